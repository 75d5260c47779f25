//! Hand-written fakes shared by unit tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use roomstate_domain::automation::PresenceCategory;
use roomstate_domain::entity::EntitySnapshot;
use roomstate_domain::error::RoomStateError;
use roomstate_domain::id::{AreaId, EntityId};

use crate::ports::{ActionSink, DispatchRequest, SettingsProvider, StateReader, UpdateNotifier};

#[derive(Default)]
pub struct FakeStates {
    entities: Mutex<BTreeMap<EntityId, EntitySnapshot>>,
}

impl FakeStates {
    pub fn with(entities: Vec<EntitySnapshot>) -> Self {
        let states = Self::default();
        for entity in entities {
            states.put(entity);
        }
        states
    }

    pub fn put(&self, entity: EntitySnapshot) {
        self.entities
            .lock()
            .unwrap()
            .insert(entity.entity_id.clone(), entity);
    }

    pub fn set_state(&self, id: &str, state: &str) {
        let mut entities = self.entities.lock().unwrap();
        let entity = entities.get_mut(&EntityId::new(id)).expect("unknown entity");
        entity.state = state.to_string();
    }
}

impl StateReader for FakeStates {
    fn entity(&self, id: &EntityId) -> Option<EntitySnapshot> {
        self.entities.lock().unwrap().get(id).cloned()
    }

    fn entities(&self) -> Vec<EntitySnapshot> {
        self.entities.lock().unwrap().values().cloned().collect()
    }
}

pub fn sensor(id: &str, area: &str, device_class: &str, state: &str) -> EntitySnapshot {
    EntitySnapshot::builder()
        .entity_id(id)
        .area_id(area)
        .device_class(device_class)
        .state(state)
        .build()
        .unwrap()
}

pub fn plain(id: &str, area: &str, state: &str) -> EntitySnapshot {
    EntitySnapshot::builder()
        .entity_id(id)
        .area_id(area)
        .state(state)
        .build()
        .unwrap()
}

#[derive(Default)]
pub struct FakeSettings {
    pub disabled_areas: Mutex<HashSet<AreaId>>,
    pub categories: Mutex<Option<HashSet<PresenceCategory>>>,
    pub environmental_cooldown: Option<Duration>,
    pub fail_categories: bool,
}

impl SettingsProvider for FakeSettings {
    fn automation_enabled(&self, area: &AreaId) -> bool {
        !self.disabled_areas.lock().unwrap().contains(area)
    }

    fn environmental_cooldown(&self) -> Option<Duration> {
        self.environmental_cooldown
    }

    fn enabled_presence_categories(
        &self,
    ) -> Result<Option<HashSet<PresenceCategory>>, RoomStateError> {
        if self.fail_categories {
            return Err(RoomStateError::Storage("settings unavailable".into()));
        }
        Ok(self.categories.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct SpyNotifier {
    pub updates: Mutex<Vec<AreaId>>,
}

impl SpyNotifier {
    pub fn count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

impl UpdateNotifier for SpyNotifier {
    fn area_updated(&self, area: &AreaId) {
        self.updates.lock().unwrap().push(area.clone());
    }
}

#[derive(Default)]
pub struct SpySink {
    pub requests: Mutex<Vec<DispatchRequest>>,
    pub fail: std::sync::atomic::AtomicBool,
}

impl SpySink {
    pub fn requests(&self) -> Vec<DispatchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ActionSink for SpySink {
    async fn dispatch(&self, request: DispatchRequest) -> Result<(), RoomStateError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(RoomStateError::Dispatch("sink offline".into()));
        }
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}
