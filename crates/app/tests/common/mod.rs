//! Shared in-memory fakes for the end-to-end scenarios.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use roomstate_app::ports::{ActionSink, DispatchRequest, StateReader, UpdateNotifier};
use roomstate_domain::entity::EntitySnapshot;
use roomstate_domain::error::RoomStateError;
use roomstate_domain::id::{AreaId, EntityId};

/// Entity registry held in a map; tests mutate it directly.
#[derive(Default)]
pub struct MapStates {
    entities: Mutex<BTreeMap<EntityId, EntitySnapshot>>,
}

impl MapStates {
    pub fn with(entities: impl IntoIterator<Item = EntitySnapshot>) -> Self {
        let states = Self::default();
        for entity in entities {
            states
                .entities
                .lock()
                .unwrap()
                .insert(entity.entity_id.clone(), entity);
        }
        states
    }

    pub fn set(&self, id: &str, state: &str) {
        self.entities
            .lock()
            .unwrap()
            .get_mut(&EntityId::new(id))
            .expect("entity should exist")
            .state = state.to_string();
    }
}

impl StateReader for MapStates {
    fn entity(&self, id: &EntityId) -> Option<EntitySnapshot> {
        self.entities.lock().unwrap().get(id).cloned()
    }

    fn entities(&self) -> Vec<EntitySnapshot> {
        self.entities.lock().unwrap().values().cloned().collect()
    }
}

pub fn entity(id: &str, area: &str, device_class: Option<&str>, state: &str) -> EntitySnapshot {
    let mut builder = EntitySnapshot::builder()
        .entity_id(id)
        .area_id(area)
        .state(state);
    if let Some(class) = device_class {
        builder = builder.device_class(class);
    }
    builder.build().expect("valid entity")
}

/// Sink recording every accepted request.
#[derive(Default)]
pub struct RecordingSink {
    requests: Mutex<Vec<DispatchRequest>>,
}

impl RecordingSink {
    pub fn requests(&self) -> Vec<DispatchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl ActionSink for RecordingSink {
    async fn dispatch(&self, request: DispatchRequest) -> Result<(), RoomStateError> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}

/// Notifier counting updates per area.
#[derive(Default)]
pub struct CountingNotifier {
    updates: Mutex<Vec<AreaId>>,
}

impl CountingNotifier {
    pub fn count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

impl UpdateNotifier for CountingNotifier {
    fn area_updated(&self, area: &AreaId) {
        self.updates.lock().unwrap().push(area.clone());
    }
}

/// Advance paused time and let spawned tasks settle.
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
