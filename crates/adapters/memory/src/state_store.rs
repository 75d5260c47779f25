//! Entity registry kept in memory.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use roomstate_app::ports::StateReader;
use roomstate_domain::entity::EntitySnapshot;
use roomstate_domain::event::StateChange;
use roomstate_domain::id::EntityId;

/// Latest snapshot of every entity the host reported.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    entities: RwLock<HashMap<EntityId, EntitySnapshot>>,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a full snapshot.
    pub fn upsert(&self, entity: EntitySnapshot) {
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity.entity_id.clone(), entity);
    }

    /// Apply a bare state change to a known entity.
    ///
    /// Returns `false` when the entity is unknown; the change is dropped.
    pub fn apply(&self, change: &StateChange) -> bool {
        let mut entities = self.entities.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entity) = entities.get_mut(&change.entity_id) else {
            tracing::debug!(entity_id = %change.entity_id, "state change for unknown entity");
            return false;
        };
        if entity.state != change.state {
            entity.state.clone_from(&change.state);
            entity.last_changed = change.timestamp;
        }
        true
    }

    /// Forget an entity.
    pub fn remove(&self, id: &EntityId) -> Option<EntitySnapshot> {
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateReader for InMemoryStateStore {
    fn entity(&self, id: &EntityId) -> Option<EntitySnapshot> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn entities(&self) -> Vec<EntitySnapshot> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}
