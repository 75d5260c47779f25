//! State port — read access to the host's live entity states.

use roomstate_domain::entity::EntitySnapshot;
use roomstate_domain::id::{AreaId, EntityId};

/// Synchronous view of the host's current entity states.
///
/// Reads must not block on IO: the core calls them while evaluating
/// conditions under its own locks.
pub trait StateReader: Send + Sync {
    /// The current snapshot of one entity.
    fn entity(&self, id: &EntityId) -> Option<EntitySnapshot>;

    /// Every known entity.
    fn entities(&self) -> Vec<EntitySnapshot>;

    /// Entities assigned to `area`.
    fn entities_in_area(&self, area: &AreaId) -> Vec<EntitySnapshot> {
        self.entities()
            .into_iter()
            .filter(|e| e.area_id.as_ref() == Some(area))
            .collect()
    }
}

impl<T: StateReader + ?Sized> StateReader for std::sync::Arc<T> {
    fn entity(&self, id: &EntityId) -> Option<EntitySnapshot> {
        (**self).entity(id)
    }

    fn entities(&self) -> Vec<EntitySnapshot> {
        (**self).entities()
    }

    fn entities_in_area(&self, area: &AreaId) -> Vec<EntitySnapshot> {
        (**self).entities_in_area(area)
    }
}
