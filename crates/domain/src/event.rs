//! Event — "object X's observed value changed to V".
//!
//! The host publishes one [`StateChange`] per observed change. The engine
//! subscribes broadly and filters for relevance itself.

use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::time::{Timestamp, now};

/// An inbound state-change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub entity_id: EntityId,
    /// The newly observed state string.
    pub state: String,
    #[serde(default = "now")]
    pub timestamp: Timestamp,
}

impl StateChange {
    /// Record a change observed now.
    #[must_use]
    pub fn new(entity_id: impl Into<EntityId>, state: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            timestamp: now(),
        }
    }
}

impl std::fmt::Display for StateChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.entity_id, self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_entity_and_new_state() {
        let change = StateChange::new("binary_sensor.hall_motion", "on");
        assert_eq!(change.to_string(), "binary_sensor.hall_motion -> on");
    }

    #[test]
    fn should_default_timestamp_when_deserializing() {
        let json = serde_json::json!({"entity_id": "light.a", "state": "off"});
        let change: StateChange = serde_json::from_value(json).unwrap();
        assert_eq!(change.entity_id, EntityId::new("light.a"));
    }
}
