//! Action — an effect requested from the host when an action set fires.

use serde::{Deserialize, Serialize};

use crate::automation::condition::EntitySelector;
use crate::id::EntityId;

/// Which entities an [`Action`] is aimed at.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionTarget {
    /// Every entity of the service's domain in the area the action fires for.
    #[default]
    Area,
    /// An explicit list of entities.
    Entities { entity_ids: Vec<EntityId> },
    /// Entities matched by a selector.
    Selector { selector: EntitySelector },
}

/// A service call to perform, resolved against the area at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Service name in `<domain>.<service>` form, e.g. `"light.turn_on"`.
    pub service: String,
    #[serde(default)]
    pub target: ActionTarget,
    /// Additional parameters for the service call.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Action {
    /// A service call aimed at the whole area.
    #[must_use]
    pub fn call(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            target: ActionTarget::Area,
            data: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: ActionTarget) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// The service's capability domain (`light` for `light.turn_on`).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.service
            .split_once('.')
            .map_or(self.service.as_str(), |(d, _)| d)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            ActionTarget::Area => write!(f, "{}(area)", self.service),
            ActionTarget::Entities { entity_ids } => write!(
                f,
                "{}({})",
                self.service,
                entity_ids
                    .iter()
                    .map(EntityId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ActionTarget::Selector { selector } => write!(f, "{}({selector})", self.service),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_extract_domain_from_service() {
        assert_eq!(Action::call("light.turn_on").domain(), "light");
        assert_eq!(Action::call("notify").domain(), "notify");
    }

    #[test]
    fn should_default_to_area_target_when_deserializing() {
        let json = serde_json::json!({"service": "light.turn_off"});
        let a: Action = serde_json::from_value(json).unwrap();
        assert_eq!(a.target, ActionTarget::Area);
        assert!(a.data.is_null());
    }

    #[test]
    fn should_deserialize_explicit_entities_target() {
        let json = serde_json::json!({
            "service": "switch.turn_on",
            "target": {"kind": "entities", "entity_ids": ["switch.fan"]},
            "data": {"speed": 2}
        });
        let a: Action = serde_json::from_value(json).unwrap();
        assert_eq!(
            a.target,
            ActionTarget::Entities {
                entity_ids: vec![EntityId::new("switch.fan")]
            }
        );
        assert_eq!(a.data["speed"], 2);
    }

    #[test]
    fn should_display_targets() {
        assert_eq!(Action::call("light.turn_on").to_string(), "light.turn_on(area)");
        let a = Action::call("light.turn_on").with_target(ActionTarget::Entities {
            entity_ids: vec![EntityId::new("light.a"), EntityId::new("light.b")],
        });
        assert_eq!(a.to_string(), "light.turn_on(light.a, light.b)");
        let a = Action::call("light.turn_on").with_target(ActionTarget::Selector {
            selector: EntitySelector::generic("light", Some("ceiling")),
        });
        assert_eq!(a.to_string(), "light.turn_on(light[ceiling])");
    }
}
