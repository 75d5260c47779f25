//! Entity — the host's view of a single observable object.
//!
//! The core never owns entities. It reads [`EntitySnapshot`]s through the
//! `StateReader` port and reasons about their state strings, attributes,
//! area membership and capability category.

mod attribute_value;

pub use attribute_value::AttributeValue;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{RoomStateError, ValidationError};
use crate::id::{AreaId, EntityId};
use crate::time::{Timestamp, now};

/// State strings hosts use to say "there is no usable value".
pub const INVALID_STATES: [&str; 4] = ["unavailable", "unknown", "undefined", "none"];

/// State strings that count as "something is happening".
pub const ACTIVE_STATES: [&str; 7] = [
    "on", "open", "home", "playing", "detected", "occupied", "active",
];

/// Whether a raw state string is one of the invalid sentinels.
///
/// Matching is case-insensitive; an empty string is invalid too.
#[must_use]
pub fn is_invalid_state(state: &str) -> bool {
    let state = state.trim();
    state.is_empty() || INVALID_STATES.iter().any(|s| s.eq_ignore_ascii_case(state))
}

/// Point-in-time view of a host entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_id: EntityId,
    /// Area the entity belongs to, if any.
    #[serde(default)]
    pub area_id: Option<AreaId>,
    /// Capability subcategory (device class), e.g. `"motion"`, `"illuminance"`.
    #[serde(default)]
    pub device_class: Option<String>,
    pub state: String,
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
    /// Disabled entities are never considered by the resolver.
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "now")]
    pub last_changed: Timestamp,
}

impl EntitySnapshot {
    /// Create a builder for constructing an [`EntitySnapshot`].
    #[must_use]
    pub fn builder() -> EntitySnapshotBuilder {
        EntitySnapshotBuilder::default()
    }

    /// The capability domain of the entity (`light`, `binary_sensor`, …).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.entity_id.domain()
    }

    /// Whether the state is one of the invalid sentinels.
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        is_invalid_state(&self.state)
    }

    /// Whether the state is one of the [`ACTIVE_STATES`].
    #[must_use]
    pub fn is_active(&self) -> bool {
        let state = self.state.trim();
        ACTIVE_STATES.iter().any(|s| s.eq_ignore_ascii_case(state))
    }

    /// The state parsed as a number, if it is one.
    #[must_use]
    pub fn numeric_state(&self) -> Option<f64> {
        if self.is_invalid() {
            return None;
        }
        self.state.trim().parse().ok()
    }

    /// Look up an attribute by key.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// An attribute parsed as a number, if present and numeric.
    #[must_use]
    pub fn numeric_attribute(&self, key: &str) -> Option<f64> {
        self.attribute(key).and_then(AttributeValue::as_f64)
    }

    /// Whether the device class equals `subcategory`, case-insensitively.
    #[must_use]
    pub fn has_device_class(&self, subcategory: &str) -> bool {
        self.device_class
            .as_deref()
            .is_some_and(|dc| dc.eq_ignore_ascii_case(subcategory))
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RoomStateError::Validation`] when the entity id is empty.
    pub fn validate(&self) -> Result<(), RoomStateError> {
        if self.entity_id.is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`EntitySnapshot`].
#[derive(Debug, Default)]
pub struct EntitySnapshotBuilder {
    entity_id: Option<EntityId>,
    area_id: Option<AreaId>,
    device_class: Option<String>,
    state: Option<String>,
    attributes: HashMap<String, AttributeValue>,
    disabled: bool,
    last_changed: Option<Timestamp>,
}

impl EntitySnapshotBuilder {
    #[must_use]
    pub fn entity_id(mut self, entity_id: impl Into<EntityId>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    #[must_use]
    pub fn area_id(mut self, area_id: impl Into<AreaId>) -> Self {
        self.area_id = Some(area_id.into());
        self
    }

    #[must_use]
    pub fn device_class(mut self, device_class: impl Into<String>) -> Self {
        self.device_class = Some(device_class.into());
        self
    }

    #[must_use]
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    #[must_use]
    pub fn last_changed(mut self, ts: Timestamp) -> Self {
        self.last_changed = Some(ts);
        self
    }

    /// Consume the builder, validate, and return an [`EntitySnapshot`].
    ///
    /// The state defaults to `"unknown"`.
    ///
    /// # Errors
    ///
    /// Returns [`RoomStateError::Validation`] if the entity id is missing.
    pub fn build(self) -> Result<EntitySnapshot, RoomStateError> {
        let snapshot = EntitySnapshot {
            entity_id: self.entity_id.unwrap_or_else(|| EntityId::new("")),
            area_id: self.area_id,
            device_class: self.device_class,
            state: self.state.unwrap_or_else(|| "unknown".to_string()),
            attributes: self.attributes,
            disabled: self.disabled,
            last_changed: self.last_changed.unwrap_or_else(now),
        };
        snapshot.validate()?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor(state: &str) -> EntitySnapshot {
        EntitySnapshot::builder()
            .entity_id("sensor.hall_lux")
            .area_id("hall")
            .device_class("illuminance")
            .state(state)
            .build()
            .unwrap()
    }

    #[test]
    fn should_treat_sentinels_as_invalid_regardless_of_case() {
        for state in ["unavailable", "Unknown", "UNDEFINED", "None", "", "  "] {
            assert!(is_invalid_state(state), "{state:?} should be invalid");
        }
        assert!(!is_invalid_state("off"));
    }

    #[test]
    fn should_report_active_for_active_states() {
        assert!(sensor("on").is_active());
        assert!(sensor("Playing").is_active());
        assert!(!sensor("off").is_active());
        assert!(!sensor("unavailable").is_active());
    }

    #[test]
    fn should_parse_numeric_state() {
        assert_eq!(sensor("12.5").numeric_state(), Some(12.5));
        assert_eq!(sensor("bright").numeric_state(), None);
        assert_eq!(sensor("unknown").numeric_state(), None);
    }

    #[test]
    fn should_read_numeric_attribute() {
        let light = EntitySnapshot::builder()
            .entity_id("light.desk")
            .state("on")
            .attribute("brightness", AttributeValue::Int(128))
            .build()
            .unwrap();
        assert_eq!(light.numeric_attribute("brightness"), Some(128.0));
        assert_eq!(light.numeric_attribute("color_temp"), None);
    }

    #[test]
    fn should_match_device_class_case_insensitively() {
        assert!(sensor("10").has_device_class("Illuminance"));
        assert!(!sensor("10").has_device_class("motion"));
    }

    #[test]
    fn should_default_state_to_unknown() {
        let e = EntitySnapshot::builder()
            .entity_id("switch.fan")
            .build()
            .unwrap();
        assert_eq!(e.state, "unknown");
        assert!(e.is_invalid());
    }

    #[test]
    fn should_return_validation_error_when_entity_id_missing() {
        let result = EntitySnapshot::builder().state("on").build();
        assert!(matches!(
            result,
            Err(RoomStateError::Validation(ValidationError::EmptyId))
        ));
    }

    #[test]
    fn should_deserialize_with_defaults() {
        let json = serde_json::json!({"entity_id": "light.porch", "state": "off"});
        let e: EntitySnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(e.domain(), "light");
        assert!(e.area_id.is_none());
        assert!(!e.disabled);
    }
}
