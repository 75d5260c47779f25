//! Area — a spatial grouping (room, floor, zone) for sensors and devices.
//!
//! Areas are owned by the host; the core only reads them.

use serde::{Deserialize, Serialize};

use crate::error::{RoomStateError, ValidationError};
use crate::id::AreaId;

/// A spatial grouping such as a room or zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub name: String,
}

impl Area {
    /// Create a builder for constructing an [`Area`].
    #[must_use]
    pub fn builder() -> AreaBuilder {
        AreaBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RoomStateError::Validation`] when the id or the name is empty.
    pub fn validate(&self) -> Result<(), RoomStateError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Area`].
#[derive(Debug, Default)]
pub struct AreaBuilder {
    id: Option<AreaId>,
    name: Option<String>,
}

impl AreaBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<AreaId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Consume the builder, validate, and return an [`Area`].
    ///
    /// The display name defaults to the id when omitted.
    ///
    /// # Errors
    ///
    /// Returns [`RoomStateError::Validation`] if the id is missing or empty.
    pub fn build(self) -> Result<Area, RoomStateError> {
        let id = self.id.unwrap_or_else(|| AreaId::new(""));
        let name = self.name.unwrap_or_else(|| id.to_string());
        let area = Area { id, name };
        area.validate()?;
        Ok(area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_valid_area_when_id_and_name_provided() {
        let area = Area::builder()
            .id("living_room")
            .name("Living Room")
            .build()
            .unwrap();
        assert_eq!(area.id, AreaId::new("living_room"));
        assert_eq!(area.name, "Living Room");
    }

    #[test]
    fn should_default_name_to_id() {
        let area = Area::builder().id("kitchen").build().unwrap();
        assert_eq!(area.name, "kitchen");
    }

    #[test]
    fn should_return_validation_error_when_id_is_missing() {
        let result = Area::builder().name("Nowhere").build();
        assert!(matches!(
            result,
            Err(RoomStateError::Validation(ValidationError::EmptyId))
        ));
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let area = Area::builder().id("office").name("Office").build().unwrap();
        let json = serde_json::to_string(&area).unwrap();
        let parsed: Area = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, area);
    }
}
