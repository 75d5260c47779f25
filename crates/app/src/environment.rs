//! Environment probe — derives an area's environmental snapshot from its
//! sensors.

use std::sync::Arc;

use roomstate_domain::entity::EntitySnapshot;
use roomstate_domain::environment::{
    EnvironmentalReadings, EnvironmentalSnapshot, Quantity, SENSOR_DOMAIN,
};
use roomstate_domain::id::AreaId;

use crate::ports::{SettingsProvider, StateReader};

/// Reads illuminance, humidity and temperature sensors of an area.
#[derive(Clone)]
pub struct EnvironmentProbe {
    states: Arc<dyn StateReader>,
    settings: Arc<dyn SettingsProvider>,
}

impl EnvironmentProbe {
    pub fn new(states: Arc<dyn StateReader>, settings: Arc<dyn SettingsProvider>) -> Self {
        Self { states, settings }
    }

    /// The quantity a sensor reports, if it feeds environmental snapshots.
    #[must_use]
    pub fn quantity_of(entity: &EntitySnapshot) -> Option<Quantity> {
        if entity.domain() != SENSOR_DOMAIN || entity.disabled {
            return None;
        }
        entity
            .device_class
            .as_deref()
            .and_then(Quantity::from_device_class)
    }

    /// Whether `entity` feeds the environmental snapshot of `area`.
    #[must_use]
    pub fn feeds(entity: &EntitySnapshot, area: &AreaId) -> bool {
        entity.area_id.as_ref() == Some(area) && Self::quantity_of(entity).is_some()
    }

    /// Averaged valid readings per quantity.
    #[must_use]
    pub fn readings(&self, area: &AreaId) -> EnvironmentalReadings {
        EnvironmentalReadings::average(
            self.states
                .entities_in_area(area)
                .iter()
                .filter_map(|e| Some((Self::quantity_of(e)?, e.numeric_state()?))),
        )
    }

    /// Current boolean attributes of `area`.
    #[must_use]
    pub fn snapshot(&self, area: &AreaId) -> EnvironmentalSnapshot {
        EnvironmentalSnapshot::derive(
            &self.readings(area),
            &self.settings.environmental_thresholds(),
        )
    }
}
