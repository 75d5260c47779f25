//! Settings port — runtime configuration read at invocation time.

use std::collections::HashSet;
use std::time::Duration;

use roomstate_domain::automation::PresenceCategory;
use roomstate_domain::environment::EnvironmentalThresholds;
use roomstate_domain::error::RoomStateError;
use roomstate_domain::id::AreaId;

/// Runtime toggles owned by the host, not by the core.
///
/// Every method has a permissive default.
pub trait SettingsProvider: Send + Sync {
    /// Whether automation dispatch is enabled for `area`.
    fn automation_enabled(&self, _area: &AreaId) -> bool {
        true
    }

    /// Override for the environmental enter/exit cooldown window.
    fn environmental_cooldown(&self) -> Option<Duration> {
        None
    }

    /// Presence categories currently enabled; `None` means all of them.
    ///
    /// # Errors
    ///
    /// Implementations backed by IO may fail; callers treat a failure as
    /// "all enabled".
    fn enabled_presence_categories(
        &self,
    ) -> Result<Option<HashSet<PresenceCategory>>, RoomStateError> {
        Ok(None)
    }

    /// Thresholds turning sensor readings into environmental attributes.
    fn environmental_thresholds(&self) -> EnvironmentalThresholds {
        EnvironmentalThresholds::default()
    }
}

/// Settings with every default in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSettings;

impl SettingsProvider for DefaultSettings {}

impl<T: SettingsProvider + ?Sized> SettingsProvider for std::sync::Arc<T> {
    fn automation_enabled(&self, area: &AreaId) -> bool {
        (**self).automation_enabled(area)
    }

    fn environmental_cooldown(&self) -> Option<Duration> {
        (**self).environmental_cooldown()
    }

    fn enabled_presence_categories(
        &self,
    ) -> Result<Option<HashSet<PresenceCategory>>, RoomStateError> {
        (**self).enabled_presence_categories()
    }

    fn environmental_thresholds(&self) -> EnvironmentalThresholds {
        (**self).environmental_thresholds()
    }
}
