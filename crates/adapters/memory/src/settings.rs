//! Settings fixed at startup, with a runtime per-area automation toggle.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use roomstate_app::ports::SettingsProvider;
use roomstate_domain::automation::PresenceCategory;
use roomstate_domain::environment::EnvironmentalThresholds;
use roomstate_domain::error::RoomStateError;
use roomstate_domain::id::AreaId;

#[derive(Debug, Default)]
pub struct StaticSettings {
    disabled_areas: RwLock<HashSet<AreaId>>,
    disabled_categories: HashSet<PresenceCategory>,
    environmental_cooldown: Option<Duration>,
    thresholds: EnvironmentalThresholds,
}

impl StaticSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_disabled_areas(self, areas: impl IntoIterator<Item = AreaId>) -> Self {
        *self
            .disabled_areas
            .write()
            .unwrap_or_else(PoisonError::into_inner) = areas.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_disabled_categories(
        mut self,
        categories: impl IntoIterator<Item = PresenceCategory>,
    ) -> Self {
        self.disabled_categories = categories.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_environmental_cooldown(mut self, cooldown: Duration) -> Self {
        self.environmental_cooldown = Some(cooldown);
        self
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: EnvironmentalThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Switch automation dispatch for `area` on or off.
    pub fn set_automation_enabled(&self, area: &AreaId, enabled: bool) {
        let mut disabled = self
            .disabled_areas
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if enabled {
            disabled.remove(area);
        } else {
            disabled.insert(area.clone());
        }
    }
}

impl SettingsProvider for StaticSettings {
    fn automation_enabled(&self, area: &AreaId) -> bool {
        !self
            .disabled_areas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(area)
    }

    fn environmental_cooldown(&self) -> Option<Duration> {
        self.environmental_cooldown
    }

    fn enabled_presence_categories(
        &self,
    ) -> Result<Option<HashSet<PresenceCategory>>, RoomStateError> {
        if self.disabled_categories.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            PresenceCategory::ALL
                .into_iter()
                .filter(|c| !self.disabled_categories.contains(c))
                .collect(),
        ))
    }

    fn environmental_thresholds(&self) -> EnvironmentalThresholds {
        self.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_enable_everything_by_default() {
        let settings = StaticSettings::new();
        assert!(settings.automation_enabled(&AreaId::new("hall")));
        assert_eq!(settings.enabled_presence_categories().unwrap(), None);
        assert_eq!(settings.environmental_cooldown(), None);
    }

    #[test]
    fn should_report_remaining_categories_when_some_disabled() {
        let settings = StaticSettings::new().with_disabled_categories([PresenceCategory::MediaPlaying]);
        let enabled = settings.enabled_presence_categories().unwrap().unwrap();
        assert_eq!(enabled.len(), 3);
        assert!(!enabled.contains(&PresenceCategory::MediaPlaying));
    }

    #[test]
    fn should_toggle_area_at_runtime() {
        let hall = AreaId::new("hall");
        let settings = StaticSettings::new().with_disabled_areas([hall.clone()]);
        assert!(!settings.automation_enabled(&hall));
        settings.set_automation_enabled(&hall, true);
        assert!(settings.automation_enabled(&hall));
    }
}
