//! Cooldown bookkeeping — when did each kind of dispatch last happen?
//!
//! Enter and exit dispatches are tracked on separate keys so that turning
//! something on never blocks turning it off straight after.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::time::{Timestamp, elapsed};

/// What caused a rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// A presence / detection-relevant entity changed, or a timer moved the
    /// area to a new activity.
    Activity,
    /// An environmental attribute crossed its boundary.
    Environmental,
}

/// Whether actions are entering (conditions became true) or exiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionDirection {
    Enter,
    Exit,
}

/// Independent cooldown tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownKey {
    ActivityEnter,
    EnvironmentalEnter,
    EnvironmentalExit,
}

impl CooldownKey {
    /// The track for a trigger kind and direction.
    ///
    /// Activity-triggered exits are not cooled down and return `None`.
    #[must_use]
    pub fn for_dispatch(trigger: TriggerKind, direction: ActionDirection) -> Option<Self> {
        match (trigger, direction) {
            (TriggerKind::Activity, ActionDirection::Enter) => Some(Self::ActivityEnter),
            (TriggerKind::Activity, ActionDirection::Exit) => None,
            (TriggerKind::Environmental, ActionDirection::Enter) => Some(Self::EnvironmentalEnter),
            (TriggerKind::Environmental, ActionDirection::Exit) => Some(Self::EnvironmentalExit),
        }
    }
}

/// Last dispatch time per cooldown track, for one area.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CooldownRecord {
    stamps: HashMap<CooldownKey, Timestamp>,
}

impl CooldownRecord {
    /// Whether `key` was stamped less than `window` before `now`.
    #[must_use]
    pub fn is_cooling(&self, key: CooldownKey, now: Timestamp, window: Duration) -> bool {
        self.stamps
            .get(&key)
            .is_some_and(|&last| elapsed(last, now) < window)
    }

    /// Stamp `key` at `now`.
    pub fn record(&mut self, key: CooldownKey, now: Timestamp) {
        self.stamps.insert(key, now);
    }

    /// When `key` was last stamped.
    #[must_use]
    pub fn last(&self, key: CooldownKey) -> Option<Timestamp> {
        self.stamps.get(&key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    const WINDOW: Duration = Duration::from_secs(30);

    #[test]
    fn should_not_cool_down_when_never_stamped() {
        let record = CooldownRecord::default();
        assert!(!record.is_cooling(CooldownKey::ActivityEnter, now(), WINDOW));
    }

    #[test]
    fn should_cool_down_within_window() {
        let t0 = now();
        let mut record = CooldownRecord::default();
        record.record(CooldownKey::EnvironmentalEnter, t0);
        let t1 = t0 + chrono::Duration::seconds(10);
        assert!(record.is_cooling(CooldownKey::EnvironmentalEnter, t1, WINDOW));
        let t2 = t0 + chrono::Duration::seconds(30);
        assert!(!record.is_cooling(CooldownKey::EnvironmentalEnter, t2, WINDOW));
    }

    #[test]
    fn should_keep_enter_and_exit_tracks_independent() {
        let t0 = now();
        let mut record = CooldownRecord::default();
        record.record(CooldownKey::EnvironmentalEnter, t0);
        assert!(!record.is_cooling(CooldownKey::EnvironmentalExit, t0, WINDOW));
        assert!(!record.is_cooling(CooldownKey::ActivityEnter, t0, WINDOW));
        assert_eq!(record.last(CooldownKey::EnvironmentalEnter), Some(t0));
    }

    #[test]
    fn should_map_trigger_and_direction_to_key() {
        assert_eq!(
            CooldownKey::for_dispatch(TriggerKind::Activity, ActionDirection::Enter),
            Some(CooldownKey::ActivityEnter)
        );
        assert_eq!(
            CooldownKey::for_dispatch(TriggerKind::Environmental, ActionDirection::Exit),
            Some(CooldownKey::EnvironmentalExit)
        );
        assert_eq!(
            CooldownKey::for_dispatch(TriggerKind::Activity, ActionDirection::Exit),
            None
        );
    }
}
