//! Activity — the named state an area is in (empty, movement, occupied, …).
//!
//! An [`ActivityDefinition`] says how an activity is detected, how long its
//! detection must hold before it is committed, how long it lives once its
//! detection stops, and what it turns into when it expires. The
//! [`ActivityCatalog`] is the full, validated set of definitions.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::automation::{Combinator, Condition};
use crate::error::{RoomStateError, ValidationError};
use crate::id::{ActivityId, AreaId};
use crate::time::Timestamp;

/// Id of the default baseline activity.
pub const DEFAULT_BASELINE: &str = "empty";

/// How one activity is detected and how it expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDefinition {
    pub id: ActivityId,
    #[serde(default)]
    pub name: String,
    /// Detection predicate; empty means "never detected directly".
    #[serde(default)]
    pub detection: Vec<Condition>,
    #[serde(default)]
    pub combinator: Combinator,
    /// Seconds the detection must hold before the activity is committed.
    #[serde(default)]
    pub duration_threshold: u64,
    /// Seconds the activity survives once its detection stops holding.
    #[serde(default)]
    pub timeout: u64,
    /// Activity committed when this one expires.
    #[serde(default)]
    pub transition_to: Option<ActivityId>,
    /// Entered only via timeout expiry, never via detection.
    #[serde(default)]
    pub is_transition_state: bool,
}

impl ActivityDefinition {
    /// Create a builder for constructing an [`ActivityDefinition`].
    #[must_use]
    pub fn builder() -> ActivityDefinitionBuilder {
        ActivityDefinitionBuilder::default()
    }

    /// A definition with no detection, threshold, timeout or transition.
    #[must_use]
    pub fn plain(id: ActivityId) -> Self {
        Self {
            name: id.to_string(),
            id,
            detection: Vec::new(),
            combinator: Combinator::And,
            duration_threshold: 0,
            timeout: 0,
            transition_to: None,
            is_transition_state: false,
        }
    }

    #[must_use]
    pub fn threshold_duration(&self) -> Duration {
        Duration::from_secs(self.duration_threshold)
    }

    #[must_use]
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RoomStateError::Validation`] when the id is empty or a
    /// transition state carries a detection predicate.
    pub fn validate(&self) -> Result<(), RoomStateError> {
        Ok(self.check()?)
    }

    fn check(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if self.is_transition_state && !self.detection.is_empty() {
            return Err(ValidationError::DetectableTransitionState(self.id.clone()));
        }
        Ok(())
    }
}

/// Step-by-step builder for [`ActivityDefinition`].
#[derive(Debug, Default)]
pub struct ActivityDefinitionBuilder {
    id: Option<ActivityId>,
    name: Option<String>,
    detection: Vec<Condition>,
    combinator: Combinator,
    duration_threshold: u64,
    timeout: u64,
    transition_to: Option<ActivityId>,
    is_transition_state: bool,
}

impl ActivityDefinitionBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<ActivityId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn detection(mut self, condition: Condition) -> Self {
        self.detection.push(condition);
        self
    }

    #[must_use]
    pub fn combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = combinator;
        self
    }

    #[must_use]
    pub fn duration_threshold(mut self, seconds: u64) -> Self {
        self.duration_threshold = seconds;
        self
    }

    #[must_use]
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    #[must_use]
    pub fn transition_to(mut self, target: impl Into<ActivityId>) -> Self {
        self.transition_to = Some(target.into());
        self
    }

    #[must_use]
    pub fn transition_state(mut self) -> Self {
        self.is_transition_state = true;
        self
    }

    /// Consume the builder, validate, and return an [`ActivityDefinition`].
    ///
    /// # Errors
    ///
    /// Returns [`RoomStateError::Validation`] if invariants fail.
    pub fn build(self) -> Result<ActivityDefinition, RoomStateError> {
        let id = self.id.unwrap_or_else(|| ActivityId::new(""));
        let definition = ActivityDefinition {
            name: self.name.unwrap_or_else(|| id.to_string()),
            id,
            detection: self.detection,
            combinator: self.combinator,
            duration_threshold: self.duration_threshold,
            timeout: self.timeout,
            transition_to: self.transition_to,
            is_transition_state: self.is_transition_state,
        };
        definition.validate()?;
        Ok(definition)
    }
}

/// The validated set of activity definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCatalog", into = "RawCatalog")]
pub struct ActivityCatalog {
    baseline: ActivityId,
    definitions: BTreeMap<ActivityId, ActivityDefinition>,
}

impl ActivityCatalog {
    /// Build and validate a catalog.
    ///
    /// When the baseline is the default `"empty"` activity and it is not
    /// defined, a plain definition for it is added.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a definition is invalid, the baseline
    /// is missing, or a `transition_to` names an unknown activity.
    pub fn new(
        baseline: impl Into<ActivityId>,
        definitions: impl IntoIterator<Item = ActivityDefinition>,
    ) -> Result<Self, ValidationError> {
        let baseline = baseline.into();
        let mut map = BTreeMap::new();
        for definition in definitions {
            definition.check()?;
            map.insert(definition.id.clone(), definition);
        }
        if !map.contains_key(&baseline) {
            if baseline.as_str() != DEFAULT_BASELINE {
                return Err(ValidationError::MissingBaseline(baseline));
            }
            map.insert(baseline.clone(), ActivityDefinition::plain(baseline.clone()));
        }
        for definition in map.values() {
            if let Some(target) = &definition.transition_to {
                if !map.contains_key(target) {
                    return Err(ValidationError::UnknownTransition {
                        from: definition.id.clone(),
                        to: target.clone(),
                    });
                }
            }
        }
        Ok(Self {
            baseline,
            definitions: map,
        })
    }

    /// The activity an area starts in and falls back to.
    #[must_use]
    pub fn baseline(&self) -> &ActivityId {
        &self.baseline
    }

    #[must_use]
    pub fn get(&self, id: &ActivityId) -> Option<&ActivityDefinition> {
        self.definitions.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &ActivityId) -> bool {
        self.definitions.contains_key(id)
    }

    /// Whether `id` names a transition-state activity.
    #[must_use]
    pub fn is_transition_state(&self, id: &ActivityId) -> bool {
        self.get(id).is_some_and(|d| d.is_transition_state)
    }

    /// Every definition, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &ActivityDefinition> {
        self.definitions.values()
    }

    /// Activities that can be detected directly: everything except the
    /// baseline and transition states, by descending duration threshold
    /// (ties broken by id).
    #[must_use]
    pub fn detection_candidates(&self) -> Vec<&ActivityDefinition> {
        let mut candidates: Vec<_> = self
            .definitions
            .values()
            .filter(|d| d.id != self.baseline && !d.is_transition_state)
            .collect();
        candidates.sort_by(|a, b| {
            b.duration_threshold
                .cmp(&a.duration_threshold)
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates
    }
}

impl Default for ActivityCatalog {
    fn default() -> Self {
        let baseline = ActivityId::new(DEFAULT_BASELINE);
        let mut definitions = BTreeMap::new();
        definitions.insert(baseline.clone(), ActivityDefinition::plain(baseline.clone()));
        Self {
            baseline,
            definitions,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawCatalog {
    #[serde(default = "default_baseline")]
    baseline: ActivityId,
    #[serde(default)]
    activities: Vec<ActivityDefinition>,
}

fn default_baseline() -> ActivityId {
    ActivityId::new(DEFAULT_BASELINE)
}

impl TryFrom<RawCatalog> for ActivityCatalog {
    type Error = ValidationError;

    fn try_from(raw: RawCatalog) -> Result<Self, Self::Error> {
        Self::new(raw.baseline, raw.activities)
    }
}

impl From<ActivityCatalog> for RawCatalog {
    fn from(catalog: ActivityCatalog) -> Self {
        Self {
            baseline: catalog.baseline,
            activities: catalog.definitions.into_values().collect(),
        }
    }
}

/// In-progress promotion of a detected but not yet committed activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThresholdTracking {
    pub target: ActivityId,
    pub since: Timestamp,
}

/// Per-area activity state, owned by the activity state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaActivityState {
    pub area_id: AreaId,
    pub current: ActivityId,
    pub activity_start: Timestamp,
    pub last_update: Timestamp,
    pub threshold: Option<ThresholdTracking>,
    /// When detection of the committed activity first stopped holding.
    pub false_since: Option<Timestamp>,
}

impl AreaActivityState {
    /// Fresh state committed to `baseline`.
    #[must_use]
    pub fn new(area_id: AreaId, baseline: ActivityId, now: Timestamp) -> Self {
        Self {
            area_id,
            current: baseline,
            activity_start: now,
            last_update: now,
            threshold: None,
            false_since: None,
        }
    }

    /// Commit `activity`.
    ///
    /// Returns `true` when the activity changed; `activity_start` moves only
    /// then.
    pub fn commit(&mut self, activity: &ActivityId, now: Timestamp) -> bool {
        self.last_update = now;
        if &self.current == activity {
            return false;
        }
        self.current = activity.clone();
        self.activity_start = now;
        true
    }
}
