//! Condition — a boolean test evaluated against live state.
//!
//! Conditions form a tree: leaves test one entity (or a generic selector that
//! is expanded into concrete entities at evaluation time), the clock, an
//! area's environmental snapshot or its current activity; `and` / `or` nodes
//! nest arbitrarily.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::environment::EnvironmentalAttribute;
use crate::id::{ActivityId, AreaId, EntityId};

/// How the results of sibling conditions are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

/// Which area a generic selector searches.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaScope {
    /// The area the condition is being evaluated for.
    #[default]
    Current,
    /// A specific, named area.
    Named(AreaId),
    /// Every area, including entities with no area.
    Any,
}

impl AreaScope {
    /// Resolve the scope to a concrete area filter; `None` means "any area".
    #[must_use]
    pub fn resolve<'a>(&'a self, current: &'a AreaId) -> Option<&'a AreaId> {
        match self {
            Self::Current => Some(current),
            Self::Named(area) => Some(area),
            Self::Any => None,
        }
    }
}

/// Reference to the entity (or entities) a leaf condition tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntitySelector {
    /// One concrete entity.
    Entity { entity_id: EntityId },
    /// Every entity of a capability domain (optionally narrowed to a
    /// subcategory) within an area scope.
    Generic {
        domain: String,
        #[serde(default)]
        subcategory: Option<String>,
        #[serde(default)]
        area: AreaScope,
    },
}

impl EntitySelector {
    /// Select one concrete entity.
    #[must_use]
    pub fn entity(entity_id: impl Into<EntityId>) -> Self {
        Self::Entity {
            entity_id: entity_id.into(),
        }
    }

    /// Select every entity of `domain` in the current area.
    #[must_use]
    pub fn generic(domain: impl Into<String>, subcategory: Option<&str>) -> Self {
        Self::Generic {
            domain: domain.into(),
            subcategory: subcategory.map(str::to_string),
            area: AreaScope::Current,
        }
    }

    /// The presence category implied by the selector, if any.
    #[must_use]
    pub fn presence_category(&self) -> Option<PresenceCategory> {
        match self {
            Self::Entity { entity_id } => PresenceCategory::classify(entity_id.domain(), None),
            Self::Generic {
                domain,
                subcategory,
                ..
            } => PresenceCategory::classify(domain, subcategory.as_deref()),
        }
    }
}

impl std::fmt::Display for EntitySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entity { entity_id } => write!(f, "{entity_id}"),
            Self::Generic {
                domain,
                subcategory: Some(sub),
                ..
            } => write!(f, "{domain}[{sub}]"),
            Self::Generic { domain, .. } => write!(f, "{domain}[*]"),
        }
    }
}

/// Presence-class categories that can be switched off at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceCategory {
    Motion,
    Presence,
    Occupancy,
    MediaPlaying,
}

impl PresenceCategory {
    pub const ALL: [Self; 4] = [
        Self::Motion,
        Self::Presence,
        Self::Occupancy,
        Self::MediaPlaying,
    ];

    /// Classify a capability domain and device class.
    #[must_use]
    pub fn classify(domain: &str, subcategory: Option<&str>) -> Option<Self> {
        if domain == "media_player" {
            return Some(Self::MediaPlaying);
        }
        if domain != "binary_sensor" {
            return None;
        }
        match subcategory?.to_ascii_lowercase().as_str() {
            "motion" => Some(Self::Motion),
            "presence" => Some(Self::Presence),
            "occupancy" => Some(Self::Occupancy),
            _ => None,
        }
    }
}

/// One or several accepted state strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateMatch {
    One(String),
    Any(Vec<String>),
}

impl StateMatch {
    /// Whether `state` is accepted, case-insensitively.
    #[must_use]
    pub fn matches(&self, state: &str) -> bool {
        match self {
            Self::One(expected) => expected.eq_ignore_ascii_case(state),
            Self::Any(expected) => expected.iter().any(|e| e.eq_ignore_ascii_case(state)),
        }
    }
}

impl std::fmt::Display for StateMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::One(s) => f.write_str(s),
            Self::Any(list) => write!(f, "[{}]", list.join("|")),
        }
    }
}

/// Generic entity predicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// State is one of the active states (`on`, `playing`, …).
    Active,
    /// State is valid but not active.
    Inactive,
    /// State is anything but an invalid sentinel.
    Available,
    /// The named attribute is present.
    HasAttribute(String),
}

/// A predicate over live state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Entity state equals one of the given values.
    StateEquals {
        target: EntitySelector,
        state: StateMatch,
    },
    /// Numeric state (or attribute) lies strictly within `above..below`.
    NumericRange {
        target: EntitySelector,
        #[serde(default)]
        attribute: Option<String>,
        #[serde(default)]
        above: Option<f64>,
        #[serde(default)]
        below: Option<f64>,
    },
    /// Current local time lies within a window (`HH:MM`, overnight wrap allowed).
    TimeWindow {
        #[serde(default)]
        after: Option<String>,
        #[serde(default)]
        before: Option<String>,
        #[serde(default)]
        weekdays: Vec<Weekday>,
    },
    /// Generic entity predicate.
    Predicate {
        target: EntitySelector,
        test: Predicate,
    },
    /// An environmental attribute of the evaluated area has the given value.
    AreaAttribute {
        attribute: EnvironmentalAttribute,
        #[serde(default = "default_true")]
        value: bool,
    },
    /// The evaluated area's current activity equals `activity`.
    ActivityEquals { activity: ActivityId },
    And { conditions: Vec<Condition> },
    Or { conditions: Vec<Condition> },
}

fn default_true() -> bool {
    true
}

impl Condition {
    /// Build an `and` group.
    #[must_use]
    pub fn and(conditions: Vec<Condition>) -> Self {
        Self::And { conditions }
    }

    /// Build an `or` group.
    #[must_use]
    pub fn or(conditions: Vec<Condition>) -> Self {
        Self::Or { conditions }
    }

    /// Build a group using the given combinator.
    #[must_use]
    pub fn group(combinator: Combinator, conditions: Vec<Condition>) -> Self {
        match combinator {
            Combinator::And => Self::and(conditions),
            Combinator::Or => Self::or(conditions),
        }
    }

    /// The entity selector of a leaf condition.
    #[must_use]
    pub fn selector(&self) -> Option<&EntitySelector> {
        match self {
            Self::StateEquals { target, .. }
            | Self::NumericRange { target, .. }
            | Self::Predicate { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Copy of this leaf with its selector replaced.
    ///
    /// Conditions without a selector are returned unchanged.
    #[must_use]
    pub fn with_selector(&self, selector: EntitySelector) -> Self {
        let mut copy = self.clone();
        match &mut copy {
            Self::StateEquals { target, .. }
            | Self::NumericRange { target, .. }
            | Self::Predicate { target, .. } => *target = selector,
            _ => {}
        }
        copy
    }

    /// The presence category this leaf belongs to, if it is presence-class.
    #[must_use]
    pub fn presence_category(&self) -> Option<PresenceCategory> {
        self.selector().and_then(EntitySelector::presence_category)
    }

    /// Whether the condition is an `and` / `or` group.
    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self, Self::And { .. } | Self::Or { .. })
    }

    /// Visit every selector in the tree, depth first.
    pub fn visit_selectors<'a>(&'a self, visit: &mut impl FnMut(&'a EntitySelector)) {
        match self {
            Self::And { conditions } | Self::Or { conditions } => {
                for c in conditions {
                    c.visit_selectors(visit);
                }
            }
            other => {
                if let Some(selector) = other.selector() {
                    visit(selector);
                }
            }
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StateEquals { target, state } => write!(f, "state({target} == {state})"),
            Self::NumericRange {
                target,
                above,
                below,
                ..
            } => {
                let above = above.map_or_else(|| "-inf".to_string(), |v| v.to_string());
                let below = below.map_or_else(|| "+inf".to_string(), |v| v.to_string());
                write!(f, "numeric({target} in {above}..{below})")
            }
            Self::TimeWindow { after, before, .. } => write!(
                f,
                "time({}..{})",
                after.as_deref().unwrap_or("00:00"),
                before.as_deref().unwrap_or("24:00")
            ),
            Self::Predicate { target, test } => write!(f, "predicate({target} is {test:?})"),
            Self::AreaAttribute { attribute, value } => write!(f, "area({attribute} == {value})"),
            Self::ActivityEquals { activity } => write!(f, "activity({activity})"),
            Self::And { conditions } => write!(f, "and({} conditions)", conditions.len()),
            Self::Or { conditions } => write!(f, "or({} conditions)", conditions.len()),
        }
    }
}
