//! Entity resolver — turns generic selectors into concrete entities.
//!
//! A generic selector (`binary_sensor[motion]` in the current area) may match
//! zero, one or many entities. Conditions are rewritten accordingly: one
//! match replaces the selector in place, several matches become an `or` group
//! of concrete copies, and no match drops the condition. Disabled entities and
//! entities in an invalid state are never candidates. Results are ordered by
//! entity id.

use std::sync::Arc;

use roomstate_domain::automation::{ActionTarget, Condition, EntitySelector};
use roomstate_domain::entity::EntitySnapshot;
use roomstate_domain::id::{AreaId, EntityId};

use crate::ports::StateReader;

/// How many candidates a lookup returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveStrategy {
    /// The first candidate by entity id.
    First,
    /// Every candidate.
    #[default]
    All,
    /// Every candidate whose state is active.
    AnyActive,
}

/// Outcome of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    None,
    One(EntityId),
    Many(Vec<EntityId>),
}

impl Resolution {
    fn from_ids(mut ids: Vec<EntityId>) -> Self {
        match ids.len() {
            0 => Self::None,
            1 => Self::One(ids.remove(0)),
            _ => Self::Many(ids),
        }
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    #[must_use]
    pub fn into_ids(self) -> Vec<EntityId> {
        match self {
            Self::None => Vec::new(),
            Self::One(id) => vec![id],
            Self::Many(ids) => ids,
        }
    }
}

/// Resolves selectors against the live entity registry.
#[derive(Clone)]
pub struct EntityResolver {
    states: Arc<dyn StateReader>,
}

impl EntityResolver {
    pub fn new(states: Arc<dyn StateReader>) -> Self {
        Self { states }
    }

    /// Entities of `domain` in `area` (any area when `None`), optionally
    /// narrowed to a device class.
    #[must_use]
    pub fn resolve(
        &self,
        domain: &str,
        area: Option<&AreaId>,
        subcategory: Option<&str>,
        strategy: ResolveStrategy,
    ) -> Resolution {
        let mut candidates: Vec<EntitySnapshot> = self
            .states
            .entities()
            .into_iter()
            .filter(|e| is_candidate(e, domain, area, subcategory))
            .collect();
        candidates.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

        let ids = candidates.into_iter().map(|e| e.entity_id);
        match strategy {
            ResolveStrategy::First => Resolution::from_ids(ids.take(1).collect()),
            ResolveStrategy::All => Resolution::from_ids(ids.collect()),
            ResolveStrategy::AnyActive => Resolution::from_ids(
                ids.filter(|id| self.states.entity(id).is_some_and(|e| e.is_active()))
                    .collect(),
            ),
        }
    }

    /// Concrete entities behind a selector.
    ///
    /// Explicit selectors are returned as-is, whether or not the entity
    /// currently exists.
    #[must_use]
    pub fn resolve_selector(&self, selector: &EntitySelector, area: &AreaId) -> Vec<EntityId> {
        match selector {
            EntitySelector::Entity { entity_id } => vec![entity_id.clone()],
            EntitySelector::Generic {
                domain,
                subcategory,
                area: scope,
            } => self
                .resolve(
                    domain,
                    scope.resolve(area),
                    subcategory.as_deref(),
                    ResolveStrategy::All,
                )
                .into_ids(),
        }
    }

    /// Rewrite a condition tree so every selector is concrete.
    ///
    /// Returns `None` when nothing is left to evaluate.
    #[must_use]
    pub fn resolve_condition(&self, condition: &Condition, area: &AreaId) -> Option<Condition> {
        match condition {
            Condition::And { conditions } => {
                self.resolve_group(conditions, area).map(Condition::and)
            }
            Condition::Or { conditions } => self.resolve_group(conditions, area).map(Condition::or),
            leaf => match leaf.selector() {
                Some(selector @ EntitySelector::Generic { .. }) => {
                    let mut copies: Vec<Condition> = self
                        .resolve_selector(selector, area)
                        .into_iter()
                        .map(|id| leaf.with_selector(EntitySelector::entity(id)))
                        .collect();
                    match copies.len() {
                        0 => None,
                        1 => copies.pop(),
                        _ => Some(Condition::or(copies)),
                    }
                }
                _ => Some(leaf.clone()),
            },
        }
    }

    fn resolve_group(&self, conditions: &[Condition], area: &AreaId) -> Option<Vec<Condition>> {
        let resolved: Vec<Condition> = conditions
            .iter()
            .filter_map(|c| self.resolve_condition(c, area))
            .collect();
        (!resolved.is_empty()).then_some(resolved)
    }

    /// Entities an action aims at when fired for `area`.
    ///
    /// An area target selects every entity of the service's domain.
    #[must_use]
    pub fn resolve_target(
        &self,
        target: &ActionTarget,
        service_domain: &str,
        area: &AreaId,
    ) -> Vec<EntityId> {
        match target {
            ActionTarget::Area => self
                .resolve(service_domain, Some(area), None, ResolveStrategy::All)
                .into_ids(),
            ActionTarget::Entities { entity_ids } => entity_ids.clone(),
            ActionTarget::Selector { selector } => self.resolve_selector(selector, area),
        }
    }
}

fn is_candidate(
    entity: &EntitySnapshot,
    domain: &str,
    area: Option<&AreaId>,
    subcategory: Option<&str>,
) -> bool {
    !entity.disabled
        && !entity.is_invalid()
        && entity.domain() == domain
        && area.is_none_or(|a| entity.area_id.as_ref() == Some(a))
        && subcategory.is_none_or(|s| entity.has_device_class(s))
}
