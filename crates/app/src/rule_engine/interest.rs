//! Interest sets — which entity changes concern a bound area.

use std::collections::HashSet;

use roomstate_domain::automation::{Condition, EntitySelector};
use roomstate_domain::entity::EntitySnapshot;
use roomstate_domain::id::{AreaId, EntityId};

#[derive(Debug, Clone, PartialEq, Eq)]
struct GenericInterest {
    domain: String,
    subcategory: Option<String>,
    /// `None` matches every area.
    area: Option<AreaId>,
}

/// Explicit entities plus generic selectors, resolved relative to one area.
///
/// Generic selectors are matched against the changed entity's live snapshot,
/// so entities added to an area after binding are picked up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterestSet {
    entities: HashSet<EntityId>,
    generic: Vec<GenericInterest>,
}

impl InterestSet {
    /// Collect every selector in `conditions`.
    pub fn build<'a>(area: &AreaId, conditions: impl IntoIterator<Item = &'a Condition>) -> Self {
        let mut set = Self::default();
        for condition in conditions {
            condition.visit_selectors(&mut |selector| match selector {
                EntitySelector::Entity { entity_id } => {
                    set.entities.insert(entity_id.clone());
                }
                EntitySelector::Generic {
                    domain,
                    subcategory,
                    area: scope,
                } => {
                    let interest = GenericInterest {
                        domain: domain.clone(),
                        subcategory: subcategory.clone(),
                        area: scope.resolve(area).cloned(),
                    };
                    if !set.generic.contains(&interest) {
                        set.generic.push(interest);
                    }
                }
            });
        }
        set
    }

    /// Whether a change of `id` (currently `snapshot`) is of interest.
    #[must_use]
    pub fn matches(&self, id: &EntityId, snapshot: Option<&EntitySnapshot>) -> bool {
        if self.entities.contains(id) {
            return true;
        }
        let Some(entity) = snapshot else {
            return false;
        };
        self.generic.iter().any(|interest| {
            entity.domain() == interest.domain
                && interest
                    .subcategory
                    .as_deref()
                    .is_none_or(|s| entity.has_device_class(s))
                && interest
                    .area
                    .as_ref()
                    .is_none_or(|a| entity.area_id.as_ref() == Some(a))
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.generic.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use roomstate_domain::automation::{AreaScope, Predicate, StateMatch};

    use super::*;
    use crate::testing::{plain, sensor};

    fn interest() -> InterestSet {
        let conditions = [
            Condition::Predicate {
                target: EntitySelector::generic("binary_sensor", Some("motion")),
                test: Predicate::Active,
            },
            Condition::or(vec![Condition::StateEquals {
                target: EntitySelector::entity("media_player.tv"),
                state: StateMatch::One("playing".into()),
            }]),
            Condition::Predicate {
                target: EntitySelector::Generic {
                    domain: "person".into(),
                    subcategory: None,
                    area: AreaScope::Any,
                },
                test: Predicate::Active,
            },
        ];
        InterestSet::build(&AreaId::new("hall"), &conditions)
    }

    #[test]
    fn should_match_explicit_entity_without_snapshot() {
        assert!(interest().matches(&EntityId::new("media_player.tv"), None));
        assert!(!interest().matches(&EntityId::new("media_player.radio"), None));
    }

    #[test]
    fn should_match_generic_selector_in_bound_area() {
        let set = interest();
        let hall = sensor("binary_sensor.hall_motion", "hall", "motion", "on");
        let office = sensor("binary_sensor.office_motion", "office", "motion", "on");
        let door = sensor("binary_sensor.hall_door", "hall", "door", "on");
        assert!(set.matches(&hall.entity_id, Some(&hall)));
        assert!(!set.matches(&office.entity_id, Some(&office)));
        assert!(!set.matches(&door.entity_id, Some(&door)));
    }

    #[test]
    fn should_match_any_area_scope_everywhere() {
        let phone = plain("person.alex", "garden", "home");
        assert!(interest().matches(&phone.entity_id, Some(&phone)));
        assert!(!InterestSet::default().matches(&phone.entity_id, Some(&phone)));
        assert!(InterestSet::default().is_empty());
    }
}
