//! Condition evaluator — boolean condition trees against live state.
//!
//! Generic selectors are expanded through the [`EntityResolver`] before
//! evaluation. A condition whose selector matches nothing, or whose presence
//! category is switched off in settings, is *skipped*: it does not count
//! either way, but a group in which every condition was skipped is false.
//!
//! Invalid entity states never match and are not errors. Malformed
//! conditions (unparseable times, empty or inverted ranges, explicit
//! entities that do not exist) are [`EvaluationError`]s. [`evaluate`]
//! logs each one and counts that condition as not matching, so its
//! siblings still decide the group; [`try_evaluate`] surfaces the first.
//!
//! [`evaluate`]: ConditionEvaluator::evaluate
//! [`try_evaluate`]: ConditionEvaluator::try_evaluate

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use tokio::time::Instant;

use roomstate_domain::automation::{
    Combinator, Condition, EntitySelector, Predicate, PresenceCategory,
};
use roomstate_domain::entity::EntitySnapshot;
use roomstate_domain::error::EvaluationError;
use roomstate_domain::id::{ActivityId, AreaId, EntityId};

use crate::clock::Clock;
use crate::entity_resolver::EntityResolver;
use crate::environment::EnvironmentProbe;
use crate::ports::{SettingsProvider, StateReader};

/// How long the enabled presence-category set is cached.
pub const CATEGORY_CACHE_TTL: Duration = Duration::from_secs(60);

/// What a condition tree is evaluated for.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub area: &'a AreaId,
    /// The area's current activity, for `activity_equals`.
    pub activity: Option<&'a ActivityId>,
}

impl<'a> EvalContext<'a> {
    #[must_use]
    pub fn new(area: &'a AreaId) -> Self {
        Self {
            area,
            activity: None,
        }
    }

    #[must_use]
    pub fn with_activity(mut self, activity: &'a ActivityId) -> Self {
        self.activity = Some(activity);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Matched,
    Unmatched,
    Skipped,
}

/// What a malformed condition does to its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnError {
    NonMatch,
    Propagate,
}

impl From<bool> for Outcome {
    fn from(value: bool) -> Self {
        if value { Self::Matched } else { Self::Unmatched }
    }
}

struct CachedCategories {
    fetched: Instant,
    enabled: Option<HashSet<PresenceCategory>>,
}

type Enabled = Option<HashSet<PresenceCategory>>;

pub struct ConditionEvaluator {
    states: Arc<dyn StateReader>,
    settings: Arc<dyn SettingsProvider>,
    resolver: EntityResolver,
    probe: EnvironmentProbe,
    clock: Arc<dyn Clock>,
    categories: Mutex<Option<CachedCategories>>,
    malformed: AtomicU64,
}

impl ConditionEvaluator {
    pub fn new(
        states: Arc<dyn StateReader>,
        settings: Arc<dyn SettingsProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver: EntityResolver::new(Arc::clone(&states)),
            probe: EnvironmentProbe::new(Arc::clone(&states), Arc::clone(&settings)),
            states,
            settings,
            clock,
            categories: Mutex::new(None),
            malformed: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    #[must_use]
    pub fn probe(&self) -> &EnvironmentProbe {
        &self.probe
    }

    /// Evaluate `conditions` joined by `combinator`.
    ///
    /// A malformed condition is logged and counts as "no match" on its own;
    /// the rest of its group is still evaluated.
    #[must_use]
    pub fn evaluate(
        &self,
        conditions: &[Condition],
        combinator: Combinator,
        ctx: &EvalContext<'_>,
    ) -> bool {
        let enabled = self.enabled_categories();
        self.eval_group(conditions, combinator, ctx, &enabled, OnError::NonMatch)
            .is_ok_and(|outcome| outcome == Outcome::Matched)
    }

    /// Evaluate `conditions` joined by `combinator`, surfacing malformed
    /// conditions.
    ///
    /// An empty `and` is true, an empty `or` is false.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError`] for the first malformed condition reached.
    pub fn try_evaluate(
        &self,
        conditions: &[Condition],
        combinator: Combinator,
        ctx: &EvalContext<'_>,
    ) -> Result<bool, EvaluationError> {
        let enabled = self.enabled_categories();
        let outcome = self.eval_group(conditions, combinator, ctx, &enabled, OnError::Propagate)?;
        Ok(outcome == Outcome::Matched)
    }

    /// Malformed conditions met by [`evaluate`](Self::evaluate) so far.
    #[must_use]
    pub fn malformed_conditions(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Drop the cached presence-category set.
    pub fn invalidate_categories(&self) {
        *self
            .categories
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn enabled_categories(&self) -> Enabled {
        let mut cache = self
            .categories
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.as_ref() {
            if cached.fetched.elapsed() < CATEGORY_CACHE_TTL {
                return cached.enabled.clone();
            }
        }
        let enabled = self
            .settings
            .enabled_presence_categories()
            .unwrap_or_else(|err| {
                tracing::debug!(error = %err, "presence categories unavailable, all enabled");
                None
            });
        *cache = Some(CachedCategories {
            fetched: Instant::now(),
            enabled: enabled.clone(),
        });
        enabled
    }

    fn eval_group(
        &self,
        conditions: &[Condition],
        combinator: Combinator,
        ctx: &EvalContext<'_>,
        enabled: &Enabled,
        on_error: OnError,
    ) -> Result<Outcome, EvaluationError> {
        if conditions.is_empty() {
            return Ok((combinator == Combinator::And).into());
        }
        let mut evaluated = false;
        for condition in conditions {
            let outcome = match self.eval(condition, ctx, enabled, on_error) {
                Ok(outcome) => outcome,
                Err(err) if on_error == OnError::NonMatch => {
                    self.malformed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(area = %ctx.area, error = %err, "malformed condition, not matching");
                    Outcome::Unmatched
                }
                Err(err) => return Err(err),
            };
            match (outcome, combinator) {
                (Outcome::Skipped, _) => {}
                (Outcome::Unmatched, Combinator::And) => return Ok(Outcome::Unmatched),
                (Outcome::Matched, Combinator::Or) => return Ok(Outcome::Matched),
                _ => evaluated = true,
            }
        }
        if !evaluated {
            return Ok(Outcome::Unmatched);
        }
        Ok((combinator == Combinator::And).into())
    }

    fn eval(
        &self,
        condition: &Condition,
        ctx: &EvalContext<'_>,
        enabled: &Enabled,
        on_error: OnError,
    ) -> Result<Outcome, EvaluationError> {
        match condition {
            Condition::And { conditions } => {
                self.eval_group(conditions, Combinator::And, ctx, enabled, on_error)
            }
            Condition::Or { conditions } => {
                self.eval_group(conditions, Combinator::Or, ctx, enabled, on_error)
            }
            Condition::TimeWindow {
                after,
                before,
                weekdays,
            } => {
                let local = self.clock.now().with_timezone(&chrono::Local).naive_local();
                time_window_matches(after.as_deref(), before.as_deref(), weekdays, local)
                    .map(Outcome::from)
            }
            Condition::AreaAttribute { attribute, value } => {
                let snapshot = self.probe.snapshot(ctx.area);
                Ok((snapshot.get(*attribute) == Some(*value)).into())
            }
            Condition::ActivityEquals { activity } => Ok((ctx.activity == Some(activity)).into()),
            leaf => match leaf.selector() {
                Some(EntitySelector::Entity { entity_id }) => {
                    self.eval_entity(leaf, entity_id, enabled)
                }
                Some(selector) => {
                    if is_suppressed(selector.presence_category(), enabled) {
                        tracing::trace!(%selector, "presence category disabled, skipping");
                        return Ok(Outcome::Skipped);
                    }
                    match self.resolver.resolve_condition(leaf, ctx.area) {
                        Some(resolved) => self.eval(&resolved, ctx, enabled, on_error),
                        None => {
                            tracing::trace!(area = %ctx.area, %selector, "selector matched nothing");
                            Ok(Outcome::Skipped)
                        }
                    }
                }
                None => Ok(Outcome::Unmatched),
            },
        }
    }

    fn eval_entity(
        &self,
        condition: &Condition,
        entity_id: &EntityId,
        enabled: &Enabled,
    ) -> Result<Outcome, EvaluationError> {
        if let Condition::NumericRange { above, below, .. } = condition {
            check_range(*above, *below)?;
        }
        let entity = self
            .states
            .entity(entity_id)
            .ok_or_else(|| EvaluationError::UnknownEntity(entity_id.to_string()))?;
        let category = PresenceCategory::classify(entity.domain(), entity.device_class.as_deref());
        if is_suppressed(category, enabled) {
            return Ok(Outcome::Skipped);
        }
        Ok(leaf_matches(condition, &entity).into())
    }
}

fn is_suppressed(category: Option<PresenceCategory>, enabled: &Enabled) -> bool {
    match (category, enabled) {
        (Some(category), Some(enabled)) => !enabled.contains(&category),
        _ => false,
    }
}

fn check_range(above: Option<f64>, below: Option<f64>) -> Result<(), EvaluationError> {
    match (above, below) {
        (None, None) => Err(EvaluationError::EmptyRange),
        (Some(above), Some(below)) if above >= below => Err(EvaluationError::InvertedRange {
            above: above.to_string(),
            below: below.to_string(),
        }),
        _ => Ok(()),
    }
}

fn leaf_matches(condition: &Condition, entity: &EntitySnapshot) -> bool {
    match condition {
        Condition::StateEquals { state, .. } => !entity.is_invalid() && state.matches(&entity.state),
        Condition::NumericRange {
            attribute,
            above,
            below,
            ..
        } => {
            let value = match attribute {
                Some(name) => entity.numeric_attribute(name),
                None => entity.numeric_state(),
            };
            value.is_some_and(|v| above.is_none_or(|a| v > a) && below.is_none_or(|b| v < b))
        }
        Condition::Predicate { test, .. } => match test {
            Predicate::Active => !entity.is_invalid() && entity.is_active(),
            Predicate::Inactive => !entity.is_invalid() && !entity.is_active(),
            Predicate::Available => !entity.is_invalid(),
            Predicate::HasAttribute(name) => entity.attribute(name).is_some(),
        },
        _ => false,
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, EvaluationError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| EvaluationError::InvalidTime(value.to_string()))
}

/// Whether `at` falls within `after..before` on one of `weekdays`.
///
/// A window whose start is later than its end wraps past midnight. An empty
/// weekday list means every day. `before` may be `24:00`.
///
/// # Errors
///
/// Returns [`EvaluationError::InvalidTime`] for unparseable times.
pub fn time_window_matches(
    after: Option<&str>,
    before: Option<&str>,
    weekdays: &[Weekday],
    at: NaiveDateTime,
) -> Result<bool, EvaluationError> {
    let after = after.map(parse_time).transpose()?;
    let before = before
        .filter(|b| *b != "24:00")
        .map(parse_time)
        .transpose()?;
    if !weekdays.is_empty() && !weekdays.contains(&at.weekday()) {
        return Ok(false);
    }
    let now = at.time();
    Ok(match (after, before) {
        (None, None) => true,
        (Some(after), None) => now >= after,
        (None, Some(before)) => now < before,
        (Some(after), Some(before)) if after <= before => now >= after && now < before,
        (Some(after), Some(before)) => now >= after || now < before,
    })
}

#[cfg(test)]
mod tests {
    use roomstate_domain::automation::StateMatch;
    use roomstate_domain::entity::AttributeValue;
    use roomstate_domain::environment::EnvironmentalAttribute;

    use super::*;
    use crate::clock::SystemClock;
    use crate::testing::{FakeSettings, FakeStates, plain, sensor};

    fn hall() -> AreaId {
        AreaId::new("hall")
    }

    fn states() -> FakeStates {
        FakeStates::with(vec![
            sensor("binary_sensor.hall_motion_a", "hall", "motion", "off"),
            sensor("binary_sensor.hall_motion_b", "hall", "motion", "off"),
            sensor("binary_sensor.hall_motion_c", "hall", "motion", "on"),
            sensor("sensor.hall_lux", "hall", "illuminance", "12"),
            plain("media_player.tv", "hall", "unavailable"),
            EntitySnapshot::builder()
                .entity_id("climate.hall")
                .area_id("hall")
                .state("heat")
                .attribute("current_temperature", AttributeValue::Float(20.5))
                .build()
                .unwrap(),
        ])
    }

    fn evaluator_with(settings: FakeSettings) -> ConditionEvaluator {
        ConditionEvaluator::new(Arc::new(states()), Arc::new(settings), Arc::new(SystemClock))
    }

    fn evaluator() -> ConditionEvaluator {
        evaluator_with(FakeSettings::default())
    }

    fn motion() -> Condition {
        Condition::StateEquals {
            target: EntitySelector::generic("binary_sensor", Some("motion")),
            state: StateMatch::One("on".into()),
        }
    }

    fn eval(evaluator: &ConditionEvaluator, conditions: &[Condition], combinator: Combinator) -> bool {
        let area = hall();
        evaluator.evaluate(conditions, combinator, &EvalContext::new(&area))
    }

    #[test]
    fn should_match_when_third_of_three_expanded_targets_matches() {
        assert!(eval(&evaluator(), &[motion()], Combinator::And));
    }

    #[test]
    fn should_treat_empty_groups_by_combinator() {
        let e = evaluator();
        assert!(eval(&e, &[], Combinator::And));
        assert!(!eval(&e, &[], Combinator::Or));
    }

    #[test]
    fn should_short_circuit_and_on_first_false() {
        let broken = Condition::TimeWindow {
            after: Some("25:99".into()),
            before: None,
            weekdays: vec![],
        };
        let off = Condition::StateEquals {
            target: EntitySelector::entity("binary_sensor.hall_motion_a"),
            state: StateMatch::One("on".into()),
        };
        let e = evaluator();
        let area = hall();
        let ctx = EvalContext::new(&area);
        assert_eq!(
            e.try_evaluate(&[off, broken.clone()], Combinator::And, &ctx),
            Ok(false)
        );
        assert_eq!(
            e.try_evaluate(&[motion(), broken], Combinator::Or, &ctx),
            Ok(true)
        );
    }

    #[test]
    fn should_never_match_invalid_states() {
        let tv = Condition::Predicate {
            target: EntitySelector::entity("media_player.tv"),
            test: Predicate::Inactive,
        };
        let e = evaluator();
        assert!(!eval(&e, &[tv], Combinator::And));
        let available = Condition::Predicate {
            target: EntitySelector::entity("media_player.tv"),
            test: Predicate::Available,
        };
        assert!(!eval(&e, &[available], Combinator::And));
    }

    #[test]
    fn should_compare_numeric_attribute_exclusively() {
        let e = evaluator();
        let range = |above: f64, below: f64| Condition::NumericRange {
            target: EntitySelector::entity("climate.hall"),
            attribute: Some("current_temperature".into()),
            above: Some(above),
            below: Some(below),
        };
        assert!(eval(&e, &[range(20.0, 21.0)], Combinator::And));
        assert!(!eval(&e, &[range(20.5, 21.0)], Combinator::And));
    }

    #[test]
    fn should_report_inverted_range_and_missing_entity_as_errors() {
        let e = evaluator();
        let area = hall();
        let ctx = EvalContext::new(&area);
        let inverted = Condition::NumericRange {
            target: EntitySelector::entity("sensor.hall_lux"),
            attribute: None,
            above: Some(10.0),
            below: Some(5.0),
        };
        assert!(matches!(
            e.try_evaluate(&[inverted.clone()], Combinator::And, &ctx),
            Err(EvaluationError::InvertedRange { .. })
        ));
        assert!(!e.evaluate(&[inverted], Combinator::And, &ctx));
        let missing = Condition::StateEquals {
            target: EntitySelector::entity("light.ghost"),
            state: StateMatch::One("on".into()),
        };
        assert_eq!(
            e.try_evaluate(&[missing], Combinator::And, &ctx),
            Err(EvaluationError::UnknownEntity("light.ghost".into()))
        );
    }

    #[test]
    fn should_treat_malformed_condition_as_non_match_when_sibling_decides_group() {
        let e = evaluator();
        let missing = Condition::StateEquals {
            target: EntitySelector::entity("light.ghost"),
            state: StateMatch::One("on".into()),
        };
        let bad_time = Condition::TimeWindow {
            after: Some("25:99".into()),
            before: None,
            weekdays: vec![],
        };
        assert!(eval(&e, &[missing.clone(), motion()], Combinator::Or));
        assert!(eval(
            &e,
            &[Condition::Or {
                conditions: vec![bad_time, motion()],
            }],
            Combinator::And
        ));
        assert!(!eval(&e, &[missing, motion()], Combinator::And));
        assert_eq!(e.malformed_conditions(), 3);
    }

    #[test]
    fn should_evaluate_area_attribute_from_sensors() {
        let e = evaluator();
        let dark = Condition::AreaAttribute {
            attribute: EnvironmentalAttribute::IsDark,
            value: true,
        };
        let humid = Condition::AreaAttribute {
            attribute: EnvironmentalAttribute::IsHumid,
            value: false,
        };
        assert!(eval(&e, &[dark], Combinator::And));
        assert!(!eval(&e, &[humid], Combinator::And));
    }

    #[test]
    fn should_compare_activity_from_context() {
        let e = evaluator();
        let area = hall();
        let occupied = ActivityId::new("occupied");
        let condition = Condition::ActivityEquals {
            activity: occupied.clone(),
        };
        let ctx = EvalContext::new(&area).with_activity(&occupied);
        assert!(e.evaluate(std::slice::from_ref(&condition), Combinator::And, &ctx));
        assert!(!e.evaluate(&[condition], Combinator::And, &EvalContext::new(&area)));
    }

    #[test]
    fn should_skip_selector_without_matches_and_fail_all_skipped_group() {
        let e = evaluator();
        let fan = Condition::Predicate {
            target: EntitySelector::generic("fan", None),
            test: Predicate::Active,
        };
        assert!(!eval(&e, &[fan.clone()], Combinator::And));
        assert!(!eval(&e, &[fan.clone()], Combinator::Or));
        assert!(eval(&e, &[fan, motion()], Combinator::And));
    }

    #[test]
    fn should_skip_suppressed_presence_categories() {
        let settings = FakeSettings::default();
        *settings.categories.lock().unwrap() =
            Some(HashSet::from([PresenceCategory::MediaPlaying]));
        let e = evaluator_with(settings);
        let dark = Condition::AreaAttribute {
            attribute: EnvironmentalAttribute::IsDark,
            value: true,
        };
        assert!(!eval(&e, &[motion()], Combinator::And));
        assert!(eval(&e, &[motion(), dark], Combinator::And));
        let explicit = Condition::StateEquals {
            target: EntitySelector::entity("binary_sensor.hall_motion_c"),
            state: StateMatch::One("on".into()),
        };
        assert!(!eval(&e, &[explicit], Combinator::And));
    }

    #[test]
    fn should_enable_all_categories_when_settings_fail() {
        let e = evaluator_with(FakeSettings {
            fail_categories: true,
            ..FakeSettings::default()
        });
        assert!(eval(&e, &[motion()], Combinator::And));
    }

    #[tokio::test(start_paused = true)]
    async fn should_cache_categories_until_ttl_expires() {
        let settings = Arc::new(FakeSettings::default());
        let e = ConditionEvaluator::new(
            Arc::new(states()),
            Arc::clone(&settings) as Arc<dyn SettingsProvider>,
            Arc::new(SystemClock),
        );
        assert!(eval(&e, &[motion()], Combinator::And));
        *settings.categories.lock().unwrap() = Some(HashSet::new());
        assert!(eval(&e, &[motion()], Combinator::And));
        tokio::time::advance(CATEGORY_CACHE_TTL).await;
        assert!(!eval(&e, &[motion()], Combinator::And));
        *settings.categories.lock().unwrap() = None;
        e.invalidate_categories();
        assert!(eval(&e, &[motion()], Combinator::And));
    }

    #[test]
    fn should_evaluate_nested_groups() {
        let e = evaluator();
        let tree = Condition::or(vec![
            Condition::and(vec![
                motion(),
                Condition::ActivityEquals {
                    activity: "party".into(),
                },
            ]),
            Condition::and(vec![
                motion(),
                Condition::AreaAttribute {
                    attribute: EnvironmentalAttribute::IsDark,
                    value: true,
                },
            ]),
        ]);
        assert!(eval(&e, &[tree], Combinator::And));
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        // 2024-01-01 is a Monday.
        chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn should_match_same_day_window() {
        assert!(time_window_matches(Some("08:00"), Some("18:00"), &[], at(12, 0)).unwrap());
        assert!(!time_window_matches(Some("08:00"), Some("18:00"), &[], at(18, 0)).unwrap());
        assert!(!time_window_matches(Some("08:00"), Some("18:00"), &[], at(7, 59)).unwrap());
    }

    #[test]
    fn should_wrap_overnight_window() {
        assert!(time_window_matches(Some("22:00"), Some("06:00"), &[], at(23, 30)).unwrap());
        assert!(time_window_matches(Some("22:00"), Some("06:00"), &[], at(5, 0)).unwrap());
        assert!(!time_window_matches(Some("22:00"), Some("06:00"), &[], at(12, 0)).unwrap());
        assert!(time_window_matches(Some("18:00"), Some("24:00"), &[], at(23, 59)).unwrap());
    }

    #[test]
    fn should_filter_by_weekday() {
        assert!(time_window_matches(None, None, &[Weekday::Mon], at(9, 0)).unwrap());
        assert!(!time_window_matches(None, None, &[Weekday::Sat, Weekday::Sun], at(9, 0)).unwrap());
    }

    #[test]
    fn should_reject_unparseable_time() {
        assert_eq!(
            time_window_matches(Some("late"), None, &[], at(9, 0)),
            Err(EvaluationError::InvalidTime("late".into()))
        );
    }
}
