//! Activity state machine — infers and tracks the activity of each area.
//!
//! [`ActivityStateMachine::evaluate`] walks the detection candidates from the
//! highest duration threshold down. A candidate with no threshold commits as
//! soon as its detection holds; one with a threshold is tracked until the
//! detection has held for that long. When nothing matches, the committed
//! activity survives for its timeout and then moves to its `transition_to`
//! target, which may chain further timeouts (movement → inactive → empty).
//! Transition-state activities are only ever entered through such a timeout.
//!
//! Per-area state and pending timeouts live behind one mutex that is never
//! held across an `.await`. The update notifier is called after the lock is
//! released.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

use roomstate_domain::activity::{ActivityCatalog, AreaActivityState, ThresholdTracking};
use roomstate_domain::error::{NotFoundError, RoomStateError};
use roomstate_domain::id::{ActivityId, AreaId};
use roomstate_domain::time::{Timestamp, elapsed};

use crate::clock::Clock;
use crate::condition_evaluator::{ConditionEvaluator, EvalContext};
use crate::ports::UpdateNotifier;
use crate::scheduler::{TaskSlots, TaskToken};

#[derive(Default)]
struct MachineState {
    areas: HashMap<AreaId, AreaActivityState>,
    timeouts: TaskSlots<AreaId>,
}

struct Inner {
    catalog: RwLock<Arc<ActivityCatalog>>,
    evaluator: Arc<ConditionEvaluator>,
    notifier: Arc<dyn UpdateNotifier>,
    clock: Arc<dyn Clock>,
    state: Mutex<MachineState>,
}

/// Per-area activity tracking. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ActivityStateMachine {
    inner: Arc<Inner>,
}

impl ActivityStateMachine {
    pub fn new(
        catalog: ActivityCatalog,
        evaluator: Arc<ConditionEvaluator>,
        notifier: Arc<dyn UpdateNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog: RwLock::new(Arc::new(catalog)),
                evaluator,
                notifier,
                clock,
                state: Mutex::new(MachineState::default()),
            }),
        }
    }

    /// The catalog currently in use.
    #[must_use]
    pub fn catalog(&self) -> Arc<ActivityCatalog> {
        self.inner.catalog()
    }

    /// Recompute the activity of `area` from live state.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, since timeouts are
    /// spawned as tasks.
    #[tracing::instrument(skip_all, fields(area = %area))]
    pub fn evaluate(&self, area: &AreaId) -> ActivityId {
        let catalog = self.inner.catalog();
        let now = self.inner.clock.now();
        let (current, changed) = {
            let mut guard = self.inner.lock();
            let MachineState { areas, timeouts } = &mut *guard;
            let state = areas
                .entry(area.clone())
                .or_insert_with(|| AreaActivityState::new(area.clone(), catalog.baseline().clone(), now));
            let changed = self.inner.step(&catalog, state, timeouts, now);
            (state.current.clone(), changed)
        };
        if changed {
            tracing::info!(activity = %current, "activity changed");
            self.inner.notifier.area_updated(area);
        }
        current
    }

    /// The committed activity of `area`, without recomputing anything.
    #[must_use]
    pub fn get(&self, area: &AreaId) -> ActivityId {
        self.inner.lock().areas.get(area).map_or_else(
            || self.inner.catalog().baseline().clone(),
            |state| state.current.clone(),
        )
    }

    /// A copy of the full tracking state of `area`, if it has any.
    #[must_use]
    pub fn snapshot(&self, area: &AreaId) -> Option<AreaActivityState> {
        self.inner.lock().areas.get(area).cloned()
    }

    /// Whether a timeout is pending for `area`.
    #[must_use]
    pub fn has_pending_timeout(&self, area: &AreaId) -> bool {
        self.inner.lock().timeouts.is_pending(area)
    }

    /// Areas with tracking state.
    #[must_use]
    pub fn areas(&self) -> Vec<AreaId> {
        let mut areas: Vec<_> = self.inner.lock().areas.keys().cloned().collect();
        areas.sort();
        areas
    }

    /// Forget everything about `area` and cancel its timeout.
    pub fn reset(&self, area: &AreaId) {
        let baseline = self.inner.catalog().baseline().clone();
        let removed = {
            let mut guard = self.inner.lock();
            guard.timeouts.cancel(area);
            guard.areas.remove(area)
        };
        tracing::debug!(%area, "activity state reset");
        if removed.is_some_and(|state| state.current != baseline) {
            self.inner.notifier.area_updated(area);
        }
    }

    /// Force `area` into `activity` for `duration` (the activity's own timeout
    /// when `None`), after which the usual timeout handling applies.
    ///
    /// # Errors
    ///
    /// Returns [`RoomStateError::NotFound`] when `activity` is not in the
    /// catalog.
    #[tracing::instrument(skip_all, fields(area = %area, activity = %activity))]
    pub fn simulate(
        &self,
        area: &AreaId,
        activity: &ActivityId,
        duration: Option<Duration>,
    ) -> Result<(), RoomStateError> {
        let catalog = self.inner.catalog();
        let definition = catalog.get(activity).ok_or_else(|| NotFoundError {
            entity: "Activity",
            id: activity.to_string(),
        })?;
        let delay = duration.unwrap_or_else(|| definition.timeout_duration());
        let now = self.inner.clock.now();
        let changed = {
            let mut guard = self.inner.lock();
            let MachineState { areas, timeouts } = &mut *guard;
            let state = areas
                .entry(area.clone())
                .or_insert_with(|| AreaActivityState::new(area.clone(), catalog.baseline().clone(), now));
            let changed = state.commit(activity, now);
            state.threshold = None;
            state.false_since = Some(now);
            if delay.is_zero() {
                timeouts.cancel(area);
            } else {
                self.inner.schedule_timeout(timeouts, area, delay);
            }
            changed
        };
        if changed {
            self.inner.notifier.area_updated(area);
        }
        Ok(())
    }

    /// Swap the catalog. Areas whose activity no longer exists fall back to
    /// the new baseline.
    pub fn replace_catalog(&self, catalog: ActivityCatalog) {
        let catalog = Arc::new(catalog);
        *self
            .inner
            .catalog
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::clone(&catalog);
        let now = self.inner.clock.now();
        let orphaned: Vec<AreaId> = {
            let mut guard = self.inner.lock();
            let MachineState { areas, timeouts } = &mut *guard;
            areas
                .values_mut()
                .filter(|state| !catalog.contains(&state.current))
                .map(|state| {
                    timeouts.cancel(&state.area_id);
                    *state = AreaActivityState::new(
                        state.area_id.clone(),
                        catalog.baseline().clone(),
                        now,
                    );
                    state.area_id.clone()
                })
                .collect()
        };
        for area in &orphaned {
            tracing::info!(%area, "activity removed from catalog, back to baseline");
            self.inner.notifier.area_updated(area);
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, MachineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn catalog(&self) -> Arc<ActivityCatalog> {
        Arc::clone(&self.catalog.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// One evaluation pass; returns whether the committed activity changed.
    fn step(
        self: &Arc<Self>,
        catalog: &ActivityCatalog,
        state: &mut AreaActivityState,
        timeouts: &mut TaskSlots<AreaId>,
        now: Timestamp,
    ) -> bool {
        let area = state.area_id.clone();
        let current = state.current.clone();
        let ctx = EvalContext::new(&area).with_activity(&current);
        let mut tracked = false;

        for candidate in catalog.detection_candidates() {
            if candidate.detection.is_empty()
                || !self
                    .evaluator
                    .evaluate(&candidate.detection, candidate.combinator, &ctx)
            {
                continue;
            }
            if candidate.id == state.current {
                if !tracked {
                    state.threshold = None;
                }
                state.false_since = None;
                state.last_update = now;
                timeouts.cancel(&area);
                return false;
            }
            if candidate.duration_threshold > 0 {
                // The highest-threshold match owns the single tracking record.
                if tracked {
                    continue;
                }
                tracked = true;
                match &state.threshold {
                    Some(tracking) if tracking.target == candidate.id => {
                        if elapsed(tracking.since, now) >= candidate.threshold_duration() {
                            let changed = state.commit(&candidate.id, now);
                            state.threshold = None;
                            state.false_since = None;
                            timeouts.cancel(&area);
                            return changed;
                        }
                    }
                    _ => {
                        tracing::debug!(target_activity = %candidate.id, "threshold tracking started");
                        state.threshold = Some(ThresholdTracking {
                            target: candidate.id.clone(),
                            since: now,
                        });
                    }
                }
                continue;
            }
            let changed = state.commit(&candidate.id, now);
            state.false_since = None;
            if !tracked {
                state.threshold = None;
            }
            timeouts.cancel(&area);
            return changed;
        }

        if !tracked {
            state.threshold = None;
        }
        state.last_update = now;

        let Some(definition) = catalog.get(&state.current) else {
            return false;
        };
        if definition.is_transition_state || state.false_since.is_some() {
            return false;
        }
        state.false_since = Some(now);
        if definition.timeout > 0 {
            tracing::debug!(activity = %state.current, timeout = definition.timeout, "detection lost, timeout scheduled");
            self.schedule_timeout(timeouts, &area, definition.timeout_duration());
            return false;
        }
        match &definition.transition_to {
            Some(target) => {
                let changed = state.commit(target, now);
                if let Some(next) = catalog.get(target).filter(|d| d.timeout > 0) {
                    self.schedule_timeout(timeouts, &area, next.timeout_duration());
                }
                changed
            }
            None => false,
        }
    }

    fn schedule_timeout(self: &Arc<Self>, timeouts: &mut TaskSlots<AreaId>, area: &AreaId, delay: Duration) {
        let machine: Weak<Self> = Arc::downgrade(self);
        let key = area.clone();
        timeouts.schedule(area.clone(), delay, move |token| async move {
            if let Some(machine) = machine.upgrade() {
                machine.expire(&key, token);
            }
        });
    }

    /// Timeout handler: follow `transition_to` of the current activity.
    fn expire(self: &Arc<Self>, area: &AreaId, token: TaskToken) {
        let catalog = self.catalog();
        let now = self.clock.now();
        let current = {
            let mut guard = self.lock();
            let MachineState { areas, timeouts } = &mut *guard;
            if !timeouts.claim(area, token) {
                return;
            }
            let Some(state) = areas.get_mut(area) else {
                return;
            };
            let target = catalog
                .get(&state.current)
                .and_then(|d| d.transition_to.clone());
            match target {
                Some(target) => {
                    state.commit(&target, now);
                    state.threshold = None;
                    state.false_since = Some(now);
                    if let Some(next) = catalog.get(&target).filter(|d| d.timeout > 0) {
                        self.schedule_timeout(timeouts, area, next.timeout_duration());
                    }
                }
                None => state.last_update = now,
            }
            state.current.clone()
        };
        tracing::info!(%area, activity = %current, "activity timeout expired");
        self.notifier.area_updated(area);
    }
}
