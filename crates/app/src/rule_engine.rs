//! Rule engine — drives app action sets off activity and environmental
//! transitions.
//!
//! Every bound area carries an [`InterestSet`]. A state change an area is
//! interested in is an *activity trigger*: after the debounce delay the
//! state machine re-evaluates the area. A change of an environmental sensor
//! in the area is an *environmental trigger*: the committed activity is read
//! without recomputation and work proceeds only when a boolean environmental
//! attribute crossed its boundary.
//!
//! Once settled, the action set registered for the current activity is
//! evaluated. Conditions that became true fire the enter actions, conditions
//! that became false fire the `on_exit` actions. Enter and exit dispatches
//! are cooled down on separate tracks; environmental exits are deferred by
//! the activity's timeout and cancelled if the conditions recover first.
//!
//! Timer-driven activity changes inside the state machine are relayed back
//! here so the new activity's enter actions run without any external event.
//!
//! Nothing that goes wrong while processing one area escapes: failures are
//! logged and counted in [`StatisticsSnapshot`].

mod interest;
mod statistics;

pub use interest::InterestSet;
pub use statistics::StatisticsSnapshot;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use roomstate_domain::activity::ActivityCatalog;
use roomstate_domain::automation::{Action, Assignment};
use roomstate_domain::cooldown::{ActionDirection, CooldownKey, CooldownRecord, TriggerKind};
use roomstate_domain::definitions::Definitions;
use roomstate_domain::environment::EnvironmentalSnapshot;
use roomstate_domain::error::RoomStateError;
use roomstate_domain::event::StateChange;
use roomstate_domain::id::{ActivityId, AreaId, EntityId};
use roomstate_domain::time::Timestamp;

use crate::activity_machine::ActivityStateMachine;
use crate::clock::Clock;
use crate::condition_evaluator::{ConditionEvaluator, EvalContext};
use crate::environment::EnvironmentProbe;
use crate::ports::{
    ActionSink, DefinitionSource, DispatchRequest, ResolvedAction, SettingsProvider, StateReader,
    UpdateNotifier,
};
use crate::scheduler::{TaskSlots, TaskToken};

use statistics::{Counter, EngineStatistics};

/// Timing knobs of the rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Quiet period before a burst of changes is acted upon.
    pub debounce: Duration,
    /// Cooldown window for activity-triggered enter actions.
    pub activity_cooldown: Duration,
    /// Cooldown window for environmental enter and exit actions, unless the
    /// settings override it.
    pub environmental_cooldown: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            activity_cooldown: Duration::from_secs(30),
            environmental_cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cause {
    /// A presence or condition entity changed.
    Activity,
    /// An environmental sensor changed.
    Environmental,
    /// The state machine changed the activity on its own.
    Timer,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DebounceSubject {
    Entity(EntityId),
    Environmental,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DebounceKey {
    area: AreaId,
    subject: DebounceSubject,
}

struct Binding {
    assignment: Assignment,
    interest: InterestSet,
    environment: EnvironmentalSnapshot,
    /// Last activity this engine acted upon.
    observed: ActivityId,
    /// Whether enter actions of the current action set are in effect.
    effects_active: bool,
    cooldown: CooldownRecord,
}

#[derive(Default)]
struct EngineState {
    bindings: HashMap<AreaId, Binding>,
    debounce: TaskSlots<DebounceKey>,
    exits: TaskSlots<AreaId>,
}

struct PendingDispatch {
    request: DispatchRequest,
    cooldown: Option<CooldownKey>,
}

struct EngineInner<D> {
    config: EngineConfig,
    states: Arc<dyn StateReader>,
    settings: Arc<dyn SettingsProvider>,
    sink: D,
    evaluator: Arc<ConditionEvaluator>,
    machine: ActivityStateMachine,
    clock: Arc<dyn Clock>,
    definitions: RwLock<Arc<Definitions>>,
    state: Mutex<EngineState>,
    stats: EngineStatistics,
    shutdown: watch::Sender<bool>,
}

/// Forwards state machine updates downstream and back into the engine.
struct ActivityRelay<D> {
    engine: Weak<EngineInner<D>>,
    downstream: Arc<dyn UpdateNotifier>,
}

impl<D: ActionSink + 'static> UpdateNotifier for ActivityRelay<D> {
    fn area_updated(&self, area: &AreaId) {
        self.downstream.area_updated(area);
        let (Some(engine), Ok(runtime)) =
            (self.engine.upgrade(), tokio::runtime::Handle::try_current())
        else {
            return;
        };
        let area = area.clone();
        runtime.spawn(async move { engine.process(area, Cause::Timer).await });
    }
}

/// Orchestrates activity tracking and rule dispatch for every bound area.
///
/// Cheap to clone; clones share state.
pub struct RuleEngine<D> {
    inner: Arc<EngineInner<D>>,
}

impl<D> Clone for RuleEngine<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: ActionSink + 'static> RuleEngine<D> {
    /// Create an engine with an empty definition set.
    pub fn new(
        config: EngineConfig,
        states: Arc<dyn StateReader>,
        settings: Arc<dyn SettingsProvider>,
        sink: D,
        notifier: Arc<dyn UpdateNotifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let evaluator = Arc::new(ConditionEvaluator::new(
            Arc::clone(&states),
            Arc::clone(&settings),
            Arc::clone(&clock),
        ));
        let inner = Arc::new_cyclic(|engine: &Weak<EngineInner<D>>| {
            let relay = Arc::new(ActivityRelay {
                engine: engine.clone(),
                downstream: notifier,
            });
            let machine = ActivityStateMachine::new(
                ActivityCatalog::default(),
                Arc::clone(&evaluator),
                relay,
                Arc::clone(&clock),
            );
            EngineInner {
                config,
                states,
                settings,
                sink,
                evaluator,
                machine,
                clock,
                definitions: RwLock::new(Arc::new(Definitions::default())),
                state: Mutex::new(EngineState::default()),
                stats: EngineStatistics::default(),
                shutdown: watch::Sender::new(false),
            }
        });
        Self { inner }
    }

    /// Replace the definitions and rebind every assigned area.
    ///
    /// Areas no longer assigned are unbound. Cooldowns and cached
    /// environmental snapshots of areas that stay bound are kept.
    ///
    /// # Errors
    ///
    /// Returns [`RoomStateError::Validation`] if `definitions` are
    /// inconsistent; the running definitions are left untouched.
    #[tracing::instrument(skip_all)]
    pub fn load(&self, definitions: Definitions) -> Result<(), RoomStateError> {
        definitions.validate()?;
        let definitions = Arc::new(definitions);
        *self
            .inner
            .definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::clone(&definitions);
        self.inner.machine.replace_catalog(definitions.catalog.clone());

        let stale: Vec<AreaId> = self
            .inner
            .lock()
            .bindings
            .keys()
            .filter(|area| !definitions.assignments.contains_key(*area))
            .cloned()
            .collect();
        for area in &stale {
            self.unbind(area);
        }
        for (area, assignment) in &definitions.assignments {
            self.bind(area.clone(), assignment.clone());
        }
        tracing::info!(
            activities = definitions.catalog.iter().count(),
            apps = definitions.apps.len(),
            areas = definitions.assignments.len(),
            "definitions loaded"
        );
        Ok(())
    }

    /// Pull fresh definitions from `source` and [`load`](Self::load) them.
    ///
    /// # Errors
    ///
    /// Returns the source's error, or a validation error.
    pub async fn reload(&self, source: &impl DefinitionSource) -> Result<(), RoomStateError> {
        let definitions = source.load().await?;
        self.load(definitions)
    }

    /// Bind `area` to an app, or update an existing binding.
    #[tracing::instrument(skip_all, fields(area = %area, app = %assignment.app_id))]
    pub fn bind(&self, area: AreaId, assignment: Assignment) {
        let definitions = self.inner.definitions();
        let catalog = self.inner.machine.catalog();
        let detection = catalog.iter().flat_map(|d| d.detection.iter());
        let rules = definitions
            .app(&assignment.app_id)
            .into_iter()
            .flat_map(|app| app.action_sets.values())
            .flat_map(|set| set.conditions.iter());
        let interest = InterestSet::build(&area, detection.chain(rules));

        let mut guard = self.inner.lock();
        if let Some(binding) = guard.bindings.get_mut(&area) {
            binding.assignment = assignment;
            binding.interest = interest;
            tracing::debug!("binding updated");
            return;
        }
        let binding = Binding {
            assignment,
            interest,
            environment: self.inner.evaluator.probe().snapshot(&area),
            observed: self.inner.machine.get(&area),
            effects_active: false,
            cooldown: CooldownRecord::default(),
        };
        tracing::info!(area_name = definitions.area_name(&area), "area bound");
        guard.bindings.insert(area, binding);
    }

    /// Stop managing `area`: pending work is cancelled and its activity reset.
    ///
    /// Returns whether the area was bound.
    pub fn unbind(&self, area: &AreaId) -> bool {
        let removed = {
            let mut guard = self.inner.lock();
            guard.debounce.cancel_where(|key| &key.area == area);
            guard.exits.cancel(area);
            guard.bindings.remove(area).is_some()
        };
        if removed {
            self.inner.machine.reset(area);
            tracing::info!(%area, "area unbound");
        }
        removed
    }

    /// Feed one inbound state change.
    ///
    /// The host must have applied the change to the [`StateReader`] first.
    pub fn handle_state_change(&self, change: &StateChange) {
        self.inner.handle_state_change(change);
    }

    /// Consume `changes` on a background task until [`stop`](Self::stop) is
    /// called or the channel closes.
    pub fn start(&self, mut changes: broadcast::Receiver<StateChange>) -> JoinHandle<()> {
        self.inner.shutdown.send_replace(false);
        let mut shutdown = self.inner.shutdown.subscribe();
        let engine = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tracing::info!("rule engine started");
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    received = changes.recv() => match received {
                        Ok(change) => engine.handle_state_change(&change),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "rule engine lagging, state changes dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            tracing::info!("rule engine stopped");
        })
    }

    /// Stop the event loop and cancel pending debounce and exit tasks.
    pub fn stop(&self) {
        self.inner.shutdown.send_replace(true);
        let mut guard = self.inner.lock();
        guard.debounce.cancel_all();
        guard.exits.cancel_all();
    }

    /// The committed activity of `area`.
    #[must_use]
    pub fn activity(&self, area: &AreaId) -> ActivityId {
        self.inner.machine.get(area)
    }

    #[must_use]
    pub fn statistics(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            malformed_conditions: self.inner.evaluator.malformed_conditions(),
            ..self.inner.stats.snapshot()
        }
    }

    /// The activity state machine driven by this engine.
    #[must_use]
    pub fn machine(&self) -> &ActivityStateMachine {
        &self.inner.machine
    }

    /// The definitions currently loaded.
    #[must_use]
    pub fn definitions(&self) -> Arc<Definitions> {
        self.inner.definitions()
    }

    /// Bound areas, ordered.
    #[must_use]
    pub fn bound_areas(&self) -> Vec<AreaId> {
        let mut areas: Vec<_> = self.inner.lock().bindings.keys().cloned().collect();
        areas.sort();
        areas
    }

    /// Whether exit actions are scheduled for `area`.
    #[must_use]
    pub fn has_pending_exit(&self, area: &AreaId) -> bool {
        self.inner.lock().exits.is_pending(area)
    }
}

impl<D: ActionSink + 'static> EngineInner<D> {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn definitions(&self) -> Arc<Definitions> {
        Arc::clone(&self.definitions.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn cooldown_window(&self, key: CooldownKey) -> Duration {
        match key {
            CooldownKey::ActivityEnter => self.config.activity_cooldown,
            CooldownKey::EnvironmentalEnter | CooldownKey::EnvironmentalExit => self
                .settings
                .environmental_cooldown()
                .unwrap_or(self.config.environmental_cooldown),
        }
    }

    fn is_cooling(&self, binding: &Binding, key: Option<CooldownKey>, now: Timestamp) -> bool {
        key.is_some_and(|key| {
            binding
                .cooldown
                .is_cooling(key, now, self.cooldown_window(key))
        })
    }

    fn handle_state_change(self: &Arc<Self>, change: &StateChange) {
        self.stats.incr(Counter::EventReceived);
        let snapshot = self.states.entity(&change.entity_id);
        let mut guard = self.lock();
        let EngineState {
            bindings, debounce, ..
        } = &mut *guard;
        for (area, binding) in bindings.iter() {
            let (subject, cause) = if binding.interest.matches(&change.entity_id, snapshot.as_ref()) {
                (DebounceSubject::Entity(change.entity_id.clone()), Cause::Activity)
            } else if snapshot
                .as_ref()
                .is_some_and(|entity| EnvironmentProbe::feeds(entity, area))
            {
                (DebounceSubject::Environmental, Cause::Environmental)
            } else {
                continue;
            };
            tracing::trace!(%area, %change, ?cause, "change scheduled");
            self.stats.incr(Counter::TriggerScheduled);
            let key = DebounceKey {
                area: area.clone(),
                subject,
            };
            let engine = Arc::downgrade(self);
            debounce.schedule(key.clone(), self.config.debounce, move |token| {
                Self::settle(engine, key, token, cause)
            });
        }
    }

    async fn settle(engine: Weak<Self>, key: DebounceKey, token: TaskToken, cause: Cause) {
        let Some(engine) = engine.upgrade() else {
            return;
        };
        let claimed = engine.lock().debounce.claim(&key, token);
        if claimed {
            engine.process(key.area, cause).await;
        }
    }

    async fn process(self: &Arc<Self>, area: AreaId, cause: Cause) {
        if let Some(pending) = self.plan(&area, cause) {
            self.dispatch(pending).await;
        }
    }

    /// Decide what to do for `area`, under the engine lock.
    fn plan(self: &Arc<Self>, area: &AreaId, cause: Cause) -> Option<PendingDispatch> {
        let definitions = self.definitions();
        let catalog = self.machine.catalog();
        let now = self.clock.now();
        let mut guard = self.lock();
        let EngineState {
            bindings, exits, ..
        } = &mut *guard;
        let Some(binding) = bindings.get_mut(area) else {
            tracing::debug!(%area, "area not bound");
            return None;
        };

        let (activity, trigger) = match cause {
            Cause::Activity => (self.machine.evaluate(area), TriggerKind::Activity),
            Cause::Timer => (self.machine.get(area), TriggerKind::Activity),
            Cause::Environmental => {
                let snapshot = self.evaluator.probe().snapshot(area);
                let crossings = snapshot.crossings(&binding.environment);
                binding.environment = snapshot;
                if crossings.is_empty() {
                    tracing::trace!(%area, "environment changed without crossing");
                    return None;
                }
                tracing::debug!(%area, ?crossings, "environmental crossing");
                (self.machine.get(area), TriggerKind::Environmental)
            }
        };

        let previous = std::mem::replace(&mut binding.observed, activity.clone());
        let activity_changed = previous != activity;
        if activity_changed {
            binding.effects_active = false;
            exits.cancel(area);
        } else if cause == Cause::Timer {
            return None;
        }

        if !binding.assignment.enabled || !self.settings.automation_enabled(area) {
            tracing::debug!(%area, %activity, "automation disabled");
            return None;
        }
        let Some(app) = definitions.app(&binding.assignment.app_id) else {
            tracing::debug!(%area, app = %binding.assignment.app_id, "app not defined");
            return None;
        };
        let Some(set) = app.action_set(&activity) else {
            tracing::debug!(%area, %activity, "no action set for activity");
            return None;
        };

        self.stats.incr(Counter::Evaluation);
        let ctx = EvalContext::new(area).with_activity(&activity);
        let conditions_met = self
            .evaluator
            .evaluate(&set.conditions, set.combinator, &ctx);

        if conditions_met {
            if binding.effects_active {
                if exits.cancel(area) {
                    tracing::debug!(%area, %activity, "conditions recovered, exit cancelled");
                }
                return None;
            }
            let key = CooldownKey::for_dispatch(trigger, ActionDirection::Enter);
            let bypass = activity_changed
                && catalog.is_transition_state(&previous)
                && !catalog.is_transition_state(&activity);
            if !bypass && self.is_cooling(binding, key, now) {
                self.stats.incr(Counter::CooldownSuppressed);
                tracing::debug!(%area, %activity, ?trigger, "enter actions cooling down");
                return None;
            }
            binding.effects_active = true;
            return self.prepare(area, &activity, trigger, ActionDirection::Enter, &set.actions, key);
        }

        if !binding.effects_active {
            return None;
        }
        if set.on_exit.is_empty() {
            binding.effects_active = false;
            exits.cancel(area);
            return None;
        }
        if trigger != TriggerKind::Environmental && exits.is_pending(area) {
            tracing::trace!(%area, %activity, "exit already deferred");
            return None;
        }
        if trigger == TriggerKind::Environmental {
            let delay = catalog
                .get(&activity)
                .map(|d| d.timeout_duration())
                .unwrap_or_default();
            if !delay.is_zero() {
                if !exits.is_pending(area) {
                    tracing::debug!(%area, %activity, ?delay, "exit actions scheduled");
                    let engine = Arc::downgrade(self);
                    let (area, activity) = (area.clone(), activity.clone());
                    exits.schedule(area.clone(), delay, move |token| {
                        Self::expire_exit(engine, area, activity, token)
                    });
                }
                return None;
            }
        }
        let key = CooldownKey::for_dispatch(trigger, ActionDirection::Exit);
        if self.is_cooling(binding, key, now) {
            self.stats.incr(Counter::CooldownSuppressed);
            tracing::debug!(%area, %activity, ?trigger, "exit actions cooling down");
            return None;
        }
        exits.cancel(area);
        binding.effects_active = false;
        self.prepare(area, &activity, trigger, ActionDirection::Exit, &set.on_exit, key)
    }

    async fn expire_exit(engine: Weak<Self>, area: AreaId, activity: ActivityId, token: TaskToken) {
        let Some(engine) = engine.upgrade() else {
            return;
        };
        let pending = engine.plan_exit(&area, &activity, token);
        if let Some(pending) = pending {
            engine.dispatch(pending).await;
        }
    }

    fn plan_exit(&self, area: &AreaId, activity: &ActivityId, token: TaskToken) -> Option<PendingDispatch> {
        let definitions = self.definitions();
        let now = self.clock.now();
        let mut guard = self.lock();
        let EngineState {
            bindings, exits, ..
        } = &mut *guard;
        if !exits.claim(area, token) {
            return None;
        }
        let binding = bindings.get_mut(area)?;
        if &binding.observed != activity || !binding.effects_active {
            return None;
        }
        let set = definitions
            .app(&binding.assignment.app_id)?
            .action_set(activity)?;
        let key = CooldownKey::for_dispatch(TriggerKind::Environmental, ActionDirection::Exit);
        if self.is_cooling(binding, key, now) {
            self.stats.incr(Counter::CooldownSuppressed);
            return None;
        }
        binding.effects_active = false;
        self.prepare(
            area,
            activity,
            TriggerKind::Environmental,
            ActionDirection::Exit,
            &set.on_exit,
            key,
        )
    }

    fn prepare(
        &self,
        area: &AreaId,
        activity: &ActivityId,
        trigger: TriggerKind,
        direction: ActionDirection,
        actions: &[Action],
        cooldown: Option<CooldownKey>,
    ) -> Option<PendingDispatch> {
        let resolver = self.evaluator.resolver();
        let actions: Vec<ResolvedAction> = actions
            .iter()
            .filter_map(|action| {
                let entity_ids = resolver.resolve_target(&action.target, action.domain(), area);
                if entity_ids.is_empty() {
                    tracing::debug!(%area, %action, "action has no targets");
                    return None;
                }
                Some(ResolvedAction {
                    service: action.service.clone(),
                    entity_ids,
                    data: action.data.clone(),
                })
            })
            .collect();
        if actions.is_empty() {
            return None;
        }
        Some(PendingDispatch {
            request: DispatchRequest {
                area: area.clone(),
                activity: activity.clone(),
                trigger,
                direction,
                actions,
            },
            cooldown,
        })
    }

    async fn dispatch(&self, pending: PendingDispatch) {
        let PendingDispatch { request, cooldown } = pending;
        let area = request.area.clone();
        let activity = request.activity.clone();
        let direction = request.direction;
        let count = request.actions.len();
        match self.sink.dispatch(request).await {
            Ok(()) => {
                self.stats.incr(Counter::Dispatch);
                tracing::info!(%area, %activity, ?direction, actions = count, "actions dispatched");
                if let Some(key) = cooldown {
                    let now = self.clock.now();
                    if let Some(binding) = self.lock().bindings.get_mut(&area) {
                        binding.cooldown.record(key, now);
                    }
                }
            }
            Err(err) => {
                self.stats.incr(Counter::DispatchFailure);
                tracing::warn!(%area, %activity, ?direction, error = %err, "dispatch failed");
                if let Some(binding) = self.lock().bindings.get_mut(&area) {
                    if binding.observed == activity {
                        binding.effects_active = direction == ActionDirection::Exit;
                    }
                }
            }
        }
    }
}
