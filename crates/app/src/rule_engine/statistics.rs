//! Counters surfaced by the rule engine.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct EngineStatistics {
    events_received: AtomicU64,
    triggers_scheduled: AtomicU64,
    evaluations: AtomicU64,
    dispatches: AtomicU64,
    dispatch_failures: AtomicU64,
    cooldown_suppressed: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Counter {
    EventReceived,
    TriggerScheduled,
    Evaluation,
    Dispatch,
    DispatchFailure,
    CooldownSuppressed,
}

impl EngineStatistics {
    pub(crate) fn incr(&self, counter: Counter) {
        let slot = match counter {
            Counter::EventReceived => &self.events_received,
            Counter::TriggerScheduled => &self.triggers_scheduled,
            Counter::Evaluation => &self.evaluations,
            Counter::Dispatch => &self.dispatches,
            Counter::DispatchFailure => &self.dispatch_failures,
            Counter::CooldownSuppressed => &self.cooldown_suppressed,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatisticsSnapshot {
        let read = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatisticsSnapshot {
            events_received: read(&self.events_received),
            triggers_scheduled: read(&self.triggers_scheduled),
            evaluations: read(&self.evaluations),
            dispatches: read(&self.dispatches),
            dispatch_failures: read(&self.dispatch_failures),
            cooldown_suppressed: read(&self.cooldown_suppressed),
            malformed_conditions: 0,
        }
    }
}

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    /// State changes handed to the engine.
    pub events_received: u64,
    /// Debounced evaluations scheduled (one per relevant area).
    pub triggers_scheduled: u64,
    /// Action-set evaluations run.
    pub evaluations: u64,
    /// Batches accepted by the action sink.
    pub dispatches: u64,
    /// Batches the action sink rejected.
    pub dispatch_failures: u64,
    /// Dispatches skipped because a cooldown window was active.
    pub cooldown_suppressed: u64,
    /// Malformed conditions met while evaluating, each counted as not
    /// matching.
    pub malformed_conditions: u64,
}
