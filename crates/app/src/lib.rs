//! # roomstate-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `StateReader` — read-only view of the host's entity registry
//!   - `SettingsProvider` — per-area switches, thresholds and category filters
//!   - `ActionSink` — perform resolved actions
//!   - `DefinitionSource` — load activities, apps and assignments
//!   - `UpdateNotifier` — "refresh observers for area X"
//!   - `EventPublisher` — publish inbound state changes
//! - Provide the use-cases driving them:
//!   - `EntityResolver` — generic selectors to concrete entities
//!   - `ConditionEvaluator` — condition trees against live state
//!   - `ActivityStateMachine` — per-area activity with thresholds and timeouts
//!   - `RuleEngine` — debounce, cooldowns and action dispatch
//! - Provide **in-process infrastructure** (event bus, clocks, task slots) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `roomstate-domain` only (plus `tokio` for channels, timers and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod activity_machine;
pub mod clock;
pub mod condition_evaluator;
pub mod entity_resolver;
pub mod environment;
pub mod event_bus;
pub mod ports;
pub mod rule_engine;
pub mod scheduler;

#[cfg(test)]
mod testing;
