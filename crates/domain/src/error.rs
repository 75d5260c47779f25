//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`RoomStateError`] via `#[from]`. There are no catch-all `String` variants.

use crate::id::{ActivityId, AppId};

/// Base error for the roomstate core.
#[derive(Debug, thiserror::Error)]
pub enum RoomStateError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("condition evaluation failed")]
    Evaluation(#[from] EvaluationError),

    #[error("action dispatch failed")]
    Dispatch(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A domain invariant was violated.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("identifier must not be empty")]
    EmptyId,

    #[error("baseline activity {0} is not defined")]
    MissingBaseline(ActivityId),

    #[error("activity {from} transitions to unknown activity {to}")]
    UnknownTransition { from: ActivityId, to: ActivityId },

    #[error("transition-state activity {0} must not carry a detection predicate")]
    DetectableTransitionState(ActivityId),

    #[error("assignment references unknown app {0}")]
    UnknownApp(AppId),

    #[error("app {app} defines actions for unknown activity {activity}")]
    UnknownActivity { app: AppId, activity: ActivityId },
}

/// A lookup by identifier found nothing.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A single condition could not be evaluated.
///
/// Callers treat these as a non-match; they are never fatal.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("invalid time of day {0:?}, expected HH:MM")]
    InvalidTime(String),

    #[error("numeric range has neither `above` nor `below`")]
    EmptyRange,

    #[error("numeric range is inverted: above {above} >= below {below}")]
    InvertedRange { above: String, below: String },

    #[error("entity {0} does not exist")]
    UnknownEntity(String),
}
