//! Automation — apps, per-activity action sets, and area assignments.
//!
//! An [`App`] bundles one [`ActionSet`] per activity. An [`Assignment`] binds
//! an area to an app. When an area's activity (or environment) changes, the
//! action set registered for the current activity is looked up, its
//! [`Condition`]s evaluated, and its [`Action`]s dispatched.

mod action;
mod condition;

pub use action::{Action, ActionTarget};
pub use condition::{
    AreaScope, Combinator, Condition, EntitySelector, Predicate, PresenceCategory, StateMatch,
};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{RoomStateError, ValidationError};
use crate::id::{ActivityId, AppId};

/// The rules an app runs while an area is in one activity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionSet {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub combinator: Combinator,
    /// Fired, in order, when the conditions become true.
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Fired, in order, when the conditions become false.
    #[serde(default)]
    pub on_exit: Vec<Action>,
}

impl ActionSet {
    #[must_use]
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    #[must_use]
    pub fn combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = combinator;
        self
    }

    #[must_use]
    pub fn on_exit(mut self, actions: Vec<Action>) -> Self {
        self.on_exit = actions;
        self
    }
}

/// A named automation bundle: one action set per activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub id: AppId,
    pub name: String,
    #[serde(default)]
    pub action_sets: HashMap<ActivityId, ActionSet>,
}

impl App {
    /// Create a builder for constructing an [`App`].
    #[must_use]
    pub fn builder() -> AppBuilder {
        AppBuilder::default()
    }

    /// The action set registered for `activity`.
    #[must_use]
    pub fn action_set(&self, activity: &ActivityId) -> Option<&ActionSet> {
        self.action_sets.get(activity)
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RoomStateError::Validation`] when the id or name is empty.
    pub fn validate(&self) -> Result<(), RoomStateError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`App`].
#[derive(Debug, Default)]
pub struct AppBuilder {
    id: Option<AppId>,
    name: Option<String>,
    action_sets: HashMap<ActivityId, ActionSet>,
}

impl AppBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<AppId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn action_set(mut self, activity: impl Into<ActivityId>, set: ActionSet) -> Self {
        self.action_sets.insert(activity.into(), set);
        self
    }

    /// Consume the builder, validate, and return an [`App`].
    ///
    /// The name defaults to the id.
    ///
    /// # Errors
    ///
    /// Returns [`RoomStateError::Validation`] if the id is missing.
    pub fn build(self) -> Result<App, RoomStateError> {
        let id = self.id.unwrap_or_else(|| AppId::new(""));
        let name = self.name.unwrap_or_else(|| id.to_string());
        let app = App {
            id,
            name,
            action_sets: self.action_sets,
        };
        app.validate()?;
        Ok(app)
    }
}

/// Binds an area to an app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub app_id: AppId,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Assignment {
    /// An enabled assignment to `app_id`.
    #[must_use]
    pub fn new(app_id: impl Into<AppId>) -> Self {
        Self {
            app_id: app_id.into(),
            enabled: true,
        }
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
