//! Definitions — the bundle of activity catalog, apps and assignments the
//! engine runs from.
//!
//! Definitions are authored and stored elsewhere; this type is the validated
//! snapshot handed to the engine on load and reload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::activity::ActivityCatalog;
use crate::area::Area;
use crate::automation::{App, Assignment};
use crate::error::{RoomStateError, ValidationError};
use crate::id::{AppId, AreaId};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Definitions {
    #[serde(default)]
    pub catalog: ActivityCatalog,
    /// Display metadata for areas; assignments do not require an entry.
    #[serde(default)]
    pub areas: Vec<Area>,
    #[serde(default)]
    pub apps: Vec<App>,
    #[serde(default)]
    pub assignments: BTreeMap<AreaId, Assignment>,
}

impl Definitions {
    #[must_use]
    pub fn app(&self, id: &AppId) -> Option<&App> {
        self.apps.iter().find(|app| &app.id == id)
    }

    /// Display name of `id`, falling back to the id itself.
    #[must_use]
    pub fn area_name<'a>(&'a self, id: &'a AreaId) -> &'a str {
        self.areas
            .iter()
            .find(|area| &area.id == id)
            .map_or(id.as_str(), |area| area.name.as_str())
    }

    /// Check every area and app, then that assignments and action sets only name
    /// apps and activities that exist.
    ///
    /// # Errors
    ///
    /// Returns the first [`RoomStateError::Validation`] found.
    pub fn validate(&self) -> Result<(), RoomStateError> {
        for area in &self.areas {
            area.validate()?;
        }
        for app in &self.apps {
            app.validate()?;
            if let Some(activity) = app
                .action_sets
                .keys()
                .filter(|activity| !self.catalog.contains(activity))
                .min()
            {
                return Err(ValidationError::UnknownActivity {
                    app: app.id.clone(),
                    activity: activity.clone(),
                }
                .into());
            }
        }
        for assignment in self.assignments.values() {
            if self.app(&assignment.app_id).is_none() {
                return Err(ValidationError::UnknownApp(assignment.app_id.clone()).into());
            }
        }
        Ok(())
    }
}
