//! JSON-lines ingestion — one entity report per line.
//!
//! A line carries at least `entity_id` and `state`. Metadata fields
//! (`area_id`, `device_class`, `attributes`, `disabled`) are merged into the
//! stored snapshot when present and kept otherwise.

use std::collections::HashMap;

use serde::Deserialize;

use roomstate_adapter_memory::InMemoryStateStore;
use roomstate_app::ports::StateReader;
use roomstate_domain::entity::{AttributeValue, EntitySnapshot};
use roomstate_domain::event::StateChange;
use roomstate_domain::id::{AreaId, EntityId};

/// One inbound report.
#[derive(Debug, Deserialize)]
pub struct Report {
    pub entity_id: EntityId,
    pub state: String,
    #[serde(default)]
    pub area_id: Option<AreaId>,
    #[serde(default)]
    pub device_class: Option<String>,
    #[serde(default)]
    pub attributes: Option<HashMap<String, AttributeValue>>,
    #[serde(default)]
    pub disabled: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("malformed report")]
    Json(#[from] serde_json::Error),
    #[error("entity id must not be empty")]
    EmptyEntityId,
}

/// Parse one line; blank lines yield `None`.
///
/// # Errors
///
/// Returns [`IngestError`] for malformed JSON or an empty entity id.
pub fn parse_line(line: &str) -> Result<Option<Report>, IngestError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let report: Report = serde_json::from_str(line)?;
    if report.entity_id.is_empty() {
        return Err(IngestError::EmptyEntityId);
    }
    Ok(Some(report))
}

/// Merge `report` into `store` and return the change to publish.
pub fn apply(store: &InMemoryStateStore, report: Report) -> StateChange {
    let change = StateChange::new(report.entity_id.clone(), report.state.clone());
    let mut entity = store.entity(&report.entity_id).unwrap_or_else(|| EntitySnapshot {
        entity_id: report.entity_id.clone(),
        area_id: None,
        device_class: None,
        state: String::new(),
        attributes: HashMap::new(),
        disabled: false,
        last_changed: change.timestamp,
    });
    if entity.state != report.state {
        entity.state = report.state;
        entity.last_changed = change.timestamp;
    }
    if let Some(area) = report.area_id {
        entity.area_id = Some(area);
    }
    if let Some(class) = report.device_class {
        entity.device_class = Some(class);
    }
    if let Some(attributes) = report.attributes {
        entity.attributes = attributes;
    }
    if let Some(disabled) = report.disabled {
        entity.disabled = disabled;
    }
    store.upsert(entity);
    change
}
