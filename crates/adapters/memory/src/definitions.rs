//! Definitions read from a TOML document on disk.

use std::path::{Path, PathBuf};

use roomstate_app::ports::DefinitionSource;
use roomstate_domain::definitions::Definitions;
use roomstate_domain::error::RoomStateError;

use crate::error::StorageError;

/// Re-reads one TOML file on every [`DefinitionSource::load`].
#[derive(Debug, Clone)]
pub struct TomlDefinitionSource {
    path: PathBuf,
}

impl TomlDefinitionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse and validate a definitions document.
    ///
    /// # Errors
    ///
    /// Returns [`RoomStateError::Storage`] for malformed TOML and
    /// [`RoomStateError::Validation`] for inconsistent definitions.
    pub fn parse(&self, content: &str) -> Result<Definitions, RoomStateError> {
        let definitions: Definitions =
            toml::from_str(content).map_err(|source| StorageError::Parse {
                path: self.path.display().to_string(),
                source,
            })?;
        definitions.validate()?;
        Ok(definitions)
    }
}

impl DefinitionSource for TomlDefinitionSource {
    async fn load(&self) -> Result<Definitions, RoomStateError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| StorageError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        let definitions = self.parse(&content)?;
        tracing::debug!(path = %self.path.display(), "definitions read");
        Ok(definitions)
    }
}

#[cfg(test)]
mod tests {
    use roomstate_domain::id::{AppId, AreaId};

    use super::*;

    const DOCUMENT: &str = r#"
        [catalog]
        baseline = "empty"

        [[catalog.activities]]
        id = "movement"
        timeout = 120
        transition_to = "empty"

        [[catalog.activities.detection]]
        type = "predicate"
        target = { domain = "binary_sensor", subcategory = "motion" }
        test = "active"

        [[apps]]
        id = "lights"
        name = "Lights"

        [apps.action_sets.movement]
        actions = [{ service = "light.turn_on" }]

        [assignments.hall]
        app_id = "lights"
    "#;

    #[test]
    fn should_parse_valid_document() {
        let source = TomlDefinitionSource::new("definitions.toml");
        let definitions = source.parse(DOCUMENT).unwrap();
        assert!(definitions.app(&AppId::new("lights")).is_some());
        assert!(definitions.assignments.contains_key(&AreaId::new("hall")));
    }

    #[test]
    fn should_report_storage_error_for_malformed_toml() {
        let source = TomlDefinitionSource::new("definitions.toml");
        let err = source.parse("catalog = {{{").unwrap_err();
        assert!(matches!(err, RoomStateError::Storage(_)));
    }

    #[test]
    fn should_report_validation_error_for_unknown_app() {
        let source = TomlDefinitionSource::new("definitions.toml");
        let err = source
            .parse("[assignments.hall]\napp_id = \"ghost\"\n")
            .unwrap_err();
        assert!(matches!(err, RoomStateError::Validation(_)));
    }

    #[tokio::test]
    async fn should_load_document_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "roomstate-definitions-{}.toml",
            std::process::id()
        ));
        tokio::fs::write(&path, DOCUMENT).await.unwrap();
        let loaded = TomlDefinitionSource::new(&path).load().await;
        tokio::fs::remove_file(&path).await.unwrap();
        assert_eq!(loaded.unwrap().apps.len(), 1);
    }

    #[tokio::test]
    async fn should_fail_when_file_missing() {
        let source = TomlDefinitionSource::new("/nonexistent/roomstate.toml");
        assert!(matches!(
            source.load().await,
            Err(RoomStateError::Storage(_))
        ));
    }
}
