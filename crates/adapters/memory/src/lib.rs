//! # roomstate-adapter-memory
//!
//! In-process implementations of the port traits defined in `roomstate-app`.
//!
//! ## Responsibilities
//! - `InMemoryStateStore` — entity registry fed by inbound state changes (`StateReader`)
//! - `StaticSettings` — settings fixed at startup (`SettingsProvider`)
//! - `TomlDefinitionSource` — definitions read from a TOML file (`DefinitionSource`)
//! - `LoggingActionSink` / `RecordingActionSink` — action sinks that log or keep requests
//!
//! ## Dependency rule
//! Depends on `roomstate-app` (for port traits) and `roomstate-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod action_sink;
mod definitions;
mod error;
mod settings;
mod state_store;

pub use action_sink::{LoggingActionSink, RecordingActionSink};
pub use definitions::TomlDefinitionSource;
pub use error::StorageError;
pub use settings::StaticSettings;
pub use state_store::InMemoryStateStore;
