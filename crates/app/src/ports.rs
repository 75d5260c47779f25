//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.
//!
//! Ports the core calls while holding its own locks (`StateReader`,
//! `SettingsProvider`, `UpdateNotifier`) are synchronous and object safe.
//! Ports that perform IO (`ActionSink`, `DefinitionSource`, `EventPublisher`)
//! return futures.

pub mod definitions;
pub mod dispatch;
pub mod event_bus;
pub mod notifier;
pub mod settings;
pub mod state;

pub use definitions::DefinitionSource;
pub use dispatch::{ActionSink, DispatchRequest, ResolvedAction};
pub use event_bus::EventPublisher;
pub use notifier::{NoopNotifier, UpdateNotifier};
pub use settings::{DefaultSettings, SettingsProvider};
pub use state::StateReader;
