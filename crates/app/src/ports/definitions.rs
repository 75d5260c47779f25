//! Definition port — where activity catalogs, apps and assignments come from.

use std::future::Future;

use roomstate_domain::definitions::Definitions;
use roomstate_domain::error::RoomStateError;

/// Read-only source of [`Definitions`], pulled again on every reload.
pub trait DefinitionSource: Send + Sync {
    fn load(&self) -> impl Future<Output = Result<Definitions, RoomStateError>> + Send;
}
