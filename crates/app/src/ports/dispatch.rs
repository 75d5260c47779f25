//! Dispatch port — hands resolved actions to the host.

use std::future::Future;

use serde::Serialize;

use roomstate_domain::cooldown::{ActionDirection, TriggerKind};
use roomstate_domain::error::RoomStateError;
use roomstate_domain::id::{ActivityId, AreaId, EntityId};

/// One service call with its targets already resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAction {
    pub service: String,
    pub entity_ids: Vec<EntityId>,
    pub data: serde_json::Value,
}

/// A batch of actions fired for one area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRequest {
    pub area: AreaId,
    /// Activity whose action set fired.
    pub activity: ActivityId,
    pub trigger: TriggerKind,
    pub direction: ActionDirection,
    pub actions: Vec<ResolvedAction>,
}

/// Performs actions on behalf of the rule engine.
///
/// The sink reports success or failure for the whole batch.
pub trait ActionSink: Send + Sync {
    fn dispatch(
        &self,
        request: DispatchRequest,
    ) -> impl Future<Output = Result<(), RoomStateError>> + Send;
}

impl<T: ActionSink> ActionSink for std::sync::Arc<T> {
    fn dispatch(
        &self,
        request: DispatchRequest,
    ) -> impl Future<Output = Result<(), RoomStateError>> + Send {
        (**self).dispatch(request)
    }
}
