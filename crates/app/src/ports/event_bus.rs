//! Event bus port — publish inbound state changes to interested subscribers.

use std::future::Future;

use roomstate_domain::error::RoomStateError;
use roomstate_domain::event::StateChange;

/// Publishes state changes to all current subscribers.
pub trait EventPublisher {
    fn publish(
        &self,
        change: StateChange,
    ) -> impl Future<Output = Result<(), RoomStateError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        change: StateChange,
    ) -> impl Future<Output = Result<(), RoomStateError>> + Send {
        (**self).publish(change)
    }
}
