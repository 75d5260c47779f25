//! In-process event bus backed by tokio broadcast channels.

use std::future::Future;

use tokio::sync::broadcast;

use roomstate_domain::error::RoomStateError;
use roomstate_domain::event::StateChange;
use roomstate_domain::id::AreaId;

use crate::ports::{EventPublisher, UpdateNotifier};

/// In-process event bus using tokio [`broadcast`] channels.
///
/// Carries inbound state changes to the rule engine, and area updates from
/// the activity state machine to whoever displays them. Publishing succeeds
/// even when there are no active subscribers (the message is simply dropped).
pub struct InProcessEventBus {
    changes: broadcast::Sender<StateChange>,
    updates: broadcast::Sender<AreaId>,
}

impl InProcessEventBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity);
        let (updates, _) = broadcast::channel(capacity);
        Self { changes, updates }
    }

    /// Subscribe to state changes on this bus.
    ///
    /// Returns a receiver that will get all changes published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// Subscribe to area update notifications.
    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<AreaId> {
        self.updates.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(
        &self,
        change: StateChange,
    ) -> impl Future<Output = Result<(), RoomStateError>> + Send {
        // Fails only without receivers; the change is dropped.
        let _ = self.changes.send(change);
        async { Ok(()) }
    }
}

impl UpdateNotifier for InProcessEventBus {
    fn area_updated(&self, area: &AreaId) {
        let _ = self.updates.send(area.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_deliver_change_to_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(StateChange::new("binary_sensor.hall_motion", "on"))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.entity_id.as_str(), "binary_sensor.hall_motion");
        assert_eq!(received.state, "on");
    }

    #[tokio::test]
    async fn should_deliver_change_to_multiple_subscribers() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let change = StateChange::new("light.hall", "off");
        bus.publish(change.clone()).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap(), change);
        assert_eq!(rx2.recv().await.unwrap(), change);
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        let result = bus.publish(StateChange::new("light.hall", "on")).await;
        assert!(result.is_ok());
        bus.area_updated(&AreaId::new("hall"));
    }

    #[tokio::test]
    async fn should_not_deliver_changes_published_before_subscription() {
        let bus = InProcessEventBus::new(16);

        bus.publish(StateChange::new("light.hall", "on")).await.unwrap();

        let mut rx = bus.subscribe();

        let later = StateChange::new("light.hall", "off");
        bus.publish(later.clone()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), later);
    }

    #[tokio::test]
    async fn should_forward_area_updates_separately_from_changes() {
        let bus = InProcessEventBus::new(16);
        let mut changes = bus.subscribe();
        let mut updates = bus.subscribe_updates();

        bus.area_updated(&AreaId::new("hall"));

        assert_eq!(updates.recv().await.unwrap(), AreaId::new("hall"));
        assert!(matches!(
            changes.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
