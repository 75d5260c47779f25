//! Update notification port — "refresh observers for area X".

use roomstate_domain::id::AreaId;

/// Fire-and-forget hook invoked after a committed activity change.
///
/// Implementations must return promptly and never call back into the
/// component that notified them synchronously.
pub trait UpdateNotifier: Send + Sync {
    fn area_updated(&self, area: &AreaId);
}

/// Notifier that drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl UpdateNotifier for NoopNotifier {
    fn area_updated(&self, _area: &AreaId) {}
}

impl<T: UpdateNotifier + ?Sized> UpdateNotifier for std::sync::Arc<T> {
    fn area_updated(&self, area: &AreaId) {
        (**self).area_updated(area);
    }
}
