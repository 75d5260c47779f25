//! Action sinks that do not talk to a real host.

use std::sync::{Mutex, PoisonError};

use roomstate_app::ports::{ActionSink, DispatchRequest};
use roomstate_domain::error::RoomStateError;

/// Logs every request at `info` level and reports success.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingActionSink;

impl ActionSink for LoggingActionSink {
    async fn dispatch(&self, request: DispatchRequest) -> Result<(), RoomStateError> {
        for action in &request.actions {
            tracing::info!(
                area = %request.area,
                activity = %request.activity,
                trigger = ?request.trigger,
                direction = ?request.direction,
                service = %action.service,
                targets = ?action.entity_ids,
                data = %action.data,
                "action"
            );
        }
        Ok(())
    }
}

/// Keeps every request for later inspection.
#[derive(Debug, Default)]
pub struct RecordingActionSink {
    requests: Mutex<Vec<DispatchRequest>>,
}

impl RecordingActionSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<DispatchRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Take and clear the recorded requests.
    pub fn drain(&self) -> Vec<DispatchRequest> {
        std::mem::take(&mut *self.requests.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ActionSink for RecordingActionSink {
    async fn dispatch(&self, request: DispatchRequest) -> Result<(), RoomStateError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        Ok(())
    }
}
