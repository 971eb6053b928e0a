use std::time::Duration;

use service::{NoteService, OpContext};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub notes: NoteService,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(notes: NoteService, request_timeout: Duration) -> Self {
        Self { notes, request_timeout }
    }

    /// Context for one request; storage calls give up after `request_timeout`.
    pub fn op_context(&self) -> OpContext {
        OpContext::with_timeout(self.request_timeout)
    }
}
