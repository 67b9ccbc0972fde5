//! Records login outcomes from session status events.

use crate::events::SessionEvent;
use crate::processor::LoginHistoryProcessor;
use atlas_core::Context;
use atlas_core::consumer::{Delivery, Handler, HandlerFuture};

/// Appends every login outcome to the history.
pub struct SessionStatusHandler {
    processor: LoginHistoryProcessor,
}

impl SessionStatusHandler {
    /// Handler driving `processor`.
    #[must_use]
    pub const fn new(processor: LoginHistoryProcessor) -> Self {
        Self { processor }
    }
}

impl Handler for SessionStatusHandler {
    fn name(&self) -> &'static str {
        "login_history_session_status"
    }

    fn handle<'a>(&'a self, ctx: Context, delivery: &'a Delivery) -> HandlerFuture<'a> {
        Box::pin(async move {
            let event: SessionEvent = delivery.decode()?;
            if let Some(attempt) = event.attempt() {
                self.processor.record(&ctx, attempt).await?;
            }
            Ok(())
        })
    }
}
