//! Daily login history purge.

use crate::processor::LoginHistoryProcessor;
use atlas_core::Result;
use atlas_runtime::{Sweep, SweepFuture};
use std::time::Duration;

/// Default interval between purges.
pub const DAILY: Duration = Duration::from_secs(24 * 60 * 60);

/// Purges expired login history on an interval.
pub struct PurgeSweep {
    processor: LoginHistoryProcessor,
    interval: Duration,
}

impl PurgeSweep {
    /// Sweep over `processor`, ticking every `interval`.
    #[must_use]
    pub const fn new(processor: LoginHistoryProcessor, interval: Duration) -> Self {
        Self { processor, interval }
    }

    async fn run(&self) -> Result<usize> {
        let purged = self.processor.purge().await?;
        Ok(usize::try_from(purged).unwrap_or(usize::MAX))
    }
}

impl Sweep for PurgeSweep {
    fn name(&self) -> &'static str {
        "login_history_purge"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn tick(&self) -> SweepFuture<'_> {
        Box::pin(self.run())
    }
}
