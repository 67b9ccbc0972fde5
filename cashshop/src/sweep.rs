//! Periodic cash asset expiration.

use crate::processor::CashAssetProcessor;
use atlas_core::producer::Producer;
use atlas_core::{Context, Result};
use atlas_runtime::{Sweep, SweepFuture};
use std::sync::Arc;
use std::time::Duration;

/// Expires due cash assets of every tenant that has any.
pub struct ExpirationSweep {
    processor: CashAssetProcessor,
    producer: Arc<dyn Producer>,
    interval: Duration,
}

impl ExpirationSweep {
    /// Sweep over `processor`, ticking every `interval`.
    #[must_use]
    pub fn new(processor: CashAssetProcessor, producer: Arc<dyn Producer>, interval: Duration) -> Self {
        Self {
            processor,
            producer,
            interval,
        }
    }

    async fn run(&self) -> Result<usize> {
        let mut total = 0;
        for tenant in self.processor.due_tenants().await? {
            let ctx = Context::new(tenant);
            match self.processor.expire_due_and_emit(self.producer.as_ref(), &ctx).await {
                Ok(expired) => total += expired,
                Err(e) => {
                    tracing::warn!(tenant = %ctx.tenant(), error = %e, "cash asset expiration failed for tenant");
                }
            }
        }
        Ok(total)
    }
}

impl Sweep for ExpirationSweep {
    fn name(&self) -> &'static str {
        "cash_asset_expiration"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn tick(&self) -> SweepFuture<'_> {
        Box::pin(self.run())
    }
}
