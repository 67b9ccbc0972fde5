//! Periodic buff expiration and poison damage.

use crate::processor::BuffProcessor;
use atlas_core::producer::Producer;
use atlas_core::{Context, Result};
use atlas_runtime::{Sweep, SweepFuture};
use std::sync::Arc;
use std::time::Duration;

/// Expires buffs of every tenant once per interval.
pub struct ExpirationSweep {
    processor: BuffProcessor,
    producer: Arc<dyn Producer>,
    interval: Duration,
}

impl ExpirationSweep {
    /// Sweep over `processor`, ticking every `interval`.
    #[must_use]
    pub fn new(processor: BuffProcessor, producer: Arc<dyn Producer>, interval: Duration) -> Self {
        Self {
            processor,
            producer,
            interval,
        }
    }

    async fn run(&self) -> Result<usize> {
        let mut total = 0;
        for tenant in self.processor.tenants().await? {
            let ctx = Context::new(tenant);
            match self.processor.expire_and_emit(self.producer.as_ref(), &ctx).await {
                Ok(expired) => total += expired,
                Err(e) => {
                    tracing::warn!(tenant = %ctx.tenant(), error = %e, "buff expiration failed for tenant");
                }
            }
        }
        Ok(total)
    }
}

impl Sweep for ExpirationSweep {
    fn name(&self) -> &'static str {
        "buff_expiration"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn tick(&self) -> SweepFuture<'_> {
        Box::pin(self.run())
    }
}

/// Deals poison damage for every tenant once per interval.
pub struct PoisonSweep {
    processor: BuffProcessor,
    producer: Arc<dyn Producer>,
    interval: Duration,
}

impl PoisonSweep {
    /// Sweep over `processor`, ticking every `interval`.
    #[must_use]
    pub fn new(processor: BuffProcessor, producer: Arc<dyn Producer>, interval: Duration) -> Self {
        Self {
            processor,
            producer,
            interval,
        }
    }

    async fn run(&self) -> Result<usize> {
        let mut total = 0;
        for tenant in self.processor.tenants().await? {
            let ctx = Context::new(tenant);
            match self.processor.tick_poison_and_emit(self.producer.as_ref(), &ctx).await {
                Ok(damaged) => total += damaged,
                Err(e) => {
                    tracing::warn!(tenant = %ctx.tenant(), error = %e, "poison tick failed for tenant");
                }
            }
        }
        Ok(total)
    }
}

impl Sweep for PoisonSweep {
    fn name(&self) -> &'static str {
        "buff_poison"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn tick(&self) -> SweepFuture<'_> {
        Box::pin(self.run())
    }
}
