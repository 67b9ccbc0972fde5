//! Periodic background sweeps.
//!
//! A [`Sweep`] is one unit of housekeeping run on a fixed interval. Each tick
//! is bounded by the sweep itself; [`spawn_sweep`] only schedules ticks and
//! stops between them when the shutdown broadcast fires. A failing tick is
//! logged and the next tick runs as scheduled.

use atlas_core::error::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Future returned by [`Sweep::tick`]: the number of entries affected.
pub type SweepFuture<'a> = Pin<Box<dyn Future<Output = Result<usize>> + Send + 'a>>;

/// One periodic housekeeping job.
pub trait Sweep: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Time between ticks.
    fn interval(&self) -> Duration;

    /// Run one pass.
    ///
    /// # Errors
    ///
    /// Any error; it is logged and the sweep keeps running.
    fn tick(&self) -> SweepFuture<'_>;
}

/// Run one tick and record its outcome.
pub async fn run_once(sweep: &dyn Sweep) -> Option<usize> {
    let started = Instant::now();
    let result = sweep.tick().await;
    metrics::histogram!("atlas_sweep_duration_seconds", "sweep" => sweep.name())
        .record(started.elapsed().as_secs_f64());

    match result {
        Ok(affected) => {
            metrics::counter!("atlas_sweep_runs_total", "sweep" => sweep.name(), "outcome" => "ok").increment(1);
            if affected > 0 {
                tracing::info!(sweep = sweep.name(), affected, "sweep completed");
            } else {
                tracing::debug!(sweep = sweep.name(), "sweep found nothing to do");
            }
            Some(affected)
        }
        Err(e) => {
            metrics::counter!("atlas_sweep_runs_total", "sweep" => sweep.name(), "outcome" => "error").increment(1);
            tracing::error!(sweep = sweep.name(), error = %e, "sweep failed");
            None
        }
    }
}

/// Spawn `sweep` on the runtime.
///
/// The first tick runs one interval after spawning. The task returns when
/// `shutdown` receives a value or its sender is dropped; an in-flight tick is
/// finished first.
pub fn spawn_sweep(sweep: Arc<dyn Sweep>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = sweep.interval();
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(sweep = sweep.name(), interval_secs = period.as_secs(), "sweep started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = interval.tick() => {
                    run_once(sweep.as_ref()).await;
                }
            }
        }
        tracing::info!(sweep = sweep.name(), "sweep stopped");
    })
}
