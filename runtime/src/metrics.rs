//! Prometheus recorder for the Atlas service metrics.
//!
//! Metric names recorded across the workspace:
//! - `atlas_emit_records_total` / `atlas_emit_failures_total`
//! - `atlas_registry_ops_total`
//! - `atlas_transactions_total`
//! - `atlas_consumer_messages_total` / `atlas_consumer_errors_total`
//! - `atlas_sweep_runs_total` / `atlas_sweep_duration_seconds`
//!
//! # Example
//!
//! ```rust,no_run
//! use atlas_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let body = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

/// Recorder setup failures.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Bucket configuration rejected
    #[error("invalid prometheus exporter configuration: {0}")]
    Build(String),
    /// Global recorder could not be set
    #[error("prometheus recorder not installed: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address its `/metrics` route is served on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsServer")
            .field("addr", &self.addr)
            .field("handle", &self.handle.as_ref().map(|_| "PrometheusHandle"))
            .finish()
    }
}

impl MetricsServer {
    /// Recorder to be scraped on `addr`; nothing is installed until [`start`](Self::start).
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint should bind to.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Describe the Atlas metrics and install the Prometheus recorder.
    ///
    /// A recorder installed earlier in the process (tests) is tolerated;
    /// [`render`](Self::render) then returns `None`.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) if e.to_string().contains("already initialized") => {
                tracing::warn!(addr = %self.addr, "A recorder is already installed; this server renders nothing");
                Ok(())
            }
            Err(e) => Err(MetricsError::Install(e.to_string())),
        }
    }

    /// Prometheus text exposition, or `None` when another recorder won.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "atlas_emit_records_total",
        "Status event records produced after a successful unit of work"
    );
    describe_counter!(
        "atlas_emit_failures_total",
        "Buffers that failed to produce after the operation succeeded"
    );
    describe_counter!("atlas_registry_ops_total", "Tenant registry operations");
    describe_counter!(
        "atlas_transactions_total",
        "Database transactions by outcome (commit, rollback)"
    );
    describe_counter!(
        "atlas_consumer_messages_total",
        "Consumed records by topic and outcome"
    );
    describe_counter!("atlas_consumer_errors_total", "Broker receive errors");
    describe_counter!("atlas_sweep_runs_total", "Background sweep ticks by outcome");
    describe_histogram!("atlas_sweep_duration_seconds", "Time taken by one sweep tick");
}
