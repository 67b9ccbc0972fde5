//! Per-operation context.
//!
//! A [`Context`] travels with every request and consumer dispatch. It carries
//! the caller's [`Tenant`], a W3C-style span context that is propagated on
//! outgoing Kafka headers, and optional cancellation and deadline signals.
//!
//! Registry and store calls run inside [`Context::run`], which races the
//! operation against both signals. A future that loses the race is dropped,
//! so any lock guards it held are released.

use crate::error::{Error, Result};
use crate::tenant::Tenant;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use uuid::Uuid;

/// Trace/span identifiers in `traceparent` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpanContext {
    trace_id: String,
    span_id: String,
}

impl SpanContext {
    /// Start a new trace.
    #[must_use]
    pub fn root() -> Self {
        Self {
            trace_id: Uuid::new_v4().simple().to_string(),
            span_id: new_span_id(),
        }
    }

    /// A child span within the same trace.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            span_id: new_span_id(),
        }
    }

    /// 32 hex characters.
    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// 16 hex characters.
    #[must_use]
    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    /// Render as a `traceparent` header value.
    #[must_use]
    pub fn to_header(&self) -> String {
        format!("00-{}-{}-01", self.trace_id, self.span_id)
    }

    /// Parse a `traceparent` header value.
    ///
    /// Returns `None` for anything that is not version `00` with well-formed
    /// ids.
    #[must_use]
    pub fn parse(header: &str) -> Option<Self> {
        let mut parts = header.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let span_id = parts.next()?;
        let _flags = parts.next()?;
        if version != "00" || parts.next().is_some() {
            return None;
        }
        if !is_hex(trace_id, 32) || !is_hex(span_id, 16) {
            return None;
        }
        Some(Self {
            trace_id: trace_id.to_ascii_lowercase(),
            span_id: span_id.to_ascii_lowercase(),
        })
    }
}

impl fmt::Display for SpanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header())
    }
}

fn new_span_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}

fn is_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Owner side of a cancellation signal.
#[derive(Debug)]
pub struct CancellationHandle(watch::Sender<bool>);

impl CancellationHandle {
    /// Cancel every context holding the paired signal.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Observer side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancellationSignal(watch::Receiver<bool>);

impl CancellationSignal {
    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once cancellation is requested.
    ///
    /// Never resolves if the handle is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a linked cancellation handle and signal.
#[must_use]
pub fn cancellation() -> (CancellationHandle, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (CancellationHandle(tx), CancellationSignal(rx))
}

/// Ambient value carried by every operation.
#[derive(Debug, Clone)]
pub struct Context {
    tenant: Tenant,
    span: SpanContext,
    deadline: Option<Instant>,
    cancel: Option<CancellationSignal>,
}

impl Context {
    /// Context for `tenant` with a fresh root span and no deadline.
    #[must_use]
    pub fn new(tenant: Tenant) -> Self {
        Self {
            tenant,
            span: SpanContext::root(),
            deadline: None,
            cancel: None,
        }
    }

    /// Replace the span context.
    #[must_use]
    pub fn with_span(mut self, span: SpanContext) -> Self {
        self.span = span;
        self
    }

    /// Fail operations started after `deadline`.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Attach a cancellation signal.
    #[must_use]
    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// The caller's tenant.
    #[must_use]
    pub const fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    /// Current span.
    #[must_use]
    pub const fn span(&self) -> &SpanContext {
        &self.span
    }

    /// Deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail fast if the context is already cancelled or expired.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`].
    pub fn check(&self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancellationSignal::is_cancelled) {
            return Err(Error::Cancelled("operation cancelled".into()));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::Cancelled("deadline exceeded".into()));
        }
        Ok(())
    }

    /// Run `fut`, abandoning it on cancellation or deadline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the context fires first, otherwise the
    /// result of `fut`.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;

        let cancelled = async {
            match self.cancel.clone() {
                Some(mut signal) => signal.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = cancelled => Err(Error::Cancelled("operation cancelled".into())),
            () = expired => Err(Error::Cancelled("deadline exceeded".into())),
            result = fut => result,
        }
    }
}
