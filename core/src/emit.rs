//! Unit-of-work emission.
//!
//! [`emit`] runs a function with a fresh [`MessageBuffer`] and produces the
//! staged records only when the function succeeds. Combined with
//! `atlas_postgres::execute_transaction` this gives the outbox pattern: the
//! database commits and the events are produced, or the transaction rolls
//! back and nothing is produced.
//!
//! A producer failure after a successful unit of work is logged and counted
//! in `atlas_emit_failures_total`; the operation still succeeds. Database
//! state is authoritative and reconciliation sweeps recover missed events.
//!
//! ```rust,ignore
//! let party = emit(&*producer, &ctx, |mut buffer| async move {
//!     let result = processor.create(&ctx, &mut buffer, leader).await;
//!     (buffer, result)
//! })
//! .await?;
//! ```

use crate::context::Context;
use crate::envelope::Headers;
use crate::error::{Error, Result};
use crate::message::MessageBuffer;
use crate::producer::{Producer, ProducerError};
use std::future::Future;

/// Evaluate `buffer` and produce every topic in order.
///
/// Stops at the first failing topic.
///
/// # Errors
///
/// [`ProducerError::Serialization`] if a provider fails, otherwise the
/// producer's error.
pub async fn flush(producer: &dyn Producer, ctx: &Context, buffer: &MessageBuffer) -> std::result::Result<usize, ProducerError> {
    let batches = buffer
        .evaluate()
        .map_err(|e| ProducerError::Serialization(e.to_string()))?;
    let headers = Headers::from_context(ctx);

    let mut produced = 0;
    for (topic, records) in &batches {
        if records.is_empty() {
            continue;
        }
        producer.produce(topic, &headers, records).await?;
        metrics::counter!("atlas_emit_records_total", "topic" => topic.clone())
            .increment(records.len() as u64);
        produced += records.len();
    }
    Ok(produced)
}

/// Flush `buffer`, logging instead of returning failures.
pub async fn publish(producer: &dyn Producer, ctx: &Context, buffer: MessageBuffer) {
    if buffer.is_empty() {
        return;
    }
    match flush(producer, ctx, &buffer).await {
        Ok(count) => {
            tracing::debug!(tenant = %ctx.tenant(), records = count, "status events produced");
        }
        Err(e) => {
            metrics::counter!("atlas_emit_failures_total").increment(1);
            tracing::error!(
                tenant = %ctx.tenant(),
                trace_id = ctx.span().trace_id(),
                error = %e,
                "failed to produce status events after successful operation"
            );
        }
    }
}

/// Run `f` with a fresh buffer and produce its records on success.
///
/// `f` receives the buffer by value and hands it back with its result. On
/// `Err` the buffer is dropped and nothing is produced.
///
/// # Errors
///
/// The error returned by `f`.
pub async fn emit<T, F, Fut>(producer: &dyn Producer, ctx: &Context, f: F) -> Result<T>
where
    F: FnOnce(MessageBuffer) -> Fut,
    Fut: Future<Output = (MessageBuffer, Result<T>)>,
{
    let (buffer, result) = f(MessageBuffer::new()).await;
    let value = result?;
    publish(producer, ctx, buffer).await;
    Ok(value)
}

/// Finish an operation that staged onto `buffer`.
///
/// On `Ok` the buffer is produced. On `Err` it is discarded and the buffer
/// built by `on_error` (typically a single `ERROR` status event for the
/// initiator) is produced instead. The original error is returned either way.
///
/// # Errors
///
/// The error carried by `outcome`.
pub async fn settle<T, E>(
    producer: &dyn Producer,
    ctx: &Context,
    buffer: MessageBuffer,
    outcome: Result<T>,
    on_error: E,
) -> Result<T>
where
    E: FnOnce(&Error) -> Option<MessageBuffer>,
{
    match outcome {
        Ok(value) => {
            publish(producer, ctx, buffer).await;
            Ok(value)
        }
        Err(err) => {
            drop(buffer);
            if let Some(report) = on_error(&err) {
                publish(producer, ctx, report).await;
            }
            Err(err)
        }
    }
}
