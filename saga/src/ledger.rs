//! In-flight saga tracking.
//!
//! The ledger keeps every in-flight saga of a tenant in a registry and
//! advances it as step outcomes arrive. Each call returns a [`Directive`]
//! telling the caller what to dispatch next. Terminal outcomes remove the
//! saga and stage a status event.

use crate::compensation::{self, Compensation, Plan};
use crate::model::{Saga, SagaType, Status, Step};
use atlas_core::environment::Clock;
use atlas_core::registry::{RegistryBackend, TenantRegistry};
use atlas_core::{Context, Error, MessageBuffer, Result, topic};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Environment key of the saga status topic.
pub const EVENT_TOPIC_SAGA_STATUS: &str = "EVENT_TOPIC_SAGA_STATUS";

/// `COMPLETED` status discriminator.
pub const STATUS_COMPLETED: &str = "COMPLETED";
/// `FAILED` status discriminator.
pub const STATUS_FAILED: &str = "FAILED";

/// What the caller should do after a ledger transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Dispatch this step.
    Dispatch(Step),
    /// Dispatch these undo actions in order.
    Compensate(Vec<Compensation>),
    /// The saga failed terminally; nothing to undo.
    Aborted {
        /// Failed step
        step_id: String,
    },
    /// Every step completed.
    Finished,
    /// The outcome was already applied or the saga is no longer in flight.
    Duplicate,
}

/// Saga status event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent<B> {
    /// Transaction id
    pub transaction_id: Uuid,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Event body
    pub body: B,
}

/// Body of `COMPLETED`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedBody {
    /// Flow kind
    pub saga_type: SagaType,
}

/// Body of `FAILED`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedBody {
    /// Flow kind
    pub saga_type: SagaType,
    /// Failure reason reported by the step's executor
    pub reason: String,
    /// Failed step
    pub failed_step: String,
}

/// Partition key of a saga: the first four bytes of its transaction id.
#[must_use]
pub fn saga_key(transaction_id: &Uuid) -> u32 {
    let b = transaction_id.as_bytes();
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

/// Registry-backed tracker of in-flight sagas.
#[derive(Clone)]
pub struct SagaLedger {
    sagas: TenantRegistry<Uuid, Saga>,
    clock: Arc<dyn Clock>,
    status_topic: String,
}

impl std::fmt::Debug for SagaLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaLedger")
            .field("sagas", &self.sagas)
            .field("status_topic", &self.status_topic)
            .finish_non_exhaustive()
    }
}

impl SagaLedger {
    /// Ledger over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn RegistryBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sagas: TenantRegistry::builder(backend, "saga")
                .invariant(|s: &Saga| s.validate_consistency().map_err(Error::from))
                .build(),
            clock,
            status_topic: topic::resolve(EVENT_TOPIC_SAGA_STATUS),
        }
    }

    /// Topic status events are staged on.
    #[must_use]
    pub fn status_topic(&self) -> &str {
        &self.status_topic
    }

    /// Track `saga` and return its first step.
    ///
    /// A resubmitted transaction id is a duplicate. A saga without steps
    /// finishes immediately.
    ///
    /// # Errors
    ///
    /// Validation errors for inconsistent sagas and registry failures.
    pub async fn begin(&self, ctx: &Context, buffer: &mut MessageBuffer, saga: Saga) -> Result<Directive> {
        saga.validate_consistency()?;
        if self.sagas.find(ctx, &saga.transaction_id).await?.is_some() {
            return Ok(Directive::Duplicate);
        }
        let Some(first) = saga.current_step().cloned() else {
            self.stage_completed(buffer, &saga);
            return Ok(Directive::Finished);
        };
        let transaction_id = saga.transaction_id.clone();
        let saga = self.sagas.put(ctx, &transaction_id, saga).await?;
        tracing::info!(
            tenant = %ctx.tenant(),
            transaction_id = %saga.transaction_id,
            saga_type = %saga.saga_type,
            "saga started"
        );
        Ok(Directive::Dispatch(first))
    }

    /// Mark `step_id` completed and return what comes next.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown step and registry failures.
    pub async fn step_completed(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        transaction_id: Uuid,
        step_id: &str,
    ) -> Result<Directive> {
        let Some(saga) = self.sagas.find(ctx, &transaction_id).await? else {
            tracing::debug!(%transaction_id, step_id, "outcome for saga not in flight");
            return Ok(Directive::Duplicate);
        };
        let index = Self::index_of(&saga, step_id)?;
        if saga.steps[index].status == Status::Completed {
            return Ok(Directive::Duplicate);
        }

        let now = self.clock.now();
        let saga = self
            .sagas
            .try_update(ctx, &transaction_id, move |mut saga| {
                saga.set_step_status(index, Status::Completed, now)?;
                Ok(saga)
            })
            .await?;

        if let Some(next) = saga.current_step() {
            return Ok(Directive::Dispatch(next.clone()));
        }
        self.sagas.remove(ctx, &transaction_id).await?;
        self.stage_completed(buffer, &saga);
        tracing::info!(%transaction_id, "saga completed");
        Ok(Directive::Finished)
    }

    /// Mark `step_id` failed, stop tracking the saga and plan compensation.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown step and registry failures.
    pub async fn step_failed(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        transaction_id: Uuid,
        step_id: &str,
        reason: impl Into<String>,
    ) -> Result<Directive> {
        let Some(mut saga) = self.sagas.find(ctx, &transaction_id).await? else {
            tracing::debug!(%transaction_id, step_id, "outcome for saga not in flight");
            return Ok(Directive::Duplicate);
        };
        let index = Self::index_of(&saga, step_id)?;
        saga.set_step_status(index, Status::Failed, self.clock.now())?;
        self.sagas.remove(ctx, &transaction_id).await?;

        let reason = reason.into();
        tracing::warn!(%transaction_id, step_id, reason = %reason, "saga step failed");
        buffer.put_json(
            self.status_topic.clone(),
            saga_key(&transaction_id),
            StatusEvent {
                transaction_id,
                kind: STATUS_FAILED,
                body: FailedBody {
                    saga_type: saga.saga_type,
                    reason,
                    failed_step: step_id.to_string(),
                },
            },
        );

        Ok(match compensation::plan(&saga) {
            Plan::Rollback(undo) => Directive::Compensate(undo),
            Plan::Terminal { step_id } => Directive::Aborted { step_id },
            Plan::None => Directive::Finished,
        })
    }

    /// In-flight saga by transaction id.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the saga is not in flight.
    pub async fn get(&self, ctx: &Context, transaction_id: Uuid) -> Result<Saga> {
        self.sagas.get(ctx, &transaction_id).await
    }

    /// Every in-flight saga of the caller's tenant.
    ///
    /// # Errors
    ///
    /// Registry failures.
    pub async fn in_flight(&self, ctx: &Context) -> Result<Vec<Saga>> {
        self.sagas.get_all(ctx).await
    }

    fn index_of(saga: &Saga, step_id: &str) -> Result<usize> {
        saga.step_index(step_id)
            .ok_or_else(|| Error::not_found("saga step", format!("{}/{step_id}", saga.transaction_id)))
    }

    fn stage_completed(&self, buffer: &mut MessageBuffer, saga: &Saga) {
        buffer.put_json(
            self.status_topic.clone(),
            saga_key(&saga.transaction_id),
            StatusEvent {
                transaction_id: saga.transaction_id,
                kind: STATUS_COMPLETED,
                body: CompletedBody {
                    saga_type: saga.saga_type,
                },
            },
        );
    }
}
