//! Fluent saga construction.

use crate::SagaError;
use crate::action::StepPayload;
use crate::model::{Saga, SagaType, Step};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

/// Builder for [`Saga`].
///
/// ```rust,ignore
/// let saga = SagaBuilder::new()
///     .saga_type(SagaType::QuestReward)
///     .initiated_by("quest-service")
///     .add_step("give_mesos", StepPayload::AwardMesos(mesos))
///     .add_step("give_exp", StepPayload::AwardExperience(exp))
///     .build()?;
/// ```
#[derive(Debug, Default, Clone)]
#[must_use]
pub struct SagaBuilder {
    transaction_id: Option<Uuid>,
    saga_type: Option<SagaType>,
    initiated_by: Option<String>,
    steps: Vec<(String, StepPayload)>,
    now: Option<DateTime<Utc>>,
}

impl SagaBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed transaction id instead of a random one.
    pub const fn transaction_id(mut self, id: Uuid) -> Self {
        self.transaction_id = Some(id);
        self
    }

    /// Flow kind (required).
    pub const fn saga_type(mut self, saga_type: SagaType) -> Self {
        self.saga_type = Some(saga_type);
        self
    }

    /// Initiator (required).
    pub fn initiated_by(mut self, who: impl Into<String>) -> Self {
        self.initiated_by = Some(who.into());
        self
    }

    /// Append a pending step.
    pub fn add_step(mut self, step_id: impl Into<String>, payload: StepPayload) -> Self {
        self.steps.push((step_id.into(), payload));
        self
    }

    /// Timestamp for the steps (defaults to now).
    pub const fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Build the saga.
    ///
    /// # Errors
    ///
    /// [`SagaError::MissingField`] for a missing type or initiator and
    /// [`SagaError::DuplicateStep`] for repeated step ids.
    pub fn build(self) -> Result<Saga, SagaError> {
        let saga_type = self.saga_type.ok_or(SagaError::MissingField("sagaType"))?;
        let initiated_by = self
            .initiated_by
            .ok_or(SagaError::MissingField("initiatedBy"))?;
        let now = self.now.unwrap_or_else(Utc::now);

        let mut seen = HashSet::new();
        let mut steps = Vec::with_capacity(self.steps.len());
        for (step_id, payload) in self.steps {
            if !seen.insert(step_id.clone()) {
                return Err(SagaError::DuplicateStep(step_id));
            }
            steps.push(Step::pending(step_id, payload, now));
        }

        Ok(Saga {
            transaction_id: self.transaction_id.unwrap_or_else(Uuid::new_v4),
            saga_type,
            initiated_by,
            steps,
        })
    }
}

impl Saga {
    /// Start building a saga.
    pub fn builder() -> SagaBuilder {
        SagaBuilder::new()
    }
}
