//! Submitting sagas to the orchestrator.

use crate::model::Saga;
use atlas_core::emit::emit;
use atlas_core::producer::Producer;
use atlas_core::{Context, MessageBuffer, Result, topic};
use uuid::Uuid;

/// Environment key of the saga command topic.
pub const COMMAND_TOPIC_SAGA: &str = "COMMAND_TOPIC_SAGA";

/// Stages sagas on the orchestrator's command topic.
#[derive(Debug, Clone)]
pub struct SagaSubmitter {
    topic: String,
}

impl Default for SagaSubmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl SagaSubmitter {
    /// Submitter for the configured saga command topic.
    #[must_use]
    pub fn new() -> Self {
        Self::with_topic(topic::resolve(COMMAND_TOPIC_SAGA))
    }

    /// Submitter for an explicit topic.
    #[must_use]
    pub fn with_topic(topic: impl Into<String>) -> Self {
        Self { topic: topic.into() }
    }

    /// Topic sagas are staged on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Stage `saga` keyed by the initiating character.
    ///
    /// # Errors
    ///
    /// Validation errors when the saga is internally inconsistent.
    pub fn stage(&self, buffer: &mut MessageBuffer, character_id: u32, saga: &Saga) -> Result<()> {
        saga.validate_consistency()?;
        tracing::debug!(
            transaction_id = %saga.transaction_id,
            saga_type = %saga.saga_type,
            steps = saga.steps.len(),
            "saga staged"
        );
        buffer.put_json(self.topic.clone(), character_id, saga.clone());
        Ok(())
    }

    /// Stage and produce `saga` in its own unit of work.
    ///
    /// # Errors
    ///
    /// See [`stage`](Self::stage).
    pub async fn submit_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        character_id: u32,
        saga: Saga,
    ) -> Result<Uuid> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self
                .stage(&mut buffer, character_id, &saga)
                .map(|()| saga.transaction_id);
            (buffer, result)
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::action::{StepPayload, UpdateAreaInfoPayload};
    use crate::model::SagaType;
    use atlas_testing::{RecordingProducer, test_context};

    fn saga() -> Saga {
        Saga::builder()
            .saga_type(SagaType::QuestStart)
            .initiated_by("quest-service")
            .add_step(
                "area",
                StepPayload::UpdateAreaInfo(UpdateAreaInfoPayload {
                    character_id: 42,
                    world_id: 0,
                    channel_id: 1,
                    area: 7,
                    info: "r=1".into(),
                }),
            )
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn submits_keyed_by_character() {
        let producer = RecordingProducer::new();
        let submitter = SagaSubmitter::with_topic("sagas");
        let saga = saga();

        let id = submitter
            .submit_and_emit(&producer, &test_context(), 42, saga.clone())
            .await
            .unwrap();

        assert_eq!(id, saga.transaction_id);
        let records = producer.on_topic("sagas");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key(), Some(42));
        let back: Saga = records[0].message.decode().unwrap();
        assert_eq!(back, saga);
    }

    #[tokio::test]
    async fn inconsistent_saga_is_not_submitted() {
        let producer = RecordingProducer::new();
        let mut saga = saga();
        saga.steps.push(saga.steps[0].clone());

        let result = SagaSubmitter::with_topic("sagas")
            .submit_and_emit(&producer, &test_context(), 42, saga)
            .await;

        assert!(result.is_err());
        assert!(producer.is_empty());
    }
}
