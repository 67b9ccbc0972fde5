//! Party consumers: commands and character status.

use crate::events::{
    CHARACTER_STATUS_DELETED, COMMAND_CHANGE_LEADER, COMMAND_CREATE, COMMAND_EXPEL, COMMAND_JOIN,
    COMMAND_LEAVE, CharacterStatusEvent, Command, PartyBody, TargetBody,
};
use crate::processor::PartyProcessor;
use atlas_core::consumer::{Delivery, Handler, HandlerFuture};
use atlas_core::producer::Producer;
use atlas_core::{Context, Error, Result};
use std::sync::Arc;

/// Applies commands from the party command topic.
pub struct CommandHandler {
    processor: PartyProcessor,
    producer: Arc<dyn Producer>,
}

impl CommandHandler {
    /// Handler driving `processor`.
    #[must_use]
    pub fn new(processor: PartyProcessor, producer: Arc<dyn Producer>) -> Self {
        Self { processor, producer }
    }

    #[tracing::instrument(skip(self, ctx, command), fields(actor_id = command.actor_id, kind = %command.kind))]
    async fn apply(&self, ctx: &Context, command: Command) -> Result<()> {
        let producer = self.producer.as_ref();
        let processor = &self.processor;
        match command.kind.as_str() {
            COMMAND_CREATE => {
                processor
                    .create_and_emit(producer, ctx, command.world_id, command.actor_id)
                    .await?;
            }
            COMMAND_JOIN => {
                let body: PartyBody = serde_json::from_value(command.body)?;
                processor
                    .join_and_emit(producer, ctx, body.party_id, command.actor_id)
                    .await?;
            }
            COMMAND_LEAVE => {
                let body: PartyBody = serde_json::from_value(command.body)?;
                processor
                    .leave_and_emit(producer, ctx, body.party_id, command.actor_id)
                    .await?;
            }
            COMMAND_CHANGE_LEADER => {
                let body: TargetBody = serde_json::from_value(command.body)?;
                processor
                    .change_leader_and_emit(producer, ctx, body.party_id, command.actor_id, body.character_id)
                    .await?;
            }
            COMMAND_EXPEL => {
                let body: TargetBody = serde_json::from_value(command.body)?;
                processor
                    .expel_and_emit(producer, ctx, body.party_id, command.actor_id, body.character_id)
                    .await?;
            }
            other => {
                return Err(Error::Unexpected(format!("unknown party command {other}")));
            }
        }
        Ok(())
    }
}

impl Handler for CommandHandler {
    fn name(&self) -> &'static str {
        "party_command"
    }

    fn handle<'a>(&'a self, ctx: Context, delivery: &'a Delivery) -> HandlerFuture<'a> {
        Box::pin(async move {
            let command: Command = delivery.decode()?;
            match self.apply(&ctx, command).await {
                // reported to the actor as an ERROR event
                Err(e) if e.is_precondition() => Ok(()),
                other => other,
            }
        })
    }
}

/// Removes deleted characters from their party. A deleted leader disbands
/// it.
pub struct CharacterStatusHandler {
    processor: PartyProcessor,
    producer: Arc<dyn Producer>,
}

impl CharacterStatusHandler {
    /// Handler driving `processor`.
    #[must_use]
    pub fn new(processor: PartyProcessor, producer: Arc<dyn Producer>) -> Self {
        Self { processor, producer }
    }

    async fn deleted(&self, ctx: &Context, character_id: u32) -> Result<()> {
        let party = match self.processor.get_by_member(ctx, character_id).await {
            Ok(party) => party,
            Err(Error::NotFound { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };
        tracing::info!(party_id = party.id(), character_id, "deleted character leaves party");
        self.processor
            .leave_and_emit(self.producer.as_ref(), ctx, party.id(), character_id)
            .await?;
        Ok(())
    }
}

impl Handler for CharacterStatusHandler {
    fn name(&self) -> &'static str {
        "party_character_status"
    }

    fn handle<'a>(&'a self, ctx: Context, delivery: &'a Delivery) -> HandlerFuture<'a> {
        Box::pin(async move {
            let event: CharacterStatusEvent = delivery.decode()?;
            if event.kind != CHARACTER_STATUS_DELETED {
                return Ok(());
            }
            match self.deleted(&ctx, event.character_id).await {
                Err(e) if e.is_precondition() => Ok(()),
                other => other,
            }
        })
    }
}
