//! Fame consumers: change requests and character deletion.

use crate::events::{
    CHARACTER_STATUS_DELETED, COMMAND_REQUEST_CHANGE, CharacterStatusEvent, Command, RequestChangeBody,
};
use crate::model::Field;
use crate::processor::FameProcessor;
use atlas_core::consumer::{Delivery, Handler, HandlerFuture};
use atlas_core::producer::Producer;
use atlas_core::{Context, Error, Result};
use std::sync::Arc;

/// Applies `REQUEST_CHANGE` commands.
pub struct CommandHandler {
    processor: FameProcessor,
    producer: Arc<dyn Producer>,
}

impl CommandHandler {
    /// Handler driving `processor`.
    #[must_use]
    pub fn new(processor: FameProcessor, producer: Arc<dyn Producer>) -> Self {
        Self { processor, producer }
    }

    #[tracing::instrument(
        skip(self, ctx, command),
        fields(transaction_id = %command.transaction_id, character_id = command.character_id, kind = %command.kind)
    )]
    async fn apply(&self, ctx: &Context, command: Command) -> Result<()> {
        if command.kind != COMMAND_REQUEST_CHANGE {
            return Err(Error::Unexpected(format!("unknown fame command {}", command.kind)));
        }
        let body: RequestChangeBody = serde_json::from_value(command.body)?;
        let field = Field {
            world_id: command.world_id,
            channel_id: command.channel_id,
            map_id: command.map_id,
        };
        self.processor
            .request_change_and_emit(
                self.producer.as_ref(),
                ctx,
                command.transaction_id,
                field,
                command.character_id,
                body.target_id,
                body.amount,
            )
            .await?;
        Ok(())
    }
}

impl Handler for CommandHandler {
    fn name(&self) -> &'static str {
        "fame_command"
    }

    fn handle<'a>(&'a self, ctx: Context, delivery: &'a Delivery) -> HandlerFuture<'a> {
        Box::pin(async move {
            let command: Command = delivery.decode()?;
            match self.apply(&ctx, command).await {
                Err(e) if e.is_precondition() => Ok(()),
                other => other,
            }
        })
    }
}

/// Drops the fame history of deleted characters.
pub struct CharacterStatusHandler {
    processor: FameProcessor,
}

impl CharacterStatusHandler {
    /// Handler driving `processor`.
    #[must_use]
    pub const fn new(processor: FameProcessor) -> Self {
        Self { processor }
    }
}

impl Handler for CharacterStatusHandler {
    fn name(&self) -> &'static str {
        "fame_character_status"
    }

    fn handle<'a>(&'a self, ctx: Context, delivery: &'a Delivery) -> HandlerFuture<'a> {
        Box::pin(async move {
            let event: CharacterStatusEvent = delivery.decode()?;
            if event.kind == CHARACTER_STATUS_DELETED {
                self.processor.delete_by_character(&ctx, event.character_id).await?;
            }
            Ok(())
        })
    }
}
