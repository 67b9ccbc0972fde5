//! Buff command consumer.

use crate::events::{ApplyBody, COMMAND_APPLY, COMMAND_CANCEL, COMMAND_CANCEL_ALL, CancelBody, Command};
use crate::processor::BuffProcessor;
use atlas_core::consumer::{Delivery, Handler, HandlerFuture};
use atlas_core::producer::Producer;
use atlas_core::{Context, Error, Result};
use std::sync::Arc;

/// Applies commands from the buff command topic.
pub struct CommandHandler {
    processor: BuffProcessor,
    producer: Arc<dyn Producer>,
}

impl CommandHandler {
    /// Handler driving `processor`.
    #[must_use]
    pub fn new(processor: BuffProcessor, producer: Arc<dyn Producer>) -> Self {
        Self { processor, producer }
    }

    #[tracing::instrument(skip(self, ctx, command), fields(character_id = command.character_id, kind = %command.kind))]
    async fn apply(&self, ctx: &Context, command: Command) -> Result<()> {
        let producer = self.producer.as_ref();
        match command.kind.as_str() {
            COMMAND_APPLY => {
                let body: ApplyBody = serde_json::from_value(command.body)?;
                self.processor
                    .apply_and_emit(producer, ctx, command.world_id, command.channel_id, command.character_id, body)
                    .await?;
            }
            COMMAND_CANCEL => {
                let body: CancelBody = serde_json::from_value(command.body)?;
                self.processor
                    .cancel_and_emit(producer, ctx, command.character_id, body.source_id)
                    .await?;
            }
            COMMAND_CANCEL_ALL => {
                self.processor
                    .cancel_all_and_emit(producer, ctx, command.character_id)
                    .await?;
            }
            other => return Err(Error::Unexpected(format!("unknown buff command {other}"))),
        }
        Ok(())
    }
}

impl Handler for CommandHandler {
    fn name(&self) -> &'static str {
        "buff_command"
    }

    fn handle<'a>(&'a self, ctx: Context, delivery: &'a Delivery) -> HandlerFuture<'a> {
        Box::pin(async move {
            let command: Command = delivery.decode()?;
            match self.apply(&ctx, command).await {
                // a duplicate cancel finds nothing to cancel
                Err(e) if e.is_precondition() => Ok(()),
                other => other,
            }
        })
    }
}
