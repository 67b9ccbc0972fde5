//! Messenger consumers: commands and character status.

use crate::events::{
    CHARACTER_STATUS_LOGOUT, COMMAND_CREATE, COMMAND_JOIN, COMMAND_LEAVE, COMMAND_REQUEST_INVITE,
    CharacterStatusEvent, Command, InviteRequestBody, MessengerBody,
};
use crate::processor::MessengerProcessor;
use atlas_core::consumer::{Delivery, Handler, HandlerFuture};
use atlas_core::producer::Producer;
use atlas_core::{Context, Error, Result};
use std::sync::Arc;

/// Applies commands from the messenger command topic.
pub struct CommandHandler {
    processor: MessengerProcessor,
    producer: Arc<dyn Producer>,
}

impl CommandHandler {
    /// Handler driving `processor`.
    #[must_use]
    pub fn new(processor: MessengerProcessor, producer: Arc<dyn Producer>) -> Self {
        Self { processor, producer }
    }

    #[tracing::instrument(
        skip(self, ctx, command),
        fields(transaction_id = %command.transaction_id, actor_id = command.actor_id, kind = %command.kind)
    )]
    async fn apply(&self, ctx: &Context, command: Command) -> Result<()> {
        let producer = self.producer.as_ref();
        let processor = &self.processor;
        let (tx, world, actor) = (command.transaction_id, command.world_id, command.actor_id);
        match command.kind.as_str() {
            COMMAND_CREATE => {
                processor.create_and_emit(producer, ctx, tx, world, actor).await?;
            }
            COMMAND_JOIN => {
                let body: MessengerBody = serde_json::from_value(command.body)?;
                processor
                    .join_and_emit(producer, ctx, tx, world, body.messenger_id, actor)
                    .await?;
            }
            COMMAND_LEAVE => {
                let body: MessengerBody = serde_json::from_value(command.body)?;
                processor
                    .leave_and_emit(producer, ctx, tx, world, body.messenger_id, actor)
                    .await?;
            }
            COMMAND_REQUEST_INVITE => {
                let body: InviteRequestBody = serde_json::from_value(command.body)?;
                processor
                    .request_invite_and_emit(producer, ctx, tx, world, actor, body.character_id)
                    .await?;
            }
            other => {
                return Err(Error::Unexpected(format!("unknown messenger command {other}")));
            }
        }
        Ok(())
    }
}

impl Handler for CommandHandler {
    fn name(&self) -> &'static str {
        "messenger_command"
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

/// Takes characters that log out out of their messenger.
pub struct CharacterStatusHandler {
    processor: MessengerProcessor,
    producer: Arc<dyn Producer>,
}

impl CharacterStatusHandler {
    /// Handler driving `processor`.
    #[must_use]
    pub fn new(processor: MessengerProcessor, producer: Arc<dyn Producer>) -> Self {
        Self { processor, producer }
    }

    #[tracing::instrument(skip(self, ctx, event), fields(transaction_id = %event.transaction_id, character_id = event.character_id))]
    async fn logout(&self, ctx: &Context, event: &CharacterStatusEvent) -> Result<()> {
        let messenger = match self.processor.get_by_member(ctx, event.character_id).await {
            Ok(messenger) => messenger,
            Err(Error::NotFound { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };
        self.processor
            .leave_and_emit(
                self.producer.as_ref(),
                ctx,
                event.transaction_id,
                event.world_id,
                messenger.id(),
                event.character_id,
            )
            .await?;
        Ok(())
    }
}

impl Handler for CharacterStatusHandler {
    fn name(&self) -> &'static str {
        "messenger_character_status"
    }

    fn handle<'a>(&'a self, ctx: Context, delivery: &'a Delivery) -> HandlerFuture<'a> {
        Box::pin(async move {
            let event: CharacterStatusEvent = delivery.decode()?;
            if event.kind != CHARACTER_STATUS_LOGOUT {
                return Ok(());
            }
            match self.logout(&ctx, &event).await {
                Err(e) if e.is_precondition() => Ok(()),
                other => other,
            }
        })
    }
}
