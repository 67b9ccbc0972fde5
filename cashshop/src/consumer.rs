//! Cash asset command consumer.

use crate::events::{
    AssetRef, COMMAND_ACCEPT, COMMAND_CREATE, COMMAND_EXPIRE, COMMAND_RELEASE, COMMAND_UPDATE_QUANTITY, Command,
    CreateBody, ExpireBody, UpdateQuantityBody,
};
use crate::processor::CashAssetProcessor;
use atlas_core::consumer::{Delivery, Handler, HandlerFuture};
use atlas_core::producer::Producer;
use atlas_core::{Context, Error, Result};
use std::sync::Arc;

/// Applies commands from the cash asset command topic.
pub struct CommandHandler {
    processor: CashAssetProcessor,
    producer: Arc<dyn Producer>,
}

impl CommandHandler {
    /// Handler driving `processor`.
    #[must_use]
    pub fn new(processor: CashAssetProcessor, producer: Arc<dyn Producer>) -> Self {
        Self { processor, producer }
    }

    #[tracing::instrument(
        skip(self, ctx, command),
        fields(transaction_id = %command.transaction_id, character_id = command.character_id, kind = %command.kind)
    )]
    async fn apply(&self, ctx: &Context, command: Command) -> Result<()> {
        let producer = self.producer.as_ref();
        match command.kind.as_str() {
            COMMAND_CREATE => {
                let body: CreateBody = serde_json::from_value(command.body)?;
                self.processor.create_and_emit(producer, ctx, body.into()).await?;
            }
            COMMAND_ACCEPT => {
                let body: CreateBody = serde_json::from_value(command.body)?;
                self.processor
                    .accept_and_emit(
                        producer,
                        ctx,
                        command.transaction_id,
                        command.character_id,
                        body.into(),
                        body.cash_id,
                    )
                    .await?;
            }
            COMMAND_RELEASE => {
                let body: AssetRef = serde_json::from_value(command.body)?;
                self.processor
                    .release_and_emit(producer, ctx, command.transaction_id, command.character_id, body.asset_id)
                    .await?;
            }
            COMMAND_UPDATE_QUANTITY => {
                let body: UpdateQuantityBody = serde_json::from_value(command.body)?;
                self.processor
                    .update_quantity_and_emit(producer, ctx, body.asset_id, body.quantity)
                    .await?;
            }
            COMMAND_EXPIRE => {
                let body: ExpireBody = serde_json::from_value(command.body)?;
                self.processor
                    .expire_and_emit(producer, ctx, body.asset_id, body.replace_item_id, &body.replace_message)
                    .await?;
            }
            other => return Err(Error::Unexpected(format!("unknown cash asset command {other}"))),
        }
        Ok(())
    }
}

impl Handler for CommandHandler {
    fn name(&self) -> &'static str {
        "cash_asset_command"
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
