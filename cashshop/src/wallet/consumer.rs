//! Wallet command consumer.

use crate::wallet::events::{AdjustCurrencyBody, COMMAND_ADJUST_CURRENCY, Command};
use crate::wallet::processor::WalletProcessor;
use atlas_core::consumer::{Delivery, Handler, HandlerFuture};
use atlas_core::producer::Producer;
use atlas_core::{Context, Error, Result};
use std::sync::Arc;

/// Applies commands from the wallet command topic.
pub struct WalletCommandHandler {
    processor: WalletProcessor,
    producer: Arc<dyn Producer>,
}

impl WalletCommandHandler {
    /// Handler driving `processor`.
    #[must_use]
    pub fn new(processor: WalletProcessor, producer: Arc<dyn Producer>) -> Self {
        Self { processor, producer }
    }

    #[tracing::instrument(skip(self, ctx, command), fields(transaction_id = %command.transaction_id, kind = %command.kind))]
    async fn apply(&self, ctx: &Context, command: Command) -> Result<()> {
        match command.kind.as_str() {
            COMMAND_ADJUST_CURRENCY => {
                let body: AdjustCurrencyBody = serde_json::from_value(command.body)?;
                self.processor
                    .adjust_currency_and_emit(
                        self.producer.as_ref(),
                        ctx,
                        body.account_id,
                        body.currency_type,
                        body.amount,
                    )
                    .await?;
            }
            other => return Err(Error::Unexpected(format!("unknown wallet command {other}"))),
        }
        Ok(())
    }
}

impl Handler for WalletCommandHandler {
    fn name(&self) -> &'static str {
        "wallet_command"
    }

    fn handle<'a>(&'a self, ctx: Context, delivery: &'a Delivery) -> HandlerFuture<'a> {
        Box::pin(async move {
            let command: Command = delivery.decode()?;
            match self.apply(&ctx, command).await {
                Err(e) if e.is_precondition() => {
                    tracing::debug!(error = %e, "wallet command rejected");
                    Ok(())
                }
                other => other,
            }
        })
    }
}
