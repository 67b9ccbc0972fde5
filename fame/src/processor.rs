//! Fame change requests.

use crate::character::CharacterDirectory;
use crate::events::{
    CHARACTER_COMMAND_REQUEST_CHANGE_FAME, COMMAND_TOPIC_CHARACTER, ChangeFameBody, CharacterCommand,
    ERROR_INVALID_AMOUNT, ERROR_INVALID_NAME, ERROR_NOT_MINIMUM_LEVEL, ERROR_NOT_THIS_MONTH,
    ERROR_NOT_TODAY, EVENT_TOPIC_FAME_STATUS, ErrorBody, STATUS_ERROR, StatusEvent, error_code,
};
use crate::model::{FameLog, Field, MINIMUM_LEVEL};
use crate::store;
use atlas_core::emit::settle;
use atlas_core::environment::Clock;
use atlas_core::producer::Producer;
use atlas_core::{Context, Error, MessageBuffer, Result, topic};
use atlas_postgres::{advisory_lock, execute_transaction, lock_key};
use chrono::{DateTime, Months, TimeDelta, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Fame processor.
#[derive(Clone)]
pub struct FameProcessor {
    pool: PgPool,
    characters: Arc<dyn CharacterDirectory>,
    clock: Arc<dyn Clock>,
    status_topic: String,
    character_topic: String,
}

impl std::fmt::Debug for FameProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FameProcessor")
            .field("status_topic", &self.status_topic)
            .field("character_topic", &self.character_topic)
            .finish_non_exhaustive()
    }
}

/// Start of the trailing month ending at `now`: one calendar month or 30
/// days back, whichever is earlier.
fn month_before(now: DateTime<Utc>) -> DateTime<Utc> {
    let calendar = now.checked_sub_months(Months::new(1)).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let thirty_days = now.checked_sub_signed(TimeDelta::days(30)).unwrap_or(DateTime::<Utc>::MIN_UTC);
    calendar.min(thirty_days)
}

impl FameProcessor {
    /// Processor over `pool`, validating characters through `characters`.
    #[must_use]
    pub fn new(pool: PgPool, characters: Arc<dyn CharacterDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            characters,
            clock,
            status_topic: topic::resolve(EVENT_TOPIC_FAME_STATUS),
            character_topic: topic::resolve(COMMAND_TOPIC_CHARACTER),
        }
    }

    /// Status topic.
    #[must_use]
    pub fn status_topic(&self) -> &str {
        &self.status_topic
    }

    /// Character command topic.
    #[must_use]
    pub fn character_topic(&self) -> &str {
        &self.character_topic
    }

    /// Fame given by `character_id` within the trailing month.
    ///
    /// # Errors
    ///
    /// Database failures.
    pub async fn by_character_last_month(&self, ctx: &Context, character_id: u32) -> Result<Vec<FameLog>> {
        let tenant_id = ctx.tenant().id();
        let since = month_before(self.clock.now());
        execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = store::given_since(&mut tx, tenant_id, character_id, since).await;
            (tx, result)
        })
        .await
    }

    /// `character_id` gives `amount` fame to `target_id`.
    ///
    /// Checks run in order: giver exists, target exists, amount is `±1`,
    /// giver level, nothing given today, target not famed within a month.
    /// The month check and the insert run under a per-giver advisory lock.
    /// On success a `REQUEST_CHANGE_FAME` character command is staged.
    ///
    /// # Errors
    ///
    /// Named [`Error::Validation`] codes for each failed check,
    /// [`Error::NotFound`] when the giver does not exist, database or
    /// directory failures.
    pub async fn request_change(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        transaction_id: Uuid,
        field: Field,
        character_id: u32,
        target_id: u32,
        amount: i8,
    ) -> Result<FameLog> {
        let giver = self
            .characters
            .find(ctx, character_id)
            .await?
            .ok_or_else(|| Error::not_found("character", character_id))?;
        if self.characters.find(ctx, target_id).await?.is_none() {
            return Err(Error::validation(ERROR_INVALID_NAME, format!("character {target_id} does not exist")));
        }
        if amount != 1 && amount != -1 {
            return Err(Error::validation(ERROR_INVALID_AMOUNT, format!("fame amount {amount} is not +1 or -1")));
        }
        if giver.level < MINIMUM_LEVEL {
            return Err(Error::validation(
                ERROR_NOT_MINIMUM_LEVEL,
                format!("character {character_id} is level {}", giver.level),
            ));
        }

        let now = self.clock.now();
        let tenant_id = ctx.tenant().id();
        let log = FameLog {
            id: Uuid::new_v4(),
            tenant_id,
            character_id,
            target_id,
            amount,
            created_at: now,
        };
        let lock = lock_key(&["fame", &tenant_id.to_string(), &character_id.to_string()]);

        let log = execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = async {
                advisory_lock(&mut tx, lock).await?;
                let recent = store::given_since(&mut tx, tenant_id, character_id, month_before(now)).await?;
                if recent.iter().any(|l| l.created_at.date_naive() == now.date_naive()) {
                    return Err(Error::validation(
                        ERROR_NOT_TODAY,
                        format!("character {character_id} already gave fame today"),
                    ));
                }
                if recent.iter().any(|l| l.target_id == target_id) {
                    return Err(Error::validation(
                        ERROR_NOT_THIS_MONTH,
                        format!("character {character_id} already famed {target_id} this month"),
                    ));
                }
                store::insert(&mut tx, &log).await?;
                Ok(log)
            }
            .await;
            (tx, result)
        })
        .await?;

        tracing::info!(character_id, target_id, amount, "fame given");
        buffer.put_json(
            self.character_topic.clone(),
            target_id,
            CharacterCommand {
                transaction_id,
                world_id: field.world_id,
                character_id: target_id,
                kind: CHARACTER_COMMAND_REQUEST_CHANGE_FAME.to_string(),
                body: ChangeFameBody {
                    actor_id: character_id,
                    actor_type: "CHARACTER".to_string(),
                    amount,
                },
            },
        );
        Ok(log)
    }

    /// [`request_change`](Self::request_change) as a unit of work; failures
    /// are reported to the giver as an `ERROR` status event.
    ///
    /// # Errors
    ///
    /// See [`request_change`](Self::request_change).
    #[allow(clippy::too_many_arguments)]
    pub async fn request_change_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        transaction_id: Uuid,
        field: Field,
        character_id: u32,
        target_id: u32,
        amount: i8,
    ) -> Result<FameLog> {
        let mut buffer = MessageBuffer::new();
        let outcome = self
            .request_change(ctx, &mut buffer, transaction_id, field, character_id, target_id, amount)
            .await;
        settle(producer, ctx, buffer, outcome, |err| {
            self.report(transaction_id, field, character_id, err)
        })
        .await
    }

    /// Remove every log given or received by a deleted character.
    ///
    /// # Errors
    ///
    /// Database failures.
    pub async fn delete_by_character(&self, ctx: &Context, character_id: u32) -> Result<u64> {
        let tenant_id = ctx.tenant().id();
        let deleted = execute_transaction(ctx, &self.pool, |mut tx| async move {
            let result = store::delete_by_character(&mut tx, tenant_id, character_id).await;
            (tx, result)
        })
        .await?;
        tracing::info!(character_id, deleted, "fame logs deleted");
        Ok(deleted)
    }

    fn report(&self, transaction_id: Uuid, field: Field, character_id: u32, err: &Error) -> Option<MessageBuffer> {
        let code = error_code(err);
        tracing::warn!(character_id, error = %err, code, "fame request failed");
        let mut report = MessageBuffer::new();
        report.put_json(
            self.status_topic.clone(),
            character_id,
            StatusEvent {
                transaction_id,
                world_id: field.world_id,
                character_id,
                kind: STATUS_ERROR.to_string(),
                body: ErrorBody {
                    channel_id: field.channel_id,
                    error: code.to_string(),
                },
            },
        );
        Some(report)
    }
}
