//! Buff operations.

use crate::events::{
    AppliedBody, ApplyBody, CHARACTER_COMMAND_CHANGE_HP, COMMAND_TOPIC_CHARACTER, ChangeHpBody,
    CharacterCommand, EVENT_TOPIC_CHARACTER_BUFF_STATUS, ExpiredBody, STATUS_APPLIED, STATUS_EXPIRED,
    StatusEvent,
};
use crate::model::{Buff, Character};
use atlas_core::emit::emit;
use atlas_core::environment::Clock;
use atlas_core::producer::Producer;
use atlas_core::registry::{MemoryBackend, RegistryBackend, TenantRegistry};
use atlas_core::tenant::Tenant;
use atlas_core::{Context, Error, MessageBuffer, Result, topic};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Registry namespace.
pub const NAMESPACE: &str = "buffs";
/// Registry namespace of the last poison tick per character.
pub const POISON_NAMESPACE: &str = "buffs-poison";
/// Time between two poison damage ticks of one character.
pub const POISON_TICK: Duration = Duration::seconds(1);

/// Buff registry over `backend`, keyed by character id.
#[must_use]
pub fn registry(backend: Arc<dyn RegistryBackend>) -> TenantRegistry<u32, Character> {
    TenantRegistry::builder(backend, NAMESPACE).build()
}

/// Last poison tick per character over `backend`.
#[must_use]
pub fn poison_registry(backend: Arc<dyn RegistryBackend>) -> TenantRegistry<u32, DateTime<Utc>> {
    TenantRegistry::builder(backend, POISON_NAMESPACE).build()
}

/// A character carrying an active poison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poisoned {
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Character
    pub character_id: u32,
    /// Damage per tick
    pub amount: i32,
}

/// Buff processor.
#[derive(Clone)]
pub struct BuffProcessor {
    characters: TenantRegistry<u32, Character>,
    poison_ticks: TenantRegistry<u32, DateTime<Utc>>,
    clock: Arc<dyn Clock>,
    status_topic: String,
    character_topic: String,
}

impl std::fmt::Debug for BuffProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuffProcessor")
            .field("characters", &self.characters)
            .field("status_topic", &self.status_topic)
            .finish_non_exhaustive()
    }
}

impl BuffProcessor {
    /// Processor over `characters`. Poison ticks stay in process memory
    /// until [`with_poison_ticks`](Self::with_poison_ticks) says otherwise.
    #[must_use]
    pub fn new(characters: TenantRegistry<u32, Character>, clock: Arc<dyn Clock>) -> Self {
        Self {
            characters,
            poison_ticks: poison_registry(Arc::new(MemoryBackend::new())),
            clock,
            status_topic: topic::resolve(EVENT_TOPIC_CHARACTER_BUFF_STATUS),
            character_topic: topic::resolve(COMMAND_TOPIC_CHARACTER),
        }
    }

    /// Keep poison ticks in `poison_ticks`.
    #[must_use]
    pub fn with_poison_ticks(mut self, poison_ticks: TenantRegistry<u32, DateTime<Utc>>) -> Self {
        self.poison_ticks = poison_ticks;
        self
    }

    /// Status topic.
    #[must_use]
    pub fn status_topic(&self) -> &str {
        &self.status_topic
    }

    /// Buffs of `character_id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the character was never buffed.
    pub async fn get(&self, ctx: &Context, character_id: u32) -> Result<Character> {
        self.characters.get(ctx, &character_id).await
    }

    /// Tenants with buffed characters.
    ///
    /// # Errors
    ///
    /// Registry failures.
    pub async fn tenants(&self) -> Result<Vec<Tenant>> {
        self.characters.tenants().await
    }

    /// Apply a buff to `character_id`, replacing any buff from the same
    /// source.
    ///
    /// Returns `None` without staging anything when the buff carries a
    /// disease and the character is immune.
    ///
    /// # Errors
    ///
    /// `INVALID_BUFF` validation, registry failures.
    pub async fn apply(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        world_id: u8,
        channel_id: u8,
        character_id: u32,
        request: ApplyBody,
    ) -> Result<Option<Buff>> {
        let now = self.clock.now();
        let buff = Buff::new(request.source_id, request.level, request.duration, request.changes, now)?;

        let mut blocked = false;
        let candidate = buff.clone();
        let character = self
            .characters
            .upsert(ctx, &character_id, |current| {
                let character = current
                    .unwrap_or_else(|| Character::new(world_id, channel_id, character_id))
                    .on_channel(channel_id);
                if candidate.is_disease() && character.is_immune(now) {
                    blocked = true;
                    return Ok(character);
                }
                Ok(character.apply(candidate))
            })
            .await?;

        if blocked {
            tracing::info!(character_id, source_id = buff.source_id(), "disease blocked by immunity");
            return Ok(None);
        }
        tracing::debug!(character_id, source_id = buff.source_id(), duration = buff.duration(), "buff applied");
        self.stage(buffer, &character, STATUS_APPLIED, AppliedBody::new(request.from_id, &buff));
        Ok(Some(buff))
    }

    /// Cancel the buff from `source_id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the character or the buff is absent.
    pub async fn cancel(&self, ctx: &Context, buffer: &mut MessageBuffer, character_id: u32, source_id: i32) -> Result<Buff> {
        let mut cancelled = None;
        let character = self
            .characters
            .try_update(ctx, &character_id, |mut c| {
                cancelled = c.cancel(source_id);
                if cancelled.is_some() {
                    Ok(c)
                } else {
                    Err(Error::not_found("buff", source_id))
                }
            })
            .await?;
        let buff = cancelled.ok_or_else(|| Error::not_found("buff", source_id))?;
        tracing::debug!(character_id, source_id, "buff cancelled");
        self.settle_poison(ctx, &character).await?;
        self.stage(buffer, &character, STATUS_EXPIRED, ExpiredBody::from(&buff));
        Ok(buff)
    }

    /// Cancel every buff of `character_id`. A character never buffed has
    /// nothing to cancel.
    ///
    /// # Errors
    ///
    /// Registry failures.
    pub async fn cancel_all(&self, ctx: &Context, buffer: &mut MessageBuffer, character_id: u32) -> Result<Vec<Buff>> {
        if self.characters.find(ctx, &character_id).await?.is_none() {
            return Ok(Vec::new());
        }
        let mut cancelled = Vec::new();
        let character = self
            .characters
            .try_update(ctx, &character_id, |mut c| {
                cancelled = c.cancel_all();
                Ok(c)
            })
            .await?;
        tracing::debug!(character_id, count = cancelled.len(), "buffs cancelled");
        self.settle_poison(ctx, &character).await?;
        for buff in &cancelled {
            self.stage(buffer, &character, STATUS_EXPIRED, ExpiredBody::from(buff));
        }
        Ok(cancelled)
    }

    /// Remove every expired buff of the caller's tenant and stage
    /// `BUFF_EXPIRED` for each. Returns how many expired.
    ///
    /// # Errors
    ///
    /// Registry failures.
    pub async fn expire(&self, ctx: &Context, buffer: &mut MessageBuffer) -> Result<usize> {
        let now = self.clock.now();
        let mut total = 0;
        for character in self.characters.get_all(ctx).await? {
            if !character.buffs().any(|b| b.is_expired(now)) {
                continue;
            }
            let mut expired = Vec::new();
            let character = self
                .characters
                .try_update(ctx, &character.character_id(), |mut c| {
                    expired = c.take_expired(now);
                    Ok(c)
                })
                .await?;
            for buff in &expired {
                self.stage(buffer, &character, STATUS_EXPIRED, ExpiredBody::from(buff));
            }
            self.settle_poison(ctx, &character).await?;
            total += expired.len();
        }
        Ok(total)
    }

    /// Characters of the caller's tenant with an active poison.
    ///
    /// # Errors
    ///
    /// Registry failures.
    pub async fn poisoned(&self, ctx: &Context) -> Result<Vec<Poisoned>> {
        let now = self.clock.now();
        Ok(self
            .characters
            .get_all(ctx)
            .await?
            .into_iter()
            .filter_map(|c| {
                c.poison(now).map(|amount| Poisoned {
                    world_id: c.world_id(),
                    channel_id: c.channel_id(),
                    character_id: c.character_id(),
                    amount,
                })
            })
            .collect())
    }

    /// When poison last damaged `character_id`.
    ///
    /// # Errors
    ///
    /// Registry failures.
    pub async fn last_poison_tick(&self, ctx: &Context, character_id: u32) -> Result<Option<DateTime<Utc>>> {
        self.poison_ticks.find(ctx, &character_id).await
    }

    /// Record a poison tick of `character_id` at `at`.
    ///
    /// # Errors
    ///
    /// Registry failures.
    pub async fn update_poison_tick(&self, ctx: &Context, character_id: u32, at: DateTime<Utc>) -> Result<()> {
        self.poison_ticks.put(ctx, &character_id, at).await?;
        Ok(())
    }

    /// Forget the poison tick of `character_id`.
    ///
    /// # Errors
    ///
    /// Registry failures.
    pub async fn clear_poison_tick(&self, ctx: &Context, character_id: u32) -> Result<()> {
        self.poison_ticks.remove(ctx, &character_id).await?;
        Ok(())
    }

    /// Stage one `CHANGE_HP` for every poisoned character whose last tick is
    /// at least [`POISON_TICK`] old. A newly poisoned character only starts
    /// its clock. Returns how many characters took damage.
    ///
    /// # Errors
    ///
    /// Registry failures.
    pub async fn tick_poison(&self, ctx: &Context, buffer: &mut MessageBuffer) -> Result<usize> {
        let now = self.clock.now();
        let mut damaged = 0;
        for poisoned in self.poisoned(ctx).await? {
            match self.last_poison_tick(ctx, poisoned.character_id).await? {
                None => {}
                Some(last) if now - last < POISON_TICK => continue,
                Some(_) => {
                    self.stage_poison_damage(buffer, &poisoned);
                    damaged += 1;
                }
            }
            self.update_poison_tick(ctx, poisoned.character_id, now).await?;
        }
        Ok(damaged)
    }

    /// [`tick_poison`](Self::tick_poison) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`tick_poison`](Self::tick_poison).
    pub async fn tick_poison_and_emit(&self, producer: &dyn Producer, ctx: &Context) -> Result<usize> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self.tick_poison(ctx, &mut buffer).await;
            (buffer, result)
        })
        .await
    }

    fn stage_poison_damage(&self, buffer: &mut MessageBuffer, poisoned: &Poisoned) {
        let amount = i16::try_from(poisoned.amount.saturating_abs()).unwrap_or(i16::MAX);
        tracing::debug!(character_id = poisoned.character_id, amount, "poison damage");
        buffer.put_json(
            self.character_topic.clone(),
            poisoned.character_id,
            CharacterCommand {
                transaction_id: Uuid::new_v4(),
                world_id: poisoned.world_id,
                character_id: poisoned.character_id,
                kind: CHARACTER_COMMAND_CHANGE_HP.to_string(),
                body: ChangeHpBody {
                    channel_id: poisoned.channel_id,
                    amount: -amount,
                },
            },
        );
    }

    async fn settle_poison(&self, ctx: &Context, character: &Character) -> Result<()> {
        if character.poison(self.clock.now()).is_none() {
            self.clear_poison_tick(ctx, character.character_id()).await?;
        }
        Ok(())
    }

    /// [`apply`](Self::apply) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`apply`](Self::apply).
    pub async fn apply_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        world_id: u8,
        channel_id: u8,
        character_id: u32,
        request: ApplyBody,
    ) -> Result<Option<Buff>> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self
                .apply(ctx, &mut buffer, world_id, channel_id, character_id, request)
                .await;
            (buffer, result)
        })
        .await
    }

    /// [`cancel`](Self::cancel) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`cancel`](Self::cancel).
    pub async fn cancel_and_emit(&self, producer: &dyn Producer, ctx: &Context, character_id: u32, source_id: i32) -> Result<Buff> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self.cancel(ctx, &mut buffer, character_id, source_id).await;
            (buffer, result)
        })
        .await
    }

    /// [`cancel_all`](Self::cancel_all) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`cancel_all`](Self::cancel_all).
    pub async fn cancel_all_and_emit(&self, producer: &dyn Producer, ctx: &Context, character_id: u32) -> Result<Vec<Buff>> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self.cancel_all(ctx, &mut buffer, character_id).await;
            (buffer, result)
        })
        .await
    }

    /// [`expire`](Self::expire) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`expire`](Self::expire).
    pub async fn expire_and_emit(&self, producer: &dyn Producer, ctx: &Context) -> Result<usize> {
        emit(producer, ctx, |mut buffer| async move {
            let result = self.expire(ctx, &mut buffer).await;
            (buffer, result)
        })
        .await
    }

    fn stage<B>(&self, buffer: &mut MessageBuffer, character: &Character, kind: &str, body: B)
    where
        B: Serialize + Send + Sync + 'static,
    {
        buffer.put_json(
            self.status_topic.clone(),
            character.character_id(),
            StatusEvent {
                world_id: character.world_id(),
                channel_id: character.channel_id(),
                character_id: character.character_id(),
                kind: kind.to_string(),
                body,
            },
        );
    }
}
