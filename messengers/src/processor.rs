//! Messenger operations.

use crate::events::{
    COMMAND_TOPIC_INVITE, CreatedBody, ErrorBody, EVENT_TOPIC_MESSENGER_STATUS,
    INVITE_TYPE_MESSENGER, InviteBody, InviteCommand, Operation, STATUS_CREATED, STATUS_ERROR,
    STATUS_JOINED, STATUS_LEFT, SlotBody, StatusEvent, error_code,
};
use crate::model::{CAPACITY, ID_BASE, Messenger};
use atlas_core::emit::settle;
use atlas_core::producer::Producer;
use atlas_core::registry::{RegistryBackend, TenantRegistry};
use atlas_core::{Context, Error, MessageBuffer, Result, topic};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Registry namespace.
pub const NAMESPACE: &str = "messenger";
/// Secondary index from character id to messenger id.
pub const CHARACTER_INDEX: &str = "character";

/// Messenger registry over `backend`.
#[must_use]
pub fn registry(backend: Arc<dyn RegistryBackend>) -> TenantRegistry<u32, Messenger> {
    TenantRegistry::builder(backend, NAMESPACE)
        .id_base(ID_BASE)
        .index(CHARACTER_INDEX, |m: &Messenger| {
            m.members().iter().map(|member| member.id.to_string()).collect()
        })
        .invariant(Messenger::check)
        .build()
}

/// Messenger processor.
#[derive(Debug, Clone)]
pub struct MessengerProcessor {
    messengers: TenantRegistry<u32, Messenger>,
    status_topic: String,
    invite_topic: String,
}

impl MessengerProcessor {
    /// Processor over `messengers`.
    #[must_use]
    pub fn new(messengers: TenantRegistry<u32, Messenger>) -> Self {
        Self {
            messengers,
            status_topic: topic::resolve(EVENT_TOPIC_MESSENGER_STATUS),
            invite_topic: topic::resolve(COMMAND_TOPIC_INVITE),
        }
    }

    /// Status topic.
    #[must_use]
    pub fn status_topic(&self) -> &str {
        &self.status_topic
    }

    /// Invite command topic.
    #[must_use]
    pub fn invite_topic(&self) -> &str {
        &self.invite_topic
    }

    /// Messenger by id.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`].
    pub async fn get_by_id(&self, ctx: &Context, messenger_id: u32) -> Result<Messenger> {
        self.messengers.get(ctx, &messenger_id).await
    }

    /// Messenger `character_id` sits in.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the character is in none.
    pub async fn get_by_member(&self, ctx: &Context, character_id: u32) -> Result<Messenger> {
        let id = self
            .messengers
            .lookup(ctx, CHARACTER_INDEX, character_id)
            .await?;
        self.messengers.get(ctx, &id).await
    }

    /// Every messenger of the caller's tenant.
    ///
    /// # Errors
    ///
    /// Registry failures.
    pub async fn get_all(&self, ctx: &Context) -> Result<Vec<Messenger>> {
        self.messengers.get_all(ctx).await
    }

    /// Open a messenger with `character_id` in slot 0.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyIn`] when the character already sits in one.
    pub async fn create(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        transaction_id: Uuid,
        world_id: u8,
        character_id: u32,
    ) -> Result<Messenger> {
        self.ensure_unaffiliated(ctx, character_id).await?;
        let messenger = self
            .messengers
            .create(ctx, |id| Messenger::new(id, world_id, character_id))
            .await?;
        tracing::info!(messenger_id = messenger.id(), character_id, "messenger created");
        self.stage(buffer, transaction_id, character_id, &messenger, STATUS_CREATED, CreatedBody {});
        Ok(messenger)
    }

    /// Seat `character_id` in the lowest free slot of `messenger_id`.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyIn`], [`Error::NotFound`] or [`Error::AtCapacity`].
    /// The registry is untouched on failure.
    pub async fn join(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        transaction_id: Uuid,
        messenger_id: u32,
        character_id: u32,
    ) -> Result<Messenger> {
        self.ensure_unaffiliated(ctx, character_id).await?;
        let messenger = self
            .messengers
            .try_update(ctx, &messenger_id, move |m| m.add_member(character_id))
            .await?;
        let slot = messenger
            .member(character_id)
            .map(|m| m.slot)
            .ok_or_else(|| Error::not_in(NAMESPACE, messenger_id, character_id))?;
        tracing::info!(messenger_id, character_id, slot, "character joined messenger");
        self.stage(buffer, transaction_id, character_id, &messenger, STATUS_JOINED, SlotBody { slot });
        Ok(messenger)
    }

    /// Remove `character_id` from `messenger_id`, deleting the messenger when
    /// it empties.
    ///
    /// Returns the messenger as it stands afterwards.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] or [`Error::NotIn`].
    pub async fn leave(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        transaction_id: Uuid,
        messenger_id: u32,
        character_id: u32,
    ) -> Result<Messenger> {
        let before = self.messengers.get(ctx, &messenger_id).await?;
        let member = before
            .member(character_id)
            .ok_or_else(|| Error::not_in(NAMESPACE, messenger_id, character_id))?;

        let messenger = self
            .messengers
            .try_update(ctx, &messenger_id, move |m| {
                if m.contains(character_id) {
                    Ok(m.remove_member(character_id))
                } else {
                    Err(Error::not_in(NAMESPACE, messenger_id, character_id))
                }
            })
            .await?;
        if messenger.is_empty() {
            self.messengers.remove(ctx, &messenger_id).await?;
            tracing::info!(messenger_id, "messenger closed");
        }
        tracing::info!(messenger_id, character_id, slot = member.slot, "character left messenger");
        self.stage(
            buffer,
            transaction_id,
            character_id,
            &messenger,
            STATUS_LEFT,
            SlotBody { slot: member.slot },
        );
        Ok(messenger)
    }

    /// `actor_id` invites `character_id`, opening a messenger for the actor
    /// first when it has none.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyIn`] when the target already sits in a messenger,
    /// [`Error::AtCapacity`] when the actor's messenger is full.
    pub async fn request_invite(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        transaction_id: Uuid,
        world_id: u8,
        actor_id: u32,
        character_id: u32,
    ) -> Result<Messenger> {
        self.ensure_unaffiliated(ctx, character_id).await?;
        let existing = self
            .messengers
            .lookup_all(ctx, CHARACTER_INDEX, actor_id)
            .await?;
        let messenger = match existing.first() {
            Some(id) => self.messengers.get(ctx, id).await?,
            None => self.create(ctx, buffer, transaction_id, world_id, actor_id).await?,
        };
        if messenger.is_full() {
            return Err(Error::at_capacity(NAMESPACE, messenger.id(), CAPACITY));
        }

        tracing::info!(messenger_id = messenger.id(), actor_id, character_id, "messenger invite requested");
        buffer.put_json(
            self.invite_topic.clone(),
            character_id,
            InviteCommand {
                transaction_id,
                world_id: messenger.world_id(),
                invite_type: INVITE_TYPE_MESSENGER.to_string(),
                kind: "CREATE".to_string(),
                body: InviteBody {
                    originator_id: actor_id,
                    target_id: character_id,
                    reference_id: messenger.id(),
                },
            },
        );
        Ok(messenger)
    }

    /// [`create`](Self::create) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`create`](Self::create).
    pub async fn create_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        transaction_id: Uuid,
        world_id: u8,
        character_id: u32,
    ) -> Result<Messenger> {
        let mut buffer = MessageBuffer::new();
        let outcome = self
            .create(ctx, &mut buffer, transaction_id, world_id, character_id)
            .await;
        settle(producer, ctx, buffer, outcome, |err| {
            self.report(Operation::Create, transaction_id, world_id, character_id, 0, character_id, err)
        })
        .await
    }

    /// [`join`](Self::join) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`join`](Self::join).
    pub async fn join_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        transaction_id: Uuid,
        world_id: u8,
        messenger_id: u32,
        character_id: u32,
    ) -> Result<Messenger> {
        let mut buffer = MessageBuffer::new();
        let outcome = self
            .join(ctx, &mut buffer, transaction_id, messenger_id, character_id)
            .await;
        settle(producer, ctx, buffer, outcome, |err| {
            self.report(Operation::Join, transaction_id, world_id, character_id, messenger_id, character_id, err)
        })
        .await
    }

    /// [`leave`](Self::leave) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`leave`](Self::leave).
    pub async fn leave_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        transaction_id: Uuid,
        world_id: u8,
        messenger_id: u32,
        character_id: u32,
    ) -> Result<Messenger> {
        let mut buffer = MessageBuffer::new();
        let outcome = self
            .leave(ctx, &mut buffer, transaction_id, messenger_id, character_id)
            .await;
        settle(producer, ctx, buffer, outcome, |err| {
            self.report(Operation::Leave, transaction_id, world_id, character_id, messenger_id, character_id, err)
        })
        .await
    }

    /// [`request_invite`](Self::request_invite) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`request_invite`](Self::request_invite).
    pub async fn request_invite_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        transaction_id: Uuid,
        world_id: u8,
        actor_id: u32,
        character_id: u32,
    ) -> Result<Messenger> {
        let mut buffer = MessageBuffer::new();
        let outcome = self
            .request_invite(ctx, &mut buffer, transaction_id, world_id, actor_id, character_id)
            .await;
        settle(producer, ctx, buffer, outcome, |err| {
            self.report(Operation::Join, transaction_id, world_id, actor_id, 0, character_id, err)
        })
        .await
    }

    async fn ensure_unaffiliated(&self, ctx: &Context, character_id: u32) -> Result<()> {
        let current = self
            .messengers
            .lookup_all(ctx, CHARACTER_INDEX, character_id)
            .await?;
        if current.is_empty() {
            Ok(())
        } else {
            Err(Error::AlreadyIn {
                entity: NAMESPACE,
                member: character_id,
            })
        }
    }

    fn stage<B>(
        &self,
        buffer: &mut MessageBuffer,
        transaction_id: Uuid,
        actor_id: u32,
        messenger: &Messenger,
        kind: &str,
        body: B,
    ) where
        B: Serialize + Send + Sync + 'static,
    {
        buffer.put_json(
            self.status_topic.clone(),
            actor_id,
            StatusEvent {
                transaction_id,
                actor_id,
                messenger_id: messenger.id(),
                world_id: messenger.world_id(),
                kind: kind.to_string(),
                body,
            },
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &self,
        operation: Operation,
        transaction_id: Uuid,
        world_id: u8,
        actor_id: u32,
        messenger_id: u32,
        character_id: u32,
        err: &Error,
    ) -> Option<MessageBuffer> {
        let code = error_code(operation, err);
        tracing::warn!(actor_id, messenger_id, error = %err, code, "messenger operation failed");
        let mut report = MessageBuffer::new();
        report.put_json(
            self.status_topic.clone(),
            actor_id,
            StatusEvent {
                transaction_id,
                actor_id,
                messenger_id,
                world_id,
                kind: STATUS_ERROR.to_string(),
                body: ErrorBody {
                    error: code.to_string(),
                    character_id,
                },
            },
        );
        Some(report)
    }
}
