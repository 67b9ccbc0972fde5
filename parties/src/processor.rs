//! Party operations.

use crate::events::{
    ChangeLeaderBody, CreatedBody, DisbandedBody, ErrorBody, EVENT_TOPIC_PARTY_STATUS, MemberBody,
    STATUS_CHANGE_LEADER, STATUS_CREATED, STATUS_DISBANDED, STATUS_ERROR, STATUS_EXPEL,
    STATUS_JOINED, STATUS_LEFT, StatusEvent, error_code,
};
use crate::model::{ID_BASE, Party};
use atlas_core::emit::settle;
use atlas_core::producer::Producer;
use atlas_core::registry::{RegistryBackend, TenantRegistry};
use atlas_core::{Context, Error, MessageBuffer, Result, topic};
use serde::Serialize;
use std::sync::Arc;

/// Registry namespace.
pub const NAMESPACE: &str = "party";
/// Secondary index from character id to party id.
pub const CHARACTER_INDEX: &str = "character";

/// Party registry over `backend`.
#[must_use]
pub fn registry(backend: Arc<dyn RegistryBackend>) -> TenantRegistry<u32, Party> {
    TenantRegistry::builder(backend, NAMESPACE)
        .id_base(ID_BASE)
        .index(CHARACTER_INDEX, |p: &Party| {
            p.members().iter().map(u32::to_string).collect()
        })
        .invariant(Party::check)
        .build()
}

/// Party processor.
///
/// Each operation validates, mutates the registry and stages status events
/// on the caller's buffer. The `*_and_emit` variants run one operation as a
/// unit of work and report named failures to the actor with an `ERROR`
/// event.
#[derive(Debug, Clone)]
pub struct PartyProcessor {
    parties: TenantRegistry<u32, Party>,
    status_topic: String,
}

impl PartyProcessor {
    /// Processor over `parties`, producing to the configured status topic.
    #[must_use]
    pub fn new(parties: TenantRegistry<u32, Party>) -> Self {
        Self {
            parties,
            status_topic: topic::resolve(EVENT_TOPIC_PARTY_STATUS),
        }
    }

    /// Status topic.
    #[must_use]
    pub fn status_topic(&self) -> &str {
        &self.status_topic
    }

    /// Party by id.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`].
    pub async fn get_by_id(&self, ctx: &Context, party_id: u32) -> Result<Party> {
        self.parties.get(ctx, &party_id).await
    }

    /// Party `character_id` belongs to.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the character is in no party.
    pub async fn get_by_member(&self, ctx: &Context, character_id: u32) -> Result<Party> {
        let party_id = self
            .parties
            .lookup(ctx, CHARACTER_INDEX, character_id)
            .await?;
        self.parties.get(ctx, &party_id).await
    }

    /// Every party of the caller's tenant.
    ///
    /// # Errors
    ///
    /// Registry failures.
    pub async fn get_all(&self, ctx: &Context) -> Result<Vec<Party>> {
        self.parties.get_all(ctx).await
    }

    /// Form a party led by `leader_id`.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyIn`] when the leader is already in a party.
    pub async fn create(&self, ctx: &Context, buffer: &mut MessageBuffer, world_id: u8, leader_id: u32) -> Result<Party> {
        self.ensure_unaffiliated(ctx, leader_id).await?;
        let party = self
            .parties
            .create(ctx, |id| Party::new(id, world_id, leader_id))
            .await?;
        tracing::info!(party_id = party.id(), leader_id, "party created");
        self.stage(buffer, leader_id, &party, STATUS_CREATED, CreatedBody {});
        Ok(party)
    }

    /// Add `character_id` to `party_id`.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyIn`], [`Error::NotFound`] or [`Error::AtCapacity`].
    pub async fn join(&self, ctx: &Context, buffer: &mut MessageBuffer, party_id: u32, character_id: u32) -> Result<Party> {
        self.ensure_unaffiliated(ctx, character_id).await?;
        let party = self
            .parties
            .try_update(ctx, &party_id, move |p| Ok(p.add_member(character_id)))
            .await?;
        tracing::info!(party_id, character_id, "character joined party");
        self.stage(buffer, character_id, &party, STATUS_JOINED, MemberBody { character_id });
        Ok(party)
    }

    /// Remove `character_id` from `party_id`. A leaving leader disbands the
    /// party.
    ///
    /// Returns the party as it stands after the operation, or as it stood
    /// before disbanding.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] or [`Error::NotIn`].
    pub async fn leave(&self, ctx: &Context, buffer: &mut MessageBuffer, party_id: u32, character_id: u32) -> Result<Party> {
        let party = self.parties.get(ctx, &party_id).await?;
        if !party.contains(character_id) {
            return Err(Error::not_in(NAMESPACE, party_id, character_id));
        }
        if party.is_leader(character_id) {
            return self.disband(ctx, buffer, party, character_id).await;
        }

        let party = self
            .parties
            .try_update(ctx, &party_id, move |p| {
                if p.contains(character_id) {
                    Ok(p.remove_member(character_id))
                } else {
                    Err(Error::not_in(NAMESPACE, party_id, character_id))
                }
            })
            .await?;
        tracing::info!(party_id, character_id, "character left party");
        self.stage(buffer, character_id, &party, STATUS_LEFT, MemberBody { character_id });
        Ok(party)
    }

    /// Leader `actor_id` removes `character_id`. Expelling oneself is a
    /// leave.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], [`Error::NotIn`] or `NOT_LEADER` validation.
    pub async fn expel(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        party_id: u32,
        actor_id: u32,
        character_id: u32,
    ) -> Result<Party> {
        let party = self.parties.get(ctx, &party_id).await?;
        Self::ensure_leader(&party, actor_id)?;
        if actor_id == character_id {
            return self.leave(ctx, buffer, party_id, character_id).await;
        }
        if !party.contains(character_id) {
            return Err(Error::not_in(NAMESPACE, party_id, character_id));
        }

        let party = self
            .parties
            .try_update(ctx, &party_id, move |p| Ok(p.remove_member(character_id)))
            .await?;
        tracing::info!(party_id, actor_id, character_id, "character expelled from party");
        self.stage(buffer, actor_id, &party, STATUS_EXPEL, MemberBody { character_id });
        Ok(party)
    }

    /// Leader `actor_id` hands leadership to member `character_id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`], [`Error::NotIn`] or `NOT_LEADER` validation.
    pub async fn change_leader(
        &self,
        ctx: &Context,
        buffer: &mut MessageBuffer,
        party_id: u32,
        actor_id: u32,
        character_id: u32,
    ) -> Result<Party> {
        let party = self
            .parties
            .try_update(ctx, &party_id, move |p| {
                Self::ensure_leader(&p, actor_id)?;
                if !p.contains(character_id) {
                    return Err(Error::not_in(NAMESPACE, party_id, character_id));
                }
                Ok(p.set_leader(character_id))
            })
            .await?;
        tracing::info!(party_id, actor_id, character_id, "party leader changed");
        self.stage(buffer, actor_id, &party, STATUS_CHANGE_LEADER, ChangeLeaderBody { character_id });
        Ok(party)
    }

    /// [`create`](Self::create) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`create`](Self::create).
    pub async fn create_and_emit(&self, producer: &dyn Producer, ctx: &Context, world_id: u8, leader_id: u32) -> Result<Party> {
        let mut buffer = MessageBuffer::new();
        let outcome = self.create(ctx, &mut buffer, world_id, leader_id).await;
        settle(producer, ctx, buffer, outcome, |err| self.report(leader_id, 0, leader_id, err)).await
    }

    /// [`join`](Self::join) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`join`](Self::join).
    pub async fn join_and_emit(&self, producer: &dyn Producer, ctx: &Context, party_id: u32, character_id: u32) -> Result<Party> {
        let mut buffer = MessageBuffer::new();
        let outcome = self.join(ctx, &mut buffer, party_id, character_id).await;
        settle(producer, ctx, buffer, outcome, |err| {
            self.report(character_id, party_id, character_id, err)
        })
        .await
    }

    /// [`leave`](Self::leave) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`leave`](Self::leave).
    pub async fn leave_and_emit(&self, producer: &dyn Producer, ctx: &Context, party_id: u32, character_id: u32) -> Result<Party> {
        let mut buffer = MessageBuffer::new();
        let outcome = self.leave(ctx, &mut buffer, party_id, character_id).await;
        settle(producer, ctx, buffer, outcome, |err| {
            self.report(character_id, party_id, character_id, err)
        })
        .await
    }

    /// [`expel`](Self::expel) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`expel`](Self::expel).
    pub async fn expel_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        party_id: u32,
        actor_id: u32,
        character_id: u32,
    ) -> Result<Party> {
        let mut buffer = MessageBuffer::new();
        let outcome = self.expel(ctx, &mut buffer, party_id, actor_id, character_id).await;
        settle(producer, ctx, buffer, outcome, |err| {
            self.report(actor_id, party_id, character_id, err)
        })
        .await
    }

    /// [`change_leader`](Self::change_leader) as a unit of work.
    ///
    /// # Errors
    ///
    /// See [`change_leader`](Self::change_leader).
    pub async fn change_leader_and_emit(
        &self,
        producer: &dyn Producer,
        ctx: &Context,
        party_id: u32,
        actor_id: u32,
        character_id: u32,
    ) -> Result<Party> {
        let mut buffer = MessageBuffer::new();
        let outcome = self
            .change_leader(ctx, &mut buffer, party_id, actor_id, character_id)
            .await;
        settle(producer, ctx, buffer, outcome, |err| {
            self.report(actor_id, party_id, character_id, err)
        })
        .await
    }

    async fn disband(&self, ctx: &Context, buffer: &mut MessageBuffer, party: Party, actor_id: u32) -> Result<Party> {
        let party = self.parties.remove(ctx, &party.id()).await?.unwrap_or(party);
        tracing::info!(party_id = party.id(), actor_id, members = party.members().len(), "party disbanded");
        self.stage(
            buffer,
            actor_id,
            &party,
            STATUS_DISBANDED,
            DisbandedBody {
                members: party.members().to_vec(),
            },
        );
        Ok(party)
    }

    async fn ensure_unaffiliated(&self, ctx: &Context, character_id: u32) -> Result<()> {
        let current = self
            .parties
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

    fn ensure_leader(party: &Party, actor_id: u32) -> Result<()> {
        if party.is_leader(actor_id) {
            Ok(())
        } else {
            Err(Error::validation(
                "NOT_LEADER",
                format!("character {actor_id} does not lead party {}", party.id()),
            ))
        }
    }

    fn stage<B>(&self, buffer: &mut MessageBuffer, actor_id: u32, party: &Party, kind: &str, body: B)
    where
        B: Serialize + Send + Sync + 'static,
    {
        buffer.put_json(
            self.status_topic.clone(),
            actor_id,
            StatusEvent {
                actor_id,
                world_id: Some(party.world_id()),
                party_id: party.id(),
                kind: kind.to_string(),
                body,
            },
        );
    }

    fn report(&self, actor_id: u32, party_id: u32, character_id: u32, err: &Error) -> Option<MessageBuffer> {
        let code = error_code(err);
        tracing::warn!(actor_id, party_id, error = %err, code, "party operation failed");
        let mut report = MessageBuffer::new();
        report.put_json(
            self.status_topic.clone(),
            actor_id,
            StatusEvent {
                actor_id,
                world_id: None,
                party_id,
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
