//! Saga and step model.

use crate::SagaError;
use crate::action::StepPayload;
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Business flow a saga implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaType {
    /// Item grants and removals
    InventoryTransaction,
    /// Quest completion rewards
    QuestReward,
    /// Player-to-player trade
    TradeTransaction,
    /// New character setup
    CharacterCreation,
    /// Account storage deposit or withdrawal
    StorageOperation,
    /// Cash shop purchase
    CashShopOperation,
    /// Respawn after death
    CharacterRespawn,
    /// Gachapon draw
    GachaponTransaction,
    /// Field effect item use
    FieldEffectUse,
    /// Quest start actions
    QuestStart,
    /// Quest completion actions
    QuestComplete,
    /// Re-granting a lost quest item
    QuestRestoreItem,
}

impl fmt::Display for SagaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = serde_json::to_value(self).map_err(|_| fmt::Error)?;
        f.write_str(raw.as_str().unwrap_or_default())
    }
}

/// Step status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Not yet acknowledged
    Pending,
    /// Done
    Completed,
    /// Failed; triggers compensation
    Failed,
}

impl Status {
    /// Whether a step may move from `self` to `next`.
    ///
    /// `completed -> failed` covers compensation of an already-applied step
    /// and `failed -> pending` covers retries.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed | Self::Failed)
                | (Self::Completed, Self::Failed)
                | (Self::Failed, Self::Pending)
        )
    }
}

/// One step of a saga.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Identifier unique within the saga
    pub step_id: String,
    /// Progress
    pub status: Status,
    /// Action and its typed payload
    pub payload: StepPayload,
    /// When the step was added
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Step {
    /// A pending step.
    #[must_use]
    pub fn pending(step_id: impl Into<String>, payload: StepPayload, now: DateTime<Utc>) -> Self {
        Self {
            step_id: step_id.into(),
            status: Status::Pending,
            payload,
            created_at: now,
            updated_at: now,
        }
    }

    /// The action tag.
    #[must_use]
    pub const fn action(&self) -> &'static str {
        self.payload.action()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStep {
    step_id: String,
    status: Status,
    action: String,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (action, payload) = self.payload.encode().map_err(serde::ser::Error::custom)?;
        WireStep {
            step_id: self.step_id.clone(),
            status: self.status,
            action: action.to_string(),
            payload,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireStep::deserialize(deserializer)?;
        let payload = StepPayload::decode(&wire.action, wire.payload).map_err(|e| {
            D::Error::custom(format!("step {} action {}: {e}", wire.step_id, wire.action))
        })?;
        Ok(Self {
            step_id: wire.step_id,
            status: wire.status,
            payload,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
        })
    }
}

/// A multi-step distributed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Saga {
    /// Transaction id
    pub transaction_id: Uuid,
    /// Flow kind
    pub saga_type: SagaType,
    /// Initiating service or actor
    pub initiated_by: String,
    /// Ordered steps
    pub steps: Vec<Step>,
}

impl Saga {
    /// Decode a saga from JSON.
    ///
    /// # Errors
    ///
    /// [`SagaError::Decode`] for malformed JSON or an unknown action; one bad
    /// step rejects the whole saga.
    pub fn from_json(bytes: &[u8]) -> Result<Self, SagaError> {
        serde_json::from_slice(bytes).map_err(|e| SagaError::Decode(e.to_string()))
    }

    /// Whether any step failed.
    #[must_use]
    pub fn failing(&self) -> bool {
        self.failed_index().is_some()
    }

    /// First pending step.
    #[must_use]
    pub fn current_step(&self) -> Option<&Step> {
        self.earliest_pending_index().map(|i| &self.steps[i])
    }

    /// Whether every step completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.status == Status::Completed)
    }

    /// Index of the last completed step.
    #[must_use]
    pub fn furthest_completed_index(&self) -> Option<usize> {
        self.steps.iter().rposition(|s| s.status == Status::Completed)
    }

    /// Index of the first pending step.
    #[must_use]
    pub fn earliest_pending_index(&self) -> Option<usize> {
        self.steps.iter().position(|s| s.status == Status::Pending)
    }

    /// Index of the failed step.
    #[must_use]
    pub fn failed_index(&self) -> Option<usize> {
        self.steps.iter().position(|s| s.status == Status::Failed)
    }

    /// Index of the step named `step_id`.
    #[must_use]
    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.step_id == step_id)
    }

    /// Move step `index` to `status`.
    ///
    /// # Errors
    ///
    /// [`SagaError::InvalidIndex`] or [`SagaError::InvalidTransition`]; the
    /// saga is unchanged on error.
    pub fn set_step_status(&mut self, index: usize, status: Status, now: DateTime<Utc>) -> Result<(), SagaError> {
        let len = self.steps.len();
        let step = self
            .steps
            .get_mut(index)
            .ok_or(SagaError::InvalidIndex { index, len })?;
        if !step.status.can_transition_to(status) {
            return Err(SagaError::InvalidTransition {
                step: step.step_id.clone(),
                from: step.status,
                to: status,
            });
        }
        step.status = status;
        step.updated_at = now;
        Ok(())
    }

    /// Whether completed steps form a prefix (no completed step after a
    /// pending one).
    #[must_use]
    pub fn validate_ordering(&self) -> bool {
        let mut seen_pending = false;
        for step in &self.steps {
            match step.status {
                Status::Pending => seen_pending = true,
                Status::Completed if seen_pending => return false,
                _ => {}
            }
        }
        true
    }

    /// Check ordering, step id uniqueness and the single-failure rule.
    ///
    /// # Errors
    ///
    /// The first violated rule.
    pub fn validate_consistency(&self) -> Result<(), SagaError> {
        if !self.validate_ordering() {
            return Err(SagaError::InvalidOrdering(self.transaction_id));
        }
        let mut ids = HashSet::new();
        for step in &self.steps {
            if !ids.insert(step.step_id.as_str()) {
                return Err(SagaError::DuplicateStep(step.step_id.clone()));
            }
        }
        let failed = self
            .steps
            .iter()
            .filter(|s| s.status == Status::Failed)
            .count();
        if failed > 1 {
            return Err(SagaError::MultipleFailures(failed));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::action::{AwardFamePayload, PortalBlockPayload};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn block(id: &str) -> Step {
        Step::pending(
            id,
            StepPayload::BlockPortal(PortalBlockPayload {
                character_id: 1,
                map_id: 100_000_000,
                portal_id: 3,
            }),
            now(),
        )
    }

    fn saga(steps: Vec<Step>) -> Saga {
        Saga {
            transaction_id: Uuid::new_v4(),
            saga_type: SagaType::QuestReward,
            initiated_by: "npc-conversation".into(),
            steps,
        }
    }

    #[test]
    fn transitions() {
        assert!(Status::Pending.can_transition_to(Status::Completed));
        assert!(Status::Completed.can_transition_to(Status::Failed));
        assert!(Status::Failed.can_transition_to(Status::Pending));
        assert!(!Status::Completed.can_transition_to(Status::Pending));
        assert!(!Status::Pending.can_transition_to(Status::Pending));
    }

    #[test]
    fn invalid_transition_leaves_saga_unchanged() {
        let mut s = saga(vec![block("a")]);
        s.set_step_status(0, Status::Completed, now()).unwrap();
        let before = s.clone();

        let err = s.set_step_status(0, Status::Pending, now()).unwrap_err();
        assert!(matches!(err, SagaError::InvalidTransition { .. }));
        assert_eq!(s, before);
        assert!(matches!(
            s.set_step_status(3, Status::Completed, now()),
            Err(SagaError::InvalidIndex { index: 3, len: 1 })
        ));
    }

    #[test]
    fn indices_track_progress() {
        let mut s = saga(vec![block("a"), block("b"), block("c")]);
        assert_eq!(s.earliest_pending_index(), Some(0));
        assert_eq!(s.furthest_completed_index(), None);

        s.set_step_status(0, Status::Completed, now()).unwrap();
        s.set_step_status(1, Status::Failed, now()).unwrap();
        assert_eq!(s.current_step().unwrap().step_id, "c");
        assert_eq!(s.furthest_completed_index(), Some(0));
        assert_eq!(s.failed_index(), Some(1));
        assert!(s.failing());
        assert!(!s.is_complete());
    }

    #[test]
    fn completed_after_pending_is_out_of_order() {
        let mut s = saga(vec![block("a"), block("b")]);
        s.steps[1].status = Status::Completed;
        assert!(!s.validate_ordering());
        assert!(matches!(s.validate_consistency(), Err(SagaError::InvalidOrdering(_))));
    }

    #[test]
    fn consistency_rejects_duplicates_and_double_failure() {
        let s = saga(vec![block("a"), block("a")]);
        assert!(matches!(s.validate_consistency(), Err(SagaError::DuplicateStep(id)) if id == "a"));

        let mut s = saga(vec![block("a"), block("b")]);
        s.steps[0].status = Status::Failed;
        s.steps[1].status = Status::Failed;
        assert!(matches!(s.validate_consistency(), Err(SagaError::MultipleFailures(2))));
    }

    #[test]
    fn wire_format_is_tagged_by_action() {
        let s = saga(vec![Step::pending(
            "fame",
            StepPayload::AwardFame(AwardFamePayload {
                character_id: 7,
                world_id: 0,
                channel_id: 1,
                actor_id: None,
                actor_type: None,
                amount: 1,
            }),
            now(),
        )]);

        let value = serde_json::to_value(&s).unwrap();
        assert_eq!(value["sagaType"], "quest_reward");
        assert_eq!(value["steps"][0]["stepId"], "fame");
        assert_eq!(value["steps"][0]["action"], "award_fame");
        assert_eq!(value["steps"][0]["payload"]["characterId"], 7);
        assert!(value["steps"][0]["payload"].get("actorId").is_none());

        let back: Saga = serde_json::from_value(value).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn unknown_action_rejects_whole_saga() {
        let raw = json!({
            "transactionId": Uuid::new_v4(),
            "sagaType": "inventory_transaction",
            "initiatedBy": "test",
            "steps": [{
                "stepId": "x",
                "status": "pending",
                "action": "teleport_everyone",
                "payload": {},
                "createdAt": now(),
                "updatedAt": now()
            }]
        });
        let err = Saga::from_json(raw.to_string().as_bytes()).unwrap_err();
        assert!(err.to_string().contains("teleport_everyone"));
    }

    #[test]
    fn saga_type_displays_wire_name() {
        assert_eq!(SagaType::CashShopOperation.to_string(), "cash_shop_operation");
    }
}
