//! # Atlas Saga
//!
//! Client side of the saga orchestrator: the saga model, its typed action
//! catalog, compensation planning, submission and an in-flight ledger.
//!
//! A saga is an ordered list of steps, each carrying one action from the
//! catalog. Steps complete strictly in order; when one fails the completed
//! steps before it are undone in reverse through their inverse actions.
//!
//! ## Example
//!
//! ```ignore
//! use atlas_saga::{Saga, SagaSubmitter, SagaType, StepPayload};
//!
//! let saga = Saga::builder()
//!     .saga_type(SagaType::QuestReward)
//!     .initiated_by("quest-service")
//!     .add_step("mesos", StepPayload::AwardMesos(mesos))
//!     .build()?;
//!
//! SagaSubmitter::new()
//!     .submit_and_emit(&*producer, &ctx, character_id, saga)
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod builder;
pub mod compensation;
pub mod ledger;
pub mod model;
pub mod submitter;

pub use action::{ACTIONS, StepPayload};
pub use builder::SagaBuilder;
pub use compensation::{Compensation, Plan};
pub use ledger::{Directive, SagaLedger, saga_key};
pub use model::{Saga, SagaType, Status, Step};
pub use submitter::SagaSubmitter;

use thiserror::Error;

/// Saga model errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SagaError {
    /// Step index out of range.
    #[error("step index {index} out of range ({len} steps)")]
    InvalidIndex {
        /// Requested index
        index: usize,
        /// Number of steps
        len: usize,
    },

    /// Disallowed status change.
    #[error("step {step} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// Step id
        step: String,
        /// Current status
        from: Status,
        /// Requested status
        to: Status,
    },

    /// A completed step follows a pending one.
    #[error("saga {0} has a completed step after a pending one")]
    InvalidOrdering(uuid::Uuid),

    /// Two steps share an id.
    #[error("duplicate step id {0}")]
    DuplicateStep(String),

    /// More than one step failed.
    #[error("{0} failed steps, at most one allowed")]
    MultipleFailures(usize),

    /// Builder field not set.
    #[error("missing {0}")]
    MissingField(&'static str),

    /// Malformed JSON or unknown action.
    #[error("decode: {0}")]
    Decode(String),
}

impl From<SagaError> for atlas_core::Error {
    fn from(err: SagaError) -> Self {
        match err {
            SagaError::InvalidTransition { .. } => Self::Conflict(err.to_string()),
            SagaError::InvalidIndex { .. } => Self::Unexpected(err.to_string()),
            _ => Self::validation("INVALID_SAGA", err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_onto_taxonomy() {
        let conflict: atlas_core::Error = SagaError::InvalidTransition {
            step: "a".into(),
            from: Status::Completed,
            to: Status::Pending,
        }
        .into();
        assert_eq!(conflict.code(), "CONFLICT");

        let invalid: atlas_core::Error = SagaError::DuplicateStep("a".into()).into();
        assert_eq!(invalid.code(), "INVALID_SAGA");
        assert!(invalid.is_precondition());
    }
}
