//! Compensation planning for failed sagas.

use crate::action::StepPayload;
use crate::model::{Saga, Status};

/// What to do about a failed saga.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Undo actions, most recent first.
    Rollback(Vec<Compensation>),
    /// The failure is terminal; nothing was applied that needs undoing.
    Terminal {
        /// Failed step
        step_id: String,
    },
    /// Nothing failed.
    None,
}

/// One undo action for a completed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compensation {
    /// Step being undone
    pub step_id: String,
    /// Inverse action
    pub payload: StepPayload,
}

/// Plan compensation for `saga`.
///
/// A failed `validate_character_state` step guards the rest of the flow and
/// is terminal. Otherwise completed steps before the failure are undone in
/// reverse order; steps without an inverse are skipped with a warning.
#[must_use]
pub fn plan(saga: &Saga) -> Plan {
    let Some(failed) = saga.failed_index() else {
        return Plan::None;
    };
    let step = &saga.steps[failed];
    if matches!(step.payload, StepPayload::ValidateCharacterState(_)) {
        return Plan::Terminal {
            step_id: step.step_id.clone(),
        };
    }

    let undo = saga.steps[..failed]
        .iter()
        .rev()
        .filter(|s| s.status == Status::Completed)
        .filter_map(|s| match s.payload.inverse() {
            Some(payload) => Some(Compensation {
                step_id: s.step_id.clone(),
                payload,
            }),
            None => {
                tracing::warn!(
                    transaction_id = %saga.transaction_id,
                    step_id = %s.step_id,
                    action = s.action(),
                    "no compensating action, skipping"
                );
                None
            }
        })
        .collect();
    Plan::Rollback(undo)
}
