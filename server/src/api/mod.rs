//! REST routes, one module per domain.
//!
//! Every route reads the caller's tenant from the tenant headers and answers
//! with the domain's `RestModel`. Failures render as `{code, message}`.

pub mod buffs;
pub mod cashshop;
pub mod fame;
pub mod login_history;
pub mod messengers;
pub mod parties;

use atlas_core::{Error, Result};
use serde::Deserialize;

/// `?memberId=` filter on collection routes.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MemberFilter {
    pub(crate) member_id: Option<u32>,
}

/// Filtered collections answer an empty list rather than 404.
pub(crate) fn none_when_missing<T>(found: Result<T>) -> Result<Option<T>> {
    match found {
        Ok(value) => Ok(Some(value)),
        Err(Error::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}
