//! Mapping from backend counters to entity ids.

use crate::error::{Error, Result};

/// Turn the `counter`-th allocation into an id starting at `base`.
///
/// Counters start at 1, so the first id equals `base`.
///
/// # Errors
///
/// Returns [`Error::Unexpected`] when the id space above `base` is exhausted
/// or the counter is zero.
pub fn allocate(base: u32, counter: u64) -> Result<u32> {
    let offset = counter
        .checked_sub(1)
        .ok_or_else(|| Error::Unexpected("id counter returned zero".into()))?;
    u64::from(base)
        .checked_add(offset)
        .and_then(|id| u32::try_from(id).ok())
        .ok_or_else(|| Error::Unexpected(format!("id space exhausted above {base}")))
}
