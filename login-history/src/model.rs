//! Login history entries.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Days an entry is kept before the purge removes it.
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// One login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginEntry {
    /// Row id
    pub id: i64,
    /// Owning tenant
    pub tenant_id: Uuid,
    /// Account that attempted the login
    pub account_id: u32,
    /// Account name as typed
    pub account_name: String,
    /// Remote address
    pub ip_address: String,
    /// Client hardware id
    pub hwid: String,
    /// Whether the login succeeded
    pub success: bool,
    /// Reason for a failed attempt, empty on success
    pub failure_reason: String,
    /// Attempt time
    pub created_at: DateTime<Utc>,
}

/// Fields of an attempt being recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// Account
    pub account_id: u32,
    /// Account name
    pub account_name: String,
    /// Remote address
    pub ip_address: String,
    /// Hardware id
    pub hwid: String,
    /// Outcome
    pub success: bool,
    /// Failure reason
    pub failure_reason: String,
}

impl Attempt {
    /// Successful attempt.
    #[must_use]
    pub fn succeeded(account_id: u32, account_name: &str, ip_address: &str, hwid: &str) -> Self {
        Self {
            account_id,
            account_name: account_name.to_string(),
            ip_address: ip_address.to_string(),
            hwid: hwid.to_string(),
            success: true,
            failure_reason: String::new(),
        }
    }

    /// Failed attempt with `reason`.
    #[must_use]
    pub fn failed(account_id: u32, account_name: &str, ip_address: &str, hwid: &str, reason: &str) -> Self {
        Self {
            success: false,
            failure_reason: reason.to_string(),
            ..Self::succeeded(account_id, account_name, ip_address, hwid)
        }
    }
}
