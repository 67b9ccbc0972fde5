//! REST representation of login history.

use crate::model::LoginEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// JSON resource for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestModel {
    /// Row id as a string
    pub id: String,
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
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub failure_reason: String,
    /// Attempt time
    pub created_at: DateTime<Utc>,
}

/// Entry to resource.
#[must_use]
pub fn transform(entry: &LoginEntry) -> RestModel {
    RestModel {
        id: entry.id.to_string(),
        account_id: entry.account_id,
        account_name: entry.account_name.clone(),
        ip_address: entry.ip_address.clone(),
        hwid: entry.hwid.clone(),
        success: entry.success,
        failure_reason: entry.failure_reason.clone(),
        created_at: entry.created_at,
    }
}

/// Query of `GET /login-history`; at most one filter is honoured, in the
/// order account, ip, hwid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Account filter
    pub account_id: Option<u32>,
    /// Address filter
    pub ip: Option<String>,
    /// Hardware filter
    pub hwid: Option<String>,
}
