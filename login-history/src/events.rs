//! Login attempt events consumed from the login service.

use crate::model::Attempt;
use serde::{Deserialize, Serialize};

/// Environment key of the account session status topic.
pub const EVENT_TOPIC_ACCOUNT_SESSION_STATUS: &str = "EVENT_TOPIC_ACCOUNT_SESSION_STATUS";

/// `LOGIN_SUCCEEDED`
pub const STATUS_LOGIN_SUCCEEDED: &str = "LOGIN_SUCCEEDED";
/// `LOGIN_FAILED`
pub const STATUS_LOGIN_FAILED: &str = "LOGIN_FAILED";

/// Session status event; other discriminators are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    /// Account
    pub account_id: u32,
    /// Account name
    #[serde(default)]
    pub account_name: String,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific body
    #[serde(default)]
    pub body: LoginBody,
}

/// Body of `LOGIN_SUCCEEDED` and `LOGIN_FAILED`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginBody {
    /// Remote address
    #[serde(default)]
    pub ip_address: String,
    /// Hardware id
    #[serde(default)]
    pub hwid: String,
    /// Failure reason
    #[serde(default)]
    pub reason: String,
}

impl SessionEvent {
    /// The attempt this event describes, if it is a login outcome.
    #[must_use]
    pub fn attempt(&self) -> Option<Attempt> {
        let b = &self.body;
        match self.kind.as_str() {
            STATUS_LOGIN_SUCCEEDED => Some(Attempt::succeeded(self.account_id, &self.account_name, &b.ip_address, &b.hwid)),
            STATUS_LOGIN_FAILED => Some(Attempt::failed(
                self.account_id,
                &self.account_name,
                &b.ip_address,
                &b.hwid,
                if b.reason.is_empty() { "UNKNOWN" } else { &b.reason },
            )),
            _ => None,
        }
    }
}
