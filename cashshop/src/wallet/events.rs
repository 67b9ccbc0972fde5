//! Wallet status events and commands.

use crate::wallet::model::Wallet;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Environment key of the wallet status topic.
pub const EVENT_TOPIC_WALLET_STATUS: &str = "EVENT_TOPIC_WALLET_STATUS";
/// Environment key of the wallet command topic.
pub const COMMAND_TOPIC_WALLET: &str = "COMMAND_TOPIC_WALLET";

/// `CREATED`
pub const STATUS_CREATED: &str = "CREATED";
/// `UPDATED`
pub const STATUS_UPDATED: &str = "UPDATED";
/// `DELETED`
pub const STATUS_DELETED: &str = "DELETED";

/// `ADJUST_CURRENCY` command.
pub const COMMAND_ADJUST_CURRENCY: &str = "ADJUST_CURRENCY";

/// Wallet status event, keyed by account id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent<B> {
    /// Owning account
    pub account_id: u32,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific body
    pub body: B,
}

/// Balances, carried by `CREATED` and `UPDATED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceBody {
    /// Credit
    pub credit: u32,
    /// Points
    pub points: u32,
    /// Prepaid
    pub prepaid: u32,
}

impl From<&Wallet> for BalanceBody {
    fn from(wallet: &Wallet) -> Self {
        Self {
            credit: wallet.credit,
            points: wallet.points,
            prepaid: wallet.prepaid,
        }
    }
}

/// Body of `DELETED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedBody {}

/// Command envelope consumed from the wallet command topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Request correlation
    #[serde(default)]
    pub transaction_id: Uuid,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific body
    #[serde(default)]
    pub body: serde_json::Value,
}

/// Body of `ADJUST_CURRENCY`; the same shape as the saga `award_currency`
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustCurrencyBody {
    /// Character the request came from
    #[serde(default)]
    pub character_id: u32,
    /// Owning account
    pub account_id: u32,
    /// `1` credit, `2` points, `3` prepaid
    pub currency_type: u32,
    /// Signed amount
    pub amount: i32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn adjust_body_reads_an_award_currency_payload() {
        let body: AdjustCurrencyBody = serde_json::from_value(json!({
            "characterId": 3, "accountId": 9, "currencyType": 2, "amount": -50
        }))
        .unwrap();
        assert_eq!(
            body,
            AdjustCurrencyBody {
                character_id: 3,
                account_id: 9,
                currency_type: 2,
                amount: -50,
            }
        );
    }

    #[test]
    fn deleted_body_is_an_empty_object() {
        let event = StatusEvent {
            account_id: 9,
            kind: STATUS_DELETED.to_string(),
            body: DeletedBody {},
        };
        assert_eq!(
            serde_json::to_value(event).unwrap(),
            json!({"accountId": 9, "type": "DELETED", "body": {}})
        );
    }
}
