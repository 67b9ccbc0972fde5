//! Cash asset status events and commands.

use crate::model::{Asset, NewAsset};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Environment key of the cash asset status topic.
pub const EVENT_TOPIC_CASH_ASSET_STATUS: &str = "EVENT_TOPIC_CASH_ASSET_STATUS";
/// Environment key of the cash asset command topic.
pub const COMMAND_TOPIC_CASH_ASSET: &str = "COMMAND_TOPIC_CASH_ASSET";

/// `CREATED`
pub const STATUS_CREATED: &str = "CREATED";
/// `UPDATED`
pub const STATUS_UPDATED: &str = "UPDATED";
/// `MOVED`
pub const STATUS_MOVED: &str = "MOVED";
/// `QUANTITY_CHANGED`
pub const STATUS_QUANTITY_CHANGED: &str = "QUANTITY_CHANGED";
/// `DELETED`
pub const STATUS_DELETED: &str = "DELETED";
/// `ACCEPTED`
pub const STATUS_ACCEPTED: &str = "ACCEPTED";
/// `RELEASED`
pub const STATUS_RELEASED: &str = "RELEASED";
/// `EXPIRED`
pub const STATUS_EXPIRED: &str = "EXPIRED";

/// Cash asset status event, keyed by asset id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent<B> {
    /// Asset
    pub asset_id: u32,
    /// Compartment holding the asset
    pub compartment_id: Uuid,
    /// Cash serial
    pub cash_id: i64,
    /// Item template
    pub template_id: u32,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific body
    pub body: B,
}

/// Full asset attributes, carried by `CREATED`, `UPDATED` and `MOVED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBody {
    /// Commodity
    pub commodity_id: u32,
    /// Stack size
    pub quantity: u32,
    /// Flag bits
    pub flag: u16,
    /// Buyer
    pub purchased_by: u32,
    /// Expiration, absent for permanent assets
    pub expiration: Option<DateTime<Utc>>,
}

impl From<&Asset> for AssetBody {
    fn from(asset: &Asset) -> Self {
        Self {
            commodity_id: asset.commodity_id,
            quantity: asset.quantity,
            flag: asset.flag,
            purchased_by: asset.purchased_by,
            expiration: asset.expiration,
        }
    }
}

/// Body of `QUANTITY_CHANGED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityBody {
    /// New stack size
    pub quantity: u32,
}

/// Body of `DELETED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedBody {}

/// Body of `ACCEPTED` and `RELEASED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBody {
    /// Request correlation
    pub transaction_id: Uuid,
    /// Character moving the asset in or out of the cash shop
    pub character_id: u32,
}

/// Body of `EXPIRED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiredBody {
    /// Template granted in its place, `0` for none
    pub replace_item_id: u32,
    /// Message shown to the owner
    pub replace_message: String,
}

/// `CREATE` command.
pub const COMMAND_CREATE: &str = "CREATE";
/// `ACCEPT` command.
pub const COMMAND_ACCEPT: &str = "ACCEPT";
/// `RELEASE` command.
pub const COMMAND_RELEASE: &str = "RELEASE";
/// `UPDATE_QUANTITY` command.
pub const COMMAND_UPDATE_QUANTITY: &str = "UPDATE_QUANTITY";
/// `EXPIRE` command.
pub const COMMAND_EXPIRE: &str = "EXPIRE";

/// Command envelope consumed from the cash asset command topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Request correlation
    #[serde(default)]
    pub transaction_id: Uuid,
    /// Character on whose behalf the command runs
    #[serde(default)]
    pub character_id: u32,
    /// Discriminator
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific body
    #[serde(default)]
    pub body: serde_json::Value,
}

/// Body of `CREATE` and `ACCEPT`. `cashId` is only honoured by `ACCEPT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
    /// Target compartment
    pub compartment_id: Uuid,
    /// Existing cash serial
    #[serde(default)]
    pub cash_id: i64,
    /// Item template
    pub template_id: u32,
    /// Commodity
    #[serde(default)]
    pub commodity_id: u32,
    /// Stack size
    #[serde(default = "one")]
    pub quantity: u32,
    /// Buyer
    #[serde(default)]
    pub purchased_by: u32,
    /// Flag bits
    #[serde(default)]
    pub flag: u16,
}

impl From<CreateBody> for NewAsset {
    fn from(body: CreateBody) -> Self {
        Self {
            compartment_id: body.compartment_id,
            template_id: body.template_id,
            commodity_id: body.commodity_id,
            quantity: body.quantity,
            purchased_by: body.purchased_by,
            flag: body.flag,
        }
    }
}

const fn one() -> u32 {
    1
}

/// Body of `RELEASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    /// Asset
    pub asset_id: u32,
}

/// Body of `UPDATE_QUANTITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityBody {
    /// Asset
    pub asset_id: u32,
    /// New stack size
    pub quantity: u32,
}

/// Body of `EXPIRE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpireBody {
    /// Asset
    pub asset_id: u32,
    /// Replacement template
    #[serde(default)]
    pub replace_item_id: u32,
    /// Replacement message
    #[serde(default)]
    pub replace_message: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_body_defaults() {
        let compartment = Uuid::new_v4();
        let body: CreateBody =
            serde_json::from_value(json!({"compartmentId": compartment, "templateId": 5_211_048})).unwrap();
        assert_eq!(body.quantity, 1);
        assert_eq!(body.cash_id, 0);
        assert_eq!(body.commodity_id, 0);
    }

    #[test]
    fn permanent_assets_serialize_a_null_expiration() {
        let body = AssetBody {
            commodity_id: 1,
            quantity: 1,
            flag: 0,
            purchased_by: 9,
            expiration: None,
        };
        assert_eq!(serde_json::to_value(body).unwrap()["expiration"], serde_json::Value::Null);
    }
}
