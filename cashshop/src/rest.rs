//! REST representation of cash assets.

use crate::model::{Asset, NewAsset};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JSON resource for a cash asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestModel {
    /// Asset id as a string
    pub id: String,
    /// Holding compartment
    pub compartment_id: Uuid,
    /// Cash serial, as a string so clients keep all 64 bits
    pub cash_id: String,
    /// Item template
    pub template_id: u32,
    /// Commodity
    pub commodity_id: u32,
    /// Stack size
    pub quantity: u32,
    /// Flag bits
    pub flag: u16,
    /// Buyer
    pub purchased_by: u32,
    /// Expiration; `null` for permanent assets
    pub expiration: Option<DateTime<Utc>>,
}

/// Asset to resource.
#[must_use]
pub fn transform(asset: &Asset) -> RestModel {
    RestModel {
        id: asset.id.to_string(),
        compartment_id: asset.compartment_id,
        cash_id: asset.cash_id.to_string(),
        template_id: asset.template_id,
        commodity_id: asset.commodity_id,
        quantity: asset.quantity,
        flag: asset.flag,
        purchased_by: asset.purchased_by,
        expiration: asset.expiration,
    }
}

/// Body of `POST /cash-shop/assets`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    /// Target compartment
    pub compartment_id: Uuid,
    /// Item template
    pub template_id: u32,
    /// Commodity
    #[serde(default)]
    pub commodity_id: u32,
    /// Stack size
    pub quantity: u32,
    /// Buyer
    #[serde(default)]
    pub purchased_by: u32,
}

impl From<CreateRequest> for NewAsset {
    fn from(request: CreateRequest) -> Self {
        Self {
            compartment_id: request.compartment_id,
            template_id: request.template_id,
            commodity_id: request.commodity_id,
            quantity: request.quantity,
            purchased_by: request.purchased_by,
            flag: 0,
        }
    }
}

/// Body of `PATCH /cash-shop/assets/:id`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    /// New stack size
    pub quantity: u32,
}
