//! REST representation of wallets.

use crate::wallet::model::Wallet;
use serde::{Deserialize, Serialize};

/// JSON resource for a wallet, identified by its account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestModel {
    /// Account id as a string
    pub id: String,
    /// Credit
    pub credit: u32,
    /// Points
    pub points: u32,
    /// Prepaid
    pub prepaid: u32,
}

/// Wallet to resource.
#[must_use]
pub fn transform(wallet: &Wallet) -> RestModel {
    RestModel {
        id: wallet.account_id.to_string(),
        credit: wallet.credit,
        points: wallet.points,
        prepaid: wallet.prepaid,
    }
}

/// Body of `POST /accounts/:accountId/wallet` and
/// `PATCH /accounts/:accountId/wallet`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRequest {
    /// Credit
    #[serde(default)]
    pub credit: u32,
    /// Points
    #[serde(default)]
    pub points: u32,
    /// Prepaid
    #[serde(default)]
    pub prepaid: u32,
}
