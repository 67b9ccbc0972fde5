//! Wallet balances.

use atlas_core::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Currency held in a wallet. Numbered as on the wire: `1` credit, `2`
/// points, `3` prepaid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Currency {
    /// NX credit
    Credit,
    /// Maple points
    Points,
    /// Prepaid NX
    Prepaid,
}

impl TryFrom<u32> for Currency {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            1 => Ok(Self::Credit),
            2 => Ok(Self::Points),
            3 => Ok(Self::Prepaid),
            other => Err(Error::validation(
                "INVALID_CURRENCY_TYPE",
                format!("unknown currency type {other}"),
            )),
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Credit => "credit",
            Self::Points => "points",
            Self::Prepaid => "prepaid",
        })
    }
}

/// Currency balances of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    /// Row id
    pub id: u32,
    /// Owning tenant
    pub tenant_id: Uuid,
    /// Owning account
    pub account_id: u32,
    /// Credit balance
    pub credit: u32,
    /// Points balance
    pub points: u32,
    /// Prepaid balance
    pub prepaid: u32,
}

impl Wallet {
    /// Balance of `currency`.
    #[must_use]
    pub const fn balance(&self, currency: Currency) -> u32 {
        match currency {
            Currency::Credit => self.credit,
            Currency::Points => self.points,
            Currency::Prepaid => self.prepaid,
        }
    }

    /// This wallet with `amount` added to `currency`.
    ///
    /// # Errors
    ///
    /// `INSUFFICIENT_BALANCE` validation when the balance would drop below
    /// zero, `BALANCE_OVERFLOW` when it would exceed `u32::MAX`.
    pub fn adjusted(mut self, currency: Currency, amount: i32) -> Result<Self> {
        let current = self.balance(currency);
        let next = i64::from(current) + i64::from(amount);
        if next < 0 {
            return Err(Error::validation(
                "INSUFFICIENT_BALANCE",
                format!("{currency} balance {current} cannot cover {}", amount.unsigned_abs()),
            ));
        }
        let next = u32::try_from(next)
            .map_err(|_| Error::validation("BALANCE_OVERFLOW", format!("{currency} balance would exceed {}", u32::MAX)))?;
        match currency {
            Currency::Credit => self.credit = next,
            Currency::Points => self.points = next,
            Currency::Prepaid => self.prepaid = next,
        }
        Ok(self)
    }
}
