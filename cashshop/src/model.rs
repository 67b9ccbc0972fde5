//! Cash-shop assets and the expiration rule.

use atlas_core::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Period, in days, used when a commodity cannot be resolved.
pub const DEFAULT_PERIOD: u32 = 30;

/// An item held in a cash-shop compartment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Asset id, unique per tenant
    pub id: u32,
    /// Owning tenant
    pub tenant_id: Uuid,
    /// Compartment holding the asset
    pub compartment_id: Uuid,
    /// Globally unique cash serial
    pub cash_id: i64,
    /// Item template
    pub template_id: u32,
    /// Commodity the asset was bought as, `0` if none
    pub commodity_id: u32,
    /// Stack size
    pub quantity: u32,
    /// Client flag bits
    pub flag: u16,
    /// Character that paid for it
    pub purchased_by: u32,
    /// When the asset expires; `None` is permanent
    pub expiration: Option<DateTime<Utc>>,
}

impl Asset {
    /// Whether the asset has expired at `now`. Permanent assets never do.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|at| at <= now)
    }
}

/// Fields of an asset about to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewAsset {
    /// Target compartment
    pub compartment_id: Uuid,
    /// Item template
    pub template_id: u32,
    /// Commodity, `0` for none
    pub commodity_id: u32,
    /// Stack size
    pub quantity: u32,
    /// Buyer
    pub purchased_by: u32,
    /// Client flag bits
    pub flag: u16,
}

/// Per-tenant template overrides for one-day commodities, in hours.
///
/// Parsed from JSON of the form `{"<tenant uuid>": {"<templateId>": hours}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HourlyExpirations(HashMap<Uuid, HashMap<u32, u32>>);

impl HourlyExpirations {
    /// No overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the JSON form.
    ///
    /// # Errors
    ///
    /// `INVALID_HOURLY_EXPIRATIONS` validation when the JSON is malformed.
    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        serde_json::from_str(raw).map_err(|e| Error::validation("INVALID_HOURLY_EXPIRATIONS", e.to_string()))
    }

    /// Add an override.
    #[must_use]
    pub fn with(mut self, tenant_id: Uuid, template_id: u32, hours: u32) -> Self {
        self.0.entry(tenant_id).or_default().insert(template_id, hours);
        self
    }

    /// Override for `template_id` in `tenant_id`.
    #[must_use]
    pub fn hours(&self, tenant_id: Uuid, template_id: u32) -> Option<u32> {
        self.0.get(&tenant_id)?.get(&template_id).copied()
    }
}

/// Expiration of an asset bought with a `period`-day commodity at `now`.
///
/// A period of 0 is permanent. A one-day period uses `hours` when the
/// template has an override.
#[must_use]
pub fn expiration(period: u32, hours: Option<u32>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match (period, hours) {
        (0, _) => None,
        (1, Some(hours)) => Some(now + Duration::hours(i64::from(hours))),
        (days, _) => Some(now + Duration::days(i64::from(days))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn zero_period_is_permanent() {
        assert_eq!(expiration(0, Some(6), now()), None);
    }

    #[test]
    fn one_day_uses_the_override() {
        assert_eq!(expiration(1, Some(6), now()), Some(now() + Duration::hours(6)));
        assert_eq!(expiration(1, None, now()), Some(now() + Duration::days(1)));
    }

    #[test]
    fn longer_periods_ignore_overrides() {
        assert_eq!(expiration(90, Some(6), now()), Some(now() + Duration::days(90)));
    }

    #[test]
    fn parses_hourly_overrides() {
        let tenant = Uuid::new_v4();
        let raw = format!(r#"{{"{tenant}": {{"5211048": 6}}}}"#);
        let hourly = HourlyExpirations::from_json(&raw).unwrap();
        assert_eq!(hourly.hours(tenant, 5_211_048), Some(6));
        assert_eq!(hourly.hours(tenant, 1), None);
        assert_eq!(hourly.hours(Uuid::new_v4(), 5_211_048), None);

        assert_eq!(HourlyExpirations::from_json("").unwrap(), HourlyExpirations::new());
        assert_eq!(
            HourlyExpirations::from_json("[1]").unwrap_err().code(),
            "INVALID_HOURLY_EXPIRATIONS"
        );
    }

    #[test]
    fn permanent_assets_never_expire() {
        let mut asset = Asset {
            id: 1,
            tenant_id: Uuid::nil(),
            compartment_id: Uuid::nil(),
            cash_id: 7,
            template_id: 1,
            commodity_id: 0,
            quantity: 1,
            flag: 0,
            purchased_by: 0,
            expiration: None,
        };
        assert!(!asset.is_expired(now() + Duration::days(10_000)));
        asset.expiration = Some(now());
        assert!(asset.is_expired(now()));
    }
}
