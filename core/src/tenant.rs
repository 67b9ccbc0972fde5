//! Tenant identity.
//!
//! A tenant is an isolated logical realm (a game region at a given client
//! version). Every registry entry, database row and Kafka message is scoped
//! by one.
//!
//! The canonical string form, used inside Redis keys, is
//! `<uuid>:<REGION>:<major>.<minor>`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A tenant: identifier plus region and client version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    id: Uuid,
    region: String,
    major_version: u16,
    minor_version: u16,
}

impl Tenant {
    /// Create a tenant, validating the region code.
    ///
    /// Region codes are short upper-case alphanumeric identifiers (`GMS`,
    /// `JMS`, ...).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the region is empty or contains
    /// characters other than ASCII upper-case letters and digits.
    pub fn create(
        id: Uuid,
        region: impl Into<String>,
        major_version: u16,
        minor_version: u16,
    ) -> Result<Self> {
        let region = region.into();
        if region.is_empty()
            || !region
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(Error::validation(
                "INVALID_TENANT",
                format!("invalid tenant region '{region}'"),
            ));
        }

        Ok(Self {
            id,
            region,
            major_version,
            minor_version,
        })
    }

    /// Tenant identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Region code.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Major client version.
    #[must_use]
    pub const fn major_version(&self) -> u16 {
        self.major_version
    }

    /// Minor client version.
    #[must_use]
    pub const fn minor_version(&self) -> u16 {
        self.minor_version
    }

    /// Canonical key (`<uuid>:<REGION>:<major>.<minor>`).
    #[must_use]
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}.{}",
            self.id, self.region, self.major_version, self.minor_version
        )
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for Tenant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::validation("INVALID_TENANT", format!("invalid tenant key '{s}'"));

        let mut parts = s.splitn(3, ':');
        let id = parts
            .next()
            .and_then(|p| Uuid::parse_str(p).ok())
            .ok_or_else(invalid)?;
        let region = parts.next().ok_or_else(invalid)?;
        let (major, minor) = parts
            .next()
            .and_then(|v| v.split_once('.'))
            .ok_or_else(invalid)?;
        let major = major.parse().map_err(|_| invalid())?;
        let minor = minor.parse().map_err(|_| invalid())?;

        Self::create(id, region, major, minor)
    }
}
