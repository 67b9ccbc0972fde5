//! Error taxonomy shared by every Atlas service.
//!
//! Processors surface the most specific kind they can determine. The REST
//! layer maps kinds to HTTP statuses and the emit layer turns named domain
//! failures into `ERROR` status events using [`Error::code`].

use thiserror::Error;

/// Errors returned by registries, stores and processors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Entity absent under the caller's tenant.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity (`party`, `messenger`, ...)
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The member already belongs to an entity of this kind.
    #[error("character {member} already in a {entity}")]
    AlreadyIn {
        /// Kind of entity
        entity: &'static str,
        /// Member (usually a character id)
        member: u32,
    },

    /// The member does not belong to the named entity.
    #[error("character {member} not in {entity} {id}")]
    NotIn {
        /// Kind of entity
        entity: &'static str,
        /// Entity identifier
        id: String,
        /// Member (usually a character id)
        member: u32,
    },

    /// Size-bound invariant would be violated.
    #[error("{entity} {id} at capacity ({capacity})")]
    AtCapacity {
        /// Kind of entity
        entity: &'static str,
        /// Entity identifier
        id: String,
        /// Maximum member count
        capacity: usize,
    },

    /// Precondition on inputs failed.
    #[error("validation failed [{code}]: {message}")]
    Validation {
        /// Stable error code
        code: String,
        /// Human-readable detail
        message: String,
    },

    /// Optimistic contention; the caller may retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A collaborator (database, Redis, Kafka, HTTP) failed.
    #[error("{service} failure: {reason}")]
    Downstream {
        /// Collaborator name
        service: &'static str,
        /// Failure detail
        reason: String,
    },

    /// Operation was cancelled or its deadline passed.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// The request carried no tenant.
    #[error("tenant missing from request")]
    MissingTenant,

    /// Anything else.
    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl Error {
    /// Build a [`Error::NotFound`].
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Build a [`Error::NotIn`].
    #[must_use]
    pub fn not_in(entity: &'static str, id: impl ToString, member: u32) -> Self {
        Self::NotIn {
            entity,
            id: id.to_string(),
            member,
        }
    }

    /// Build a [`Error::AtCapacity`].
    #[must_use]
    pub fn at_capacity(entity: &'static str, id: impl ToString, capacity: usize) -> Self {
        Self::AtCapacity {
            entity,
            id: id.to_string(),
            capacity,
        }
    }

    /// Build a [`Error::Validation`].
    #[must_use]
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Build a [`Error::Downstream`].
    #[must_use]
    pub fn downstream(service: &'static str, reason: impl ToString) -> Self {
        Self::Downstream {
            service,
            reason: reason.to_string(),
        }
    }

    /// Stable code for status events and REST bodies.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyIn { .. } => "ALREADY_IN",
            Self::NotIn { .. } => "NOT_IN",
            Self::AtCapacity { .. } => "AT_CAPACITY",
            Self::Validation { code, .. } => code,
            Self::Conflict(_) => "CONFLICT",
            Self::Downstream { .. } => "DOWNSTREAM",
            Self::Cancelled(_) => "CANCELLED",
            Self::MissingTenant => "MISSING_TENANT",
            Self::Unexpected(_) => "UNEXPECTED",
        }
    }

    /// Whether this is a named precondition failure.
    ///
    /// Precondition failures reach callers unmodified and are reported to
    /// in-game initiators through an `ERROR` status event.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::AlreadyIn { .. }
                | Self::NotIn { .. }
                | Self::AtCapacity { .. }
                | Self::Validation { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Unexpected(format!("serialization: {err}"))
    }
}

/// Result alias used across Atlas crates.
pub type Result<T> = std::result::Result<T, Error>;
