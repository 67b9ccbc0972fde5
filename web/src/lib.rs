//! # Atlas Web
//!
//! The thin HTTP shell around Atlas processors:
//!
//! - [`AppError`] maps [`atlas_core::Error`] kinds onto statuses with a JSON
//!   `{code, message}` body
//! - [`TenantContext`] builds a request [`Context`](atlas_core::Context)
//!   from the `TENANT_ID`, `REGION`, `MAJOR_VERSION` and `MINOR_VERSION`
//!   headers
//! - [`correlation_id_layer`] tags every request with a correlation id
//! - [`handlers::health`] serves `/health`
//!
//! ```ignore
//! async fn get_party(
//!     State(state): State<AppState>,
//!     TenantContext(ctx): TenantContext,
//!     Path(id): Path<u32>,
//! ) -> WebResult<Json<RestModel>> {
//!     let party = state.parties.get_by_id(&ctx, id).await?;
//!     Ok(Json(transform(&party)))
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::AppError;
pub use extractors::{CorrelationId, TenantContext};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationIdExt, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
