pub mod experiments;
pub mod system;

pub use experiments::*;
pub use system::*;

use axum::http::StatusCode;

use crate::error::TrackerError;

/// Map a store error onto the HTTP response pair.
///
/// NotFound becomes 404 with its message; everything else is a 500 with
/// the error text.
pub(crate) fn store_error(err: TrackerError) -> (StatusCode, String) {
    match err {
        TrackerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}
