//! Transport-facing error bodies
//!
//! Whatever serves the ledger over the network turns an [`Error`] into an
//! [`ErrorResponse`]. Client errors keep their message. Server errors get a
//! fixed message so internal details never reach untrusted callers.

use crate::Error;
use serde::{Deserialize, Serialize};

/// Message returned for every server-side failure
pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred";

/// Error body returned to API callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status code as a string ("400", "500")
    pub code: String,

    /// Human-readable message
    pub message: String,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        let message = if err.is_client_error() {
            err.to_string()
        } else {
            INTERNAL_ERROR_MESSAGE.to_string()
        };

        Self {
            code: err.status_code().to_string(),
            message,
        }
    }
}
