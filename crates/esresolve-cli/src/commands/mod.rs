pub mod build;
pub mod resolve;

use serde::Serialize;

/// Error object in JSON output.
#[derive(Debug, Serialize)]
pub struct ErrorJson {
    pub code: String,
    pub message: String,
}

impl ErrorJson {
    pub fn from_error(err: &esresolve_core::Error) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}
