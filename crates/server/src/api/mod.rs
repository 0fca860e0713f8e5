pub mod creations;
pub mod handlers;
pub mod middleware;
pub mod pricing;
pub mod routes;

pub use routes::create_router;

use serde::Serialize;

/// Error response body shared by all API handlers.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
