// ABOUTME: Error types for resolving a container pattern into an execute endpoint
// Every failure is terminal for the resolution; nothing here is retried

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Failed to communicate with rancher API: {0}")]
    Communication(String),

    #[error("Unexpected response from rancher API: {0}")]
    Protocol(String),

    #[error("Container {pattern} not existed in system, not running, or you don't have access permissions.")]
    NotFound { pattern: String },

    #[error("Invalid selection {input:?}: expected a number between 1 and {count}")]
    InvalidSelection { input: String, count: usize },

    #[error("Container selection aborted: {0}")]
    SelectionAborted(#[source] std::io::Error),
}

impl From<reqwest::Error> for ResolveError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Communication(err.to_string())
        }
    }
}
