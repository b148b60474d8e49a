// ABOUTME: Error types for the terminal bridge
// Dial failures and anything that ends a pump abnormally

use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("We couldn't connect to this container: {0}")]
    Dial(String),

    #[error("Terminal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("Malformed frame from container: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Container closed the session abnormally ({code}): {reason}")]
    RemoteClosed { code: u16, reason: String },
}
