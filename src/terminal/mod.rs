// ABOUTME: Terminal bridge between the local tty and a container execute socket
// Owns raw-mode handling, frame encoding and the two-way byte pump

pub mod bridge;
pub mod codec;
pub mod error;
pub mod tty;

pub use bridge::{Session, TerminalBridge};
pub use error::BridgeError;
pub use tty::{CrosstermTerminal, RawModeGuard, TerminalMode};
