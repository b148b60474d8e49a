// ABOUTME: Local terminal mode handling for the bridge
// Raw mode is acquired through a guard that restores the previous mode when dropped

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io;
use tracing::{debug, warn};

/// Switches the controlling terminal between its saved mode and raw mode.
#[cfg_attr(test, mockall::automock)]
pub trait TerminalMode {
    /// Saves the current mode and enters raw (non-canonical, no echo) mode.
    fn enable_raw(&self) -> io::Result<()>;

    /// Puts back the mode saved by `enable_raw`.
    fn restore(&self) -> io::Result<()>;
}

/// The process's real controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermTerminal;

impl TerminalMode for CrosstermTerminal {
    fn enable_raw(&self) -> io::Result<()> {
        enable_raw_mode()
    }

    fn restore(&self) -> io::Result<()> {
        disable_raw_mode()
    }
}

/// Restores the terminal exactly once, on drop, if raw mode was entered.
pub struct RawModeGuard<'a, T: TerminalMode + ?Sized> {
    terminal: &'a T,
    active: bool,
}

impl<'a, T: TerminalMode + ?Sized> RawModeGuard<'a, T> {
    /// Enters raw mode. A terminal that refuses (stdin is a pipe, say) is left
    /// alone and the guard becomes a no-op.
    pub fn acquire(terminal: &'a T) -> Self {
        match terminal.enable_raw() {
            Ok(()) => {
                debug!("Raw mode enabled");
                Self {
                    terminal,
                    active: true,
                }
            }
            Err(e) => {
                warn!("Failed to enable raw mode: {}", e);
                Self {
                    terminal,
                    active: false,
                }
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl<T: TerminalMode + ?Sized> Drop for RawModeGuard<'_, T> {
    fn drop(&mut self) {
        if self.active {
            self.active = false;
            if let Err(e) = self.terminal.restore() {
                warn!("Failed to restore terminal mode: {}", e);
            } else {
                debug!("Terminal mode restored");
            }
        }
    }
}
