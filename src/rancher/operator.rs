// ABOUTME: Operator console used while resolving a container
// Progress lines go to stdout, the selection is read from stdin, geometry comes from the tty

use super::models::TerminalGeometry;
use std::io::{self, BufRead, Write};
use tokio::runtime::{Handle, RuntimeFlavor};

/// The human at the controlling terminal.
pub trait Operator {
    /// Prints one progress or status line.
    fn say(&mut self, line: &str);

    /// Shows `prompt` without a newline and reads one line of input.
    fn ask(&mut self, prompt: &str) -> io::Result<String>;

    /// Current size of the controlling terminal, if it can be queried.
    fn geometry(&self) -> Option<TerminalGeometry>;
}

/// Operator backed by the process's stdin and stdout.
#[derive(Debug, Default)]
pub struct StdioOperator;

impl Operator for StdioOperator {
    fn say(&mut self, line: &str) {
        println!("{line}");
    }

    fn ask(&mut self, prompt: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        off_runtime(|| read_answer(io::stdin().lock()))
    }

    fn geometry(&self) -> Option<TerminalGeometry> {
        match crossterm::terminal::size() {
            Ok((cols, rows)) => Some(TerminalGeometry { cols, rows }),
            Err(e) => {
                tracing::warn!("Cannot query terminal size: {}", e);
                None
            }
        }
    }
}

/// Runs a blocking call without stalling other tasks on a multi-threaded
/// runtime. Elsewhere it simply runs inline.
fn off_runtime<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

fn read_answer(mut input: impl BufRead) -> io::Result<String> {
    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "no selection entered",
        ));
    }
    Ok(answer)
}
