//! The oracle subprocess seam.
//!
//! Oracles are user-declared functions whose body is an external command.
//! The evaluator serializes the reduced arguments one per line, hands them
//! to a [`SubprocessRunner`], and re-parses the command's stdout as a
//! single expression. Both the runner and the response parser are injected
//! so the core stays testable without forking processes.

use std::fs;
use std::process::Command;

use quill_core::{Expr, State};

/// Executes an oracle command.
///
/// The serialized arguments are made available to the command as
/// `input.txt` in the working directory (the wire contract). Returns the
/// exit code and the captured stdout; `-1` when the process could not be
/// spawned.
pub trait SubprocessRunner {
    fn run(&mut self, command: &str, input: &str) -> (i32, String);
}

/// Parses an oracle's stdout back into an expression. Installed by the
/// driver, which owns the surface parser.
pub type OracleParser = Box<dyn FnMut(&mut State, &str) -> Option<Expr>>;

/// Production runner: writes `input.txt` and runs the command through the
/// shell.
#[derive(Debug, Default)]
pub struct ShellRunner;

impl SubprocessRunner for ShellRunner {
    fn run(&mut self, command: &str, input: &str) -> (i32, String) {
        if fs::write("input.txt", input).is_err() {
            return (-1, String::new());
        }
        match Command::new("sh").arg("-c").arg(command).output() {
            Ok(out) => {
                let code = out.status.code().unwrap_or(-1);
                (code, String::from_utf8_lossy(&out.stdout).into_owned())
            }
            Err(_) => (-1, String::new()),
        }
    }
}
