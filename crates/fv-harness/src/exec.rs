//! External command collaborator.
//!
//! The core never spawns processes itself; it consumes the strings a
//! [`CommandExecutor`] returns. Tests substitute a scripted executor.

use fv_error::{FvError, Result};
use std::process::Command;
use tracing::debug;

/// Captured result of one command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub trait CommandExecutor {
    /// Run `program` with `args`.
    ///
    /// Only a failure to spawn is an error; a non-zero exit is reported
    /// through [`CommandOutput::exit_code`].
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;

    /// Run and return stdout, treating a non-zero exit as an acquisition
    /// failure.
    fn run_checked(&self, program: &str, args: &[String]) -> Result<String> {
        let output = self.run(program, args)?;
        if !output.success() {
            return Err(FvError::Acquisition {
                command: command_line(program, args),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output.stdout)
    }
}

/// Runs commands with `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let cmd = command_line(program, args);
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| FvError::spawn_failed(&cmd, &err))?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            exit_code: output.status.code(),
        };
        debug!(
            cmd,
            out = %abbreviate_lines(&result.stdout),
            err = %result.stderr,
            exit_code = ?result.exit_code,
            "exe"
        );
        Ok(result)
    }
}

#[must_use]
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut line = program.to_owned();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Keep the first 8 and last 4 lines of output longer than 12 lines.
#[must_use]
pub fn abbreviate_lines(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= 12 {
        return text.to_owned();
    }
    let mut kept: Vec<&str> = lines[..8].to_vec();
    kept.push("...");
    kept.extend_from_slice(&lines[lines.len() - 4..]);
    kept.join("\n")
}
