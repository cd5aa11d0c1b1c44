//! SafeCommandExecutor: whitelisted, shell-free execution of deployment commands
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only pre-approved programs can execute
//! - **Injection prevention**: Uses `tokio::process::Command`, never a shell
//! - **Argument sanitization**: Arguments passed as Vec, never interpolated into shell strings
//! - **Working directory validation**: Validates existence before execution
//! - **Timeout control**: Kills long-running or hanging processes
//!
//! Child stdout and stderr are inherited so the tool output lands in the CI log.
//! When stdout carries machine-readable output, child stdout can be sent to
//! stderr instead.
//!
//! # Example
//!
//! ```rust,no_run
//! use package_deployer::SafeCommandExecutor;
//! use std::time::Duration;
//!
//! let mut executor = SafeCommandExecutor::new(std::env::temp_dir()).unwrap();
//! executor.set_timeout(Duration::from_secs(600));
//! ```

use crate::core::template::RenderedCommand;
use crate::core::traits::{CommandOutcome, CommandRunner};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;

/// Programs allowed by default.
///
/// Package managers able to install from a local build channel, plus the
/// upload client.
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &["conda", "mamba", "micromamba", "anaconda"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Command execution failed (e.g., binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// Command exceeded the timeout duration
    #[error("Command timeout after {0:?}")]
    Timeout(Duration),
}

/// Safe command executor with security controls
#[derive(Debug)]
pub struct SafeCommandExecutor {
    /// Working directory where commands will be executed
    working_dir: PathBuf,
    /// Programs permitted to run
    allowed_commands: Vec<String>,
    /// Optional timeout for command execution
    timeout: Option<Duration>,
    /// Write child stdout to our stderr
    stdout_to_stderr: bool,
}

impl SafeCommandExecutor {
    /// Create a new SafeCommandExecutor with the default whitelist.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.is_dir() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self {
            working_dir,
            allowed_commands: DEFAULT_ALLOWED_COMMANDS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            timeout: None,
            stdout_to_stderr: false,
        })
    }

    /// Permit additional programs
    pub fn allow_commands<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for command in commands {
            let command = command.into();
            if !self.allowed_commands.contains(&command) {
                self.allowed_commands.push(command);
            }
        }
    }

    /// Set command execution timeout.
    ///
    /// Commands exceeding this duration are killed.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Send child stdout to stderr, keeping our stdout free for reports
    pub fn redirect_stdout_to_stderr(&mut self) {
        self.stdout_to_stderr = true;
    }

    /// Check a program against the whitelist.
    ///
    /// Matching is on the bare program name, so `/opt/conda/bin/conda` is
    /// allowed when `conda` is.
    pub fn is_allowed(&self, program: &str) -> bool {
        let name = Path::new(program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(program);
        self.allowed_commands.iter().any(|c| c == program || c == name)
    }

    /// Execute a program with whitelist validation and argument sanitization.
    ///
    /// A non-zero exit is reported through the outcome, not as an error.
    ///
    /// # Errors
    ///
    /// - `CommandError::CommandNotAllowed` - Program not in whitelist
    /// - `CommandError::ExecutionFailed` - Binary not found or execution error
    /// - `CommandError::Timeout` - Timeout elapsed; the child has been killed
    pub async fn execute(&self, program: &str, args: &[String]) -> Result<CommandOutcome, CommandError> {
        if !self.is_allowed(program) {
            return Err(CommandError::CommandNotAllowed(program.to_string()));
        }

        // Windows-specific: conda and mamba are .bat shims, not .exe
        #[cfg(target_os = "windows")]
        let program_name = if matches!(program, "conda" | "mamba") {
            format!("{}.bat", program)
        } else {
            program.to_string()
        };

        #[cfg(not(target_os = "windows"))]
        let program_name = program.to_string();

        let stdout = if self.stdout_to_stderr {
            Stdio::from(std::io::stderr())
        } else {
            Stdio::inherit()
        };

        let started = Instant::now();
        let mut child = Command::new(&program_name)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", program, e)))?;

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(program, error = %e, "failed to kill timed-out command");
                    }
                    return Err(CommandError::Timeout(limit));
                }
            },
            None => child.wait().await,
        }
        .map_err(|e| CommandError::ExecutionFailed(format!("{}: {}", program, e)))?;

        Ok(CommandOutcome {
            exit_code: status.code(),
            duration: started.elapsed(),
        })
    }
}

#[async_trait]
impl CommandRunner for SafeCommandExecutor {
    async fn run(&self, command: &RenderedCommand) -> Result<CommandOutcome, CommandError> {
        tracing::debug!(
            step = %command.step(),
            command = %command,
            working_dir = %self.working_dir.display(),
            "spawning command"
        );
        self.execute(command.program(), command.args()).await
    }

    fn can_run(&self, program: &str) -> bool {
        self.is_allowed(program)
    }
}
