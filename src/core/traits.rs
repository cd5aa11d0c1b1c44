//! Core traits and types for package deployment
//!
//! This module defines the deployment steps and the process-runner seam that
//! the driver uses to reach the package manager and the upload client.

use crate::core::template::RenderedCommand;
use crate::security::command_executor::CommandError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// ============================================================================
// Steps
// ============================================================================

/// One external process invocation in the deployment pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStep {
    Install,
    Upload,
}

impl DeployStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Upload => "upload",
        }
    }
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Command outcome
// ============================================================================

/// Result of running one external command to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

// ============================================================================
// Command Runner Trait
// ============================================================================

/// Runs rendered commands on behalf of the deploy driver
///
/// Production code uses [`crate::security::SafeCommandExecutor`]; tests swap
/// in a recording fake to observe which steps ran and in what order.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command and wait for it to exit.
    ///
    /// A non-zero exit is not an error at this level; it is reported through
    /// [`CommandOutcome::exit_code`].
    async fn run(&self, command: &RenderedCommand) -> Result<CommandOutcome, CommandError>;

    /// Whether `program` would be accepted by [`CommandRunner::run`]
    fn can_run(&self, _program: &str) -> bool {
        true
    }
}
