pub mod core;
pub mod orchestration;
pub mod security;
pub mod validation;

pub use crate::core::*;
pub use orchestration::{ArchiveLocator, DeployDriver, DeployReport, PreflightReport, StepReport};
pub use security::{CommandError, SafeCommandExecutor, SecureTokenManager};
