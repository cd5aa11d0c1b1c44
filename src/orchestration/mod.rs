//! Orchestration layer for package deployment
//!
//! This module provides the high-level components that resolve the built
//! archive and drive the install and upload steps.

pub mod archive_locator;
pub mod deploy_driver;

// Re-export main types for convenience
pub use archive_locator::ArchiveLocator;
pub use deploy_driver::{DeployDriver, DeployReport, PreflightReport, StepReport};
