//! Deploy Driver - installs the locally built package, then uploads its archive
//!
//! The workflow is strictly sequential and fail-fast:
//! - Package name resolution and validation
//! - Local install check through the package manager
//! - Upload token and archive resolution
//! - Authenticated upload through the upload client
//!
//! Nothing is retried or rolled back. If the install fails the upload is never
//! attempted.

use crate::core::config::Settings;
use crate::core::error::DeployError;
use crate::core::template::{RenderedCommand, TemplateContext};
use crate::core::traits::{CommandRunner, DeployStep};
use crate::orchestration::archive_locator::ArchiveLocator;
use crate::security::token_manager::SecureTokenManager;
use crate::validation::package_name::PackageNameValidator;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

/// Report for one executed step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: DeployStep,
    /// Command line with the token masked
    pub command: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

/// Report returned after a successful deployment
#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub success: bool,
    pub package: String,
    pub platform: String,
    pub archives: Vec<PathBuf>,
    pub steps: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Result of a non-executing check of everything a deployment needs
#[derive(Debug, Clone, Serialize)]
pub struct PreflightReport {
    pub package: Option<String>,
    pub platform: String,
    pub token_variable: String,
    /// Masked token, `None` when missing
    pub token: Option<String>,
    pub archives: Vec<PathBuf>,
    pub install_command: Option<String>,
    pub upload_command: Option<String>,
    pub errors: Vec<String>,
}

impl PreflightReport {
    pub fn ready(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Main deployment orchestrator
pub struct DeployDriver<R: CommandRunner> {
    settings: Settings,
    runner: R,
    tokens: SecureTokenManager,
    env: HashMap<String, String>,
    quiet: bool,
}

impl<R: CommandRunner> DeployDriver<R> {
    /// Create a driver reading the package name and token from `env`
    pub fn new(settings: Settings, runner: R, env: HashMap<String, String>) -> Self {
        let tokens = SecureTokenManager::new(settings.token_env.clone(), env.clone());
        Self {
            settings,
            runner,
            tokens,
            env,
            quiet: false,
        }
    }

    /// Suppress the progress lines normally printed to stdout
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    fn progress(&self, message: String) {
        if !self.quiet {
            println!("{}", message);
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn token_manager(&self) -> &SecureTokenManager {
        &self.tokens
    }

    /// Resolve the package name from settings or the configured variable
    pub fn resolve_package(&self) -> Result<String, DeployError> {
        let name = match &self.settings.package_name {
            Some(name) => name.trim().to_string(),
            None => self
                .env
                .get(&self.settings.package_env)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| DeployError::PackageNameMissing {
                    variable: self.settings.package_env.clone(),
                })?,
        };

        PackageNameValidator::validate(&name)?;
        Ok(name)
    }

    fn locator(&self) -> ArchiveLocator {
        ArchiveLocator::new(&self.settings.build_dir, self.settings.archive_pattern.clone())
    }

    /// Install locally, then upload. Stops at the first failure.
    pub async fn run(&self) -> Result<DeployReport, DeployError> {
        let started_at = Utc::now();
        let start_time = Instant::now();
        let platform = self.settings.platform.as_str();

        let package = self.resolve_package()?;
        tracing::info!(package = %package, platform, "starting deployment");

        // 1. Local install check
        let install = self.settings.install.render(
            DeployStep::Install,
            &TemplateContext {
                package: &package,
                platform,
                token: None,
                archives: None,
            },
        )?;

        self.progress(format!("📦 Installing {} from the local build channel", package));
        let install_report = self.run_step(&install).await?;

        // 2. Upload prerequisites
        let token = self
            .tokens
            .get_token()
            .ok_or_else(|| DeployError::TokenMissing {
                variable: self.tokens.variable().to_string(),
            })?;
        let archives = self.locator().locate(&package, platform)?;

        let upload = self.settings.upload.render(
            DeployStep::Upload,
            &TemplateContext {
                package: &package,
                platform,
                token: Some(&token),
                archives: Some(&archives),
            },
        )?;

        // 3. Upload
        self.progress(format!("🚀 Uploading {} archive(s) for {}", archives.len(), package));
        let upload_report = self.run_step(&upload).await?;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        tracing::info!(package = %package, archives = archives.len(), duration_ms, "deployment finished");

        Ok(DeployReport {
            success: true,
            package,
            platform: platform.to_string(),
            archives,
            steps: vec![install_report, upload_report],
            started_at,
            duration_ms,
        })
    }

    async fn run_step(&self, command: &RenderedCommand) -> Result<StepReport, DeployError> {
        let step = command.step();
        tracing::info!(step = %step, command = %command, "running step");

        let outcome = self
            .runner
            .run(command)
            .await
            .map_err(|source| DeployError::Command { step, source })?;

        if !outcome.success() {
            tracing::error!(step = %step, exit_code = ?outcome.exit_code, "step failed");
            return Err(DeployError::StepFailed {
                step,
                code: outcome.exit_code,
            });
        }

        Ok(StepReport {
            step,
            command: command.display(),
            exit_code: outcome.exit_code,
            duration_ms: outcome.duration.as_millis() as u64,
        })
    }

    /// Check everything `run` needs without executing anything.
    ///
    /// Unlike `run`, every problem is collected instead of stopping at the first.
    pub fn preflight(&self) -> PreflightReport {
        let platform = self.settings.platform.as_str();
        let mut errors = Vec::new();

        let package = match self.resolve_package() {
            Ok(package) => Some(package),
            Err(e) => {
                errors.push(e.to_string());
                None
            }
        };

        let token = self.tokens.get_token();
        if token.is_none() {
            errors.push(
                DeployError::TokenMissing {
                    variable: self.tokens.variable().to_string(),
                }
                .to_string(),
            );
        }

        for template in [&self.settings.install, &self.settings.upload] {
            if !self.runner.can_run(&template.program) {
                errors.push(format!(
                    "Command '{}' is not in the allowed whitelist",
                    template.program
                ));
            }
        }

        let mut archives = Vec::new();
        let mut install_command = None;
        let mut upload_command = None;

        if let Some(package) = &package {
            match self.locator().locate(package, platform) {
                Ok(found) => archives = found,
                Err(e) => errors.push(e.to_string()),
            }

            let install_context = TemplateContext {
                package,
                platform,
                token: None,
                archives: None,
            };
            match self.settings.install.render(DeployStep::Install, &install_context) {
                Ok(command) => install_command = Some(command.display()),
                Err(e) => errors.push(e.to_string()),
            }

            if let Some(token) = &token
                && !archives.is_empty()
            {
                let upload_context = TemplateContext {
                    package,
                    platform,
                    token: Some(token),
                    archives: Some(&archives),
                };
                match self.settings.upload.render(DeployStep::Upload, &upload_context) {
                    Ok(command) => upload_command = Some(command.display()),
                    Err(e) => errors.push(e.to_string()),
                }
            }
        }

        PreflightReport {
            package,
            platform: platform.to_string(),
            token_variable: self.tokens.variable().to_string(),
            token: self.tokens.masked_token(),
            archives,
            install_command,
            upload_command,
            errors,
        }
    }
}
