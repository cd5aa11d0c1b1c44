//! Configuration file loader for package-deployer
//!
//! This module provides configuration loading, validation, and merging capabilities.

use super::config::*;
use crate::core::error::DeployError;
use crate::core::template::CommandTemplate;
use crate::security::token_manager::DEFAULT_TOKEN_VARIABLE;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::fs;

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".deploy-config.yaml";

/// Environment variable pattern (${VAR_NAME})
const ENV_VAR_PATTERN: &str = r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}";

static ENV_VAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ENV_VAR_PATTERN).expect("env var pattern is valid"));

/// Platform triple, e.g. linux-64, osx-arm64, noarch
static PLATFORM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("platform pattern is valid"));

/// Placeholders accepted in the install command
const INSTALL_PLACEHOLDERS: &[&str] = &["package", "platform"];

/// Placeholders accepted in the upload command
const UPLOAD_PLACEHOLDERS: &[&str] = &["package", "platform", "token", "archives"];

/// Placeholders accepted in the archive pattern
const PATTERN_PLACEHOLDERS: &[&str] = &["package", "platform"];

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Project path to load config from
    pub project_path: PathBuf,

    /// Explicit config file, replaces the project config lookup
    pub config_path: Option<PathBuf>,

    /// CLI arguments (highest priority)
    pub cli_args: Option<DeployConfig>,

    /// Environment variables
    pub env: HashMap<String, String>,
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "upload.command.args")
    pub field: String,

    /// Error message
    pub message: String,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and resolve configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables (DEPLOY_*)
    /// 3. Project config (./.deploy-config.yaml, or the explicit --config file)
    /// 4. Global config (~/.deploy-config.yaml)
    /// 5. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<Settings, DeployError> {
        let mut configs: Vec<DeployConfig> = Vec::new();

        // 5. Default values (lowest priority)
        configs.push(DeployConfig::default());

        // 4. Global config
        if let Some(global_config) = Self::load_global_config(&options.env).await? {
            configs.push(global_config);
        }

        // 3. Project config
        let project_config = match &options.config_path {
            Some(path) => Some(
                Self::load_config_file(path)
                    .await?
                    .ok_or_else(|| {
                        DeployError::config(format!("config file not found: {}", path.display()))
                    })?,
            ),
            None => Self::load_project_config(&options.project_path).await?,
        };
        if let Some(project_config) = project_config {
            configs.push(project_config);
        }

        // 2. Environment variables
        if let Some(env_config) = Self::load_env_config(&options.env)? {
            configs.push(env_config);
        }

        // 1. CLI arguments (highest priority)
        if let Some(cli_config) = options.cli_args {
            configs.push(cli_config);
        }

        let merged = Self::merge_configs(configs);

        let validation = Self::validate(&merged);
        for warning in &validation.warnings {
            tracing::warn!(field = %warning.field, "{}", warning.message);
        }
        if !validation.valid {
            return Err(DeployError::config(Self::format_validation_result(&validation)));
        }

        Self::resolve(merged, &options.env, &options.project_path)
    }

    /// Load global configuration from ~/.deploy-config.yaml
    async fn load_global_config(
        env: &HashMap<String, String>,
    ) -> Result<Option<DeployConfig>, DeployError> {
        let Some(home_dir) = env.get("HOME") else {
            tracing::debug!("HOME is not set, skipping global config");
            return Ok(None);
        };
        let global_config_path = PathBuf::from(home_dir).join(CONFIG_FILENAME);

        Self::load_config_file(&global_config_path).await
    }

    /// Load project configuration from ./.deploy-config.yaml
    async fn load_project_config(project_path: &Path) -> Result<Option<DeployConfig>, DeployError> {
        let project_config_path = project_path.join(CONFIG_FILENAME);

        Self::load_config_file(&project_config_path).await
    }

    /// Load configuration from YAML file
    async fn load_config_file(file_path: &Path) -> Result<Option<DeployConfig>, DeployError> {
        if !file_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(file_path).await.map_err(|e| {
            DeployError::config(format!(
                "Failed to read config file {}: {}",
                file_path.display(),
                e
            ))
        })?;

        let config: DeployConfig = serde_yaml::from_str(&content).map_err(|e| {
            DeployError::config(format!(
                "Failed to parse YAML config {}: {}",
                file_path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %file_path.display(), "loaded config file");
        Ok(Some(config))
    }

    /// Load configuration from environment variables
    fn load_env_config(env: &HashMap<String, String>) -> Result<Option<DeployConfig>, DeployError> {
        let mut config = DeployConfig::default();
        let mut has_changes = false;

        // DEPLOY_BUILD_DIR -> archive.buildDir
        if let Some(build_dir) = env.get("DEPLOY_BUILD_DIR") {
            config.archive.get_or_insert_with(ArchiveConfig::default).build_dir =
                Some(build_dir.clone());
            has_changes = true;
        }

        // DEPLOY_PLATFORM -> archive.platform
        if let Some(platform) = env.get("DEPLOY_PLATFORM") {
            config.archive.get_or_insert_with(ArchiveConfig::default).platform =
                Some(platform.clone());
            has_changes = true;
        }

        // DEPLOY_TIMEOUT_SECS -> execution.timeoutSecs
        if let Some(timeout) = env.get("DEPLOY_TIMEOUT_SECS") {
            let secs = timeout.trim().parse::<u64>().map_err(|_| {
                DeployError::config(format!(
                    "DEPLOY_TIMEOUT_SECS must be a whole number of seconds, got {:?}",
                    timeout
                ))
            })?;
            config.execution.get_or_insert_with(ExecutionConfig::default).timeout_secs = Some(secs);
            has_changes = true;
        }

        Ok(if has_changes { Some(config) } else { None })
    }

    /// Merge multiple configurations with priority
    fn merge_configs(configs: Vec<DeployConfig>) -> DeployConfig {
        let mut result = DeployConfig {
            version: CONFIG_VERSION.to_string(),
            ..Default::default()
        };

        for config in configs {
            Self::merge_into(&mut result, config);
        }

        result
    }

    /// Merge source config into target, field by field
    fn merge_into(target: &mut DeployConfig, source: DeployConfig) {
        // Version
        if !source.version.is_empty() {
            target.version = source.version;
        }

        // Package
        if let Some(source_package) = source.package {
            let target_package = target.package.get_or_insert_with(PackageConfig::default);
            if source_package.name.is_some() {
                target_package.name = source_package.name;
            }
            if source_package.name_env.is_some() {
                target_package.name_env = source_package.name_env;
            }
        }

        // Archive
        if let Some(source_archive) = source.archive {
            let target_archive = target.archive.get_or_insert_with(ArchiveConfig::default);
            if source_archive.build_dir.is_some() {
                target_archive.build_dir = source_archive.build_dir;
            }
            if source_archive.platform.is_some() {
                target_archive.platform = source_archive.platform;
            }
            if source_archive.pattern.is_some() {
                target_archive.pattern = source_archive.pattern;
            }
        }

        // Install command replaces as a whole
        if source.install.is_some() {
            target.install = source.install;
        }

        // Upload
        if let Some(source_upload) = source.upload {
            let target_upload = target.upload.get_or_insert_with(UploadConfig::default);
            if source_upload.token_env.is_some() {
                target_upload.token_env = source_upload.token_env;
            }
            if source_upload.command.is_some() {
                target_upload.command = source_upload.command;
            }
        }

        // Execution
        if let Some(source_execution) = source.execution {
            let target_execution = target.execution.get_or_insert_with(ExecutionConfig::default);
            if source_execution.timeout_secs.is_some() {
                target_execution.timeout_secs = source_execution.timeout_secs;
            }
            if source_execution.working_dir.is_some() {
                target_execution.working_dir = source_execution.working_dir;
            }
        }

        // Allowed commands accumulate across layers
        if let Some(source_security) = source.security
            && let Some(commands) = source_security.allowed_commands
        {
            let target_commands = target
                .security
                .get_or_insert_with(SecurityConfig::default)
                .allowed_commands
                .get_or_insert_with(Vec::new);
            for command in commands {
                if !target_commands.contains(&command) {
                    target_commands.push(command);
                }
            }
        }
    }

    /// Resolve merged configuration into concrete settings
    fn resolve(
        config: DeployConfig,
        env: &HashMap<String, String>,
        project_path: &Path,
    ) -> Result<Settings, DeployError> {
        let package = config.package.unwrap_or_default();
        let archive = config.archive.unwrap_or_default();
        let upload = config.upload.unwrap_or_default();
        let execution = config.execution.unwrap_or_default();
        let security = config.security.unwrap_or_default();

        let build_dir = Self::expand_string(
            archive.build_dir.as_deref().unwrap_or(DEFAULT_BUILD_DIR),
            env,
        )?;
        let working_dir = match execution.working_dir {
            Some(dir) => project_path.join(Self::expand_string(&dir, env)?),
            None => project_path.to_path_buf(),
        };

        Ok(Settings {
            package_name: package.name.filter(|n| !n.trim().is_empty()),
            package_env: package
                .name_env
                .unwrap_or_else(|| DEFAULT_PACKAGE_VARIABLE.to_string()),
            build_dir: project_path.join(build_dir),
            platform: archive
                .platform
                .unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
            archive_pattern: archive
                .pattern
                .unwrap_or_else(|| DEFAULT_ARCHIVE_PATTERN.to_string()),
            install: config.install.unwrap_or_else(CommandTemplate::default_install),
            upload: upload.command.unwrap_or_else(CommandTemplate::default_upload),
            token_env: upload
                .token_env
                .unwrap_or_else(|| DEFAULT_TOKEN_VARIABLE.to_string()),
            timeout: execution.timeout_secs.map(Duration::from_secs),
            working_dir,
            allowed_commands: security.allowed_commands.unwrap_or_default(),
        })
    }

    /// Expand environment variables in a single string
    ///
    /// Only `${VAR_NAME}` references are expanded; an unset variable is an error
    /// so that a missing `HOME` does not silently produce a relative path.
    fn expand_string(input: &str, env: &HashMap<String, String>) -> Result<String, DeployError> {
        let mut result = input.to_string();
        for cap in ENV_VAR_REGEX.captures_iter(input) {
            let var_name = &cap[1];
            let value = env.get(var_name).ok_or_else(|| {
                DeployError::config(format!(
                    "environment variable {} referenced in {:?} is not set",
                    var_name, input
                ))
            })?;
            result = result.replace(&format!("${{{}}}", var_name), value);
        }

        Ok(result)
    }

    /// Validate configuration
    pub fn validate(config: &DeployConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Check version
        if !config.version.is_empty() && config.version != CONFIG_VERSION {
            warnings.push(ConfigValidationWarning {
                field: "version".to_string(),
                message: format!("Unknown version: {}", config.version),
                suggestion: Some("Currently supported version is \"1.0\" only".to_string()),
            });
        }

        // 2. Variable names
        let package_env = config.package.as_ref().and_then(|p| p.name_env.as_deref());
        let token_env = config.upload.as_ref().and_then(|u| u.token_env.as_deref());
        for (field, value) in [("package.nameEnv", package_env), ("upload.tokenEnv", token_env)] {
            if value.is_some_and(|v| v.trim().is_empty()) {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: "Environment variable name must not be empty".to_string(),
                });
            }
        }

        // 3. Commands
        if let Some(install) = &config.install {
            Self::validate_command("install", install, INSTALL_PLACEHOLDERS, &mut errors);
        }
        let upload = config
            .upload
            .as_ref()
            .and_then(|u| u.command.clone())
            .unwrap_or_else(CommandTemplate::default_upload);
        Self::validate_command("upload.command", &upload, UPLOAD_PLACEHOLDERS, &mut errors);

        let upload_placeholders = upload.placeholders();
        if !upload_placeholders.iter().any(|p| p == "archives") {
            warnings.push(ConfigValidationWarning {
                field: "upload.command.args".to_string(),
                message: "Upload command does not reference {archives}".to_string(),
                suggestion: Some("Add \"{archives}\" as an argument".to_string()),
            });
        }
        if !upload_placeholders.iter().any(|p| p == "token") {
            warnings.push(ConfigValidationWarning {
                field: "upload.command.args".to_string(),
                message: "Upload command does not reference {token}".to_string(),
                suggestion: Some("Pass the token with \"-t\", \"{token}\"".to_string()),
            });
        }

        // 4. Archive pattern and platform
        if let Some(platform) = config.archive.as_ref().and_then(|a| a.platform.as_deref())
            && !PLATFORM_REGEX.is_match(platform)
        {
            errors.push(ConfigValidationError {
                field: "archive.platform".to_string(),
                message: format!(
                    "Invalid platform {:?}: only letters, digits, '-' and '_' are allowed",
                    platform
                ),
            });
        }
        if let Some(pattern) = config.archive.as_ref().and_then(|a| a.pattern.as_deref()) {
            Self::validate_pattern(pattern, &mut errors, &mut warnings);
        }

        // 5. Execution
        if config
            .execution
            .as_ref()
            .and_then(|e| e.timeout_secs)
            .is_some_and(|t| t == 0)
        {
            errors.push(ConfigValidationError {
                field: "execution.timeoutSecs".to_string(),
                message: "Timeout must be greater than zero".to_string(),
            });
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn validate_command(
        field: &str,
        command: &CommandTemplate,
        allowed: &[&str],
        errors: &mut Vec<ConfigValidationError>,
    ) {
        if command.program.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: format!("{}.program", field),
                message: "Program is required".to_string(),
            });
        }

        for placeholder in command.placeholders() {
            if !allowed.contains(&placeholder.as_str()) {
                errors.push(ConfigValidationError {
                    field: format!("{}.args", field),
                    message: format!("Placeholder {{{}}} is not available here", placeholder),
                });
            }
        }
    }

    fn validate_pattern(
        pattern: &str,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        if pattern.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "archive.pattern".to_string(),
                message: "Archive pattern must not be empty".to_string(),
            });
            return;
        }

        let as_template = CommandTemplate::new("pattern", &[pattern]);
        for placeholder in as_template.placeholders() {
            if !PATTERN_PLACEHOLDERS.contains(&placeholder.as_str()) {
                errors.push(ConfigValidationError {
                    field: "archive.pattern".to_string(),
                    message: format!("Placeholder {{{}}} is not available here", placeholder),
                });
            }
        }

        if !pattern.contains("{package}") {
            warnings.push(ConfigValidationWarning {
                field: "archive.pattern".to_string(),
                message: "Archive pattern does not include {package}".to_string(),
                suggestion: Some("Archives of other packages may be uploaded".to_string()),
            });
        }
    }

    /// Format validation result for display
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if !result.errors.is_empty() {
            lines.push("Configuration errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
            }
        }

        if !result.warnings.is_empty() {
            lines.push("Configuration warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}
