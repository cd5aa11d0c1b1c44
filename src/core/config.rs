//! Configuration structures and types for package-deployer
//!
//! This module provides type-safe configuration management with serde support.
//! [`DeployConfig`] mirrors the `.deploy-config.yaml` file, where every field is
//! optional so layers can be merged; [`Settings`] is the fully resolved result.

use crate::core::template::CommandTemplate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Current configuration schema version
pub const CONFIG_VERSION: &str = "1.0";

/// Default environment variable holding the package name
pub const DEFAULT_PACKAGE_VARIABLE: &str = "PACKAGE";

/// Default build output directory
pub const DEFAULT_BUILD_DIR: &str = "${HOME}/miniconda/conda-bld";

/// Default target platform
pub const DEFAULT_PLATFORM: &str = "linux-64";

/// Default archive filename pattern
pub const DEFAULT_ARCHIVE_PATTERN: &str = "{package}-*-{platform}.tar.bz2";

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployConfig {
    /// Schema version (optional, an empty value leaves the lower layer in place)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Package identification (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageConfig>,

    /// Archive location (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveConfig>,

    /// Local install check command (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<CommandTemplate>,

    /// Upload settings (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadConfig>,

    /// Process execution settings (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionConfig>,

    /// Security settings (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityConfig>,
}

/// Package identification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PackageConfig {
    /// Package name (optional, read from `nameEnv` when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Environment variable holding the package name (default: PACKAGE)
    #[serde(skip_serializing_if = "Option::is_none", rename = "nameEnv")]
    pub name_env: Option<String>,
}

/// Archive location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ArchiveConfig {
    /// Directory searched for built archives (`${VAR}` expansion supported)
    #[serde(skip_serializing_if = "Option::is_none", rename = "buildDir")]
    pub build_dir: Option<String>,

    /// Platform triple, e.g. linux-64, osx-arm64
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Filename glob inside the build directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Upload settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UploadConfig {
    /// Environment variable holding the upload token (default: ANACONDA_TOKEN)
    #[serde(skip_serializing_if = "Option::is_none", rename = "tokenEnv")]
    pub token_env: Option<String>,

    /// Upload command template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandTemplate>,
}

/// Process execution settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ExecutionConfig {
    /// Per-command timeout in seconds (default: none)
    #[serde(skip_serializing_if = "Option::is_none", rename = "timeoutSecs")]
    pub timeout_secs: Option<u64>,

    /// Working directory for both commands (default: project path)
    #[serde(skip_serializing_if = "Option::is_none", rename = "workingDir")]
    pub working_dir: Option<String>,
}

/// Security settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SecurityConfig {
    /// Programs allowed in addition to the built-in whitelist
    #[serde(skip_serializing_if = "Option::is_none", rename = "allowedCommands")]
    pub allowed_commands: Option<Vec<String>>,
}

/// Empty configuration, used as the base layer for merging
impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            version: String::new(),
            package: None,
            archive: None,
            install: None,
            upload: None,
            execution: None,
            security: None,
        }
    }
}

impl DeployConfig {
    /// Configuration with every default spelled out, as written by `init`
    pub fn template() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            package: Some(PackageConfig {
                name: None,
                name_env: Some(DEFAULT_PACKAGE_VARIABLE.to_string()),
            }),
            archive: Some(ArchiveConfig {
                build_dir: Some(DEFAULT_BUILD_DIR.to_string()),
                platform: Some(DEFAULT_PLATFORM.to_string()),
                pattern: Some(DEFAULT_ARCHIVE_PATTERN.to_string()),
            }),
            install: Some(CommandTemplate::default_install()),
            upload: Some(UploadConfig {
                token_env: Some(crate::security::token_manager::DEFAULT_TOKEN_VARIABLE.to_string()),
                command: Some(CommandTemplate::default_upload()),
            }),
            execution: Some(ExecutionConfig {
                timeout_secs: None,
                working_dir: None,
            }),
            security: Some(SecurityConfig {
                allowed_commands: Some(Vec::new()),
            }),
        }
    }
}

/// Fully resolved settings used by the deploy driver
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Explicit package name, if configured
    pub package_name: Option<String>,
    /// Environment variable consulted when `package_name` is absent
    pub package_env: String,
    /// Build directory after `${VAR}` expansion
    pub build_dir: PathBuf,
    pub platform: String,
    pub archive_pattern: String,
    pub install: CommandTemplate,
    pub upload: CommandTemplate,
    pub token_env: String,
    pub timeout: Option<Duration>,
    pub working_dir: PathBuf,
    pub allowed_commands: Vec<String>,
}
