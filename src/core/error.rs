//! Error handling for package deployment
//!
//! This module provides the deployment error taxonomy with recovery guidance
//! using the thiserror crate for ergonomic error handling.

use crate::core::traits::DeployStep;
use crate::security::command_executor::CommandError;
use thiserror::Error;

/// Main error type for deployment operations
#[derive(Error, Debug)]
pub enum DeployError {
    // Configuration errors
    #[error("設定エラー: {message}")]
    Config { message: String },

    // Input errors
    #[error("パッケージ名が指定されていません（環境変数 {variable}）")]
    PackageNameMissing { variable: String },

    #[error("無効なパッケージ名です: {name} ({reason})")]
    InvalidPackageName { name: String, reason: String },

    // Upload prerequisites
    #[error("[upload] 認証トークンが設定されていません（環境変数 {variable}）")]
    TokenMissing { variable: String },

    #[error("[upload] アーカイブが見つかりません: {pattern}")]
    ArchiveNotFound { pattern: String },

    // Step execution errors
    #[error("[{step}] コマンドが失敗しました（終了コード: {}）", exit_code_label(.code))]
    StepFailed { step: DeployStep, code: Option<i32> },

    #[error("[{step}] コマンド実行エラー: {source}")]
    Command {
        step: DeployStep,
        #[source]
        source: CommandError,
    },
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "シグナルにより終了".to_string(),
    }
}

impl DeployError {
    /// Shorthand for configuration errors
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Get the step this error belongs to, if any
    pub fn step(&self) -> Option<DeployStep> {
        match self {
            Self::TokenMissing { .. } | Self::ArchiveNotFound { .. } => Some(DeployStep::Upload),
            Self::StepFailed { step, .. } | Self::Command { step, .. } => Some(*step),
            Self::Config { .. } | Self::PackageNameMissing { .. } | Self::InvalidPackageName { .. } => {
                None
            }
        }
    }

    /// Process exit code for this error.
    ///
    /// A failed step propagates the child's own exit code; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StepFailed {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::Config { .. } => vec![
                ".deploy-config.yaml の内容を確認してください",
                "package-deployer init で既定の設定を生成できます",
            ],
            Self::PackageNameMissing { .. } => vec![
                "--package オプションでパッケージ名を指定してください",
                "CI の設定でパッケージ名の環境変数を設定してください",
            ],
            Self::InvalidPackageName { .. } => {
                vec!["英数字、ドット、ハイフン、アンダースコア、プラスのみ使用できます"]
            }
            Self::TokenMissing { .. } => vec![
                "CI のシークレットにアップロードトークンを登録してください",
                "トークンが空文字列になっていないか確認してください",
            ],
            Self::ArchiveNotFound { .. } => vec![
                "ビルドステップが成功しているか確認してください",
                "--build-dir と --platform の指定を確認してください",
            ],
            Self::StepFailed {
                step: DeployStep::Install,
                ..
            } => vec![
                "インストールコマンドの出力を確認してください",
                "ローカルチャンネルにパッケージがビルドされているか確認してください",
            ],
            Self::StepFailed {
                step: DeployStep::Upload,
                ..
            } => vec![
                "アップロードクライアントの出力を確認してください",
                "トークンの権限と有効期限を確認してください",
                "同じバージョンが既にアップロードされていないか確認してください",
            ],
            Self::Command { .. } => vec![
                "コマンドがインストールされ PATH に含まれているか確認してください",
                "security.allowedCommands の設定を確認してください",
            ],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "CONFIG_ERROR",
            Self::PackageNameMissing { .. } => "PACKAGE_NAME_MISSING",
            Self::InvalidPackageName { .. } => "INVALID_PACKAGE_NAME",
            Self::TokenMissing { .. } => "TOKEN_MISSING",
            Self::ArchiveNotFound { .. } => "ARCHIVE_NOT_FOUND",
            Self::StepFailed { .. } => "STEP_FAILED",
            Self::Command { .. } => "COMMAND_ERROR",
        }
    }
}
