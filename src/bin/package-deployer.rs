//! Package Deployer CLI
//!
//! Installs a locally built package and uploads its archive from CI

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use package_deployer::core::config::{ArchiveConfig, ExecutionConfig, PackageConfig};
use package_deployer::{
    CONFIG_FILENAME, ConfigLoadOptions, ConfigLoader, DeployConfig, DeployDriver, DeployError,
    SafeCommandExecutor, Settings,
};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Install a locally built package and upload its archive
#[derive(Parser)]
#[command(name = "package-deployer")]
#[command(version)]
#[command(about = "Install a locally built package and upload its archive", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by deploy and check
#[derive(Args)]
struct TargetArgs {
    /// Project path (defaults to current directory)
    #[arg(value_name = "PROJECT_PATH")]
    project_path: Option<PathBuf>,

    /// Config file (defaults to ./.deploy-config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Package name (defaults to the package name environment variable)
    #[arg(short, long)]
    package: Option<String>,

    /// Directory containing the built archives
    #[arg(long)]
    build_dir: Option<String>,

    /// Platform triple used in the archive pattern (e.g. linux-64)
    #[arg(long)]
    platform: Option<String>,

    /// Per-command timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the package locally, then upload its archive
    Deploy {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Check that everything a deploy needs is in place, without running anything
    Check {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Write a default .deploy-config.yaml
    Init {
        /// Project path (defaults to current directory)
        #[arg(value_name = "PROJECT_PATH")]
        project_path: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let result = run().await;

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy { target } => deploy_command(target).await,
        Commands::Check { target } => check_command(target).await,
        Commands::Init {
            project_path,
            force,
        } => {
            let path = project_path.unwrap_or_else(|| PathBuf::from("."));
            init_command(path, force).await
        }
    }
}

impl TargetArgs {
    fn project_path(&self) -> PathBuf {
        self.project_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// CLI flags as the highest-priority config layer
    fn to_config(&self) -> Option<DeployConfig> {
        let mut config = DeployConfig::default();
        let mut has_changes = false;

        if let Some(package) = &self.package {
            config.package = Some(PackageConfig {
                name: Some(package.clone()),
                name_env: None,
            });
            has_changes = true;
        }

        if self.build_dir.is_some() || self.platform.is_some() {
            config.archive = Some(ArchiveConfig {
                build_dir: self.build_dir.clone(),
                platform: self.platform.clone(),
                pattern: None,
            });
            has_changes = true;
        }

        if let Some(timeout) = self.timeout {
            config.execution = Some(ExecutionConfig {
                timeout_secs: Some(timeout),
                working_dir: None,
            });
            has_changes = true;
        }

        if has_changes { Some(config) } else { None }
    }
}

/// Load settings and build a driver backed by the real executor
async fn build_driver(target: &TargetArgs) -> Result<DeployDriver<SafeCommandExecutor>, DeployError> {
    let env: HashMap<String, String> = env::vars().collect();

    let options = ConfigLoadOptions {
        project_path: target.project_path(),
        config_path: target.config.clone(),
        cli_args: target.to_config(),
        env: env.clone(),
    };

    let settings: Settings = ConfigLoader::load(options).await?;

    let mut executor = SafeCommandExecutor::new(&settings.working_dir)
        .map_err(|e| DeployError::config(e.to_string()))?;
    executor.allow_commands(settings.allowed_commands.iter().cloned());
    if let Some(timeout) = settings.timeout {
        executor.set_timeout(timeout);
    }
    if target.json {
        executor.redirect_stdout_to_stderr();
    }

    Ok(DeployDriver::new(settings, executor, env).with_quiet(target.json))
}

fn print_error(error: &DeployError, mask: impl Fn(&str) -> String) {
    eprintln!("\n❌ Deployment failed [{}]", error.code());
    eprintln!("  {}", mask(&error.to_string()));
    for action in error.suggested_actions() {
        eprintln!("  💡 {}", action);
    }
}

async fn deploy_command(target: TargetArgs) -> Result<i32> {
    if !target.json {
        println!("\n📦 package-deployer\n");
    }

    let driver = match build_driver(&target).await {
        Ok(driver) => driver,
        Err(e) => {
            print_error(&e, str::to_string);
            return Ok(e.exit_code());
        }
    };

    match driver.run().await {
        Ok(report) => {
            if target.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for step in &report.steps {
                    println!("  ✅ {} ({} ms): {}", step.step, step.duration_ms, step.command);
                }
                println!("\n✅ Deployment completed successfully!");
            }
            Ok(0)
        }
        Err(e) => {
            let tokens = driver.token_manager();
            print_error(&e, |text| tokens.mask_tokens_in_string(text));
            Ok(e.exit_code())
        }
    }
}

async fn check_command(target: TargetArgs) -> Result<i32> {
    let driver = match build_driver(&target).await {
        Ok(driver) => driver,
        Err(e) => {
            print_error(&e, str::to_string);
            return Ok(e.exit_code());
        }
    };

    let report = driver.preflight();
    let exit_code = if report.ready() { 0 } else { 1 };

    if target.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(exit_code);
    }

    println!("\n🔍 Deployment Check\n");
    println!(
        "  Package:  {}",
        report.package.as_deref().unwrap_or("(missing)")
    );
    println!("  Platform: {}", report.platform);
    println!(
        "  Token:    {} ({})",
        report.token.as_deref().unwrap_or("(missing)"),
        report.token_variable
    );
    for archive in &report.archives {
        println!("  Archive:  {}", archive.display());
    }
    if let Some(command) = &report.install_command {
        println!("  Install:  {}", command);
    }
    if let Some(command) = &report.upload_command {
        println!("  Upload:   {}", command);
    }

    if report.ready() {
        println!("\n✅ Ready to deploy");
    } else {
        println!("\n❌ Not ready:");
        for error in &report.errors {
            println!("  - {}", error);
        }
    }

    Ok(exit_code)
}

async fn init_command(project_path: PathBuf, force: bool) -> Result<i32> {
    println!("\n🎯 Initialize package-deployer\n");

    let config_path = project_path.join(CONFIG_FILENAME);
    if config_path.exists() && !force {
        eprintln!(
            "⚠️  {} already exists (use --force to overwrite)",
            config_path.display()
        );
        return Ok(1);
    }

    let yaml = serde_yaml::to_string(&DeployConfig::template())
        .context("failed to serialize default configuration")?;
    let content = format!(
        "# package-deployer configuration\n# Placeholders: {{package}} {{platform}} {{token}} {{archives}}\n{}",
        yaml
    );

    tokio::fs::write(&config_path, content)
        .await
        .with_context(|| format!("failed to write {}", config_path.display()))?;

    println!("✅ Created {}", config_path.display());
    Ok(0)
}
