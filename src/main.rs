//! Databricks workspace provisioner
//!
//! Usage:
//! - Full provisioning: `dbx-workspace-provisioner` (same as `provision`)
//! - Custom config: `dbx-workspace-provisioner --config ./params.json provision`
//! - Validate templates only: `dbx-workspace-provisioner validate`
//! - Check a workspace: `dbx-workspace-provisioner status 1234567890`
//!
//! Account API credentials come from `DATABRICKS_ACCOUNT_USER` / `DATABRICKS_ACCOUNT_PASSWORD`
//! (or the config file).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use dbx_workspace_provisioner::config::env::{constants, ENV_CONFIG_PATH};
use dbx_workspace_provisioner::infra::{AccountsApiClient, AccountsService, CloudFormationClient, StackService};
use dbx_workspace_provisioner::services::{provisioner, StackDeployer, WorkspaceRegistrar};
use dbx_workspace_provisioner::{ProvisionConfig, ProvisionContext, ProvisionResult, Provisioner};

#[derive(Parser)]
#[command(name = "dbx-workspace-provisioner")]
#[command(about = "Provision a Databricks workspace on AWS with CloudFormation and the account API")]
#[command(version)]
struct Cli {
    /// Run-wide parameters file
    #[arg(short, long, global = true, env = ENV_CONFIG_PATH, default_value = constants::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// AWS profile (overrides aws_profile in the config file)
    #[arg(long, global = true)]
    profile: Option<String>,

    /// AWS region (overrides region_name in the config file)
    #[arg(long, global = true)]
    region: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the stacks, register them and create the workspace (default)
    Provision,

    /// Validate the four templates without creating anything
    Validate,

    /// Print the current status of a workspace
    Status {
        /// Workspace id returned by the account API
        workspace_id: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// 返回 false 表示流程结束但 workspace 没有进入 RUNNING
async fn run(cli: Cli) -> ProvisionResult<bool> {
    let mut config = ProvisionConfig::load(&cli.config)?;
    if let Some(region) = cli.region {
        config.region = region;
    }
    if let Some(profile) = cli.profile {
        config.aws_profile = Some(profile);
    }
    let config = Arc::new(config);
    let ctx = Arc::new(ProvisionContext::new());

    info!(
        version = constants::VERSION,
        run_id = %ctx.run_id,
        config = %cli.config.display(),
        region = %config.region,
        "dbx-workspace-provisioner starting"
    );

    match cli.command.unwrap_or(Commands::Provision) {
        Commands::Provision => {
            let accounts = accounts_client(&config)?;
            let stacks = stack_client(&config).await;
            let provisioner = Provisioner::new(config, stacks, accounts, ctx);

            let report = provisioner.run().await?;
            match serde_json::to_string_pretty(&report) {
                Ok(json) => debug!("Provision report:\n{}", json),
                Err(e) => debug!(error = %e, "Unable to render provision report"),
            }
            Ok(report.is_running())
        }
        Commands::Validate => {
            let deployer = StackDeployer::new(stack_client(&config).await, ctx.clone());
            provisioner::validate_templates(&config, &deployer, &ctx).await?;
            Ok(true)
        }
        Commands::Status { workspace_id } => {
            let registrar = WorkspaceRegistrar::new(config.clone(), accounts_client(&config)?, ctx.clone());
            let status = registrar.workspace_status(&workspace_id).await?;
            ctx.log_stdout(&format!(
                "Status for the workspace {} is {}",
                workspace_id, status
            ))
            .await;
            Ok(true)
        }
    }
}

/// RUST_LOG 优先；未设置或无法解析时使用 info
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

async fn stack_client(config: &ProvisionConfig) -> Arc<dyn StackService> {
    Arc::new(CloudFormationClient::new(&config.region, config.aws_profile.as_deref()).await)
}

fn accounts_client(config: &ProvisionConfig) -> ProvisionResult<Arc<dyn AccountsService>> {
    let client = AccountsApiClient::new(&config.accounts_host, config.account_credentials()?)?;
    Ok(Arc::new(client))
}
