//! cloudplane AWS provider - controller manager for AWS managed resources.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use provider_aws::telemetry::{self, LogFormat};
use provider_aws::{apis, run_all, ProviderSettings};
use tracing::info;

/// Reconcile AWS infrastructure declared as Kubernetes resources.
#[derive(Parser)]
#[command(name = "provider-aws", version)]
struct Cli {
    /// Path to a provider settings file (YAML).
    #[arg(long, env = "PROVIDER_CONFIG")]
    config: Option<String>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "LOG_FORMAT")]
    log_format: LogFormat,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the controllers (default).
    Run,
    /// Print the CustomResourceDefinitions as a multi-document YAML stream.
    Crds,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Crds => print_crds(),
        Commands::Run => {
            telemetry::init(cli.log_format, cli.debug);

            let settings = match cli.config.as_deref() {
                Some(path) => ProviderSettings::from_file(path)?,
                None => ProviderSettings::default(),
            };
            settings.validate()?;
            info!(
                poll_interval_seconds = settings.poll_interval_seconds,
                concurrency = settings.concurrency,
                controllers = ?settings.controllers,
                "Starting provider-aws"
            );

            let client = kube::Client::try_default()
                .await
                .context("Failed to create Kubernetes client")?;
            run_all(client, settings).await;

            info!("provider-aws stopped");
            Ok(())
        }
    }
}

fn print_crds() -> Result<()> {
    for crd in apis::crds() {
        let yaml = serde_yaml::to_string(&crd).context("Failed to serialize CRD")?;
        println!("---\n{yaml}");
    }
    Ok(())
}
