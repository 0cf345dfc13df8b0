///! Reelstack CLI
///!
///! Deployment automation for the catalog site: provisions storage and a
///! document database, imports the catalog, and publishes the frontend.

mod client;
mod commands;
mod config;
mod output;
mod poller;
mod retry;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelstack_common::Error;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Control-plane server address (defaults to the configured server)
    #[arg(short, long)]
    server: Option<String>,

    /// Output format (table, json, yaml)
    #[arg(short, long)]
    output: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision, import and publish in one pass
    Deploy {
        /// Resource group to deploy into
        resource_group: String,
        /// Region for newly created resources
        #[arg(short, long)]
        region: Option<String>,
        /// Catalog CSV to import
        #[arg(long, default_value = "catalog.csv")]
        csv: PathBuf,
        /// Directory with the static frontend
        #[arg(long, default_value = "site")]
        site_dir: PathBuf,
        /// Provision only, no catalog import
        #[arg(long)]
        skip_import: bool,
        /// Provision only, no site publish
        #[arg(long)]
        skip_publish: bool,
        /// Seconds between readiness polls
        #[arg(long, default_value = "10")]
        poll_interval: u64,
        /// Seconds before a readiness wait times out
        #[arg(long, default_value = "600")]
        timeout: u64,
    },
    /// Create the storage and database resources
    Provision {
        /// Resource group to provision into
        resource_group: String,
        /// Region for newly created resources
        #[arg(short, long)]
        region: Option<String>,
        /// Seconds between readiness polls
        #[arg(long, default_value = "10")]
        poll_interval: u64,
        /// Seconds before a readiness wait times out
        #[arg(long, default_value = "600")]
        timeout: u64,
    },
    /// Show provisioning state of the deployment's resources
    Status {
        /// Resource group to inspect
        resource_group: String,
    },
    /// Import a catalog CSV into the document collection
    Import {
        /// Resource group holding the database
        resource_group: String,
        /// Catalog CSV to import
        #[arg(long)]
        csv: PathBuf,
    },
    /// Upload the static frontend to the storage resource
    Publish {
        /// Resource group holding the storage resource
        resource_group: String,
        /// Directory with the static frontend
        #[arg(long)]
        site_dir: PathBuf,
    },
    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        generate_completions(*shell);
        return Ok(());
    }

    // Load config
    let config = config::Config::load().unwrap_or_default();
    let server = cli
        .server
        .clone()
        .unwrap_or_else(|| config.default_server.clone());
    let output_format = cli
        .output
        .clone()
        .unwrap_or_else(|| config.default_output.clone());

    let token = config.resolve_token().ok_or_else(|| {
        Error::MissingConfig(
            "control-plane token (set REELSTACK_TOKEN or add token to ~/.config/reelstack/cli.toml)"
                .to_string(),
        )
    })?;

    let api = client::ControlPlaneClient::new(&server).with_token(&token);

    // Execute command
    match cli.command {
        Commands::Deploy {
            resource_group,
            region,
            csv,
            site_dir,
            skip_import,
            skip_publish,
            poll_interval,
            timeout,
        } => {
            let options = commands::deploy::DeployOptions {
                region: region.as_deref().unwrap_or(&config.default_region),
                csv_path: &csv,
                site_dir: &site_dir,
                skip_import,
                skip_publish,
                poll_interval: Duration::from_secs(poll_interval),
                timeout: Duration::from_secs(timeout),
            };
            commands::deploy::handle_deploy_command(&resource_group, options, &api).await?
        }
        Commands::Provision {
            resource_group,
            region,
            poll_interval,
            timeout,
        } => {
            commands::provision::handle_provision_command(
                &resource_group,
                region.as_deref().unwrap_or(&config.default_region),
                Duration::from_secs(poll_interval),
                Duration::from_secs(timeout),
                &api,
            )
            .await?;
        }
        Commands::Status { resource_group } => {
            commands::status::handle_status_command(&resource_group, &api, &output_format).await?
        }
        Commands::Import {
            resource_group,
            csv,
        } => {
            commands::import::handle_import_command(&resource_group, &csv, &api).await?;
        }
        Commands::Publish {
            resource_group,
            site_dir,
        } => {
            commands::publish::handle_publish_command(&resource_group, &site_dir, &api).await?
        }
        Commands::Completions { .. } => unreachable!("handled before client setup"),
    }

    Ok(())
}

/// Generate shell completions
fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    generate(shell, &mut cmd, name, &mut io::stdout());
}
