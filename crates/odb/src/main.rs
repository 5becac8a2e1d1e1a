mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "odb")]
#[command(about = "On-demand service broker for deployment-director backed services", long_about = None)]
struct Cli {
    /// Broker configuration file (default: discovered, see ODB_CONFIG_PATH)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the broker startup checks against both upstreams
    Check,
    /// List service instances of the offering
    Instances,
    /// List broker deployments that no instance refers to
    Orphans,
    /// Show instance counts and remaining quota
    Metrics {
        /// Print metrics as JSON
        #[arg(long)]
        json: bool,
    },
    /// Redeploy an instance on its current plan
    Upgrade {
        /// Service instance guid
        instance_id: String,
    },
    /// Delete every instance of the offering and deregister the broker
    Purge {
        /// Registered broker name (default: broker.name from configuration)
        #[arg(long)]
        broker_name: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // no configuration needed
    if matches!(cli.command, Commands::Version) {
        println!("odb {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Check => commands::check::handle(&config).await?,
        Commands::Instances => commands::manage::instances(&config).await?,
        Commands::Orphans => commands::manage::orphans(&config).await?,
        Commands::Metrics { json } => commands::manage::metrics(&config, json).await?,
        Commands::Upgrade { instance_id } => {
            commands::manage::upgrade(&config, &instance_id).await?
        }
        Commands::Purge { broker_name, yes } => {
            let broker_name = broker_name.unwrap_or_else(|| config.broker.name.clone());
            commands::purge::handle(&config, &broker_name, yes).await?
        }
        Commands::Version => unreachable!("Version is handled before config loading"),
    }

    Ok(())
}
