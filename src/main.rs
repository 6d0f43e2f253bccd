use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

mod browser;
mod config;
mod delivery;
mod extract;
mod harvester;
mod loader;
mod models;
mod page;
mod server;
mod traits;

use config::{DEFAULT_URLS_FILENAME, HarvesterConfig, ServerConfig};
use harvester::Harvester;
use models::FlowOutcome;

#[derive(Parser)]
#[command(version, about = "Collects profile links and profile details into a local endpoint")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a company people page completely and save every profile link
    People {
        url: String,
        #[arg(short, long, default_value = DEFAULT_URLS_FILENAME)]
        filename: String,
    },
    /// Extract the fields of a single profile page
    Profile { url: String },
    /// Extract every profile listed in a collected URL file into
    /// `<stem>_profiles.json`
    Profiles { urls_file: PathBuf },
    /// Run the local collection endpoint
    Serve {
        #[arg(short, long, default_value_t = 5000)]
        port: u16,
        #[arg(long, env = "HARVESTER_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },
}

fn report(outcome: &FlowOutcome) -> Result<()> {
    if !outcome.is_success() {
        error!("{}", outcome.message());
        anyhow::bail!("{}", outcome.message());
    }
    info!("{}", outcome.message());
    println!("{}", outcome.message());
    Ok(())
}

/// Harvester whose loading stops early on Ctrl-C.
fn harvester() -> Result<Harvester> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted - finishing with the content loaded so far");
            let _ = tx.send(true);
        }
    });

    Ok(Harvester::new(HarvesterConfig::from_env()?).with_cancellation(rx))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match args.command {
        Commands::People { url, filename } => {
            info!("Starting people listing harvest");
            let outcome = harvester()?.harvest_people(&url, &filename).await?;
            report(&outcome)
        }
        Commands::Profile { url } => {
            info!("Starting single profile extraction");
            let (profile, outcome) = harvester()?.harvest_profile(&url).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
            report(&outcome)
        }
        Commands::Profiles { urls_file } => {
            info!("Starting batch profile extraction from {}", urls_file.display());
            let (output, scraped) = harvester()?.harvest_profiles(&urls_file).await?;
            println!("{} profiles saved to {}", scraped, output.display());
            Ok(())
        }
        Commands::Serve { port, data_dir } => {
            let mut config = ServerConfig::from_env();
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            server::serve(SocketAddr::from(([127, 0, 0, 1], port)), config).await
        }
    }
}
