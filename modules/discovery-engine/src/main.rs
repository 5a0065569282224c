use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use discovery_engine::{
    BatchOptions, BusinessQuery, DiscoveryConfig, DiscoveryEngine, DiscoveryOptions, ProviderCredentials,
};

#[derive(Parser)]
#[command(name = "discover", about = "Find a business's review and social profiles")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Look up one business
    Lookup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        website: Option<String>,
        #[arg(long)]
        place_id: Option<String>,
        /// Only read links from the website (no guesses, no search APIs)
        #[arg(long)]
        website_only: bool,
        /// Ignore any cached result
        #[arg(long)]
        no_cache: bool,
    },
    /// Look up every business in a JSON array file
    Batch {
        file: PathBuf,
        #[arg(long)]
        clear_cache: bool,
    },
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("discovery_engine=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let config = DiscoveryConfig::from_env();
    let credentials = ProviderCredentials::from_env();
    credentials.log_redacted();

    let engine = DiscoveryEngine::new(config).context("Failed to build discovery engine")?;

    match cli.command {
        Command::Lookup {
            name,
            address,
            website,
            place_id,
            website_only,
            no_cache,
        } => {
            let query = BusinessQuery {
                name,
                address,
                website,
                place_id,
            };
            info!(business = %query.name, website_only, "Looking up business");
            let options = DiscoveryOptions {
                website_only,
                bypass_cache: no_cache,
            };
            let result = engine
                .discover_with_options(&query, &credentials, options)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Batch { file, clear_cache } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let queries: Vec<BusinessQuery> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON array of businesses", file.display()))?;

            let report = engine
                .discover_batch(
                    queries,
                    &credentials,
                    BatchOptions {
                        clear_cache_first: clear_cache,
                    },
                )
                .await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
