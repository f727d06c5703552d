use std::path::PathBuf;

use clap::{Parser, Subcommand};
use listing_scout::config::DEFAULT_CONFIG_FILE;
use listing_scout::{ScrapeMode, ScrapeRequest, Scraper, ScraperConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "listing-scout", about = "Scrape property listings with HTTP and headless Chrome")]
struct Cli {
    /// JSON configuration file
    #[arg(long, env = "LISTING_SCOUT_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Walk the configured results pages and save every listing
    Scrape,
    /// Newest listing on a results page, with agent contact details
    Latest {
        #[arg(long)]
        url: Option<String>,
    },
    /// Several listings from a results page
    Multiple {
        #[arg(long)]
        url: Option<String>,
        #[arg(long, default_value_t = 10)]
        count: u32,
    },
    /// Everything on a single listing page
    Detail {
        #[arg(long)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    info!("🏠 Listing Scout");
    info!("================");

    let config = ScraperConfig::load(&cli.config);
    let target = config.target_url.clone();
    let scraper = Scraper::from_config(config)?;

    match cli.command.unwrap_or(Command::Scrape) {
        Command::Scrape => {
            info!("Starting scrape of {}", target);
            let report = scraper.scrape().await;
            info!(
                "✅ Scraped {} listings over {} pages ({:?})",
                report.records, report.pages_completed, report.stop_reason
            );
            if let Some(e) = &report.persist_error {
                anyhow::bail!("records were scraped but could not be saved: {e}");
            }
            info!("💾 Saved to {}", scraper.config().output_file.display());
        }
        Command::Latest { url } => {
            let request = ScrapeRequest {
                mode: ScrapeMode::Latest,
                url: url.unwrap_or(target),
                num_listings: 1,
            };
            let response = scraper.handle(&request).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Multiple { url, count } => {
            let request = ScrapeRequest {
                mode: ScrapeMode::Multiple,
                url: url.unwrap_or(target),
                num_listings: count,
            };
            let response = scraper.handle(&request).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Detail { url } => {
            let detail = scraper.extract_detail(&url).await?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
        }
    }

    Ok(())
}
