//! daraz-report - Stateless Daraz search scraper and price report builder
//!
//! A Rust implementation with TLS fingerprint emulation for reliable scraping.

use anyhow::Result;
use clap::{Parser, Subcommand};
use daraz_report::commands::ReportCommand;
use daraz_report::config::{Config, OutputFormat};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "daraz-report",
    version,
    about = "Price report for Daraz Bangladesh search results",
    long_about = "Scrapes Daraz search pages for a query and reports the cheapest listings and price distribution."
)]
struct Cli {
    /// Proxy URL (e.g., socks5://host:port)
    #[arg(long, global = true, env = "DARAZ_PROXY")]
    proxy: Option<String>,

    /// Delay between requests in milliseconds
    #[arg(long, global = true, env = "DARAZ_DELAY")]
    delay: Option<u64>,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a price report for a search query
    #[command(alias = "r")]
    Report {
        /// Search query (defaults to the configured query)
        query: Option<String>,

        /// Number of search pages to inspect
        #[arg(short, long)]
        pages: Option<u32>,

        /// Pages fetched in parallel
        #[arg(long)]
        concurrency: Option<usize>,

        /// Retries per page after a transient failure
        #[arg(long)]
        retries: Option<u32>,

        /// Timeout per fetch attempt in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Overall run deadline in milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(delay) = cli.delay {
        config.delay_ms = delay;
    }
    if let Some(proxy) = cli.proxy {
        config.proxy = Some(proxy);
    }

    match cli.command {
        Commands::Report { query, pages, concurrency, retries, timeout_ms, deadline_ms } => {
            if let Some(query) = query {
                config.query = query;
            }
            if let Some(pages) = pages {
                config.max_pages = pages;
            }
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            if let Some(retries) = retries {
                config.retry_budget = retries;
            }
            if let Some(timeout_ms) = timeout_ms {
                config.page_timeout_ms = timeout_ms;
            }
            if deadline_ms.is_some() {
                config.deadline_ms = deadline_ms;
            }

            let cmd = ReportCommand::new(config);
            let output = cmd.execute().await?;
            println!("{}", output);
        }
    }

    Ok(())
}
