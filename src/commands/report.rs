//! Report command implementation.

use crate::config::Config;
use crate::daraz::{DarazClient, PageFetcher};
use crate::format::Formatter;
use crate::report::ReportPipeline;
use anyhow::{Context, Result};
use tracing::{info, warn};

/// Builds and renders a price report.
pub struct ReportCommand {
    config: Config,
}

impl ReportCommand {
    /// Creates a new report command.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Runs the report and returns formatted output.
    pub async fn execute(&self) -> Result<String> {
        let client =
            DarazClient::new(&self.config).await.context("Failed to create HTTP client")?;

        self.execute_with_fetcher(&client).await
    }

    /// Runs the report with a provided fetcher (for testing).
    pub async fn execute_with_fetcher(&self, fetcher: &impl PageFetcher) -> Result<String> {
        info!("Building report for: {}", self.config.query);

        let mut pipeline = ReportPipeline::new(&self.config)?;
        let outcome = pipeline
            .run(fetcher)
            .await
            .with_context(|| format!("No report could be built for \"{}\"", self.config.query))?;

        for failure in &outcome.failures {
            warn!("Skipped {}", failure);
        }
        if outcome.dropped_listings > 0 {
            warn!("Dropped {} listings with missing id or price", outcome.dropped_listings);
        }

        let formatter = Formatter::new(self.config.format);
        Ok(formatter.format_report(&outcome.report))
    }
}
