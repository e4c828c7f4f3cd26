//! daraz-report - Stateless Daraz search scraper and price report builder
//!
//! Fetches a bounded number of search result pages, normalizes every
//! listing, and summarizes the deduplicated set into a [`Report`].

pub mod commands;
pub mod config;
pub mod daraz;
pub mod error;
pub mod format;
pub mod report;

pub use config::Config;
pub use daraz::{PageFetcher, Product, RawListing};
pub use error::{ExtractError, FetchError, PageFailure, ReportError};
pub use report::{generate_report, Report, Stats};
