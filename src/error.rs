//! Error taxonomy for the scrape-and-aggregate pipeline.
//!
//! Only [`ReportError`] escapes a report run. Fetch and extract errors are
//! soft failures: the page is skipped and recorded, the run continues.

use thiserror::Error;

/// Why a single fetch attempt failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchCause {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchCause {
    /// Returns true if another attempt may succeed.
    ///
    /// Timeouts, transport errors, rate limiting (429) and server errors are
    /// retried. Every other status is final.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchCause::Timeout | FetchCause::Transport(_) => true,
            FetchCause::Status(status) => *status == 429 || *status >= 500,
        }
    }
}

/// A search page could not be fetched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to fetch page {page}: {cause}")]
pub struct FetchError {
    pub page: u32,
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(page: u32, cause: FetchCause) -> Self {
        Self { page, cause }
    }

    pub fn is_transient(&self) -> bool {
        self.cause.is_transient()
    }
}

/// A fetched page does not have the expected structure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no listing container found in page")]
    MissingContainer,

    #[error("anti-bot challenge page returned instead of results")]
    Blocked,

    #[error("embedded listing payload is malformed: {0}")]
    InvalidPayload(String),
}

/// A page that contributed nothing to the report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("page {page}: {error}")]
    Extract { page: u32, error: ExtractError },

    #[error("page {page}: abandoned at run deadline")]
    DeadlineExceeded { page: u32 },
}

impl PageFailure {
    pub fn page(&self) -> u32 {
        match self {
            PageFailure::Fetch(e) => e.page,
            PageFailure::Extract { page, .. } | PageFailure::DeadlineExceeded { page } => *page,
        }
    }
}

/// Fatal failures of a report run.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("no products found across {inspected} of {attempted} search pages")]
    EmptyResult { attempted: u32, inspected: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
