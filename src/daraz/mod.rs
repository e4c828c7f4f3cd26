//! Daraz-specific modules for page fetching, listing extraction, and normalization.

pub mod client;
pub mod extractor;
pub mod models;
pub mod normalizer;
pub mod selectors;

pub use client::{fetch_with_retry, DarazClient, PageFetcher, RetryPolicy};
pub use extractor::extract;
pub use models::{Product, RawListing};
pub use normalizer::{DropReason, Normalizer};
