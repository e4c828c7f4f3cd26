//! Deduplication, statistics, and report assembly.

pub mod builder;
pub mod dedupe;
pub mod pipeline;
pub mod stats;

pub use builder::{build, Report, TOP_N};
pub use dedupe::dedupe;
pub use pipeline::{generate_report, ReportPipeline, RunOutcome, RunPhase};
pub use stats::{aggregate, Stats};
