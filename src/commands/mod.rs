//! CLI command implementations.

pub mod report;

pub use report::ReportCommand;
