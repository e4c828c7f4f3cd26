//! Assembles the final [`Report`] value.

use crate::daraz::Product;
use crate::report::stats::{aggregate, Stats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of listings in the cheapest-options ranking.
pub const TOP_N: usize = 5;

/// Price report for one run.
///
/// `products` is sorted by ascending price with ties in first-seen order;
/// `cheapest` and `top_five` are always a prefix of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub inspected_pages: u32,
    pub products: Vec<Product>,
    pub cheapest: Option<Product>,
    pub top_five: Vec<Product>,
    pub stats: Stats,
}

impl Report {
    /// Runner-up listing, if there are at least two.
    pub fn second_cheapest(&self) -> Option<&Product> {
        self.top_five.get(1)
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Builds a report from deduplicated products.
///
/// `now` is used as-is so every part of the report shares one timestamp.
pub fn build(mut products: Vec<Product>, inspected_pages: u32, now: DateTime<Utc>) -> Report {
    // sort_by is stable: equal prices keep dedupe order
    products.sort_by(|a, b| a.price.total_cmp(&b.price));

    let stats = aggregate(&products);
    let cheapest = products.first().cloned();
    let top_five = products.iter().take(TOP_N).cloned().collect();

    Report { generated_at: now, inspected_pages, products, cheapest, top_five, stats }
}
