//! Collapses listings surfaced on more than one search page.

use crate::daraz::Product;
use std::collections::HashSet;
use tracing::debug;

/// Keeps the first product seen for each id, preserving first-seen order.
pub fn dedupe(products: impl IntoIterator<Item = Product>) -> Vec<Product> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    let mut duplicates = 0usize;

    for product in products {
        if seen.insert(product.id.clone()) {
            unique.push(product);
        } else {
            duplicates += 1;
        }
    }

    if duplicates > 0 {
        debug!("Removed {} duplicate listings", duplicates);
    }
    unique
}
