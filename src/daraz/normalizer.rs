//! Validation boundary between raw listings and [`Product`].

use crate::daraz::models::{Product, RawListing};
use std::fmt;
use tracing::{trace, warn};

/// Why a raw listing was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingId,
    MissingPrice,
    InvalidPrice,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingId => write!(f, "missing item id"),
            DropReason::MissingPrice => write!(f, "missing price"),
            DropReason::InvalidPrice => write!(f, "unparsable price"),
        }
    }
}

/// Turns raw listings into products, resolving relative links against a base URL.
#[derive(Debug, Clone)]
pub struct Normalizer {
    base_url: String,
}

impl Normalizer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    /// Returns the product, or `None` when a required field is missing or unparsable.
    pub fn normalize(&self, raw: RawListing) -> Option<Product> {
        match self.try_normalize(raw) {
            Ok(product) => Some(product),
            Err((id, reason)) => {
                warn!("Dropping listing {}: {}", id.as_deref().unwrap_or("<no id>"), reason);
                None
            }
        }
    }

    /// Same as [`normalize`](Self::normalize) but reports why a listing was dropped.
    pub fn try_normalize(
        &self,
        raw: RawListing,
    ) -> Result<Product, (Option<String>, DropReason)> {
        let id = match clean(raw.id) {
            Some(id) => id,
            None => return Err((None, DropReason::MissingId)),
        };

        let price = match clean(raw.price) {
            Some(text) => match parse_price(&text) {
                Some(price) => price,
                None => return Err((Some(id), DropReason::InvalidPrice)),
            },
            None => return Err((Some(id), DropReason::MissingPrice)),
        };

        let name = clean(raw.name).unwrap_or_else(|| "Unknown".to_string());
        trace!("Normalized listing {} at {}", id, price);

        Ok(Product {
            id,
            name,
            price,
            original_price: clean(raw.original_price).and_then(|p| parse_price(&p)),
            image: clean(raw.image).map(|u| self.resolve_url(&u)),
            url: clean(raw.url).map(|u| self.resolve_url(&u)),
            seller_name: clean(raw.seller_name),
            location: clean(raw.location),
            rating: clean(raw.rating).and_then(|r| parse_rating(&r)),
            reviews: clean(raw.reviews).and_then(|r| parse_reviews(&r)),
            sold_text: clean(raw.sold_text),
            brand: clean(raw.brand),
            is_sponsored: clean(raw.is_sponsored).is_some_and(|s| parse_flag(&s)),
        })
    }

    /// Resolves protocol-relative and site-relative links.
    fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("//") {
            format!("https:{}", url)
        } else if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            url.to_string()
        }
    }
}

/// Trims and drops blank values.
fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parses a price like "৳ 1,250", "Tk. 349.00" or "300 - 450" (lower bound).
///
/// Only the first amount counts, so "৳ 349 ৳ 650" reads as 349.
pub fn parse_price(text: &str) -> Option<f64> {
    let mut tokens = text
        .split(|c: char| !(c.is_ascii_digit() || c == '.' || c == ',' || c == '-'))
        .filter(|t| !t.is_empty());

    let mut negative = false;
    let amount = loop {
        let token = tokens.next()?;
        if token.chars().any(|c| c.is_ascii_digit()) {
            break token;
        }
        // A lone minus right before the amount ("- 50")
        negative = token == "-";
    };

    // A leading minus is a negative amount, not a range
    if negative || amount.starts_with('-') {
        return None;
    }

    let first = amount.split('-').next()?;
    let normalized = first.replace(',', "");
    // "Tk." leaves a stray leading dot behind
    let normalized = normalized.trim_start_matches('.');
    if normalized.is_empty() {
        return None;
    }

    let value: f64 = normalized.parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Parses a star rating and clamps it to [0, 5].
fn parse_rating(text: &str) -> Option<f64> {
    let value: f64 = text.replace(',', ".").parse().ok()?;
    value.is_finite().then(|| value.clamp(0.0, 5.0))
}

/// Parses a review count like "87", "(1,204)"; negatives are treated as absent.
fn parse_reviews(text: &str) -> Option<u32> {
    let cleaned: String =
        text.trim_matches(|c| c == '(' || c == ')').chars().filter(|c| *c != ',').collect();
    let value: i64 = cleaned.trim().parse().ok()?;
    u32::try_from(value).ok()
}

pub(crate) fn parse_flag(text: &str) -> bool {
    matches!(text.to_lowercase().as_str(), "true" | "1" | "yes")
}
