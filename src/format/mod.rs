//! Output formatting for reports (table, JSON, markdown).
//!
//! The report carries raw numbers and a UTC timestamp. Currency symbols,
//! rounding and the Asia/Dhaka display time are applied only here.

use crate::config::OutputFormat;
use crate::daraz::Product;
use crate::report::Report;
use chrono::{DateTime, FixedOffset, Utc};

/// Placeholder for values the marketplace did not provide.
const MISSING: &str = "—";

/// Asia/Dhaka has no daylight saving time.
const DHAKA_OFFSET_SECS: i32 = 6 * 3600;

/// Formats reports for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a full report.
    pub fn format_report(&self, report: &Report) -> String {
        match self.format {
            OutputFormat::Json => self.json_report(report),
            OutputFormat::Table => self.table_report(report),
            OutputFormat::Markdown => self.markdown_report(report),
        }
    }

    // JSON formatting

    fn json_report(&self, report: &Report) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    // Table formatting

    fn table_report(&self, report: &Report) -> String {
        let mut lines = Vec::new();
        let stats = &report.stats;

        lines.push("Daraz BD Price Report".to_string());
        lines.push(format!("Generated: {}", display_time(report.generated_at)));
        lines.push(String::new());

        match &report.cheapest {
            Some(cheapest) => {
                lines.push("Cheapest listing".to_string());
                lines.extend(self.table_single(cheapest).into_iter().map(|l| format!("  {}", l)));
            }
            None => lines.push("No listings found.".to_string()),
        }
        lines.push(String::new());

        lines.push(format!("Listings:  {} {}", stats.count, pages_label(report.inspected_pages)));
        lines.push(format!("Lowest:    {}", format_price(stats.min)));
        lines.push(format!("Median:    {}", format_price(stats.median)));
        lines.push(format!("Highest:   {}", format_price(stats.max)));
        lines.push(format!("Average:   {}", format_price(stats.average.map(f64::round))));

        if !report.is_empty() {
            lines.push(String::new());
            lines.push(format!("Top {} cheapest", report.top_five.len()));
            lines.push(self.table_products(&report.top_five));

            lines.push(String::new());
            lines.push("Insights".to_string());
            lines.extend(insights(report).into_iter().map(|note| format!("  - {}", note)));

            lines.push(String::new());
            lines.push(format!(
                "Full listing inventory ({} listings, sorted by price)",
                report.products.len()
            ));
            lines.push(self.table_products(&report.products));
        }

        lines.join("\n")
    }

    fn table_single(&self, product: &Product) -> Vec<String> {
        let mut lines = Vec::new();

        lines.push(format!("Name:    {}", product.name));
        lines.push(format!("Price:   {}", format_price(Some(product.price))));
        if let Some(original) = product.original_price {
            let discount =
                product.discount_percent().map(|d| format!(" (-{}%)", d)).unwrap_or_default();
            lines.push(format!("MRP:     {}{}", format_price(Some(original)), discount));
        }

        let ships_from =
            product.location.as_deref().map(|l| format!(" - ships from {}", l)).unwrap_or_default();
        lines.push(format!(
            "Seller:  {}{}",
            product.seller_name.as_deref().unwrap_or("Unknown"),
            ships_from
        ));

        let reviews = product
            .reviews
            .filter(|r| *r > 0)
            .map(|r| format!(" ({} reviews)", group_thousands(r as u64)))
            .unwrap_or_default();
        lines.push(format!("Rating:  {}{}", rating_label(product), reviews));

        if let Some(sold) = &product.sold_text {
            lines.push(format!("Sold:    {}", sold));
        }

        lines.push(format!(
            "Badges:  {}, {}",
            product.brand.as_deref().unwrap_or("Unbranded"),
            if product.is_sponsored { "Sponsored" } else { "Organic listing" }
        ));

        if let Some(url) = &product.url {
            lines.push(format!("URL:     {}", url));
        }

        lines
    }

    fn table_products(&self, products: &[Product]) -> String {
        // Column widths
        let price_width = 10;
        let rating_width = 7;
        let reviews_width = 8;
        let location_width = 14;
        let name_width = 50;

        let mut lines = Vec::new();

        // Header
        lines.push(format!(
            "{:<price_width$}  {:<rating_width$}  {:<reviews_width$}  {:<location_width$}  {}",
            "Price", "Rating", "Reviews", "Location", "Listing"
        ));
        lines.push(format!(
            "{:-<price_width$}  {:-<rating_width$}  {:-<reviews_width$}  {:-<location_width$}  {:-<name_width$}",
            "", "", "", "", ""
        ));

        // Rows
        for product in products {
            lines.push(format!(
                "{:>price_width$}  {:>rating_width$}  {:>reviews_width$}  {:<location_width$}  {}",
                format_price(Some(product.price)),
                short_rating(product),
                review_label(product),
                truncate(product.location.as_deref().unwrap_or(MISSING), location_width),
                truncate(&product.name, name_width)
            ));
        }

        lines.join("\n")
    }

    // Markdown formatting

    fn markdown_report(&self, report: &Report) -> String {
        let mut lines = Vec::new();
        let stats = &report.stats;

        lines.push("# Daraz BD Price Report".to_string());
        lines.push(String::new());

        if let Some(cheapest) = &report.cheapest {
            lines.push("## Cheapest Listing".to_string());
            lines.push(String::new());
            lines.push(format!("**{}**", link(&cheapest.name, cheapest.url.as_deref())));
            lines.push(String::new());
            lines.extend(self.table_single(cheapest).into_iter().skip(1).map(|l| {
                let (key, value) = l.split_once(':').unwrap_or((l.as_str(), ""));
                format!("- **{}:** {}", key, value.trim())
            }));
            lines.push(String::new());
        } else {
            lines.push("_No listings found._".to_string());
            lines.push(String::new());
        }

        lines.push("## Market Summary".to_string());
        lines.push(String::new());
        lines.push("| Metric | Value |".to_string());
        lines.push("|--------|-------|".to_string());
        lines.push(format!(
            "| Listings analysed | {} {} |",
            stats.count,
            pages_label(report.inspected_pages)
        ));
        lines.push(format!("| Lowest price | {} |", format_price(stats.min)));
        lines.push(format!("| Median price | {} |", format_price(stats.median)));
        lines.push(format!("| Highest price | {} |", format_price(stats.max)));
        lines.push(format!("| Average price | {} |", format_price(stats.average.map(f64::round))));

        if !report.is_empty() {
            lines.push(String::new());
            lines.push(format!("## Top {} Cheapest", report.top_five.len()));
            lines.push(String::new());
            lines.extend(self.markdown_products(&report.top_five, false));

            lines.push(String::new());
            lines.push("## Insights & Observations".to_string());
            lines.push(String::new());
            lines.extend(insights(report).into_iter().map(|note| format!("- {}", note)));

            lines.push(String::new());
            lines.push("## Full Listing Inventory (Sorted by Price)".to_string());
            lines.push(String::new());
            lines.extend(self.markdown_products(&report.products, true));
        }

        lines.push(String::new());
        lines.push(format!(
            "*Dataset generated: {}. Timezone: Asia/Dhaka.*",
            display_time(report.generated_at)
        ));

        lines.join("\n")
    }

    fn markdown_products(&self, products: &[Product], with_sold: bool) -> Vec<String> {
        let mut lines = Vec::new();

        if with_sold {
            lines.push("| Listing | Price | Seller | Rating | Reviews | Location | Sold |".to_string());
            lines.push("|---------|-------|--------|--------|---------|----------|------|".to_string());
        } else {
            lines.push("| Listing | Price | Seller | Rating | Reviews | Location |".to_string());
            lines.push("|---------|-------|--------|--------|---------|----------|".to_string());
        }

        for product in products {
            let mut row = format!(
                "| {} | {} | {} | {} | {} | {} |",
                link(&escape_cell(&product.name), product.url.as_deref()),
                format_price(Some(product.price)),
                escape_cell(product.seller_name.as_deref().unwrap_or("Unknown")),
                short_rating(product),
                review_label(product),
                escape_cell(product.location.as_deref().unwrap_or(MISSING)),
            );
            if with_sold {
                row.push_str(&format!(
                    " {} |",
                    escape_cell(product.sold_text.as_deref().unwrap_or(MISSING))
                ));
            }
            lines.push(row);
        }

        lines
    }
}

/// Observations on where the cheapest listings sit in the market.
fn insights(report: &Report) -> Vec<String> {
    let stats = &report.stats;
    if stats.is_empty() {
        return Vec::new();
    }

    let mut notes = Vec::new();

    if let (Some(min), Some(median)) = (stats.min, stats.median) {
        if median > min {
            let below = (median - min) / median * 100.0;
            notes.push(format!(
                "The cheapest listing is {}, {:.0}% below the market median of {}.",
                format_price(Some(min)),
                below,
                format_price(Some(median))
            ));
        } else {
            notes.push(format!(
                "The cheapest listing is {}, level with the market median.",
                format_price(Some(min))
            ));
        }
    }

    if let (Some(median), Some(max)) = (stats.median, stats.max) {
        notes.push(format!(
            "The upper half of the market spans {} to {}.",
            format_price(Some(median)),
            format_price(Some(max))
        ));
    }

    if let (Some(cheapest), Some(second)) = (&report.cheapest, report.second_cheapest()) {
        notes.push(format!(
            "The two cheapest options are {} and {}.",
            format_price(Some(cheapest.price)),
            format_price(Some(second.price))
        ));
    }

    let shown = report.top_five.len();
    let sponsored = report.top_five.iter().filter(|p| p.is_sponsored).count();
    notes.push(match sponsored {
        0 => format!("All of the top {} are organic listings.", shown),
        n => format!("{} of the top {} are sponsored placements.", n, shown),
    });

    notes
}

/// Formats a price as whole taka with Indian digit grouping, e.g. `৳ 1,25,000`.
pub fn format_price(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => {
            let rounded = v.round().max(0.0) as u64;
            format!("৳ {}", group_indian(rounded))
        }
        _ => MISSING.to_string(),
    }
}

/// Renders the timestamp in Asia/Dhaka, e.g. `17 Oct 2026, 10:30`.
pub fn display_time(at: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(DHAKA_OFFSET_SECS) {
        Some(offset) => at.with_timezone(&offset).format("%-d %b %Y, %H:%M").to_string(),
        None => at.format("%-d %b %Y, %H:%M UTC").to_string(),
    }
}

/// Groups the last three digits, then pairs: 1234567 -> 12,34,567.
fn group_indian(value: u64) -> String {
    let digits = value.to_string();
    if digits.len() <= 3 {
        return digits;
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (front, pair) = rest.split_at(rest.len() - 2);
        groups.push(pair);
        rest = front;
    }
    groups.push(rest);
    groups.reverse();

    format!("{},{}", groups.join(","), tail)
}

/// Groups thousands: 12345 -> 12,345.
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn pages_label(pages: u32) -> String {
    format!("(from {} search page{})", pages, if pages == 1 { "" } else { "s" })
}

fn rating_label(product: &Product) -> String {
    match product.rating {
        Some(r) if r > 0.0 => format!("{:.2} / 5", r),
        _ => "No rating".to_string(),
    }
}

fn short_rating(product: &Product) -> String {
    match product.rating {
        Some(r) if r > 0.0 => format!("{:.2}/5", r),
        _ => MISSING.to_string(),
    }
}

fn review_label(product: &Product) -> String {
    match product.reviews {
        Some(r) if r > 0 => group_thousands(r as u64),
        _ => MISSING.to_string(),
    }
}

fn link(text: &str, url: Option<&str>) -> String {
    match url {
        Some(url) => format!("[{}]({})", text, url),
        None => text.to_string(),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}
