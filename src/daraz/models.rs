//! Data models for raw and normalized Daraz listings.

use serde::{Deserialize, Serialize};

/// Unvalidated field bag for one listing block on a search page.
///
/// Every field is captured as text exactly as the page provided it.
/// Nothing here is trusted until [`normalize`](super::normalizer::normalize)
/// has turned it into a [`Product`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawListing {
    pub id: Option<String>,
    pub name: Option<String>,
    pub price: Option<String>,
    pub original_price: Option<String>,
    pub image: Option<String>,
    pub url: Option<String>,
    pub seller_name: Option<String>,
    pub location: Option<String>,
    pub rating: Option<String>,
    pub reviews: Option<String>,
    pub sold_text: Option<String>,
    pub brand: Option<String>,
    pub is_sponsored: Option<String>,
}

/// Canonical listing used throughout aggregation.
///
/// `price` is always present and non-negative. Every other field may be
/// absent and consumers must render that as "unknown".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Marketplace item id
    pub id: String,
    /// Listing title
    pub name: String,
    /// Current total price
    pub price: f64,
    /// Pre-discount listed price
    pub original_price: Option<f64>,
    /// Listing image URL
    pub image: Option<String>,
    /// Listing URL
    pub url: Option<String>,
    pub seller_name: Option<String>,
    pub location: Option<String>,
    /// Star rating (0.0 - 5.0)
    pub rating: Option<f64>,
    pub reviews: Option<u32>,
    /// Marketplace sales label, e.g. "1.2K sold"
    pub sold_text: Option<String>,
    pub brand: Option<String>,
    pub is_sponsored: bool,
}

impl Product {
    /// Creates a product with only the required fields set.
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            original_price: None,
            image: None,
            url: None,
            seller_name: None,
            location: None,
            rating: None,
            reviews: None,
            sold_text: None,
            brand: None,
            is_sponsored: false,
        }
    }

    /// Returns discount percentage if listed below its original price.
    pub fn discount_percent(&self) -> Option<u8> {
        let original = self.original_price?;
        if original <= 0.0 || original <= self.price {
            return None;
        }
        let discount = ((original - self.price) / original * 100.0).round() as u8;
        Some(discount.min(99))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_percent() {
        let mut product = Product::new("1", "Ice Roller", 300.0);
        assert!(product.discount_percent().is_none());

        product.original_price = Some(600.0);
        assert_eq!(product.discount_percent(), Some(50));

        // Original below current price is not a discount
        product.original_price = Some(200.0);
        assert!(product.discount_percent().is_none());
    }

    #[test]
    fn test_discount_percent_clamping() {
        let mut product = Product::new("1", "Ice Roller", 1.0);
        product.original_price = Some(1000.0);
        assert_eq!(product.discount_percent(), Some(99));
    }

    #[test]
    fn test_product_serializes_camel_case() {
        let mut product = Product::new("153", "Ice Roller", 250.0);
        product.sold_text = Some("120 sold".into());
        product.is_sponsored = true;

        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["id"], "153");
        assert_eq!(json["price"], 250.0);
        assert_eq!(json["soldText"], "120 sold");
        assert_eq!(json["isSponsored"], true);
        assert!(json["originalPrice"].is_null());
        assert!(json["sellerName"].is_null());
    }
}
