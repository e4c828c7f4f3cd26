//! Listing extraction from raw search page content.
//!
//! Daraz serves the same listings three ways: as the JSON body of an
//! `ajax=true` request, as a `window.pageData` object embedded in the HTML
//! page, or as server-rendered cards. [`extract`] tries them in that order.

use crate::daraz::models::RawListing;
use crate::daraz::normalizer::parse_flag;
use crate::daraz::selectors::{errors, search};
use crate::error::ExtractError;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, trace, warn};

/// Parses raw page content into zero or more raw listings.
///
/// An empty result means the page has no listings. An error means the page
/// is not a search result page at all.
pub fn extract(raw: &str) -> Result<Vec<RawListing>, ExtractError> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') {
        let payload: Value = serde_json::from_str(trimmed)
            .map_err(|e| ExtractError::InvalidPayload(e.to_string()))?;
        return listings_from_payload(&payload);
    }

    let document = Html::parse_document(raw);

    if document.select(&errors::CAPTCHA).next().is_some() {
        return Err(ExtractError::Blocked);
    }

    if let Some(json) = embedded_page_data(&document) {
        trace!("Found embedded page data ({} bytes)", json.len());
        let payload: Value = serde_json::from_str(&json)
            .map_err(|e| ExtractError::InvalidPayload(e.to_string()))?;
        return listings_from_payload(&payload);
    }

    let has_container = document.select(&search::CONTAINER).next().is_some();
    let listings: Vec<RawListing> = document.select(&search::CARD).map(parse_card).collect();

    if listings.is_empty() && !has_container {
        return Err(ExtractError::MissingContainer);
    }

    debug!("Extracted {} listings from HTML cards", listings.len());
    Ok(listings)
}

/// Wire shape of one entry in `mods.listItems`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListItem {
    #[serde(default, deserialize_with = "lenient")]
    item_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    nid: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    price: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    price_show: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    original_price: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    image: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    product_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    seller_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    location: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    rating_score: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    review: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    item_sold_cnt_show: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    brand_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    is_sponsored: Option<String>,
    #[serde(default, rename = "isAD", deserialize_with = "lenient")]
    is_ad: Option<String>,
}

impl From<ListItem> for RawListing {
    fn from(item: ListItem) -> Self {
        RawListing {
            id: item.item_id.or(item.nid),
            name: item.name,
            price: item.price.or(item.price_show),
            original_price: item.original_price,
            image: item.image,
            url: item.product_url,
            seller_name: item.seller_name,
            location: item.location,
            rating: item.rating_score,
            reviews: item.review,
            sold_text: item.item_sold_cnt_show,
            brand: item.brand_name,
            is_sponsored: sponsored_flag(item.is_sponsored, item.is_ad),
        }
    }
}

/// Either flag marks the listing as sponsored.
fn sponsored_flag(is_sponsored: Option<String>, is_ad: Option<String>) -> Option<String> {
    let flagged = is_sponsored.iter().chain(is_ad.iter()).any(|f| parse_flag(f.trim()));
    if flagged {
        Some("true".to_string())
    } else {
        is_sponsored.or(is_ad)
    }
}

/// Accepts strings, numbers and booleans as text; anything else is absent.
fn lenient<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn listings_from_payload(payload: &Value) -> Result<Vec<RawListing>, ExtractError> {
    let mods =
        payload.get("mods").and_then(Value::as_object).ok_or(ExtractError::MissingContainer)?;

    let items = match mods.get("listItems") {
        None | Some(Value::Null) => {
            debug!("Payload has no listItems, treating as empty result page");
            return Ok(Vec::new());
        }
        Some(Value::Array(items)) => items,
        Some(other) => {
            return Err(ExtractError::InvalidPayload(format!(
                "listItems is not an array: {}",
                other
            )))
        }
    };

    let mut listings = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match ListItem::deserialize(item) {
            Ok(item) => listings.push(item.into()),
            Err(e) => warn!("Skipping malformed list item #{}: {}", index, e),
        }
    }

    debug!("Extracted {} listings from JSON payload", listings.len());
    Ok(listings)
}

/// Returns the JSON object assigned to `window.pageData`, if any script has one.
fn embedded_page_data(document: &Html) -> Option<String> {
    document.select(&search::SCRIPT).find_map(|script| {
        let text = script.text().collect::<String>();
        let start = text.find(search::PAGE_DATA_MARKER)?;
        balanced_object(&text[start..]).map(str::to_string)
    })
}

/// Returns the first complete `{...}` object in `text`, honouring string literals.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_card(card: ElementRef) -> RawListing {
    let id = card.value().attr(search::ITEM_ID_ATTR).map(String::from);

    let title = card.select(&search::TITLE_LINK).next();
    let name = title.and_then(|a| {
        a.value().attr("title").map(String::from).or_else(|| non_empty(a.text().collect()))
    });
    let url = title.and_then(|a| a.value().attr("href")).map(String::from);

    let image = card
        .select(&search::IMAGE)
        .next()
        .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
        .map(String::from);

    let location = card.select(&search::LOCATION).next().and_then(|e| {
        e.value().attr("title").map(String::from).or_else(|| non_empty(e.text().collect()))
    });

    let is_sponsored = card.select(&search::SPONSORED).next().map(|_| "true".to_string());

    RawListing {
        id,
        name,
        price: first_text(card, &search::PRICE),
        original_price: first_text(card, &search::ORIGINAL_PRICE),
        image,
        url,
        seller_name: None,
        location,
        rating: None,
        reviews: first_text(card, &search::REVIEWS),
        sold_text: first_text(card, &search::SOLD),
        brand: None,
        is_sponsored,
    }
}

fn first_text(element: ElementRef, selector: &Selector) -> Option<String> {
    element.select(selector).next().and_then(|e| non_empty(e.text().collect()))
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daraz::Normalizer;

    const AJAX_BODY: &str = r#"{
        "mainInfo": {"totalResults": "2", "page": "1"},
        "mods": {
            "listItems": [
                {
                    "name": "Ice Roller for Face",
                    "nid": "201",
                    "itemId": "201",
                    "price": "349.00",
                    "priceShow": "৳ 349",
                    "originalPrice": "650.00",
                    "productUrl": "//www.daraz.com.bd/products/ice-roller-i201.html",
                    "image": "https://static-01.daraz.com.bd/p/201.jpg",
                    "sellerName": "Glow Store",
                    "location": "Dhaka",
                    "ratingScore": "4.6",
                    "review": "87",
                    "itemSoldCntShow": "312 sold",
                    "brandName": "No Brand",
                    "isSponsored": false
                },
                {
                    "nid": 202,
                    "name": "Stainless Ice Globe",
                    "priceShow": "৳ 1,250",
                    "ratingScore": 0,
                    "isAD": 1
                }
            ]
        }
    }"#;

    #[test]
    fn test_extract_ajax_json() {
        let listings = extract(AJAX_BODY).unwrap();
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.id.as_deref(), Some("201"));
        assert_eq!(first.price.as_deref(), Some("349.00"));
        assert_eq!(first.original_price.as_deref(), Some("650.00"));
        assert_eq!(first.sold_text.as_deref(), Some("312 sold"));
        assert_eq!(first.is_sponsored.as_deref(), Some("false"));

        let second = &listings[1];
        assert_eq!(second.id.as_deref(), Some("202"));
        assert_eq!(second.price.as_deref(), Some("৳ 1,250"));
        assert_eq!(second.rating.as_deref(), Some("0"));
        assert_eq!(second.is_sponsored.as_deref(), Some("true"));
        assert!(second.url.is_none());
    }

    #[test]
    fn test_either_sponsored_flag_wins() {
        let body = r#"{"mods":{"listItems":[
            {"itemId":"1","price":"100","isSponsored":false,"isAD":1},
            {"itemId":"2","price":"100","isSponsored":"true","isAD":0},
            {"itemId":"3","price":"100","isSponsored":false,"isAD":"0"},
            {"itemId":"4","price":"100"}
        ]}}"#;
        let listings = extract(body).unwrap();

        let flags: Vec<_> = listings.iter().map(|l| l.is_sponsored.as_deref()).collect();
        assert_eq!(flags, vec![Some("true"), Some("true"), Some("false"), None]);

        let product = Normalizer::new("https://www.daraz.com.bd")
            .normalize(listings[0].clone())
            .unwrap();
        assert!(product.is_sponsored);
    }

    #[test]
    fn test_extract_embedded_page_data() {
        let html = r#"
            <html><head>
            <script>var other = 1;</script>
            <script>window.pageData = {"mods":{"listItems":[{"itemId":"7","name":"Brace } in \"name\"","price":"99"}]}};
            window.other = {};</script>
            </head><body></body></html>
        "#;

        let listings = extract(html).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].id.as_deref(), Some("7"));
        assert_eq!(listings[0].name.as_deref(), Some("Brace } in \"name\""));
    }

    #[test]
    fn test_extract_html_cards() {
        let html = r#"
            <html><body>
            <div data-qa-locator="general-products">
                <div data-qa-locator="product-item" data-item-id="301">
                    <img type="product" src="https://img.example/301.jpg">
                    <div id="id-title"><a href="//www.daraz.com.bd/products/roller-i301.html" title="Jade Roller">Jade Roller</a></div>
                    <span data-qa-locator="product-price">৳ 450</span>
                    <del>৳ 900</del>
                    <span class="qzqFw">(15)</span>
                    <span class="oa6ri" title="Chattogram">Chattogram</span>
                    <span class="ad-tag">Ad</span>
                </div>
                <div data-qa-locator="product-item">
                    <div id="id-title"><a href="/products/x.html">No id here</a></div>
                </div>
            </div>
            </body></html>
        "#;

        let listings = extract(html).unwrap();
        assert_eq!(listings.len(), 2);

        let card = &listings[0];
        assert_eq!(card.id.as_deref(), Some("301"));
        assert_eq!(card.name.as_deref(), Some("Jade Roller"));
        assert_eq!(card.price.as_deref(), Some("৳ 450"));
        assert_eq!(card.original_price.as_deref(), Some("৳ 900"));
        assert_eq!(card.reviews.as_deref(), Some("(15)"));
        assert_eq!(card.location.as_deref(), Some("Chattogram"));
        assert_eq!(card.is_sponsored.as_deref(), Some("true"));
        assert_eq!(card.image.as_deref(), Some("https://img.example/301.jpg"));

        // Missing id is captured as absent, not rejected here
        assert!(listings[1].id.is_none());
        assert_eq!(listings[1].name.as_deref(), Some("No id here"));
    }

    #[test]
    fn test_extract_empty_results() {
        let listings = extract(r#"{"mods":{"filter":{}}}"#).unwrap();
        assert!(listings.is_empty());

        let listings = extract(r#"{"mods":{"listItems":[]}}"#).unwrap();
        assert!(listings.is_empty());

        let html = r#"<html><body><div data-qa-locator="general-products"></div></body></html>"#;
        assert!(extract(html).unwrap().is_empty());
    }

    #[test]
    fn test_extract_missing_container() {
        let err = extract("<html><body><h1>Maintenance</h1></body></html>").unwrap_err();
        assert_eq!(err, ExtractError::MissingContainer);

        let err = extract(r#"{"status": "ok"}"#).unwrap_err();
        assert_eq!(err, ExtractError::MissingContainer);

        assert_eq!(extract("").unwrap_err(), ExtractError::MissingContainer);
    }

    #[test]
    fn test_extract_blocked() {
        let html = r#"<html><body><div id="baxia-punish"><div id="nocaptcha"></div></div></body></html>"#;
        assert_eq!(extract(html).unwrap_err(), ExtractError::Blocked);
    }

    #[test]
    fn test_extract_invalid_payload() {
        let err = extract(r#"{"mods": {"listItems": [ }"#).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPayload(_)));

        let err = extract(r#"{"mods": {"listItems": "nope"}}"#).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPayload(_)));
    }

    #[test]
    fn test_malformed_item_is_skipped() {
        let listings = extract(r#"{"mods":{"listItems":["junk", {"itemId":"1","price":"10"}]}}"#)
            .unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].id.as_deref(), Some("1"));
    }

    #[test]
    fn test_balanced_object() {
        assert_eq!(balanced_object(r#"x = {"a": {"b": 1}}; y = {}"#), Some(r#"{"a": {"b": 1}}"#));
        assert_eq!(balanced_object(r#"{"s": "}{\"}"}"#), Some(r#"{"s": "}{\"}"}"#));
        assert_eq!(balanced_object("{ unterminated"), None);
        assert_eq!(balanced_object("no object"), None);
    }
}
