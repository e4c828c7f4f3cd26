//! CSS selectors for Daraz HTML parsing.
//!
//! Daraz ships hashed class names that change between deploys, so each
//! selector lists the stable `data-*` hook first and known class names after.
//!
//! **Update process**: When extraction fails, capture an HTML sample,
//! update selectors, and add a test fixture.

use scraper::Selector;
use std::sync::LazyLock;

/// Selectors for search results pages.
pub mod search {
    use super::*;

    /// Inline scripts, scanned for the embedded `window.pageData` payload.
    pub static SCRIPT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());

    /// Marker for the embedded listing payload.
    pub static PAGE_DATA_MARKER: &str = "window.pageData";

    /// Grid holding server-rendered result cards.
    pub static CONTAINER: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "[data-qa-locator='general-products'], \
             [data-spm='list']",
        )
        .unwrap()
    });

    /// Product card.
    pub static CARD: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("[data-qa-locator='product-item']").unwrap());

    /// Item id attribute on the card.
    pub static ITEM_ID_ATTR: &str = "data-item-id";

    /// Title link, carries both name and URL.
    pub static TITLE_LINK: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "[id^='id-title'] a, \
             .title--wFj93 a, \
             .RfADt a",
        )
        .unwrap()
    });

    /// Product image.
    pub static IMAGE: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "img[type='product'], \
             .picture-wrapper img, \
             img",
        )
        .unwrap()
    });

    /// Current price.
    pub static PRICE: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "[data-qa-locator='product-price'], \
             .price--NVB62, \
             .aBrP0 .ooOxS",
        )
        .unwrap()
    });

    /// Struck-through pre-discount price.
    pub static ORIGINAL_PRICE: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            ".origPrice--AJxRs del, \
             ._1m41m del, \
             del",
        )
        .unwrap()
    });

    /// Seller location.
    pub static LOCATION: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            ".location--eh0Ro, \
             .oa6ri",
        )
        .unwrap()
    });

    /// Review count, rendered as "(123)".
    pub static REVIEWS: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            ".rating__review--ygkUy, \
             .qzqFw",
        )
        .unwrap()
    });

    /// Sales volume label.
    pub static SOLD: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            ".sold--FnTvn, \
             ._1cEkb span",
        )
        .unwrap()
    });

    /// Sponsored placement badge.
    pub static SPONSORED: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "[data-qa-locator='product-ad'], \
             .ad-tag",
        )
        .unwrap()
    });
}

/// Selectors for anti-bot and error pages.
pub mod errors {
    use super::*;

    /// Slider captcha / punish page.
    pub static CAPTCHA: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "#baxia-punish, \
             #nocaptcha, \
             form[action*='punish']",
        )
        .unwrap()
    });
}
