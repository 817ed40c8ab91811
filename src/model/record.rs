use crate::normalize::quality::{name_length_ok, price_in_range};
use crate::normalize::{
    classify_availability, clean_product_name, clean_text, detect_currency, extract_brand,
    extract_model, is_valid_record, join_href, parse_numeric_price, standardize_condition,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Stock state derived from availability text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    InStock,
    OutOfStock,
    LimitedStock,
    #[default]
    Unknown,
}

impl AvailabilityStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::InStock => "in_stock",
            Self::OutOfStock => "out_of_stock",
            Self::LimitedStock => "limited_stock",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "in_stock" => Some(Self::InStock),
            "out_of_stock" => Some(Self::OutOfStock),
            "limited_stock" => Some(Self::LimitedStock),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Item condition derived from listing condition text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCondition {
    New,
    Used,
    Refurbished,
    Damaged,
    #[default]
    Unknown,
}

impl ItemCondition {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Used => "used",
            Self::Refurbished => "refurbished",
            Self::Damaged => "damaged",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "used" => Some(Self::Used),
            "refurbished" => Some(Self::Refurbished),
            "damaged" => Some(Self::Damaged),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for ItemCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Field access shared by raw and normalized records
pub trait ItemFields {
    fn name(&self) -> Option<&str>;
    fn link(&self) -> Option<&str>;
    fn price_raw(&self) -> Option<&str>;
}

/// An item exactly as an adapter extracted it
///
/// Every field is optional; missing markup degrades to `None` rather than an
/// error. `page` is the listing page the item was found on and `position`
/// its 1-based slot among that page's containers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub name: Option<String>,
    pub price_raw: Option<String>,
    pub link: Option<String>,
    pub image: Option<String>,
    pub availability_raw: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub position: u32,
}

impl ItemFields for RawRecord {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    fn price_raw(&self) -> Option<&str> {
        self.price_raw.as_deref()
    }
}

/// A normalized item, ready for the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub name: String,
    pub price_raw: Option<String>,
    pub price_numeric: Option<f64>,
    pub currency: Option<String>,
    pub link: Option<String>,
    pub image: Option<String>,
    pub availability_raw: Option<String>,
    pub availability_status: AvailabilityStatus,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub condition_raw: Option<String>,
    pub condition: ItemCondition,
    pub source: String,
    pub search_term: String,
    pub scrape_time: DateTime<Utc>,
    pub page_number: u32,
    pub position_on_page: u32,
    pub job_id: Option<i64>,
}

impl Record {
    /// Fraction of the optional fields that were filled in
    pub fn quality_score(&self) -> f64 {
        let filled = [
            self.price_numeric.is_some(),
            self.link.is_some(),
            self.image.is_some(),
            self.availability_status != AvailabilityStatus::Unknown,
        ];
        filled.iter().filter(|f| **f).count() as f64 / filled.len() as f64
    }

    pub fn is_valid(&self) -> bool {
        is_valid_record(self)
    }
}

impl ItemFields for Record {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    fn price_raw(&self) -> Option<&str> {
        self.price_raw.as_deref()
    }
}

/// Labels stamped onto every record normalized for one job
#[derive(Debug, Clone)]
pub struct RecordContext {
    pub source: String,
    pub search_term: String,
    pub job_id: Option<i64>,
    /// Page URL used to resolve relative links, when the adapter left any
    pub base_url: Option<Url>,
}

impl RecordContext {
    pub fn new(source: impl Into<String>, search_term: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            search_term: search_term.into(),
            job_id: None,
            base_url: None,
        }
    }

    pub fn with_job(mut self, job_id: i64) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }
}

/// Canonicalizes a raw record
///
/// Text is whitespace-cleaned, promotional badges stripped from the name, the
/// price parsed, availability and condition classified, and relative links
/// resolved against the context base. Returns `None` if the result would not
/// be a valid record, or if its price or name length is implausible.
pub fn normalize_record(raw: &RawRecord, ctx: &RecordContext) -> Option<Record> {
    let name = raw.name.as_deref().and_then(clean_product_name)?;
    let price_raw = raw.price_raw.as_deref().and_then(clean_text);
    let availability_raw = raw.availability_raw.as_deref().and_then(clean_text);
    let condition_raw = raw.condition.as_deref().and_then(clean_text);

    let link = raw.link.as_deref().and_then(|href| match &ctx.base_url {
        Some(base) => join_href(base, href),
        None => Url::parse(href.trim()).ok().map(|u| u.to_string()),
    });
    let image = raw.image.as_deref().and_then(|src| match &ctx.base_url {
        Some(base) => join_href(base, src),
        None => clean_text(src),
    });

    let record = Record {
        price_numeric: price_raw.as_deref().and_then(parse_numeric_price),
        currency: price_raw
            .as_deref()
            .map(|p| detect_currency(p).to_string()),
        availability_status: availability_raw
            .as_deref()
            .map(classify_availability)
            .unwrap_or_default(),
        brand: extract_brand(&name).map(String::from),
        model: extract_model(&name),
        condition: condition_raw
            .as_deref()
            .map(standardize_condition)
            .unwrap_or_default(),
        condition_raw,
        name,
        price_raw,
        link,
        image,
        availability_raw,
        source: ctx.source.clone(),
        search_term: ctx.search_term.clone(),
        scrape_time: Utc::now(),
        page_number: raw.page,
        position_on_page: raw.position,
        job_id: ctx.job_id,
    };

    if !record.is_valid() {
        return None;
    }
    if !name_length_ok(&record.name) {
        tracing::debug!("Dropping item with a {}-char name", record.name.chars().count());
        return None;
    }
    if let Some(price) = record.price_numeric.filter(|p| !price_in_range(*p)) {
        tracing::debug!(name = %record.name, "Dropping item priced {} outside the plausible range", price);
        return None;
    }
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RecordContext {
        RecordContext::new("books", "travel")
            .with_job(7)
            .with_base_url(Url::parse("https://books.example/catalogue/page-1.html").unwrap())
    }

    #[test]
    fn test_normalize_full_record() {
        let raw = RawRecord {
            name: Some("  It's Only the Himalayas ".to_string()),
            price_raw: Some("£45.17".to_string()),
            link: Some("its-only-the-himalayas_981/index.html".to_string()),
            image: Some("../media/cache/himalayas.jpg".to_string()),
            availability_raw: Some("\n In stock\n".to_string()),
            condition: None,
            page: 1,
            position: 3,
        };

        let record = normalize_record(&raw, &ctx()).unwrap();
        assert_eq!(record.name, "It's Only the Himalayas");
        assert_eq!(record.price_numeric, Some(45.17));
        assert_eq!(record.currency.as_deref(), Some("GBP"));
        assert_eq!(
            record.link.as_deref(),
            Some("https://books.example/catalogue/its-only-the-himalayas_981/index.html")
        );
        assert_eq!(
            record.image.as_deref(),
            Some("https://books.example/media/cache/himalayas.jpg")
        );
        assert_eq!(record.availability_status, AvailabilityStatus::InStock);
        assert_eq!(record.source, "books");
        assert_eq!(record.search_term, "travel");
        assert_eq!(record.job_id, Some(7));
        assert_eq!(record.page_number, 1);
        assert_eq!(record.position_on_page, 3);
        assert_eq!(record.condition, ItemCondition::Unknown);
        assert_eq!(record.quality_score(), 1.0);
    }

    #[test]
    fn test_name_cleanup_brand_and_condition() {
        let raw = RawRecord {
            name: Some("New Listing Dell Latitude 5420 Model: L5420 Free Shipping".to_string()),
            price_raw: Some("$329.00".to_string()),
            link: Some("https://shop.example/itm/5420".to_string()),
            condition: Some(" Pre-Owned ".to_string()),
            ..Default::default()
        };

        let record = normalize_record(&raw, &ctx()).unwrap();
        assert_eq!(record.name, "Dell Latitude 5420 Model: L5420");
        assert_eq!(record.brand.as_deref(), Some("Dell"));
        assert_eq!(record.model.as_deref(), Some("L5420"));
        assert_eq!(record.condition_raw.as_deref(), Some("Pre-Owned"));
        assert_eq!(record.condition, ItemCondition::Used);
    }

    #[test]
    fn test_placeholder_name_is_rejected() {
        let raw = RawRecord {
            name: Some("New Listing".to_string()),
            link: Some("https://shop.example/itm/1".to_string()),
            ..Default::default()
        };
        assert!(normalize_record(&raw, &ctx()).is_none());
    }

    #[test]
    fn test_implausible_price_is_rejected() {
        let raw = |price: &str| RawRecord {
            name: Some("Widget".to_string()),
            price_raw: Some(price.to_string()),
            link: Some("https://shop.example/itm/1".to_string()),
            ..Default::default()
        };
        assert!(normalize_record(&raw("$0.00"), &ctx()).is_none());
        assert!(normalize_record(&raw("$250,000.00"), &ctx()).is_none());
        assert!(normalize_record(&raw("$.99"), &ctx()).is_some());
    }

    #[test]
    fn test_overlong_name_is_rejected() {
        let raw = RawRecord {
            name: Some("word ".repeat(200)),
            link: Some("https://shop.example/itm/1".to_string()),
            ..Default::default()
        };
        assert!(normalize_record(&raw, &ctx()).is_none());
    }

    #[test]
    fn test_name_only_is_rejected() {
        let raw = RawRecord {
            name: Some("Widget".to_string()),
            ..Default::default()
        };
        assert!(normalize_record(&raw, &ctx()).is_none());
    }

    #[test]
    fn test_unresolvable_link_without_price_is_rejected() {
        let raw = RawRecord {
            name: Some("Widget".to_string()),
            link: Some("javascript:void(0)".to_string()),
            ..Default::default()
        };
        assert!(normalize_record(&raw, &ctx()).is_none());
    }

    #[test]
    fn test_price_only_record_is_kept() {
        let raw = RawRecord {
            name: Some("Widget".to_string()),
            price_raw: Some("n/a".to_string()),
            ..Default::default()
        };
        let record = normalize_record(&raw, &ctx()).unwrap();
        assert_eq!(record.price_numeric, None);
        assert_eq!(record.link, None);
        assert_eq!(record.availability_status, AvailabilityStatus::Unknown);
        assert_eq!(record.quality_score(), 0.0);
    }

    #[test]
    fn test_absolute_link_without_base() {
        let raw = RawRecord {
            name: Some("Widget".to_string()),
            link: Some("https://shop.example/itm/1".to_string()),
            ..Default::default()
        };
        let record = normalize_record(&raw, &RecordContext::new("ebay", "widget")).unwrap();
        assert_eq!(record.link.as_deref(), Some("https://shop.example/itm/1"));
        assert_eq!(record.job_id, None);
    }

    #[test]
    fn test_condition_roundtrip() {
        for condition in &[
            ItemCondition::New,
            ItemCondition::Used,
            ItemCondition::Refurbished,
            ItemCondition::Damaged,
            ItemCondition::Unknown,
        ] {
            assert_eq!(
                ItemCondition::from_db_string(condition.to_db_string()),
                Some(*condition)
            );
        }
    }

    #[test]
    fn test_availability_roundtrip() {
        for status in &[
            AvailabilityStatus::InStock,
            AvailabilityStatus::OutOfStock,
            AvailabilityStatus::LimitedStock,
            AvailabilityStatus::Unknown,
        ] {
            assert_eq!(
                AvailabilityStatus::from_db_string(status.to_db_string()),
                Some(*status)
            );
        }
    }
}
