//! Normalization utilities
//!
//! Pure functions that turn raw text fragments pulled out of product markup
//! into canonical values:
//! - Numeric prices and currency codes
//! - Availability and condition classification
//! - Absolute product links
//! - Whitespace-clean text and badge-free product names
//! - Brand and model hints pulled from names
//! - Price and name plausibility checks

mod availability;
mod condition;
mod link;
mod name;
mod price;
pub mod quality;
mod text;

pub use availability::classify_availability;
pub use condition::standardize_condition;
pub use link::{join_href, resolve_absolute_link};
pub use name::{clean_product_name, extract_brand, extract_model};
pub use price::{detect_currency, parse_numeric_price};
pub use text::clean_text;

use crate::model::ItemFields;

/// Returns true if the record may be persisted
///
/// A record needs a non-blank name and at least one of a link or a raw price.
pub fn is_valid_record<T: ItemFields + ?Sized>(record: &T) -> bool {
    let has_name = record
        .name()
        .map(|name| !name.trim().is_empty())
        .unwrap_or(false);
    let has_link = record.link().map(|l| !l.is_empty()).unwrap_or(false);
    let has_price = record.price_raw().map(|p| !p.is_empty()).unwrap_or(false);

    has_name && (has_link || has_price)
}
