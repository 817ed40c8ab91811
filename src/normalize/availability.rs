use crate::model::AvailabilityStatus;

const OUT_OF_STOCK_TERMS: &[&str] = &[
    "out of stock",
    "sold out",
    "unavailable",
    "not available",
    "no longer available",
];
const LIMITED_TERMS: &[&str] = &["limited", "few left", "low stock"];
const IN_STOCK_TERMS: &[&str] = &["in stock", "available", "ready"];

/// Classifies free-form availability text
///
/// Matching is a case-insensitive substring test. Negative terms are checked
/// before positive ones so "unavailable" never reads as "available".
pub fn classify_availability(text: &str) -> AvailabilityStatus {
    let lower = text.to_lowercase();
    let matches = |terms: &[&str]| terms.iter().any(|t| lower.contains(t));

    if matches(OUT_OF_STOCK_TERMS) {
        AvailabilityStatus::OutOfStock
    } else if matches(LIMITED_TERMS) {
        AvailabilityStatus::LimitedStock
    } else if matches(IN_STOCK_TERMS) {
        AvailabilityStatus::InStock
    } else {
        AvailabilityStatus::Unknown
    }
}
