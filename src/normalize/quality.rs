//! Plausibility checks applied after normalization

/// Lowest believable listing price
pub const MIN_PRICE: f64 = 0.01;
/// Highest believable listing price
pub const MAX_PRICE: f64 = 100_000.0;
/// Longer names are page text caught by a loose selector
pub const MAX_NAME_CHARS: usize = 500;

pub fn price_in_range(price: f64) -> bool {
    (MIN_PRICE..=MAX_PRICE).contains(&price)
}

pub fn name_length_ok(name: &str) -> bool {
    name.chars().count() <= MAX_NAME_CHARS
}
