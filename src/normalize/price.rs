//! Price text parsing and currency detection

use regex::Regex;
use std::sync::LazyLock;

/// Abbreviations ending in a dot, e.g. "Rs." or "approx."
static ABBREVIATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{L}+\.").expect("abbreviation pattern should compile"));

/// Parses a display price into a number
///
/// Dotted abbreviations such as "Rs." are removed, then everything except
/// digits, `.` and `,` is dropped, along with trailing separators. A leading
/// separator is kept, so ".99" is 0.99. Separators are then disambiguated:
///
/// | Shape | Interpretation |
/// |-------|----------------|
/// | both `,` and `.` | `,` groups thousands (`1,299.00`) |
/// | one `,` with at most 2 digits after | `,` is the decimal point (`12,50`) |
/// | any other `,` | `,` groups thousands (`1,299`) |
///
/// The single-comma rule is a heuristic: `1.234,56` style prices with both
/// separators are read with the US convention and come out wrong.
///
/// Returns `None` when nothing numeric remains.
///
/// # Example
///
/// ```
/// use shelf_harvest::normalize::parse_numeric_price;
///
/// assert_eq!(parse_numeric_price("$1,299.00"), Some(1299.0));
/// assert_eq!(parse_numeric_price("n/a"), None);
/// ```
pub fn parse_numeric_price(text: &str) -> Option<f64> {
    let cleaned: String = ABBREVIATION
        .replace_all(text, " ")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let cleaned = cleaned.trim_end_matches(|c| c == '.' || c == ',');

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = if cleaned.contains(',') && cleaned.contains('.') {
        cleaned.replace(',', "")
    } else if cleaned.contains(',') {
        let parts: Vec<&str> = cleaned.split(',').collect();
        if parts.len() == 2 && parts[1].len() <= 2 {
            cleaned.replace(',', ".")
        } else {
            cleaned.replace(',', "")
        }
    } else {
        cleaned.to_string()
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Symbols and codes recognised in price text, checked in order
const CURRENCY_MARKERS: &[(&str, &str)] = &[
    ("USD", "USD"),
    ("EUR", "EUR"),
    ("GBP", "GBP"),
    ("JPY", "JPY"),
    ("INR", "INR"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
    ("₹", "INR"),
    ("$", "USD"),
];

/// Detects the ISO currency code of a price string
///
/// Falls back to `USD` when no marker is present.
pub fn detect_currency(text: &str) -> &'static str {
    let upper = text.to_uppercase();
    CURRENCY_MARKERS
        .iter()
        .find(|(marker, _)| upper.contains(marker))
        .map(|(_, code)| *code)
        .unwrap_or("USD")
}
