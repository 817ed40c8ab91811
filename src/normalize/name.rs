//! Product name cleanup and brand/model detection

use regex::Regex;
use std::sync::LazyLock;

/// Listing badges and promotions that storefronts mix into titles
static PROMOTIONAL: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bnew listing\b",
        r"(?i)\bsponsored\b",
        r"(?i)\bfree (?:shipping|delivery)\b",
        r"(?i)\blimited time(?: offer| deal)?\b",
        r"(?i)\bwhile supplies last\b",
        r"(?i)\b\d+\s*%\s*off\b",
        r"(?i)(?:\$|\b)\d+\s+off\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("promotional pattern should compile"))
    .collect()
});

static MODEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:model|version)\b\s*(?:no\.|number\b)?\s*[:#.]?\s*([a-z0-9][a-z0-9\-]*)")
        .expect("model pattern should compile")
});

/// Known brands as matched in lowercase, with their display spelling
const BRANDS: &[(&str, &str)] = &[
    ("apple", "Apple"),
    ("samsung", "Samsung"),
    ("google", "Google"),
    ("microsoft", "Microsoft"),
    ("amazon", "Amazon"),
    ("sony", "Sony"),
    ("lg", "LG"),
    ("dell", "Dell"),
    ("hp", "HP"),
    ("lenovo", "Lenovo"),
    ("acer", "Acer"),
    ("asus", "ASUS"),
    ("nvidia", "NVIDIA"),
    ("amd", "AMD"),
    ("intel", "Intel"),
    ("logitech", "Logitech"),
    ("anker", "Anker"),
    ("bose", "Bose"),
];

/// Strips promotional badges from a product name
///
/// Returns `None` when nothing but badges and whitespace remains, e.g. the
/// bare "New Listing" placeholder some marketplaces render.
///
/// # Example
///
/// ```
/// use shelf_harvest::normalize::clean_product_name;
///
/// assert_eq!(
///     clean_product_name("New Listing Dell XPS 13 - Free Shipping").as_deref(),
///     Some("Dell XPS 13")
/// );
/// assert_eq!(clean_product_name("New Listing"), None);
/// ```
pub fn clean_product_name(name: &str) -> Option<String> {
    let mut cleaned = name.to_string();
    for pattern in PROMOTIONAL.iter() {
        cleaned = pattern.replace_all(&cleaned, " ").into_owned();
    }

    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| matches!(c, '-' | '|' | ',' | ':' | '!') || c.is_whitespace());

    if trimmed.chars().any(char::is_alphanumeric) {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// First known brand named as a whole word
pub fn extract_brand(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    BRANDS
        .iter()
        .find(|(key, _)| words.contains(key))
        .map(|(_, display)| *display)
}

/// Model or version designator following a "Model"/"Version" label
pub fn extract_model(name: &str) -> Option<String> {
    MODEL
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
