/// Collapses runs of whitespace and trims the ends
///
/// Returns `None` if nothing but whitespace was given.
pub fn clean_text(text: &str) -> Option<String> {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
