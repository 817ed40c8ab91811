use crate::model::ItemCondition;

// Checked in this order: "renewed", "like new" and "for parts" must not read as new
const REFURBISHED_TERMS: &[&str] = &["refurbished", "renewed", "reconditioned", "remanufactured"];
const DAMAGED_TERMS: &[&str] = &["for parts", "damaged", "broken", "not working"];
const USED_TERMS: &[&str] = &["like new", "pre-owned", "preowned", "used", "second hand", "open box"];
const NEW_TERMS: &[&str] = &["brand new", "new", "factory sealed", "sealed"];

/// Maps a listing's condition text onto a fixed vocabulary
pub fn standardize_condition(text: &str) -> ItemCondition {
    let lower = text.to_lowercase();
    let matches = |terms: &[&str]| terms.iter().any(|t| lower.contains(t));

    if matches(REFURBISHED_TERMS) {
        ItemCondition::Refurbished
    } else if matches(DAMAGED_TERMS) {
        ItemCondition::Damaged
    } else if matches(USED_TERMS) {
        ItemCondition::Used
    } else if matches(NEW_TERMS) {
        ItemCondition::New
    } else {
        ItemCondition::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions() {
        assert_eq!(standardize_condition("Brand New"), ItemCondition::New);
        assert_eq!(standardize_condition("Factory sealed"), ItemCondition::New);
        assert_eq!(standardize_condition("Pre-Owned"), ItemCondition::Used);
        assert_eq!(
            standardize_condition("Certified - Refurbished"),
            ItemCondition::Refurbished
        );
        assert_eq!(standardize_condition("Renewed"), ItemCondition::Refurbished);
        assert_eq!(
            standardize_condition("For parts or not working"),
            ItemCondition::Damaged
        );
        assert_eq!(standardize_condition("Used - Like New"), ItemCondition::Used);
        assert_eq!(standardize_condition("Open box"), ItemCondition::Used);
        assert_eq!(standardize_condition("See description"), ItemCondition::Unknown);
    }
}
