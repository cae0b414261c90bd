//! Plate text helpers shared by the recognition pipeline and the registry.

/// Strip every character that is not an ASCII letter or digit.
///
/// Order and case of the remaining characters are preserved, so the result is
/// stable under repeated application.
pub fn normalize(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Registry key form of a plate number: normalized and upper-cased.
pub fn canonical(raw: &str) -> String {
    normalize(raw).to_ascii_uppercase()
}
