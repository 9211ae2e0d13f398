//! SQL utility functions

use std::sync::OnceLock;

use regex::Regex;

/// Escape SQL LIKE metacharacters (%, _, \) in user input
///
/// Use this when building LIKE patterns from filter values to prevent
/// unintended pattern matching.
///
/// # Example
///
/// ```
/// use complex_filter_server::utils::sql::escape_like_pattern;
///
/// let user_input = "100% match_test";
/// let pattern = format!("%{}%", escape_like_pattern(user_input));
/// assert_eq!(pattern, "%100\\% match\\_test%");
/// ```
pub fn escape_like_pattern(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Check that a table, column or annotation name is a plain SQL identifier.
///
/// Identifiers are interpolated into generated SQL, so anything outside
/// `[A-Za-z_][A-Za-z0-9_]*` is rejected rather than quoted.
pub fn is_safe_identifier(name: &str) -> bool {
    static RE_IDENT: OnceLock<Regex> = OnceLock::new();
    RE_IDENT
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex"))
        .is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_pattern_no_special_chars() {
        assert_eq!(escape_like_pattern("hello"), "hello");
    }

    #[test]
    fn test_escape_like_pattern_percent() {
        assert_eq!(escape_like_pattern("100%"), "100\\%");
    }

    #[test]
    fn test_escape_like_pattern_underscore() {
        assert_eq!(escape_like_pattern("foo_bar"), "foo\\_bar");
    }

    #[test]
    fn test_escape_like_pattern_multiple() {
        assert_eq!(escape_like_pattern("100%_\\test"), "100\\%\\_\\\\test");
    }

    #[test]
    fn test_safe_identifier_accepts_plain_names() {
        assert!(is_safe_identifier("group1"));
        assert!(is_safe_identifier("_private"));
        assert!(is_safe_identifier("lookup_field2"));
    }

    #[test]
    fn test_safe_identifier_rejects_injection() {
        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("1abc"));
        assert!(!is_safe_identifier("name; DROP TABLE x"));
        assert!(!is_safe_identifier("a.b"));
        assert!(!is_safe_identifier("quoted\"name"));
    }
}
