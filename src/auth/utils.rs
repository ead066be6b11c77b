//! Input validation helpers.

use regex::Regex;

/// Trim an email for lookup and storage. Case is preserved.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_string()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Trim a display name, treating blank input as no name.
pub(crate) fn normalize_full_name(full_name: Option<&str>) -> Option<String> {
    full_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_keeps_case() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "Alice@Example.COM");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@x.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
        assert!(!valid_email("spaces in@example.com"));
        assert!(!valid_email(""));
    }

    #[test]
    fn normalize_full_name_blank_is_none() {
        assert_eq!(normalize_full_name(None), None);
        assert_eq!(normalize_full_name(Some("   ")), None);
        assert_eq!(normalize_full_name(Some(" Ada ")), Some("Ada".to_string()));
    }
}
