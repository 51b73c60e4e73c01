/// Normalize an origin's human-facing order number into a cross-source
/// matching key: strip any leading non-alphanumeric run (prefixes like "#"),
/// then take the leading run of ASCII digits, without leading zeros.
///
/// Returns `None` when no digit run exists; such a record can only match by
/// origin identity or the email+date fallback.
pub fn normalize_display_number(raw: &str) -> Option<String> {
    let stripped = raw.trim_start_matches(|c: char| !c.is_ascii_alphanumeric());
    let digits: &str = {
        let end = stripped
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(stripped.len());
        &stripped[..end]
    };
    if digits.is_empty() {
        return None;
    }
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        Some("0".to_string())
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_hash_prefix() {
        assert_eq!(normalize_display_number("#1501").as_deref(), Some("1501"));
    }

    #[test]
    fn bare_number_unchanged() {
        assert_eq!(normalize_display_number("1501").as_deref(), Some("1501"));
    }

    #[test]
    fn takes_leading_run_only() {
        assert_eq!(normalize_display_number("#1501-A").as_deref(), Some("1501"));
        assert_eq!(normalize_display_number("1501.2").as_deref(), Some("1501"));
    }

    #[test]
    fn strips_whitespace_and_symbols() {
        assert_eq!(normalize_display_number("  ##1234").as_deref(), Some("1234"));
    }

    #[test]
    fn leading_zeros_normalized() {
        assert_eq!(normalize_display_number("#0012").as_deref(), Some("12"));
        assert_eq!(normalize_display_number("000").as_deref(), Some("0"));
    }

    #[test]
    fn alpha_prefix_yields_no_key() {
        // "SO-1501" keeps its alphanumeric prefix; the leading run holds no
        // digits, so there is no key and no cross-source number match.
        assert_eq!(normalize_display_number("SO-1501"), None);
        assert_eq!(normalize_display_number("draft"), None);
        assert_eq!(normalize_display_number(""), None);
    }
}
