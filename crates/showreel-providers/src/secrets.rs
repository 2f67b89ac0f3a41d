// Credential indirection: environment variable first, OS keychain second.
// Keys never appear in logs or Debug output.

const KEYRING_SERVICE: &str = "showreel";

/// Resolve a symbolic key name (e.g. `LUMA_API_KEY`) to its value.
pub fn resolve_secret(symbolic_name: &str) -> Option<String> {
    if let Ok(value) = std::env::var(symbolic_name) {
        let trimmed = value.trim();
        if !trimmed.is_empty() && !is_placeholder(trimmed) {
            return Some(trimmed.to_string());
        }
    }

    match keyring::Entry::new(KEYRING_SERVICE, symbolic_name) {
        Ok(entry) => match entry.get_password() {
            Ok(value) if !value.trim().is_empty() => Some(value),
            _ => None,
        },
        Err(_) => None,
    }
}

fn is_placeholder(value: &str) -> bool {
    value.eq_ignore_ascii_case("x")
        || value.eq_ignore_ascii_case("placeholder")
        || value.eq_ignore_ascii_case("changeme")
}

/// Mask a secret for display: first and last four characters at most.
pub fn mask_secret(value: Option<&str>) -> String {
    match value {
        None => "None".to_string(),
        Some(v) if v.len() <= 8 => "'***'".to_string(),
        Some(v) => format!("'{}...{}'", &v[..4], &v[v.len() - 4..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_never_reveals_short_keys() {
        assert_eq!(mask_secret(Some("abcd1234")), "'***'");
        assert_eq!(mask_secret(None), "None");
    }

    #[test]
    fn mask_keeps_only_edges_of_long_keys() {
        let masked = mask_secret(Some("sk-live-0123456789abcdef"));
        assert_eq!(masked, "'sk-l...cdef'");
        assert!(!masked.contains("0123456789"));
    }

    #[test]
    fn placeholders_are_not_secrets() {
        assert!(is_placeholder("x"));
        assert!(is_placeholder("PLACEHOLDER"));
        assert!(!is_placeholder("sk-real-key"));
    }
}
