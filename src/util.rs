//! Utility helpers shared by naming and materialization.
//!
//! IMPORTANT:
//! - No judge-specific rules live here; those belong to `naming`.

use chrono::Local;

/// Local-time suffix for problem directories, e.g. `20261018_194501`.
pub fn timestamp_suffix() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Last non-empty path segment of a URL.
///
/// Examples:
/// - "https://www.codechef.com/problems/FLOW001"  -> "FLOW001"
/// - "https://www.codechef.com/START1/problems/X/" -> "X"
pub fn last_url_segment(url: &str) -> Option<&str> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_segment_ignores_trailing_slash() {
        assert_eq!(
            last_url_segment("https://www.codechef.com/problems/FLOW001/"),
            Some("FLOW001")
        );
        assert_eq!(last_url_segment("https://www.codechef.com/START1/problems/X"), Some("X"));
    }

    #[test]
    fn bare_host_has_no_segment() {
        assert_eq!(last_url_segment("https:///"), None);
        assert_eq!(last_url_segment("https://"), None);
    }

    #[test]
    fn timestamp_has_fixed_shape() {
        let ts = timestamp_suffix();
        assert_eq!(ts.len(), 15);
        assert_eq!(ts.as_bytes()[8], b'_');
    }
}
