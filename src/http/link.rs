//! RFC-5988 `Link` header parsing, extended with the service's non-standard
//! `results="true|false"` and `cursor="..."` parameters.
//!
//! A header looks like:
//!
//! ```text
//! <https://example.test/api/0/...?cursor=abc>; rel="next"; results="true"; cursor="abc"
//! ```
//!
//! Absence of the `rel="next"` segment, or a `results` value other than
//! `"true"`, means the page is exhausted.

/// Extract the next-page cursor from a `Link` header value, or `None` if
/// the link set declares no further results.
#[must_use]
pub fn parse_next(header: &str) -> Option<String> {
    for segment in header.split(',') {
        let params = parse_segment(segment);
        if params.get("rel").map(String::as_str) != Some("next") {
            continue;
        }
        if params.get("results").map(String::as_str) != Some("true") {
            return None;
        }
        return params.get("cursor").cloned();
    }
    None
}

/// Parse one comma-separated segment of a `Link` header into its
/// semicolon-separated `key="value"` parameters (the leading `<url>` part
/// is ignored; the cursor and rel are carried in the quoted params).
fn parse_segment(segment: &str) -> std::collections::HashMap<String, String> {
    let mut params = std::collections::HashMap::new();
    for part in segment.split(';').skip(1) {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            let value = value.trim().trim_matches('"');
            params.insert(key.trim().to_string(), value.to_string());
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cursor_when_more_results() {
        let header = r#"<https://example.test/api/0/issues/?cursor=abc>; rel="next"; results="true"; cursor="abc""#;
        assert_eq!(parse_next(header), Some("abc".to_string()));
    }

    #[test]
    fn none_when_results_false() {
        let header = r#"<https://example.test/api/0/issues/?cursor=abc>; rel="next"; results="false"; cursor="abc""#;
        assert_eq!(parse_next(header), None);
    }

    #[test]
    fn none_when_results_param_absent() {
        let header = r#"<https://example.test/api/0/issues/?cursor=abc>; rel="next"; cursor="abc""#;
        assert_eq!(parse_next(header), None);
    }

    #[test]
    fn skips_prev_segment_and_reads_next() {
        let header = concat!(
            r#"<https://example.test/?cursor=0>; rel="previous"; results="true"; cursor="0", "#,
            r#"<https://example.test/?cursor=1>; rel="next"; results="true"; cursor="1""#
        );
        assert_eq!(parse_next(header), Some("1".to_string()));
    }
}
