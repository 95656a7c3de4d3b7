//! Small helpers shared by the store, the scrape client and the orchestrator.
//!
//! - String truncation for log fields and error details
//! - SQL identifier quoting for configurable table/view names and JSON keys
//! - Rounding of elapsed wall-clock time for the summary line

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

/// Plain or schema-qualified relation name, e.g. `rooms` or `public.view_rooms`.
static RELATION_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*)?$").unwrap());

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (backing off to a char
/// boundary) with `"…(+N bytes)"` appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Quote a single SQL identifier, doubling any embedded quote.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Validate and quote a relation name given on the command line.
///
/// Returns `None` for anything that is not `name` or `schema.name`.
pub fn quote_relation(name: &str) -> Option<String> {
    if !RELATION_NAME.is_match(name) {
        return None;
    }
    Some(name.split('.').map(quote_ident).collect::<Vec<_>>().join("."))
}

/// Elapsed seconds rounded to two decimals, as printed in the summary.
pub fn round_secs(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundary() {
        // 'é' is two bytes; cutting at 3 would split the second one
        let s = "éééé";
        let result = truncate_for_log(s, 3);
        assert!(result.starts_with('é'));
        assert!(result.contains("…(+6 bytes)"));
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("rooms"), r#""rooms""#);
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
        assert_eq!(quote_ident("has space"), r#""has space""#);
    }

    #[test]
    fn test_quote_relation() {
        assert_eq!(quote_relation("rooms").as_deref(), Some(r#""rooms""#));
        assert_eq!(
            quote_relation("public.view_rooms").as_deref(),
            Some(r#""public"."view_rooms""#)
        );
        assert_eq!(quote_relation("rooms; drop table x"), None);
        assert_eq!(quote_relation("a.b.c"), None);
        assert_eq!(quote_relation(""), None);
    }

    #[test]
    fn test_round_secs() {
        assert_eq!(round_secs(Duration::from_millis(1234)), 1.23);
        assert_eq!(round_secs(Duration::from_millis(1236)), 1.24);
        assert_eq!(round_secs(Duration::ZERO), 0.0);
    }
}
