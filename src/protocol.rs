//! Response parser for the flight plan search endpoint.
//!
//! A response body looks like:
//!
//! ```text
//! {"success": true, "root": {"total": 17, "page": 1, "root": [{"ori": ..., "arr": ..., ...}]}}
//! ```

use crate::types::{FlightRecord, PageResult};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Body is not a JSON object")]
    NotAnObject,
    #[error("Server did not report success")]
    Unsuccessful,
}

/// Default `total` when the server omits it.
const DEFAULT_TOTAL: u64 = 0;
/// Default `page` when the server omits it.
const DEFAULT_PAGE: u64 = 1;

/// Result of parsing one page body.
#[derive(Debug)]
pub enum PageOutcome {
    /// The page was usable.
    Page { result: PageResult, has_next: bool },
    /// The body could not be used. The route ends here, same as a last page.
    Unusable(ParseError),
}

impl PageOutcome {
    pub fn has_next(&self) -> bool {
        match self {
            PageOutcome::Page { has_next, .. } => *has_next,
            PageOutcome::Unusable(_) => false,
        }
    }
}

/// Parse a page body and decide whether the route continues.
pub fn parse_page(body: &str, page_size: u32) -> PageOutcome {
    match parse_response(body) {
        Ok(result) => {
            let has_next = result.has_next(page_size);
            PageOutcome::Page { result, has_next }
        }
        Err(e) => PageOutcome::Unusable(e),
    }
}

/// Parse a page body into its records and pagination metadata.
pub fn parse_response(body: &str) -> Result<PageResult, ParseError> {
    let value: Value = serde_json::from_str(body)?;
    let Value::Object(data) = value else {
        return Err(ParseError::NotAnObject);
    };

    if !data.get("success").is_some_and(is_truthy) {
        return Err(ParseError::Unsuccessful);
    }

    let empty = Map::new();
    let root = data
        .get("root")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let entries = root
        .get("root")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut records = Vec::with_capacity(entries.len());
    let mut skipped = 0;

    for entry in entries {
        match FlightRecord::from_value(entry.clone()) {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }

    let total = root
        .get("total")
        .and_then(as_count)
        .unwrap_or(DEFAULT_TOTAL);
    let page = root
        .get("page")
        .and_then(as_count)
        .unwrap_or(DEFAULT_PAGE);

    Ok(PageResult {
        records,
        total,
        page,
        skipped,
    })
}

/// A non-negative integer, whether sent as `17` or `17.0`.
fn as_count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }

    let f = value.as_f64()?;
    (f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

/// Loose truthiness for the `success` flag; the server is not strict about
/// sending a boolean.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_SIZE: u32 = 15;

    #[test]
    fn test_parse_full_page() {
        let body = r#"{
            "success": true,
            "root": {
                "total": 17,
                "page": 1,
                "root": [
                    {"ori": "北京", "arr": "巴黎", "fltNo": "CA933"},
                    {"ori": "北京", "arr": "巴黎", "fltNo": "AF129"}
                ]
            }
        }"#;

        let outcome = parse_page(body, PAGE_SIZE);
        assert!(outcome.has_next());

        let PageOutcome::Page { result, .. } = outcome else {
            panic!("expected a usable page");
        };
        assert_eq!(result.total, 17);
        assert_eq!(result.page, 1);
        assert_eq!(result.skipped, 0);
        assert_eq!(result.records.len(), 2);
        assert_eq!(
            result.records[1].get("fltNo").and_then(Value::as_str),
            Some("AF129")
        );
    }

    #[test]
    fn test_last_page_has_no_next() {
        let body = r#"{"success": true, "root": {"total": 17, "page": 2, "root": []}}"#;
        assert!(!parse_page(body, PAGE_SIZE).has_next());
    }

    #[test]
    fn test_missing_root_is_empty_last_page() {
        let outcome = parse_page(r#"{"success": true}"#, PAGE_SIZE);

        let PageOutcome::Page { result, has_next } = outcome else {
            panic!("expected a usable page");
        };
        assert!(result.records.is_empty());
        assert_eq!(result.total, 0);
        assert_eq!(result.page, 1);
        // 1 * 15 < 0 is false
        assert!(!has_next);
    }

    #[test]
    fn test_unsuccessful_body_is_unusable() {
        for body in [
            r#"{"success": false, "root": {"total": 100, "page": 1, "root": []}}"#,
            r#"{"root": {"total": 100, "page": 1, "root": []}}"#,
            r#"{"success": 0}"#,
        ] {
            let outcome = parse_page(body, PAGE_SIZE);
            assert!(matches!(
                outcome,
                PageOutcome::Unusable(ParseError::Unsuccessful)
            ));
            assert!(!outcome.has_next());
        }
    }

    #[test]
    fn test_garbage_body_is_unusable() {
        let outcome = parse_page("<html>502 Bad Gateway</html>", PAGE_SIZE);
        assert!(matches!(outcome, PageOutcome::Unusable(ParseError::Json(_))));

        let outcome = parse_page("", PAGE_SIZE);
        assert!(matches!(outcome, PageOutcome::Unusable(ParseError::Json(_))));

        let outcome = parse_page("[1, 2]", PAGE_SIZE);
        assert!(matches!(outcome, PageOutcome::Unusable(ParseError::NotAnObject)));
    }

    #[test]
    fn test_unroutable_entries_are_skipped() {
        let body = r#"{
            "success": true,
            "root": {"total": 3, "page": 1, "root": [
                {"ori": "成都", "arr": "东京"},
                {"ori": "成都"},
                "not a record"
            ]}
        }"#;

        let result = parse_response(body).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.skipped, 2);
    }

    #[test]
    fn test_bad_metadata_falls_back_to_defaults() {
        let body = r#"{"success": true, "root": {"total": "many", "page": -1, "root": []}}"#;
        let result = parse_response(body).unwrap();
        assert_eq!(result.total, DEFAULT_TOTAL);
        assert_eq!(result.page, DEFAULT_PAGE);

        let body = r#"{"success": true, "root": {"total": 17.5, "page": 1.5, "root": []}}"#;
        let result = parse_response(body).unwrap();
        assert_eq!(result.total, DEFAULT_TOTAL);
        assert_eq!(result.page, DEFAULT_PAGE);
    }

    #[test]
    fn test_integral_float_metadata_keeps_paging() {
        let body = r#"{"success": true, "root": {"total": 17.0, "page": 1.0, "root": []}}"#;
        let outcome = parse_page(body, PAGE_SIZE);
        assert!(outcome.has_next());

        let PageOutcome::Page { result, .. } = outcome else {
            panic!("expected a usable page");
        };
        assert_eq!(result.total, 17);
        assert_eq!(result.page, 1);
    }
}
