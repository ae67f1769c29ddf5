//! Core data types for flight schedule collection.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// One ordered (origin, destination) route to be queried.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CityPair {
    pub origin: String,
    pub destination: String,
}

impl CityPair {
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
        }
    }

    /// The same route flown the other way.
    pub fn reversed(&self) -> Self {
        Self {
            origin: self.destination.clone(),
            destination: self.origin.clone(),
        }
    }
}

impl fmt::Display for CityPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.origin, self.destination)
    }
}

/// A single flight record as returned by the search endpoint.
///
/// Only the `ori` and `arr` fields are ever read; every other field is kept
/// exactly as received and written back out unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightRecord {
    origin: String,
    destination: String,
    fields: Map<String, Value>,
}

impl FlightRecord {
    /// Field carrying the departure city name.
    pub const ORIGIN_FIELD: &'static str = "ori";
    /// Field carrying the arrival city name.
    pub const DESTINATION_FIELD: &'static str = "arr";

    /// Wrap a JSON value as a flight record.
    ///
    /// Returns `None` unless the value is an object with string `ori` and
    /// `arr` fields, since such a record cannot be routed into the index.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(fields) = value else {
            return None;
        };

        let origin = fields.get(Self::ORIGIN_FIELD)?.as_str()?.to_string();
        let destination = fields.get(Self::DESTINATION_FIELD)?.as_str()?.to_string();

        Some(Self {
            origin,
            destination,
            fields,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Look up any other field of the record.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

impl Serialize for FlightRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// One parsed page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    /// Routable records, in the order the server listed them
    pub records: Vec<FlightRecord>,
    /// Total result count across all pages of the route
    pub total: u64,
    /// 1-based page number reported by the server
    pub page: u64,
    /// Entries on the page that could not be turned into records
    pub skipped: usize,
}

impl PageResult {
    /// Whether another page must be requested after this one.
    ///
    /// Assumes every non-final page holds exactly `page_size` records, which
    /// is what the server promises for a fixed `pageSize`.
    pub fn has_next(&self, page_size: u32) -> bool {
        self.page.saturating_mul(u64::from(page_size)) < self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_keeps_unknown_fields() {
        let value = json!({"ori": "上海", "arr": "东京", "fltNo": "MU523", "days": [1, 3, 5]});
        let record = FlightRecord::from_value(value.clone()).unwrap();

        assert_eq!(record.origin(), "上海");
        assert_eq!(record.destination(), "东京");
        assert_eq!(record.get("fltNo"), Some(&json!("MU523")));
        assert_eq!(serde_json::to_value(&record).unwrap(), value);
    }

    #[test]
    fn test_record_serializes_in_server_field_order() {
        let raw = r#"{"ori":"上海","arr":"东京","fltNo":"MU523","days":"135","aircraft":{"type":"A330","seats":300}}"#;
        let record = FlightRecord::from_value(serde_json::from_str(raw).unwrap()).unwrap();

        assert_eq!(serde_json::to_string(&record).unwrap(), raw);
    }

    #[test]
    fn test_record_requires_route_fields() {
        assert!(FlightRecord::from_value(json!({"ori": "上海"})).is_none());
        assert!(FlightRecord::from_value(json!({"ori": "上海", "arr": 7})).is_none());
        assert!(FlightRecord::from_value(json!(["上海", "东京"])).is_none());
    }

    #[test]
    fn test_has_next() {
        let page = |page, total| PageResult {
            records: Vec::new(),
            total,
            page,
            skipped: 0,
        };

        assert!(page(1, 17).has_next(15));
        assert!(!page(2, 17).has_next(15));
        assert!(!page(1, 15).has_next(15));
        assert!(!page(1, 0).has_next(15));
        assert!(page(1, 16).has_next(15));
    }

    #[test]
    fn test_city_pair_reversed() {
        let pair = CityPair::new("北京", "巴黎");
        assert_eq!(pair.reversed(), CityPair::new("巴黎", "北京"));
        assert_eq!(pair.to_string(), "北京 -> 巴黎");
    }
}
