//! Shared in-memory flight index.
//!
//! The index maps origin city → destination city → flight records. Origins,
//! destinations and records all keep the order they first arrived in. It is shared by every route worker and guarded by a
//! single mutex; with only a handful of routes in flight at once, contention
//! on it is negligible.
//!
//! Merging is pure append. Delivering the same page twice stores its records
//! twice; nothing is deduplicated.

use crate::types::FlightRecord;
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use indexmap::IndexMap;
use std::io::{self, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Records for every destination reached from one origin.
pub type DestinationMap = IndexMap<String, Vec<FlightRecord>>;

/// Records grouped by origin, then destination.
pub type RouteMap = IndexMap<String, DestinationMap>;

/// Append-only index of collected flights.
#[derive(Debug, Default)]
pub struct FlightIndex {
    routes: Mutex<RouteMap>,
}

impl FlightIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch of records, each under its own origin and destination.
    ///
    /// The whole batch goes in under one lock, so another merge never
    /// interleaves with it. Returns the number of records added.
    pub fn merge(&self, records: Vec<FlightRecord>) -> usize {
        let count = records.len();
        if count == 0 {
            return 0;
        }

        let mut routes = self.routes.lock();
        for record in records {
            routes
                .entry(record.origin().to_string())
                .or_default()
                .entry(record.destination().to_string())
                .or_default()
                .push(record);
        }

        count
    }

    /// Append a single record.
    pub fn insert(&self, record: FlightRecord) {
        self.merge(vec![record]);
    }

    /// Records collected for a route, if any arrived.
    pub fn get(&self, origin: &str, destination: &str) -> Option<Vec<FlightRecord>> {
        self.routes
            .lock()
            .get(origin)
            .and_then(|destinations| destinations.get(destination))
            .cloned()
    }

    /// Whether any record departing from `origin` has been collected.
    pub fn contains_origin(&self, origin: &str) -> bool {
        self.routes.lock().contains_key(origin)
    }

    pub fn origin_count(&self) -> usize {
        self.routes.lock().len()
    }

    /// Number of (origin, destination) entries holding at least one record.
    pub fn route_count(&self) -> usize {
        self.routes.lock().values().map(IndexMap::len).sum()
    }

    pub fn record_count(&self) -> usize {
        self.routes
            .lock()
            .values()
            .flat_map(IndexMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.lock().is_empty()
    }

    /// Move the collected routes out, leaving the index empty.
    pub fn take(&self) -> RouteMap {
        std::mem::take(&mut *self.routes.lock())
    }

    /// Write the whole index as a single JSON document followed by a newline.
    pub fn write_json<W: Write>(&self, mut writer: W, pretty: bool) -> Result<(), OutputError> {
        if pretty {
            serde_json::to_writer_pretty(&mut writer, self)?;
        } else {
            serde_json::to_writer(&mut writer, self)?;
        }
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl From<RouteMap> for FlightIndex {
    fn from(routes: RouteMap) -> Self {
        Self {
            routes: Mutex::new(routes),
        }
    }
}

impl Serialize for FlightIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.routes.lock().serialize(serializer)
    }
}
