//! Bulk collector for scheduled international flight plans.
//!
//! This library provides functionality to:
//! - Enumerate every route between two city lists, both directions
//! - Page through the flight plan search endpoint for each route
//! - Retry flaky requests until the server answers
//! - Merge every page into one shared origin → destination index
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │   Client    │───▶│  Protocol   │───▶│    Index    │
//! │ (HTTP POST) │    │  (Parser)   │    │  (Shared)   │
//! └─────────────┘    └─────────────┘    └─────────────┘
//!        │                                     │
//!        └─────────────┬───────────────────────┘
//!                      ▼
//!              ┌─────────────┐
//!              │  Collector  │
//!              │ (Scheduler) │
//!              └─────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use flight_sweep::{
//!     cities::{DOMESTIC_CITIES, INTERNATIONAL_CITIES},
//!     client::{ClientConfig, PageFetcher, SearchClient},
//!     collector::{Collector, CollectorConfig},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client_config = ClientConfig::default();
//!     let client = SearchClient::new(&client_config)?;
//!
//!     let collector = Collector::new(
//!         PageFetcher::new(client, &client_config),
//!         CollectorConfig::default(),
//!     );
//!
//!     let index = collector.run_all(DOMESTIC_CITIES, INTERNATIONAL_CITIES).await;
//!     index.write_json(std::io::stdout().lock(), false)?;
//!
//!     Ok(())
//! }
//! ```

pub mod cities;
pub mod client;
pub mod collector;
pub mod index;
pub mod protocol;
pub mod types;

pub use client::{ClientConfig, PageFetcher, PageSource, SearchClient};
pub use collector::{Collector, CollectorConfig, CollectorStats, RouteWorker};
pub use index::FlightIndex;
pub use protocol::{parse_page, parse_response};
pub use types::{CityPair, FlightRecord, PageResult};
