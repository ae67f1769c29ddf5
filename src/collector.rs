//! Route scheduling and collection.
//!
//! Every (origin, destination) pair gets its own task. A task must win a
//! permit from the shared pool before it touches the network and keeps that
//! permit until its last page has been merged, so the pool bounds the number
//! of routes in flight rather than the number of requests.

use crate::cities;
use crate::client::{PageFetcher, PageSource};
use crate::index::FlightIndex;
use crate::protocol::{self, PageOutcome};
use crate::types::CityPair;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default number of routes queried at once. The upstream service does not
/// cope well with more.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Statistics for a collection run.
#[derive(Debug, Default)]
pub struct CollectorStats {
    pub routes_started: AtomicU64,
    pub routes_completed: AtomicU64,
    /// Routes cut short by an unusable response body
    pub routes_truncated: AtomicU64,
    pub pages_fetched: AtomicU64,
    pub retries: AtomicU64,
    pub records_merged: AtomicU64,
    pub records_skipped: AtomicU64,
    pub bytes_received: AtomicU64,
    pub active_routes: AtomicUsize,
    pub peak_active_routes: AtomicUsize,
}

impl CollectorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            routes_started: self.routes_started.load(Ordering::Relaxed),
            routes_completed: self.routes_completed.load(Ordering::Relaxed),
            routes_truncated: self.routes_truncated.load(Ordering::Relaxed),
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            records_merged: self.records_merged.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            active_routes: self.active_routes.load(Ordering::Relaxed),
            peak_active_routes: self.peak_active_routes.load(Ordering::Relaxed),
        }
    }

    fn route_activated(&self) -> ActiveRoute<'_> {
        let current = self.active_routes.fetch_add(1, Ordering::Relaxed) + 1;

        let mut peak = self.peak_active_routes.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_active_routes.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }

        ActiveRoute { stats: self }
    }
}

/// Decrements the active route count when dropped, panics included.
struct ActiveRoute<'a> {
    stats: &'a CollectorStats,
}

impl Drop for ActiveRoute<'_> {
    fn drop(&mut self) {
        self.stats.active_routes.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub routes_started: u64,
    pub routes_completed: u64,
    pub routes_truncated: u64,
    pub pages_fetched: u64,
    pub retries: u64,
    pub records_merged: u64,
    pub records_skipped: u64,
    pub bytes_received: u64,
    pub active_routes: usize,
    pub peak_active_routes: usize,
}

/// Configuration for the collector.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Maximum number of routes queried at once
    pub concurrency: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl CollectorConfig {
    /// Set the permit pool size. Zero is raised to one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// What one route produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSummary {
    pub pages: u32,
    pub records: usize,
    pub retries: u32,
    /// The route ended on an unusable body instead of its last page
    pub truncated: bool,
}

/// Walks every page of one route and merges the results into the index.
pub struct RouteWorker<S> {
    fetcher: Arc<PageFetcher<S>>,
    index: Arc<FlightIndex>,
    stats: Arc<CollectorStats>,
}

impl<S: PageSource> RouteWorker<S> {
    pub fn new(
        fetcher: Arc<PageFetcher<S>>,
        index: Arc<FlightIndex>,
        stats: Arc<CollectorStats>,
    ) -> Self {
        Self {
            fetcher,
            index,
            stats,
        }
    }

    /// Fetch pages for `pair` in order until the server has no more.
    ///
    /// An unusable body ends the route exactly like a final page would. What
    /// was merged before it stays in the index and nothing is retried.
    pub async fn run(&self, pair: &CityPair) -> RouteSummary {
        let page_size = self.fetcher.page_size();
        let mut summary = RouteSummary::default();
        let mut page_index = 1;

        loop {
            let fetched = self
                .fetcher
                .fetch(&pair.origin, &pair.destination, page_index)
                .await;

            summary.pages += 1;
            summary.retries += fetched.retries;
            self.stats.pages_fetched.fetch_add(1, Ordering::Relaxed);
            self.stats
                .retries
                .fetch_add(u64::from(fetched.retries), Ordering::Relaxed);
            self.stats
                .bytes_received
                .fetch_add(fetched.body.len() as u64, Ordering::Relaxed);

            match protocol::parse_page(&fetched.body, page_size) {
                PageOutcome::Page { result, has_next } => {
                    if result.skipped > 0 {
                        tracing::warn!(
                            "{} page {}: dropped {} entries without ori/arr",
                            pair,
                            page_index,
                            result.skipped
                        );
                        self.stats
                            .records_skipped
                            .fetch_add(result.skipped as u64, Ordering::Relaxed);
                    }

                    let merged = self.index.merge(result.records);
                    summary.records += merged;
                    self.stats
                        .records_merged
                        .fetch_add(merged as u64, Ordering::Relaxed);

                    tracing::debug!(
                        "{} page {}: {} records (total {})",
                        pair,
                        page_index,
                        merged,
                        result.total
                    );

                    if !has_next {
                        break;
                    }
                    page_index += 1;
                }
                PageOutcome::Unusable(e) => {
                    tracing::warn!("{} stopped at page {}: {}", pair, page_index, e);
                    summary.truncated = true;
                    self.stats.routes_truncated.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }
        }

        self.stats.routes_completed.fetch_add(1, Ordering::Relaxed);
        summary
    }
}

/// Runs every route under a shared permit pool and collects the results.
pub struct Collector<S> {
    fetcher: Arc<PageFetcher<S>>,
    config: CollectorConfig,
    stats: Arc<CollectorStats>,
}

impl<S: PageSource + 'static> Collector<S> {
    /// Create a new collector.
    pub fn new(fetcher: PageFetcher<S>, config: CollectorConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            config,
            stats: Arc::new(CollectorStats::new()),
        }
    }

    /// Get a reference to the collector stats.
    pub fn stats(&self) -> Arc<CollectorStats> {
        Arc::clone(&self.stats)
    }

    /// Query every route between the two city lists, both directions.
    pub async fn run_all<D, I>(&self, domestic: &[D], international: &[I]) -> FlightIndex
    where
        D: AsRef<str>,
        I: AsRef<str>,
    {
        self.run_routes(cities::route_pairs(domestic, international))
            .await
    }

    /// Query the given routes and return the index once all of them finish.
    pub async fn run_routes(&self, pairs: Vec<CityPair>) -> FlightIndex {
        let concurrency = self.config.concurrency.max(1);
        let permits = Arc::new(Semaphore::new(concurrency));
        let index = Arc::new(FlightIndex::new());

        tracing::info!(
            "Collecting {} routes, {} at a time",
            pairs.len(),
            concurrency
        );

        let mut tasks = JoinSet::new();

        for (route_id, pair) in pairs.into_iter().enumerate() {
            let worker = RouteWorker::new(
                Arc::clone(&self.fetcher),
                Arc::clone(&index),
                Arc::clone(&self.stats),
            );
            let permits = Arc::clone(&permits);
            let stats = Arc::clone(&self.stats);

            tasks.spawn(async move {
                // Held until the route's last page is merged
                let Ok(_permit) = permits.acquire_owned().await else {
                    tracing::error!("Permit pool closed, skipping route {}: {}", route_id, pair);
                    return;
                };
                let _active = stats.route_activated();

                stats.routes_started.fetch_add(1, Ordering::Relaxed);
                tracing::info!("Starting route {}: {}", route_id, pair);

                let summary = worker.run(&pair).await;
                tracing::debug!(
                    "Finished route {}: {} ({} pages, {} records, {} retries)",
                    route_id,
                    pair,
                    summary.pages,
                    summary.records,
                    summary.retries
                );
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!("Route task failed: {}", e);
            }
        }

        // Every task has been joined, so no other handle to the index is left.
        Arc::try_unwrap(index).unwrap_or_else(|shared| FlightIndex::from(shared.take()))
    }
}
