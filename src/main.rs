//! Flight plan collector CLI
//!
//! Sweeps every domestic/international route through the flight plan search
//! endpoint and prints the collected schedule as one JSON document.

use clap::builder::TypedValueParser;
use clap::{Parser, Subcommand};
use flight_sweep::{
    cities::{self, DOMESTIC_CITIES, INTERNATIONAL_CITIES},
    client::{ClientConfig, PageFetcher, SearchClient, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_URL},
    collector::{Collector, CollectorConfig, DEFAULT_CONCURRENCY},
};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "flight-sweep")]
#[command(about = "Bulk collector for scheduled international flight plans", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Query every route and print the collected flights as JSON
    Collect {
        /// Search endpoint URL
        #[arg(long, default_value = DEFAULT_SEARCH_URL)]
        url: String,

        /// Number of routes queried at once
        #[arg(
            short,
            long,
            env = "FLIGHT_SWEEP_CONCURRENCY",
            default_value_t = DEFAULT_CONCURRENCY,
            value_parser = clap::value_parser!(u64).range(1..).map(|v| v as usize)
        )]
        concurrency: usize,

        /// Per-request timeout in seconds
        #[arg(short, long, default_value = "30")]
        timeout: u64,

        /// Pause before every request attempt, in milliseconds
        #[arg(long, default_value = "1000")]
        retry_delay_ms: u64,

        /// pageSize sent to the server
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,

        #[command(flatten)]
        cities: CityArgs,

        /// Write the JSON result to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON result
        #[arg(long)]
        pretty: bool,
    },

    /// List the routes a collection would query, in order
    Routes {
        #[command(flatten)]
        cities: CityArgs,
    },
}

#[derive(clap::Args)]
struct CityArgs {
    /// Comma-separated domestic cities (defaults to the built-in list)
    #[arg(long, value_delimiter = ',')]
    domestic: Vec<String>,

    /// Comma-separated international cities (defaults to the built-in list)
    #[arg(long, value_delimiter = ',')]
    international: Vec<String>,
}

impl CityArgs {
    fn resolve(self) -> (Vec<String>, Vec<String>) {
        let or_builtin = |list: Vec<String>, builtin: &[&str]| {
            if list.is_empty() {
                builtin.iter().map(|c| c.to_string()).collect::<Vec<_>>()
            } else {
                list
            }
        };

        (
            or_builtin(self.domestic, DOMESTIC_CITIES),
            or_builtin(self.international, INTERNATIONAL_CITIES),
        )
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for the result
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match cli.command {
        Commands::Collect {
            url,
            concurrency,
            timeout,
            retry_delay_ms,
            page_size,
            cities,
            output,
            pretty,
        } => {
            let client_config = ClientConfig::default()
                .with_url(url)
                .with_timeout(Duration::from_secs(timeout))
                .with_retry_delay(Duration::from_millis(retry_delay_ms))
                .with_page_size(page_size);
            let collector_config = CollectorConfig::default().with_concurrency(concurrency);

            run_collect(client_config, collector_config, cities, output, pretty).await?;
        }

        Commands::Routes { cities } => {
            show_routes(cities);
        }
    }

    Ok(())
}

async fn run_collect(
    client_config: ClientConfig,
    collector_config: CollectorConfig,
    city_args: CityArgs,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (domestic, international) = city_args.resolve();

    tracing::info!("Starting flight plan collector");
    tracing::info!("Endpoint: {}", client_config.url);
    tracing::info!(
        "Cities: {} domestic, {} international",
        domestic.len(),
        international.len()
    );
    tracing::info!("Concurrency: {}", collector_config.concurrency);
    tracing::info!(
        "Timeout: {:?}, retry delay: {:?}, page size: {}",
        client_config.timeout,
        client_config.retry_delay,
        client_config.page_size
    );

    let client = SearchClient::new(&client_config)?;
    let collector = Collector::new(PageFetcher::new(client, &client_config), collector_config);
    let stats = collector.stats();

    // Spawn stats reporting task
    let stats_handle = {
        let stats = stats.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            interval.tick().await;
            loop {
                interval.tick().await;
                let s = stats.snapshot();
                tracing::info!(
                    "Progress: routes={}/{} active={} pages={} records={} retries={}",
                    s.routes_completed,
                    s.routes_started,
                    s.active_routes,
                    s.pages_fetched,
                    s.records_merged,
                    s.retries
                );
            }
        })
    };

    let start = Instant::now();
    let index = collector.run_all(&domestic, &international).await;
    let elapsed = start.elapsed();

    stats_handle.abort();

    match output {
        Some(path) => {
            index.write_json(BufWriter::new(File::create(&path)?), pretty)?;
            tracing::info!("Wrote results to {}", path.display());
        }
        None => index.write_json(io::stdout().lock(), pretty)?,
    }
    println!("Elapsed: {:.3}s", elapsed.as_secs_f64());

    let final_stats = stats.snapshot();
    tracing::info!("Final statistics:");
    tracing::info!("  Routes completed: {}", final_stats.routes_completed);
    tracing::info!("  Routes truncated: {}", final_stats.routes_truncated);
    tracing::info!("  Pages fetched: {}", final_stats.pages_fetched);
    tracing::info!("  Retries: {}", final_stats.retries);
    tracing::info!("  Records collected: {}", final_stats.records_merged);
    tracing::info!("  Records skipped: {}", final_stats.records_skipped);
    tracing::info!("  Peak active routes: {}", final_stats.peak_active_routes);
    tracing::info!(
        "  Network received: {:.2} MB",
        final_stats.bytes_received as f64 / (1024.0 * 1024.0)
    );
    tracing::info!(
        "  Index: {} origins, {} routes",
        index.origin_count(),
        index.route_count()
    );

    Ok(())
}

fn show_routes(city_args: CityArgs) {
    let (domestic, international) = city_args.resolve();
    let pairs = cities::route_pairs(&domestic, &international);

    for (route_id, pair) in pairs.iter().enumerate() {
        println!("{}\t{}\t{}", route_id, pair.origin, pair.destination);
    }
    println!();
    println!("{} routes", pairs.len());
}
