//! Mock Routing Example
//!
//! Demonstrates the routing-slip engine with a mock transport.
//! This example runs without requiring any real endpoints.
//!
//! Run with: cargo run --bin mock_routing [route.toml]

use config_loader::ConfigLoader;
use contracts::{Body, Message, RouteConfig};
use dispatcher::create_routing_slip;
use observability::{DispatchStatsAggregator, LogFormat, ObservabilityConfig};
use producer_cache::mock::MockTransport;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; no Prometheus listener for a one-shot demo
    observability::init_with_config(ObservabilityConfig {
        log_format: LogFormat::Compact,
        metrics_port: None,
        default_log_level: "info".to_string(),
    })?;

    tracing::info!("Starting Mock Routing Demo");

    // ==== Stage 1: Use default config or load from file ====
    let config = if let Some(path) = std::env::args().nth(1) {
        tracing::info!(path = %path, "Loading route config");
        ConfigLoader::load_from_path(std::path::Path::new(&path))?
    } else {
        RouteConfig {
            ignore_invalid_endpoints: true,
            cache_size: 2,
            ..RouteConfig::default()
        }
    };

    // ==== Stage 2: Build the engine over a mock transport ====
    let transport = MockTransport::new();
    let slip = create_routing_slip(config.clone(), transport.clone())?;

    // ==== Stage 3: Dispatch a batch of messages ====
    let itineraries = [
        "mock:orders,mock:billing,mock:audit",
        "mock:orders,mock:audit",
        "bogus:legacy,mock:billing",
        "mock:audit,mock:audit",
        "mock:inventory,mock:billing,mock:audit",
    ];

    let mut stats = DispatchStatsAggregator::new();

    for (index, itinerary) in itineraries.iter().enumerate() {
        let mut message = Message::with_body(Body::Text(format!("payload-{index}")));
        message.set_header(config.header.clone(), *itinerary);

        match slip.dispatch(&mut message).await {
            Ok(report) => {
                tracing::info!(
                    itinerary = %itinerary,
                    steps_sent = report.steps_sent,
                    skipped = ?report.skipped,
                    "Dispatch completed"
                );
                observability::record_dispatch_completed(report.steps_sent, report.skipped.len());
                for uri in &report.skipped {
                    observability::record_step_skipped(uri);
                }
                stats.record_success(report.steps_sent, &report.skipped);
            }
            Err(e) => {
                tracing::warn!(itinerary = %itinerary, error = %e, "Dispatch failed");
                observability::record_dispatch_failed(e.source.kind());
                stats.record_failure(e.source.kind(), e.steps_sent);
            }
        }
    }

    // ==== Stage 4: Report ====
    let dispatch = slip.metrics().snapshot();
    let cache = slip.cache_metrics().snapshot();
    tracing::info!(
        dispatches = dispatch.dispatches,
        succeeded = dispatch.succeeded,
        steps_sent = dispatch.steps_sent,
        steps_skipped = dispatch.steps_skipped,
        "Engine counters"
    );
    observability::record_cache_entries(cache.entries);
    tracing::info!(
        hits = cache.hits,
        misses = cache.misses,
        evictions = cache.evictions,
        entries = cache.entries,
        "Cache counters"
    );
    println!("{}", stats.summary());

    // ==== Stage 5: Cleanup ====
    tracing::info!("Shutting down...");
    slip.shutdown().await;
    tracing::info!(
        opened = transport.total_opens(),
        still_open = transport.currently_open(),
        "All producers closed"
    );

    Ok(())
}
