use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod api;
mod cache;
mod config;
mod flags;
mod live;
mod stats;
mod stream;
mod upstream;

use api::AppState;
use cache::TtlCache;
use config::Config;
use live::{NotableKinds, Poller, PollerConfig, SeenEvents};
use stats::ApiStats;
use stream::Broadcaster;
use upstream::{ApiFootballHttp, LiveFetcher};

/// Retention of the broadcaster's own duplicate gate for notable events.
const STREAM_DEDUP_WINDOW: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    if config.api_football_key.is_none() {
        warn!("API_FOOTBALL_KEY is not set; upstream calls will fail until it is");
    }

    // Process-wide services, built once and shared by handle.
    let stats = ApiStats::new();
    stats.spawn_minute_reset();

    let transport = Arc::new(ApiFootballHttp::new(
        &config.api_football_url,
        config.api_football_key.clone(),
        Duration::from_secs(config.request_timeout_secs),
    )?);
    let fetcher = LiveFetcher::new(transport, TtlCache::new(), stats.clone());

    let notable = NotableKinds::new(&config.notable_kinds);
    let broadcaster = Broadcaster::new(
        notable.clone(),
        STREAM_DEDUP_WINDOW,
        Duration::from_secs(config.keep_alive_secs),
    );

    let poller_config = PollerConfig::default();
    let seen = SeenEvents::new(poller_config.seen_retention);

    if config.enable_poller {
        Poller::new(
            fetcher.clone(),
            broadcaster.clone(),
            notable,
            seen.clone(),
            poller_config,
        )
        .spawn();
    } else {
        info!("Poller disabled (ENABLE_POLLER=false)");
    }

    let app = api::router(AppState {
        fetcher,
        broadcaster,
        stats,
        seen,
        app_key: config.enforced_app_key(),
    });
    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run HTTP server (blocks until shutdown)
    axum::serve(listener, app).await?;

    Ok(())
}
