//! Cached access to the provider.
//!
//! Every call goes through the shared [`TtlCache`]: a hit is served from
//! memory, a miss performs exactly one logical upstream fetch (several
//! requests for paginated resources) and stores the result.  Failures are
//! returned to the caller untouched; retry policy belongs to the poll loop
//! or the request handler.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::UpstreamTransport;
use super::payload::{int, LivePayload, Roster};
use super::UpstreamError;
use crate::cache::{live_cache_ttl, TtlCache};
use crate::stats::{ApiStats, CallKind};

const LIVE_CACHE_KEY: &str = "liveFixtures";
const ROSTER_TTL: Duration = Duration::from_secs(12 * 60 * 60);
/// Upper bound on pages fetched for one paged resource.
const MAX_PAGES: u32 = 20;

/// Anything the fetcher keeps in the response cache.
#[derive(Debug, Clone)]
pub enum CachedResponse {
    Live(Arc<LivePayload>),
    Roster(Arc<Roster>),
}

#[derive(Clone)]
pub struct LiveFetcher {
    transport: Arc<dyn UpstreamTransport>,
    cache: TtlCache<CachedResponse>,
    stats: ApiStats,
    /// Held across a live-snapshot miss so concurrent callers share one fetch.
    live_refresh: Arc<Mutex<()>>,
}

impl LiveFetcher {
    pub fn new(
        transport: Arc<dyn UpstreamTransport>,
        cache: TtlCache<CachedResponse>,
        stats: ApiStats,
    ) -> Self {
        LiveFetcher {
            transport,
            cache,
            stats,
            live_refresh: Arc::new(Mutex::new(())),
        }
    }

    /// All currently live fixtures, cached for a TTL that shrinks as the
    /// number of live fixtures grows.
    pub async fn fetch_live(&self, kind: CallKind) -> Result<Arc<LivePayload>, UpstreamError> {
        if let Some(CachedResponse::Live(payload)) = self.cache.get(LIVE_CACHE_KEY) {
            self.stats.mark_cache_hit();
            return Ok(payload);
        }

        let _refresh = self.live_refresh.lock().await;
        // Someone else may have refreshed while we waited.
        if let Some(CachedResponse::Live(payload)) = self.cache.get(LIVE_CACHE_KEY) {
            self.stats.mark_cache_hit();
            return Ok(payload);
        }

        self.stats.mark_cache_miss();
        self.stats.mark_api_call(kind);

        let raw = self
            .transport
            .get_json("fixtures", &[("live", "all".to_string())])
            .await?;
        let payload = Arc::new(LivePayload::from_value(raw));

        let live_count = payload.live_count();
        let ttl = live_cache_ttl(live_count);
        debug!("Live snapshot: {} fixtures, cached for {:?}", live_count, ttl);

        self.cache
            .set(LIVE_CACHE_KEY, CachedResponse::Live(Arc::clone(&payload)), ttl);
        Ok(payload)
    }

    /// Every player of `team_id` in `season`, merged across all pages.
    pub async fn fetch_players(&self, team_id: i64, season: i64) -> Result<Arc<Roster>, UpstreamError> {
        let key = format!("players_team_{}_season_{}", team_id, season);
        if let Some(CachedResponse::Roster(roster)) = self.cache.get(&key) {
            self.stats.mark_cache_hit();
            return Ok(roster);
        }

        self.stats.mark_cache_miss();
        self.stats.mark_api_call(CallKind::Other);

        let params = [("team", team_id.to_string()), ("season", season.to_string())];
        let roster = Arc::new(self.fetch_paged("players", &params).await?);
        info!(
            "Roster team={} season={}: {} players over {} page(s)",
            team_id,
            season,
            roster.items.len(),
            roster.pages
        );

        self.cache
            .set(&key, CachedResponse::Roster(Arc::clone(&roster)), ROSTER_TTL);
        Ok(roster)
    }

    /// Request pages 1..=total until the declared `paging.total` is reached,
    /// never more than [`MAX_PAGES`]. A response without paging info counts
    /// as the only page.
    async fn fetch_paged(&self, path: &str, params: &[(&str, String)]) -> Result<Roster, UpstreamError> {
        let mut items = Vec::new();
        let mut page: u32 = 1;
        let mut total_pages: u32;

        loop {
            let mut query: Vec<(&str, String)> = params.to_vec();
            query.push(("page", page.to_string()));

            let data = self.transport.get_json(path, &query).await?;
            if let Some(list) = data.get("response").and_then(Value::as_array) {
                items.extend(list.iter().cloned());
            }
            total_pages = declared_total_pages(&data);
            if total_pages > MAX_PAGES {
                if page == 1 {
                    warn!(
                        "{} declares {} pages, fetching only the first {}",
                        path, total_pages, MAX_PAGES
                    );
                }
                total_pages = MAX_PAGES;
            }

            page += 1;
            if page > total_pages {
                break;
            }
        }

        Ok(Roster {
            items,
            pages: total_pages,
        })
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }
}

/// `paging.total` when it is a positive number, else 1.
fn declared_total_pages(data: &Value) -> u32 {
    int(&data["paging"]["total"])
        .filter(|t| *t > 0)
        .map(|t| t.min(u32::MAX as i64) as u32)
        .unwrap_or(1)
}
