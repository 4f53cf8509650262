//! Upstream-call, cache and endpoint usage counters.
//!
//! Daily counters roll over lazily on the first touch after the UTC date
//! changes; per-minute counters are zeroed by [`ApiStats::spawn_minute_reset`].

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// What an upstream call was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Live,
    Compact,
    Events,
    Stats,
    Lineups,
    Other,
}

impl CallKind {
    pub const ALL: [CallKind; 6] = [
        CallKind::Live,
        CallKind::Compact,
        CallKind::Events,
        CallKind::Stats,
        CallKind::Lineups,
        CallKind::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CallKind::Live => "live",
            CallKind::Compact => "compact",
            CallKind::Events => "events",
            CallKind::Stats => "stats",
            CallKind::Lineups => "lineups",
            CallKind::Other => "other",
        }
    }
}

/// Serializable view returned by `/api/stats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub today: u64,
    pub last_minute: u64,
    pub by_type_today: BTreeMap<&'static str, u64>,
    pub endpoint_hits_today: u64,
    pub endpoint_hits_last_minute: u64,
    pub endpoint_by_path_today: BTreeMap<String, u64>,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

struct Counters {
    day: NaiveDate,
    api_calls_today: u64,
    api_calls_last_minute: u64,
    by_kind_today: [u64; 6],
    cache_hits: u64,
    cache_misses: u64,
    endpoint_hits_today: u64,
    endpoint_hits_last_minute: u64,
    endpoint_by_path_today: BTreeMap<String, u64>,
}

impl Counters {
    fn new(day: NaiveDate) -> Self {
        Counters {
            day,
            api_calls_today: 0,
            api_calls_last_minute: 0,
            by_kind_today: [0; 6],
            cache_hits: 0,
            cache_misses: 0,
            endpoint_hits_today: 0,
            endpoint_hits_last_minute: 0,
            endpoint_by_path_today: BTreeMap::new(),
        }
    }

    fn roll_over(&mut self, today: NaiveDate) {
        if today != self.day {
            *self = Counters::new(today);
        }
    }
}

/// Cloneable handle to the process-wide usage counters.
#[derive(Clone)]
pub struct ApiStats {
    inner: Arc<Mutex<Counters>>,
}

impl ApiStats {
    pub fn new() -> Self {
        ApiStats {
            inner: Arc::new(Mutex::new(Counters::new(Utc::now().date_naive()))),
        }
    }

    fn counters(&self, today: NaiveDate) -> MutexGuard<'_, Counters> {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        guard.roll_over(today);
        guard
    }

    pub fn mark_api_call(&self, kind: CallKind) {
        self.mark_api_call_on(kind, Utc::now().date_naive());
    }

    fn mark_api_call_on(&self, kind: CallKind, today: NaiveDate) {
        let mut c = self.counters(today);
        c.api_calls_today += 1;
        c.api_calls_last_minute += 1;
        c.by_kind_today[kind as usize] += 1;
    }

    pub fn mark_cache_hit(&self) {
        self.counters(Utc::now().date_naive()).cache_hits += 1;
    }

    pub fn mark_cache_miss(&self) {
        self.counters(Utc::now().date_naive()).cache_misses += 1;
    }

    pub fn mark_endpoint_hit(&self, method: &str, path: &str) {
        let mut c = self.counters(Utc::now().date_naive());
        c.endpoint_hits_today += 1;
        c.endpoint_hits_last_minute += 1;
        *c.endpoint_by_path_today
            .entry(format!("{} {}", method, path))
            .or_insert(0) += 1;
    }

    pub fn reset_last_minute(&self) {
        let mut c = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        c.api_calls_last_minute = 0;
        c.endpoint_hits_last_minute = 0;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot_on(Utc::now().date_naive())
    }

    fn snapshot_on(&self, today: NaiveDate) -> StatsSnapshot {
        let c = self.counters(today);
        StatsSnapshot {
            today: c.api_calls_today,
            last_minute: c.api_calls_last_minute,
            by_type_today: CallKind::ALL
                .iter()
                .map(|k| (k.as_str(), c.by_kind_today[*k as usize]))
                .collect(),
            endpoint_hits_today: c.endpoint_hits_today,
            endpoint_hits_last_minute: c.endpoint_hits_last_minute,
            endpoint_by_path_today: c.endpoint_by_path_today.clone(),
            cache_hits: c.cache_hits,
            cache_misses: c.cache_misses,
        }
    }

    /// Zero the per-minute counters every 60 s for the life of the process.
    pub fn spawn_minute_reset(&self) {
        let stats = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            // First tick fires immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                stats.reset_last_minute();
            }
        });
    }
}

impl Default for ApiStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_kind() {
        let stats = ApiStats::new();
        stats.mark_api_call(CallKind::Live);
        stats.mark_api_call(CallKind::Live);
        stats.mark_api_call(CallKind::Other);
        stats.mark_cache_hit();
        stats.mark_cache_miss();
        stats.mark_cache_miss();

        let snap = stats.snapshot();
        assert_eq!(snap.today, 3);
        assert_eq!(snap.last_minute, 3);
        assert_eq!(snap.by_type_today["live"], 2);
        assert_eq!(snap.by_type_today["other"], 1);
        assert_eq!(snap.by_type_today["lineups"], 0);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.cache_misses, 2);
    }

    #[test]
    fn test_endpoint_hits_by_path() {
        let stats = ApiStats::new();
        stats.mark_endpoint_hit("GET", "/live");
        stats.mark_endpoint_hit("GET", "/live");
        stats.mark_endpoint_hit("GET", "/stream");

        let snap = stats.snapshot();
        assert_eq!(snap.endpoint_hits_today, 3);
        assert_eq!(snap.endpoint_by_path_today["GET /live"], 2);
        assert_eq!(snap.endpoint_by_path_today["GET /stream"], 1);
    }

    #[test]
    fn test_last_minute_reset_keeps_daily_totals() {
        let stats = ApiStats::new();
        stats.mark_api_call(CallKind::Compact);
        stats.mark_endpoint_hit("GET", "/live/compact");
        stats.reset_last_minute();

        let snap = stats.snapshot();
        assert_eq!(snap.last_minute, 0);
        assert_eq!(snap.endpoint_hits_last_minute, 0);
        assert_eq!(snap.today, 1);
        assert_eq!(snap.endpoint_hits_today, 1);
    }

    #[test]
    fn test_day_rollover_clears_everything() {
        let stats = ApiStats::new();
        let today = Utc::now().date_naive();
        stats.mark_api_call_on(CallKind::Live, today);
        stats.mark_cache_hit();

        let tomorrow = today.succ_opt().unwrap();
        let snap = stats.snapshot_on(tomorrow);
        assert_eq!(snap.today, 0);
        assert_eq!(snap.cache_hits, 0);
        assert_eq!(snap.by_type_today["live"], 0);
    }
}
