//! Self-throttling live-score poll loop.
//!
//! One task, one cycle at a time.  Each cycle either idles (nobody is
//! listening, so no upstream call is made) or fetches the live snapshot,
//! pushes every newly seen notable event to the broadcaster, prunes its
//! bookkeeping and works out its own next delay from the adaptive TTL.
//! A failed cycle is logged and retried after a fixed back-off; the loop
//! never exits.

use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::dedup::{fingerprint, NotableKinds, SeenEvents};
use crate::cache::live_ttl;
use crate::stats::CallKind;
use crate::stream::{Broadcaster, EventNotice};
use crate::upstream::payload::text;
use crate::upstream::{LiveFetcher, UpstreamError};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay when no subscriber is attached.
    pub idle_interval: Duration,
    /// Delay after a failed cycle.
    pub retry_interval: Duration,
    /// Added on top of the adaptive TTL so the next fetch lands after expiry.
    pub safety_margin: Duration,
    /// Hard floor between two cycles.
    pub min_interval: Duration,
    /// How long a delivered fingerprint stays in the seen table.
    pub seen_retention: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        PollerConfig {
            idle_interval: Duration::from_secs(30),
            retry_interval: Duration::from_secs(15),
            safety_margin: Duration::from_millis(300),
            min_interval: Duration::from_secs(4),
            seen_retention: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No subscribers; upstream untouched.
    Idle,
    Polled { live_count: usize, broadcast: usize },
    Failed,
}

pub struct Poller {
    fetcher: LiveFetcher,
    broadcaster: Broadcaster,
    notable: NotableKinds,
    seen: SeenEvents,
    /// fixture id → last "home-away" score.
    last_score: HashMap<i64, String>,
    config: PollerConfig,
}

impl Poller {
    pub fn new(
        fetcher: LiveFetcher,
        broadcaster: Broadcaster,
        notable: NotableKinds,
        seen: SeenEvents,
        config: PollerConfig,
    ) -> Self {
        Poller {
            fetcher,
            broadcaster,
            notable,
            seen,
            last_score: HashMap::new(),
            config,
        }
    }

    /// Delay after a successful cycle with `live_count` fixtures in play.
    pub fn next_delay(&self, live_count: usize) -> Duration {
        (live_ttl(live_count) + self.config.safety_margin).max(self.config.min_interval)
    }

    /// Run one cycle and return what happened plus the delay before the next.
    pub async fn cycle(&mut self) -> (CycleOutcome, Duration) {
        if self.broadcaster.count() == 0 {
            debug!("No subscribers, idling for {:?}", self.config.idle_interval);
            return (CycleOutcome::Idle, self.config.idle_interval);
        }

        match self.poll_once().await {
            Ok((live_count, broadcast)) => (
                CycleOutcome::Polled {
                    live_count,
                    broadcast,
                },
                self.next_delay(live_count),
            ),
            Err(e) => {
                if e.is_transient() {
                    error!("Poll cycle failed: {}", e);
                } else {
                    error!("Poll cycle failed, check configuration: {}", e);
                }
                (CycleOutcome::Failed, self.config.retry_interval)
            }
        }
    }

    async fn poll_once(&mut self) -> Result<(usize, usize), UpstreamError> {
        let payload = self.fetcher.fetch_live(CallKind::Live).await?;
        if !payload.is_recognized() {
            warn!("Unrecognized live payload, treating as no live fixtures");
        }

        let mut live_ids = HashSet::new();
        let mut broadcast = 0;

        for fixture in payload.fixtures() {
            let Some(fixture_id) = fixture.id() else {
                continue;
            };
            live_ids.insert(fixture_id);

            let score = fixture.score();
            if self.last_score.get(&fixture_id) != Some(&score) {
                self.last_score.insert(fixture_id, score);
            }

            for ev in fixture.events() {
                if !self.notable.contains(&ev.kind()) {
                    continue;
                }
                let event_id = fingerprint(&ev, fixture_id);
                if !self.seen.admit(&event_id) {
                    continue;
                }

                let notice = EventNotice::from_sub_event(&ev, fixture_id, event_id);
                let delivered = self.broadcaster.publish(&notice);
                info!(
                    "New {} in fixture {} ({}' {}) → {} subscriber(s)",
                    notice.kind,
                    fixture_id,
                    text(&notice.elapsed),
                    notice.player.as_deref().unwrap_or("?"),
                    delivered
                );
                broadcast += 1;
            }
        }

        let pruned = self.seen.prune();
        if pruned > 0 {
            debug!("Pruned {} expired event fingerprints", pruned);
        }
        retain_live(&mut self.last_score, &live_ids);

        Ok((payload.live_count(), broadcast))
    }

    /// Last known score per fixture still in the latest snapshot.
    #[allow(dead_code)]
    pub fn fixture_scores(&self) -> &HashMap<i64, String> {
        &self.last_score
    }

    /// Drive cycles forever, sleeping until each computed deadline.
    pub async fn run(mut self) {
        info!(
            "Poller started (idle={:?}, retry={:?}, floor={:?})",
            self.config.idle_interval, self.config.retry_interval, self.config.min_interval
        );
        let mut next_deadline = Instant::now();
        loop {
            tokio::time::sleep_until(next_deadline).await;
            let (outcome, delay) = self.cycle().await;
            debug!("Cycle {:?}, next in {:?}", outcome, delay);
            next_deadline = Instant::now() + delay;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

/// Forget scores of fixtures that dropped out of the snapshot.
fn retain_live(scores: &mut HashMap<i64, String>, live_ids: &HashSet<i64>) {
    scores.retain(|id, _| live_ids.contains(id));
}
