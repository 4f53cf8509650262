//! Event identity and "have we already sent this?" bookkeeping.
//!
//! The provider re-sends a fixture's whole event list on every poll, so the
//! same goal shows up dozens of times.  An event's identity is derived from
//! its descriptive fields only, never from when it was observed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::upstream::payload::text;
use crate::upstream::SubEvent;

/// The descriptive fields that make two sub-events the same logical event.
/// Missing fields are empty strings, so building a key never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventKey {
    pub fixture_id: String,
    pub kind: String,
    pub team_id: String,
    pub elapsed: String,
    pub extra: String,
    pub participant: String,
    pub detail: String,
}

impl EventKey {
    /// Fields are rendered as sent, so `"45'"` and `5.5` keep their identity.
    pub fn from_sub_event(ev: &SubEvent<'_>, fixture_id: i64) -> Self {
        EventKey {
            fixture_id: fixture_id.to_string(),
            kind: ev.kind().to_lowercase(),
            team_id: text(ev.field("/team/id")),
            elapsed: text(ev.field("/time/elapsed")),
            extra: text(ev.field("/time/extra")),
            participant: ev.participant(),
            detail: ev.detail(),
        }
    }

    /// `fixture|kind|team|elapsed+extra|participant|detail`
    pub fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{}|{}+{}|{}|{}",
            self.fixture_id,
            self.kind,
            self.team_id,
            self.elapsed,
            self.extra,
            self.participant,
            self.detail
        )
    }
}

/// Fingerprint of `ev` inside fixture `fixture_id`.
pub fn fingerprint(ev: &SubEvent<'_>, fixture_id: i64) -> String {
    EventKey::from_sub_event(ev, fixture_id).fingerprint()
}

/// Fingerprint → time of first admission, with a fixed retention horizon.
///
/// A fingerprint admitted less than `retention` ago is rejected; once the
/// horizon has passed it may be admitted again.  Rejections do not extend
/// the window.
#[derive(Clone)]
pub struct SeenEvents {
    inner: Arc<Mutex<HashMap<String, Instant>>>,
    retention: Duration,
}

impl SeenEvents {
    pub fn new(retention: Duration) -> Self {
        SeenEvents {
            inner: Arc::new(Mutex::new(HashMap::new())),
            retention,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn admit(&self, fingerprint: &str) -> bool {
        self.admit_at(fingerprint, Instant::now())
    }

    /// True the first time `fingerprint` is seen within the horizon.
    pub fn admit_at(&self, fingerprint: &str, now: Instant) -> bool {
        let mut seen = self.lock();
        if let Some(at) = seen.get(fingerprint) {
            if now.saturating_duration_since(*at) <= self.retention {
                return false;
            }
        }
        seen.insert(fingerprint.to_string(), now);
        true
    }

    pub fn prune(&self) -> usize {
        self.prune_older_than_at(Instant::now())
    }

    /// Drop entries older than the retention horizon; returns how many.
    pub fn prune_older_than_at(&self, now: Instant) -> usize {
        let mut seen = self.lock();
        let before = seen.len();
        let retention = self.retention;
        seen.retain(|_, at| now.saturating_duration_since(*at) <= retention);
        before - seen.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Event kinds that get deduplicated, individually pushed notifications.
#[derive(Debug, Clone)]
pub struct NotableKinds(HashSet<String>);

impl NotableKinds {
    pub fn new<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        NotableKinds(
            kinds
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.0.contains(&kind.trim().to_lowercase())
    }
}

impl Default for NotableKinds {
    fn default() -> Self {
        NotableKinds::new(["goal"])
    }
}
