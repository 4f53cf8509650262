//! Subscriber registry for the server-sent event stream.
//!
//! Each attached client is a bounded channel feeding its HTTP response body.
//! Delivery is a non-blocking `try_send`: a closed channel (client gone) or a
//! full one (client not reading) counts as a failed write and the subscriber
//! is dropped on the spot.  No other health check exists.
//!
//! ```text
//!  Poller ──publish──▶ Broadcaster ──try_send──▶ Subscription (mpsc rx)
//!                          ▲                        │  Stream<SseFrame>
//!                          └──── detach on Drop ────┘
//! ```

pub mod message;

pub use message::{EventNotice, SseFrame};

use chrono::Utc;
use futures_util::Stream;
use std::collections::HashSet;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::live::dedup::{NotableKinds, SeenEvents};

/// Frames buffered per subscriber before it is considered dead.
const SUBSCRIBER_BUFFER: usize = 64;

pub type SubscriberId = u64;

struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<SseFrame>,
    /// Empty = every type.
    types: HashSet<String>,
}

impl Subscriber {
    fn wants(&self, message_type: &str) -> bool {
        self.types.is_empty() || self.types.contains(message_type)
    }
}

struct Registry {
    next_id: SubscriberId,
    subscribers: Vec<Subscriber>,
}

/// Cloneable handle to the process-wide subscriber list.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<Mutex<Registry>>,
    notable: NotableKinds,
    /// Second, registry-side gate for notable events.
    gate: SeenEvents,
    keep_alive: Duration,
}

impl Broadcaster {
    pub fn new(notable: NotableKinds, gate_retention: Duration, keep_alive: Duration) -> Self {
        Broadcaster {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 1,
                subscribers: Vec::new(),
            })),
            notable,
            gate: SeenEvents::new(gate_retention),
            keep_alive,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Register `tx` with an optional type filter (matched case-insensitively).
    pub fn attach<I, S>(&self, tx: mpsc::Sender<SseFrame>, types: I) -> SubscriberId
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let types: HashSet<String> = types
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let mut reg = self.lock();
        let id = reg.next_id;
        reg.next_id += 1;
        info!(
            "Subscriber {} attached (types={:?}, total={})",
            id,
            types,
            reg.subscribers.len() + 1
        );
        reg.subscribers.push(Subscriber { id, tx, types });
        id
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn detach(&self, id: SubscriberId) {
        let mut reg = self.lock();
        let before = reg.subscribers.len();
        reg.subscribers.retain(|s| s.id != id);
        if reg.subscribers.len() < before {
            debug!("Subscriber {} detached (total={})", id, reg.subscribers.len());
        }
    }

    pub fn count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Open a stream for a new client: greeting first, then published
    /// frames, with a comment ping every keep-alive interval.
    pub fn subscribe<I, S>(&self, types: I) -> Subscription
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        // Fresh channel with room to spare; cannot fail.
        let _ = tx.try_send(SseFrame::greeting());
        let id = self.attach(tx, types);

        let broadcaster = self.clone();
        let period = self.keep_alive;
        let pinger = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                if !broadcaster.ping(id) {
                    break;
                }
            }
        });

        Subscription {
            id,
            rx,
            broadcaster: self.clone(),
            pinger,
        }
    }

    /// Send a keep-alive comment to one subscriber; false once it is gone.
    pub fn ping(&self, id: SubscriberId) -> bool {
        let mut reg = self.lock();
        let Some(pos) = reg.subscribers.iter().position(|s| s.id == id) else {
            return false;
        };
        if reg.subscribers[pos]
            .tx
            .try_send(SseFrame::ping(Utc::now().timestamp_millis()))
            .is_err()
        {
            reg.subscribers.remove(pos);
            debug!("Subscriber {} dropped on keep-alive", id);
            return false;
        }
        true
    }

    /// Deliver `notice` to every interested subscriber.
    ///
    /// Notable kinds pass through the registry gate first: a key already
    /// delivered within the gate window is dropped, unless the fixture id is
    /// unknown, in which case it is always delivered.  Returns how many
    /// subscribers received the frame.
    pub fn publish(&self, notice: &EventNotice) -> usize {
        self.publish_at(notice, Instant::now())
    }

    pub fn publish_at(&self, notice: &EventNotice, now: Instant) -> usize {
        let message_type = notice.message_type();

        let frame = if self.notable.contains(&message_type) {
            self.gate.prune_older_than_at(now);
            let key = notice.key();
            let fingerprint = key.fingerprint();
            if !key.fixture_id.is_empty() && !self.gate.admit_at(&fingerprint, now) {
                debug!("Duplicate {} suppressed: {}", message_type, fingerprint);
                return 0;
            }
            let mut body = notice.to_json();
            if let Some(obj) = body.as_object_mut() {
                obj.insert("dedupeKey".into(), fingerprint.clone().into());
            }
            SseFrame::Message {
                id: Some(fingerprint),
                event: Some(message_type.clone()),
                data: body.to_string(),
            }
        } else {
            SseFrame::data(&notice.to_json())
        };

        self.deliver(&message_type, frame)
    }

    fn deliver(&self, message_type: &str, frame: SseFrame) -> usize {
        let mut reg = self.lock();
        let mut delivered = 0;
        reg.subscribers.retain(|s| {
            if !s.wants(message_type) {
                return true;
            }
            match s.tx.try_send(frame.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(e) => {
                    debug!("Subscriber {} dropped: {}", s.id, e);
                    false
                }
            }
        });
        delivered
    }
}

/// Receiving half of one subscriber; detaches itself when dropped.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<SseFrame>,
    broadcaster: Broadcaster,
    pinger: JoinHandle<()>,
}

impl Stream for Subscription {
    type Item = SseFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<SseFrame>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.pinger.abort();
        self.broadcaster.detach(self.id);
    }
}
