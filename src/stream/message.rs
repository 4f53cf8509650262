use axum::response::sse::Event;
use serde::Serialize;
use serde_json::Value;

use crate::live::dedup::EventKey;
use crate::upstream::payload::text;
use crate::upstream::SubEvent;

/// One unit written to a subscriber's event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SseFrame {
    /// `: text` line; keeps intermediaries from idling the connection out.
    Comment(String),
    Message {
        id: Option<String>,
        event: Option<String>,
        data: String,
    },
}

fn single_line(s: &str) -> String {
    s.replace(&['\r', '\n'][..], " ")
}

impl SseFrame {
    /// Untagged `data:` message carrying `body` as JSON.
    pub fn data(body: &Value) -> Self {
        SseFrame::Message {
            id: None,
            event: None,
            data: body.to_string(),
        }
    }

    pub fn greeting() -> Self {
        SseFrame::data(&serde_json::json!({ "type": "hello" }))
    }

    pub fn ping(now_ms: i64) -> Self {
        SseFrame::Comment(format!("ping {}", now_ms))
    }

    /// Text exactly as it appears on the wire, blank-line terminated.
    #[allow(dead_code)]
    pub fn to_wire(&self) -> String {
        match self {
            SseFrame::Comment(text) => format!(": {}\n\n", single_line(text)),
            SseFrame::Message { id, event, data } => {
                let mut out = String::new();
                if let Some(id) = id {
                    out.push_str(&format!("id: {}\n", single_line(id)));
                }
                if let Some(event) = event {
                    out.push_str(&format!("event: {}\n", single_line(event)));
                }
                out.push_str(&format!("data: {}\n\n", data));
                out
            }
        }
    }

    pub fn into_event(self) -> Event {
        match self {
            SseFrame::Comment(text) => Event::default().comment(single_line(&text)),
            SseFrame::Message { id, event, data } => {
                let mut ev = Event::default().data(data);
                if let Some(id) = id {
                    ev = ev.id(single_line(&id));
                }
                if let Some(event) = event {
                    ev = ev.event(single_line(&event));
                }
                ev
            }
        }
    }
}

/// Structured notification for one sub-event, as pushed to subscribers.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventNotice {
    pub event_id: String,
    pub fixture_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub detail: String,
    /// Provider values passed through untouched; `null` when absent.
    pub team_id: Value,
    pub elapsed: Value,
    pub extra: Value,
    pub player: Option<String>,
    pub player_id: Value,
}

impl EventNotice {
    pub fn from_sub_event(ev: &SubEvent<'_>, fixture_id: i64, event_id: String) -> Self {
        EventNotice {
            event_id,
            fixture_id: Some(fixture_id),
            kind: ev.kind(),
            detail: ev.detail(),
            team_id: ev.field("/team/id").clone(),
            elapsed: ev.field("/time/elapsed").clone(),
            extra: ev.field("/time/extra").clone(),
            player: ev.player_name(),
            player_id: ev.field("/player/id").clone(),
        }
    }

    /// Lower-cased type used for subscriber filters.
    pub fn message_type(&self) -> String {
        self.kind.trim().to_lowercase()
    }

    /// Identity over the same descriptive fields as the poll-side fingerprint.
    pub fn key(&self) -> EventKey {
        let mut participant = text(&self.player_id);
        if participant.is_empty() {
            participant = self.player.clone().unwrap_or_default();
        }
        EventKey {
            fixture_id: self.fixture_id.map(|id| id.to_string()).unwrap_or_default(),
            kind: self.message_type(),
            team_id: text(&self.team_id),
            elapsed: text(&self.elapsed),
            extra: text(&self.extra),
            participant,
            detail: self.detail.trim().to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
