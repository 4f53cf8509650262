//! Typed, total views over the provider's JSON.
//!
//! The provider's shapes are loose (ids sometimes strings, fields missing
//! mid-match), so nothing here fails: every accessor falls back to a default
//! and an unexpected top-level shape becomes [`LivePayload::Unrecognized`].

use serde_json::Value;

/// Render a scalar JSON value as text; null/missing/composite → "".
pub fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Integer from a number or numeric string.
pub fn int(v: &Value) -> Option<i64> {
    v.as_i64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Result of decoding the "all live fixtures" resource.
#[derive(Debug, Clone)]
pub enum LivePayload {
    Recognized(LiveSnapshot),
    /// Body had no `response` array; kept verbatim for passthrough.
    Unrecognized(Value),
}

impl LivePayload {
    pub fn from_value(raw: Value) -> Self {
        let fixtures: Option<Vec<Fixture>> = raw
            .get("response")
            .and_then(Value::as_array)
            .map(|list| list.iter().cloned().map(Fixture).collect());
        match fixtures {
            Some(fixtures) => LivePayload::Recognized(LiveSnapshot { fixtures, raw }),
            None => LivePayload::Unrecognized(raw),
        }
    }

    pub fn fixtures(&self) -> &[Fixture] {
        match self {
            LivePayload::Recognized(s) => &s.fixtures,
            LivePayload::Unrecognized(_) => &[],
        }
    }

    pub fn live_count(&self) -> usize {
        self.fixtures().len()
    }

    /// The body exactly as the provider sent it.
    pub fn raw(&self) -> &Value {
        match self {
            LivePayload::Recognized(s) => &s.raw,
            LivePayload::Unrecognized(raw) => raw,
        }
    }

    /// Provider-reported `results` count, 0 when absent.
    pub fn results(&self) -> i64 {
        int(&self.raw()["results"]).unwrap_or(0)
    }

    pub fn is_recognized(&self) -> bool {
        matches!(self, LivePayload::Recognized(_))
    }
}

/// One normalized upstream fetch.
#[derive(Debug, Clone)]
pub struct LiveSnapshot {
    pub fixtures: Vec<Fixture>,
    raw: Value,
}

/// A single live match.
#[derive(Debug, Clone)]
pub struct Fixture(pub Value);

impl Fixture {
    /// Fixture id; `None` for missing or zero ids.
    pub fn id(&self) -> Option<i64> {
        int(&self.0["fixture"]["id"]).filter(|id| *id != 0)
    }

    pub fn date(&self) -> Option<&str> {
        self.0["fixture"]["date"].as_str()
    }

    pub fn status_short(&self) -> Option<&str> {
        self.0["fixture"]["status"]["short"].as_str()
    }

    pub fn elapsed(&self) -> Option<i64> {
        int(&self.0["fixture"]["status"]["elapsed"])
    }

    pub fn home_goals(&self) -> i64 {
        int(&self.0["goals"]["home"]).unwrap_or(0)
    }

    pub fn away_goals(&self) -> i64 {
        int(&self.0["goals"]["away"]).unwrap_or(0)
    }

    /// `"home-away"` score string.
    pub fn score(&self) -> String {
        format!("{}-{}", self.home_goals(), self.away_goals())
    }

    pub fn league(&self) -> &Value {
        &self.0["league"]
    }

    pub fn home_team(&self) -> &Value {
        &self.0["teams"]["home"]
    }

    pub fn away_team(&self) -> &Value {
        &self.0["teams"]["away"]
    }

    pub fn events(&self) -> Vec<SubEvent<'_>> {
        self.0["events"]
            .as_array()
            .map(|list| list.iter().map(SubEvent).collect())
            .unwrap_or_default()
    }
}

static NULL: Value = Value::Null;

/// Something that happened inside a fixture: goal, card, substitution…
#[derive(Debug, Clone, Copy)]
pub struct SubEvent<'a>(pub &'a Value);

impl<'a> SubEvent<'a> {
    /// Field at a JSON pointer (`/time/elapsed`), `Null` when absent.
    pub fn field(&self, pointer: &str) -> &'a Value {
        self.0.pointer(pointer).unwrap_or(&NULL)
    }

    pub fn kind(&self) -> String {
        text(&self.0["type"])
    }

    pub fn detail(&self) -> String {
        text(&self.0["detail"])
    }

    pub fn team_id(&self) -> Option<i64> {
        int(&self.0["team"]["id"])
    }

    pub fn elapsed(&self) -> Option<i64> {
        int(&self.0["time"]["elapsed"])
    }

    pub fn player_name(&self) -> Option<String> {
        self.0["player"]["name"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Participant identity: id as sent when present, else name.
    pub fn participant(&self) -> String {
        let id = text(self.field("/player/id"));
        if id.is_empty() {
            self.player_name().unwrap_or_default()
        } else {
            id
        }
    }
}

/// Merged result of the paginated players resource for one team/season.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub items: Vec<Value>,
    pub pages: u32,
}

impl Roster {
    /// Player id → (nationality or birth country) for every entry with an id.
    pub fn nationalities(&self) -> Vec<(i64, String)> {
        self.items
            .iter()
            .filter_map(|item| {
                let p = &item["player"];
                let id = int(&p["id"]).filter(|id| *id != 0)?;
                let mut nationality = text(&p["nationality"]);
                if nationality.is_empty() {
                    nationality = text(&p["birth"]["country"]);
                }
                Some((id, nationality))
            })
            .collect()
    }
}
