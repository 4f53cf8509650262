//! Lightweight per-fixture projection for list views.

use serde::Serialize;
use serde_json::Value;

use super::payload::{int, Fixture, LivePayload, SubEvent};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactFixture {
    pub fixture_id: Option<i64>,
    pub date: Option<String>,
    pub status_short: Option<String>,
    pub elapsed: Option<i64>,
    pub league: CompactLeague,
    pub home: CompactTeam,
    pub away: CompactTeam,
    pub goals: CompactGoals,
    pub events: Vec<CompactEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactLeague {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub country: Option<String>,
    pub flag: Option<String>,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactTeam {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactGoals {
    pub home: i64,
    pub away: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactEvent {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub detail: Option<String>,
    pub elapsed: Option<i64>,
    pub team_id: Option<i64>,
    pub player: Option<String>,
}

fn opt_str(v: &Value) -> Option<String> {
    v.as_str().map(str::to_string)
}

fn team(v: &Value) -> CompactTeam {
    CompactTeam {
        id: int(&v["id"]),
        name: opt_str(&v["name"]),
        logo: opt_str(&v["logo"]),
    }
}

fn event(ev: SubEvent<'_>) -> CompactEvent {
    CompactEvent {
        kind: opt_str(&ev.0["type"]),
        detail: opt_str(&ev.0["detail"]),
        elapsed: ev.elapsed(),
        team_id: ev.team_id(),
        player: ev.player_name(),
    }
}

fn fixture(f: &Fixture) -> CompactFixture {
    let league = f.league();
    CompactFixture {
        fixture_id: f.id(),
        date: f.date().map(str::to_string),
        status_short: f.status_short().map(str::to_string),
        elapsed: f.elapsed(),
        league: CompactLeague {
            id: int(&league["id"]),
            name: opt_str(&league["name"]),
            country: opt_str(&league["country"]),
            flag: opt_str(&league["flag"]),
            logo: opt_str(&league["logo"]),
        },
        home: team(f.home_team()),
        away: team(f.away_team()),
        goals: CompactGoals {
            home: f.home_goals(),
            away: f.away_goals(),
        },
        events: f.events().into_iter().map(event).collect(),
    }
}

/// Project every live fixture; an unrecognized payload yields an empty list.
pub fn to_live_compact(payload: &LivePayload) -> Vec<CompactFixture> {
    payload.fixtures().iter().map(fixture).collect()
}
