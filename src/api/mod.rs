use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{sse::Sse, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::flags::{flag_url_from_country_name, FlagSize};
use crate::live::SeenEvents;
use crate::stats::{ApiStats, CallKind};
use crate::stream::Broadcaster;
use crate::upstream::{to_live_compact, LiveFetcher, UpstreamError};

#[derive(Clone)]
pub struct AppState {
    pub fetcher: LiveFetcher,
    pub broadcaster: Broadcaster,
    pub stats: ApiStats,
    pub seen: SeenEvents,
    /// Required on /api/* when set.
    pub app_key: Option<String>,
}

/// Build the Axum router.
pub fn router(state: AppState) -> Router {
    let state = Arc::new(state);

    let api = Router::new()
        .route("/live", get(live_handler))
        .route("/live/compact", get(live_compact_handler))
        .route("/players/flags", get(player_flags_handler))
        .route("/stream", get(stream_handler))
        .route("/stats", get(stats_handler))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), count_endpoint_hit))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), require_app_key));

    Router::new()
        .route("/", get(index_handler))
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiError = (StatusCode, Json<Value>);

fn upstream_error(label: &str, e: UpstreamError) -> ApiError {
    error!("{} error: {}", label, e);
    let details = match &e {
        UpstreamError::Status { body, .. } => {
            serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.clone()))
        }
        other => Value::String(other.to_string()),
    };
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "API-Football error",
            "status": e.status(),
            "details": details,
        })),
    )
}

/// Reject /api/* requests without the shared app key, when one is configured.
async fn require_app_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.app_key.as_deref() else {
        return next.run(req).await;
    };

    let from_header = req
        .headers()
        .get("x-ml-key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .map(str::to_string);
    let from_query = Query::<HashMap<String, String>>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(mut params)| params.remove("key"))
        .map(|v| v.trim().to_string());

    match from_header.or(from_query) {
        Some(got) if got == expected => next.run(req).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response(),
    }
}

async fn count_endpoint_hit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    state
        .stats
        .mark_endpoint_hit(req.method().as_str(), req.uri().path());
    next.run(req).await
}

/// GET /
async fn index_handler() -> impl IntoResponse {
    Json(json!({ "message": "MatchLive server running" }))
}

/// GET /api/live — provider payload as received.
async fn live_handler(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let payload = state
        .fetcher
        .fetch_live(CallKind::Live)
        .await
        .map_err(|e| upstream_error("LIVE", e))?;
    Ok(Json(payload.raw().clone()))
}

/// GET /api/live/compact
async fn live_compact_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = state
        .fetcher
        .fetch_live(CallKind::Compact)
        .await
        .map_err(|e| upstream_error("LIVE COMPACT", e))?;
    Ok(Json(json!({
        "updatedAt": Utc::now().to_rfc3339(),
        "results": payload.results(),
        "fixtures": to_live_compact(&payload),
    })))
}

#[derive(Debug, Deserialize)]
struct FlagsQuery {
    team: Option<String>,
    season: Option<String>,
    size: Option<String>,
}

fn positive(v: &Option<String>) -> Option<i64> {
    v.as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
}

/// GET /api/players/flags?team=&season=[&size=40|48|64]
async fn player_flags_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<FlagsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(team), Some(season)) = (positive(&q.team), positive(&q.season)) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing team or season" })),
        ));
    };

    let size = q
        .size
        .as_deref()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .and_then(FlagSize::from_width)
        .unwrap_or(FlagSize::W40);

    let roster = state.fetcher.fetch_players(team, season).await.map_err(|e| {
        error!("[players/flags] {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "players_flags_failed" })),
        )
    })?;

    let map: BTreeMap<String, Value> = roster
        .nationalities()
        .into_iter()
        .map(|(id, nationality)| {
            let flag_url = flag_url_from_country_name(&nationality, size);
            let nationality = (!nationality.is_empty()).then_some(nationality);
            (
                id.to_string(),
                json!({ "nationality": nationality, "flagUrl": flag_url }),
            )
        })
        .collect();

    Ok(Json(json!({
        "team": team,
        "season": season,
        "count": map.len(),
        "map": map,
    })))
}

#[derive(Debug, Deserialize)]
struct StreamQuery {
    types: Option<String>,
}

/// GET /api/stream?types=goal,card — server-sent events.
async fn stream_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<StreamQuery>,
) -> impl IntoResponse {
    let types: Vec<String> = q
        .types
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    // Keep-alive pings come from the broadcaster so a dead client is detached.
    let subscription = state.broadcaster.subscribe(types);
    Sse::new(subscription.map(|frame| Ok::<_, Infallible>(frame.into_event())))
}

/// GET /api/stats
async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut body = serde_json::to_value(state.stats.snapshot()).unwrap_or_else(|_| json!({}));
    if let Some(obj) = body.as_object_mut() {
        obj.insert("cacheSize".into(), state.fetcher.cache_size().into());
        obj.insert("subscribers".into(), state.broadcaster.count().into());
        obj.insert("seenEvents".into(), state.seen.len().into());
    }
    Json(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::live::NotableKinds;
    use crate::upstream::testing::Scripted;
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state(replies: Vec<Result<Value, UpstreamError>>, app_key: Option<&str>) -> AppState {
        let stats = ApiStats::new();
        AppState {
            fetcher: LiveFetcher::new(Scripted::new(replies), TtlCache::new(), stats.clone()),
            broadcaster: Broadcaster::new(
                NotableKinds::default(),
                Duration::from_secs(15 * 60),
                Duration::from_secs(25),
            ),
            stats,
            seen: SeenEvents::new(Duration::from_secs(6 * 60 * 60)),
            app_key: app_key.map(str::to_string),
        }
    }

    async fn get(app: &Router, uri: &str, key_header: Option<&str>) -> (StatusCode, Value) {
        let mut req = HttpRequest::builder().uri(uri);
        if let Some(key) = key_header {
            req = req.header("x-ml-key", key);
        }
        let resp = app
            .clone()
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_app_key_guard() {
        let app = router(state(vec![], Some("a b+c")));

        let (status, body) = get(&app, "/api/stats", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");

        assert_eq!(get(&app, "/api/stats?key=wrong", None).await.0, StatusCode::UNAUTHORIZED);
        assert_eq!(get(&app, "/api/stats", Some("a b+c")).await.0, StatusCode::OK);
        assert_eq!(get(&app, "/api/stats?key=a%20b%2Bc", None).await.0, StatusCode::OK);
        assert_eq!(get(&app, "/api/stats?key=a+b%2Bc", None).await.0, StatusCode::OK);
        // Only /api/* is guarded.
        assert_eq!(get(&app, "/", None).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_no_key_configured_is_open() {
        let app = router(state(vec![], None));
        assert_eq!(get(&app, "/api/stats", None).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_endpoint_hits_counted_per_path() {
        let st = state(vec![], Some("k"));
        let app = router(st.clone());

        get(&app, "/api/stats", Some("k")).await;
        get(&app, "/api/stats", Some("k")).await;
        get(&app, "/api/players/flags", Some("k")).await;
        // Rejected before counting.
        get(&app, "/api/stats", None).await;

        let snap = st.stats.snapshot();
        assert_eq!(snap.endpoint_hits_today, 3);
        assert_eq!(snap.endpoint_by_path_today["GET /stats"], 2);
        assert_eq!(snap.endpoint_by_path_today["GET /players/flags"], 1);
    }

    #[tokio::test]
    async fn test_player_flags() {
        let roster = json!({ "response": [
            { "player": { "id": 1, "nationality": "Italy" } },
            { "player": { "id": 2, "nationality": "", "birth": { "country": "Atlantis" } } }
        ] });
        let app = router(state(vec![Ok(roster)], None));

        let (status, body) = get(&app, "/api/players/flags?team=33", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing team or season");

        let (status, body) = get(&app, "/api/players/flags?team=33&season=2024&size=64", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["map"]["1"]["flagUrl"], "https://flagcdn.com/w64/it.png");
        assert_eq!(body["map"]["2"]["nationality"], "Atlantis");
        assert!(body["map"]["2"]["flagUrl"].is_null());
    }

    #[tokio::test]
    async fn test_live_passthrough_and_upstream_failure() {
        let raw = json!({ "results": 0, "response": [], "paging": { "current": 1 } });
        let app = router(state(vec![Ok(raw.clone())], None));
        let (status, body) = get(&app, "/api/live", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, raw);

        let failing = router(state(
            vec![Err(UpstreamError::Status { status: 499, body: "{}".into() })],
            None,
        ));
        let (status, body) = get(&failing, "/api/live/compact", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], 499);
    }

    #[tokio::test]
    async fn test_stream_greets_and_counts_subscriber() {
        let st = state(vec![], None);
        let app = router(st.clone());

        let resp = app
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .uri("/api/stream?types=goal")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        let mut body = resp.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"data: {\"type\":\"hello\"}\n\n");

        let (_, stats) = get(&app, "/api/stats", None).await;
        assert_eq!(stats["subscribers"], 1);
        assert_eq!(stats["cacheSize"], 0);
        assert_eq!(stats["seenEvents"], 0);

        drop(body);
        assert_eq!(st.broadcaster.count(), 0);
    }

    #[test]
    fn test_positive_param() {
        assert_eq!(positive(&Some("33".into())), Some(33));
        assert_eq!(positive(&Some(" 2024 ".into())), Some(2024));
        assert_eq!(positive(&Some("0".into())), None);
        assert_eq!(positive(&Some("abc".into())), None);
        assert_eq!(positive(&None), None);
    }

    #[test]
    fn test_upstream_error_body() {
        let (status, Json(body)) = upstream_error(
            "LIVE",
            UpstreamError::Status {
                status: 429,
                body: r#"{"message":"Too many requests"}"#.into(),
            },
        );
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], 429);
        assert_eq!(body["details"]["message"], "Too many requests");

        let (_, Json(body)) = upstream_error("LIVE", UpstreamError::ConfigurationMissing("API_FOOTBALL_KEY"));
        assert!(body["status"].is_null());
        assert!(body["details"].as_str().unwrap().contains("API_FOOTBALL_KEY"));
    }
}
