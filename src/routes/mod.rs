use axum::{http::Method, routing::get, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub mod matches;

pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(handlers::matches::health_check))
        .route("/ws", get(handlers::ws::ws_handler))
        .nest("/api", matches::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(app_state)
}

async fn root_handler() -> &'static str {
    "⚽ Match sync API"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncSettings;
    use crate::database::memory_store::MemoryMatchStore;
    use crate::models::match_record::fixtures::record;
    use crate::models::match_record::{MatchRecord, MatchStatus};
    use crate::services::scripted_feed::ScriptedFeed;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(rows: Vec<MatchRecord>) -> (Arc<ScriptedFeed>, Router) {
        let store = Arc::new(MemoryMatchStore::with_rows(rows));
        let feed = Arc::new(ScriptedFeed::new());
        let state = AppState::new(store, feed.clone(), SyncSettings::default(), Duration::from_secs(300));
        (feed, build_router(state))
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn sample() -> Vec<MatchRecord> {
        let mut live = record(Some("E2"), "Inter", "Milan");
        live.status = MatchStatus::Live;
        let mut english = record(Some("E3"), "Arsenal", "Chelsea");
        english.league.name = "Premier League".to_string();
        english.country = "EN".to_string();
        vec![record(Some("E1"), "Inter", "Milan"), live, english]
    }

    #[tokio::test]
    async fn health_is_served() {
        let (_, router) = app(vec![]);
        let (status, body) = get(router.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = get(router, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "connected");
    }

    #[tokio::test]
    async fn match_list_is_deduplicated_and_filtered() {
        let (_, router) = app(sample());

        let (status, body) = get(router.clone(), "/api/matches").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);

        let (_, body) = get(router.clone(), "/api/matches?country=it").await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["matches"][0]["id"], "E2");

        let (_, body) = get(router, "/api/matches?date=2026-10-18&league=Premier%20League").await;
        assert_eq!(body["matches"][0]["homeTeam"]["name"], "Arsenal");
    }

    #[tokio::test]
    async fn bad_filters_are_rejected() {
        let (_, router) = app(sample());
        let (status, body) = get(router.clone(), "/api/matches?date=18-10-2026").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = get(router, "/api/matches?status=postponed").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn match_lookup_by_id_and_miss() {
        let (_, router) = app(sample());
        let (status, body) = get(router.clone(), "/api/match/E3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["league"]["name"], "Premier League");
        assert_eq!(body["startTime"], "2026-10-18T18:45:00+00:00");

        let (status, body) = get(router, "/api/match/E404").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn odds_endpoint_fetches_then_caches() {
        let (feed, router) = app(sample());
        feed.event_odds.lock().unwrap().insert(
            "E3".to_string(),
            json!({ "results": [
                { "name": "1", "odds": "1.85" },
                { "name": "X", "odds": "7/2" },
                { "name": "2", "odds": "4.00" },
            ]}),
        );

        let (status, body) = get(router.clone(), "/api/match/E3/odds").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["main"]["home"], 1.85);
        assert_eq!(body["main"]["draw"], 4.5);
        assert_eq!(body["cached"], false);

        let (_, body) = get(router, "/api/match/E3/odds").await;
        assert_eq!(body["cached"], true);
        assert_eq!(feed.calls_to("event_odds:"), 1);
    }

    #[tokio::test]
    async fn leagues_are_grouped() {
        let (_, router) = app(sample());
        let (status, body) = get(router, "/api/leagues").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["country"], "EN");
        assert_eq!(body[1]["leagues"][0]["name"], "Serie A");
        assert_eq!(body[1]["leagues"][0]["count"], 2);
    }
}
