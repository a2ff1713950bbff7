use axum::{routing::get, Router};

use crate::handlers::matches;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/matches", get(matches::list_matches))
        .route("/matches/live", get(matches::list_live_matches))
        .route("/match/:id", get(matches::get_match))
        .route("/match/:id/odds", get(matches::get_match_odds))
        .route("/leagues", get(matches::list_leagues))
        .route("/leagues/:id/table", get(matches::get_league_table))
        .route("/sync", get(matches::trigger_sync))
        .route("/health", get(matches::api_health_check))
}
