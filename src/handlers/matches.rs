use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use bson::oid::ObjectId;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};

use crate::database::match_store::{MatchFilter, MatchStore};
use crate::dtos::match_dtos::{
    group_leagues, LeagueGroup, MatchListQuery, MatchListResponse, MatchView, OddsResponse,
};
use crate::errors::{AppError, Result};
use crate::models::match_record::{MatchRecord, MatchStatus};
use crate::services::dedupe::dedupe;
use crate::state::AppState;

pub async fn list_matches(
    State(state): State<AppState>,
    Query(query): Query<MatchListQuery>,
) -> Result<Json<MatchListResponse>> {
    tracing::info!("🔍 GET /api/matches called with query: {:?}", query);
    let started = std::time::Instant::now();

    let mut filter = MatchFilter {
        league: query.league.clone().filter(|l| !l.trim().is_empty()),
        country: query.country.clone().filter(|c| !c.trim().is_empty()),
        ..MatchFilter::default()
    };
    if let Some(status) = query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        filter.status = Some(status.parse::<MatchStatus>().map_err(AppError::invalid_data)?);
    }
    if let Some(date) = query.date.as_deref().filter(|d| !d.trim().is_empty()) {
        let (from, before) = local_day_bounds(date, state.settings.local_offset)?;
        filter.starts_from = Some(from);
        filter.starts_before = Some(before);
    }

    let records = dedupe(state.store.find_matches(&filter).await?);
    tracing::info!("✅ Returning {} matches in {:?}", records.len(), started.elapsed());
    Ok(Json(MatchListResponse::new(&records)))
}

pub async fn list_live_matches(State(state): State<AppState>) -> Result<Json<MatchListResponse>> {
    tracing::info!("🔥 GET /api/matches/live called");
    let records = dedupe(state.store.find_by_status(MatchStatus::Live).await?);
    Ok(Json(MatchListResponse::new(&records)))
}

pub async fn get_match(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MatchView>> {
    tracing::info!("🔍 GET /api/match/{} called", id);
    let record = find_by_any_id(state.store.as_ref(), &id).await?;
    let record = state.enricher.timeline(record).await;
    Ok(Json(MatchView::from(&record)))
}

pub async fn get_match_odds(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OddsResponse>> {
    tracing::info!("💰 GET /api/match/{}/odds called", id);
    let record = find_by_any_id(state.store.as_ref(), &id).await?;
    let (odds, cached) = state.enricher.odds(&record).await;
    Ok(Json(OddsResponse {
        match_id: id,
        odds,
        cached,
    }))
}

pub async fn list_leagues(State(state): State<AppState>) -> Result<Json<Vec<LeagueGroup>>> {
    tracing::info!("🏆 GET /api/leagues called");
    let counts = state.store.league_counts().await?;
    Ok(Json(group_leagues(counts)))
}

pub async fn get_league_table(
    State(state): State<AppState>,
    Path(league_id): Path<String>,
) -> Result<Json<Value>> {
    tracing::info!("📊 GET /api/leagues/{}/table called", league_id);
    let table = state.feed.get_league_table(&league_id).await?;
    Ok(Json(table))
}

/// Starts a full pass in the background and returns immediately.
pub async fn trigger_sync(State(state): State<AppState>) -> Json<Value> {
    tracing::info!("🔄 GET /api/sync called");
    let reconciler = state.reconciler.clone();
    tokio::spawn(async move {
        reconciler.full_pass(Utc::now()).await;
    });
    Json(json!({
        "success": true,
        "message": "Full sync started",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn api_health_check(State(state): State<AppState>) -> Json<Value> {
    let db_status = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("Store ping failed: {}", e);
            "disconnected"
        }
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "subscribers": state.push.subscriber_count(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Primary id, then secondary id, then store id.
async fn find_by_any_id(store: &dyn MatchStore, id: &str) -> Result<MatchRecord> {
    let rows = store.find_by_primary_or_secondary_id(Some(id), Some(id)).await?;
    let found = rows
        .iter()
        .find(|r| r.primary_id.as_deref() == Some(id))
        .or_else(|| rows.iter().find(|r| r.answers_to(id)));
    if let Some(found) = found {
        return Ok(found.clone());
    }

    if let Ok(oid) = ObjectId::parse_str(id) {
        if let Some(found) = store.find_by_record_id(&oid).await?.filter(|r| r.answers_to(id)) {
            return Ok(found);
        }
    }
    Err(AppError::not_found(format!("match {}", id)))
}

/// `YYYY-MM-DD` in the local offset, as a half-open UTC range.
fn local_day_bounds(date: &str, offset: FixedOffset) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::invalid_data(format!("date must be YYYY-MM-DD, got '{}'", date)))?;
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .ok_or_else(|| AppError::invalid_data(format!("invalid date '{}'", date)))?;
    let from = midnight.with_timezone(&Utc);
    Ok((from, from + Duration::days(1)))
}
