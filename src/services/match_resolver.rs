// services/match_resolver.rs
//
// Cross-source identity resolution and the merge rules applied on every write.
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::database::match_store::{FuzzyQuery, MatchStore};
use crate::errors::{AppError, Result};
use crate::models::match_record::{MatchRecord, MatchStatus, TeamSide, FUZZY_BUCKET_MS};
use crate::services::event_mapper::Candidate;

const UNKNOWN_LEAGUE: &str = "Unknown League";
const UNKNOWN_COUNTRY: &str = "UN";

/// Start-time tolerance for fuzzy matches on the write side: two bucket widths.
pub fn fuzzy_window() -> Duration {
    Duration::milliseconds(2 * FUZZY_BUCKET_MS)
}

/// How long after settling a late live sighting may still reopen a fixture.
pub fn retraction_window() -> Duration {
    Duration::minutes(10)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Created,
    Updated,
    Unchanged,
    /// A uniqueness clash was folded into the owning row.
    Recovered,
}

#[derive(Debug, Clone)]
pub struct Ingested {
    pub outcome: IngestOutcome,
    pub record: MatchRecord,
    pub transition: Option<(MatchStatus, MatchStatus)>,
}

#[derive(Clone)]
pub struct MatchResolver {
    store: Arc<dyn MatchStore>,
}

impl MatchResolver {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        MatchResolver { store }
    }

    /// Primary id, then secondary id, then the closest fuzzy-key match.
    pub async fn resolve(&self, candidate: &Candidate) -> Result<Option<MatchRecord>> {
        let primary = candidate.primary_id.as_deref();
        let secondary = candidate.secondary_id.as_deref();

        if primary.is_some() || secondary.is_some() {
            let rows = self.store.find_by_primary_or_secondary_id(primary, secondary).await?;
            if let Some(row) = rows
                .iter()
                .find(|row| primary.is_some() && row.primary_id.as_deref() == primary)
            {
                return Ok(Some(row.clone()));
            }
            if let Some(row) = rows
                .into_iter()
                .find(|row| secondary.is_some() && row.secondary_id.as_deref() == secondary)
            {
                return Ok(Some(row));
            }
        }

        let league = candidate.league.name.trim();
        let home = candidate.home_team.name.trim();
        let away = candidate.away_team.name.trim();
        if league.is_empty() || home.is_empty() || away.is_empty() {
            return Ok(None);
        }

        let query = FuzzyQuery {
            league: league.to_string(),
            home: home.to_string(),
            away: away.to_string(),
            start_time: candidate.start_time,
            window: fuzzy_window(),
        };
        let rows = self.store.find_by_fuzzy_key(&query).await?;
        Ok(rows
            .into_iter()
            .min_by_key(|row| (row.start_time - candidate.start_time).num_milliseconds().abs()))
    }

    pub async fn ingest(&self, candidate: Candidate, now: DateTime<Utc>) -> Result<Ingested> {
        let existing = self.resolve(&candidate).await?;

        let (record, previous) = match existing {
            None => (candidate.into_record(now), None),
            Some(existing) => {
                let merged = merge(&existing, &candidate, now);
                if merged.same_content(&existing) {
                    return Ok(Ingested {
                        outcome: IngestOutcome::Unchanged,
                        record: existing,
                        transition: None,
                    });
                }
                (merged, Some(existing.status))
            }
        };

        match self.store.upsert(&record).await {
            Ok(saved) => {
                let transition = previous
                    .filter(|from| *from != saved.status)
                    .map(|from| (from, saved.status));
                log_transition(&saved, transition);
                let outcome = if previous.is_some() {
                    IngestOutcome::Updated
                } else {
                    IngestOutcome::Created
                };
                Ok(Ingested {
                    outcome,
                    record: saved,
                    transition,
                })
            }
            Err(AppError::IdentityConflict { primary_id }) => {
                self.recover_conflict(&primary_id, record, now).await
            }
            Err(e) => Err(e),
        }
    }

    /// Another pass already owns `primary_id`: fold our row into the owner
    /// and drop ours if it was already stored.
    async fn recover_conflict(
        &self,
        primary_id: &str,
        orphan: MatchRecord,
        now: DateTime<Utc>,
    ) -> Result<Ingested> {
        warn!("Identity conflict on primary id {}, merging into owner", primary_id);

        let owner = self
            .store
            .find_by_primary_or_secondary_id(Some(primary_id), None)
            .await?
            .into_iter()
            .find(|row| row.primary_id.as_deref() == Some(primary_id))
            .ok_or_else(|| AppError::not_found(format!("owner of primary id {}", primary_id)))?;

        let merged = merge_records(&owner, &orphan, now);
        let saved = if merged.same_content(&owner) {
            owner.clone()
        } else {
            self.store.upsert(&merged).await?
        };

        if let Some(orphan_id) = orphan.id {
            if saved.id != Some(orphan_id) {
                self.store.delete(&orphan_id).await?;
                info!("Removed orphaned row {} after merging into {}", orphan_id, primary_id);
            }
        }

        let transition = (owner.status != saved.status).then_some((owner.status, saved.status));
        log_transition(&saved, transition);
        Ok(Ingested {
            outcome: IngestOutcome::Recovered,
            record: saved,
            transition,
        })
    }
}

fn log_transition(record: &MatchRecord, transition: Option<(MatchStatus, MatchStatus)>) {
    if let Some((from, to)) = transition {
        info!(
            "{} vs {} ({}): {} -> {}",
            record.home_team.name,
            record.away_team.name,
            record.primary_id.as_deref().unwrap_or("-"),
            from,
            to
        );
    }
}

/// Whether an incoming status may replace the stored one.
fn status_adoptable(existing: &MatchRecord, incoming: MatchStatus, now: DateTime<Utc>) -> bool {
    if incoming.lifecycle_rank() >= existing.status.lifecycle_rank() {
        return true;
    }
    existing.status == MatchStatus::Finished
        && incoming == MatchStatus::Live
        && existing
            .finished_at
            .map_or(false, |at| now - at <= retraction_window())
}

fn merge_side(stored: &mut TeamSide, incoming: &TeamSide) {
    if stored.name.trim().is_empty() && !incoming.name.trim().is_empty() {
        stored.name = incoming.name.clone();
    }
    if stored.image_id.is_none() {
        stored.image_id = incoming.image_id.clone();
    }
    if !stored.has_logo() && incoming.has_logo() {
        stored.logo_url = incoming.logo_url.clone();
    }
}

/// Folds a fresh sighting into the stored record. Returns the existing record
/// unchanged (including `updated_at`) when the sighting adds nothing.
pub fn merge(existing: &MatchRecord, candidate: &Candidate, now: DateTime<Utc>) -> MatchRecord {
    let mut merged = existing.clone();

    if merged.primary_id.is_none() {
        merged.primary_id = candidate.primary_id.clone();
    }
    if !merged.has_secondary_id() && candidate.secondary_id.is_some() {
        merged.secondary_id = candidate.secondary_id.clone();
    }

    if merged.sport.is_empty() {
        merged.sport = candidate.sport.clone();
    }
    if (merged.league.name.is_empty() || merged.league.name == UNKNOWN_LEAGUE)
        && !candidate.league.name.is_empty()
    {
        merged.league.name = candidate.league.name.clone();
    }
    if merged.league.id.is_none() {
        merged.league.id = candidate.league.id.clone();
    }
    if (merged.country.is_empty() || merged.country == UNKNOWN_COUNTRY)
        && !candidate.country.is_empty()
    {
        merged.country = candidate.country.clone();
    }
    if merged.start_time.timestamp() <= 0 {
        merged.start_time = candidate.start_time;
    }

    merge_side(&mut merged.home_team, &candidate.home_team);
    merge_side(&mut merged.away_team, &candidate.away_team);

    if status_adoptable(existing, candidate.status, now) {
        match (existing.status, candidate.status) {
            (from, MatchStatus::Finished) if from != MatchStatus::Finished => {
                merged.finished_at = Some(now)
            }
            (MatchStatus::Finished, MatchStatus::Live) => merged.finished_at = None,
            _ => {}
        }
        merged.status = candidate.status;
        // A live sighting without a timer minute keeps the last known one.
        if candidate.status != MatchStatus::Live || !candidate.minute.is_empty() {
            merged.minute = candidate.minute.clone();
        }
        if candidate.score_reported {
            merged.home_team.score = candidate.home_team.score;
            merged.away_team.score = candidate.away_team.score;
        }
    }

    if !candidate.timeline.is_empty() {
        merged.timeline = candidate.timeline.clone();
    }

    merged.logos_resolved = existing.logos_resolved || merged.both_logos();

    if merged.same_content(existing) {
        return existing.clone();
    }
    merged.updated_at = now;
    merged
}

/// Folds a whole stored row into the row that owns its primary id.
pub fn merge_records(owner: &MatchRecord, orphan: &MatchRecord, now: DateTime<Utc>) -> MatchRecord {
    let mut merged = merge(owner, &Candidate::from(orphan), now);

    if merged.odds.is_none() {
        merged.odds = orphan.odds.clone();
    }
    if merged.over_under25.is_none() {
        merged.over_under25 = orphan.over_under25.clone();
    }
    if merged.both_teams_score.is_none() {
        merged.both_teams_score = orphan.both_teams_score.clone();
    }
    merged.timeline = if orphan.timeline.len() > owner.timeline.len() {
        orphan.timeline.clone()
    } else {
        owner.timeline.clone()
    };
    merged.created_at = owner.created_at.min(orphan.created_at);

    if merged.same_content(owner) {
        return owner.clone();
    }
    merged.updated_at = now;
    merged
}
