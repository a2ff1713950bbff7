// services/cleanup.rs
//
// Administrative pass: the only place besides conflict recovery that deletes
// match records.
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::database::match_store::{MatchFilter, MatchStore};
use crate::errors::Result;
use crate::models::match_record::{MatchPatch, MatchRecord, TeamSide};
use crate::services::dedupe::partition_duplicates;
use crate::services::event_mapper::logo_url;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub scanned: usize,
    pub removed: usize,
    pub logos_backfilled: usize,
}

pub async fn run_cleanup(store: &dyn MatchStore, now: DateTime<Utc>) -> Result<CleanupReport> {
    info!("🧹 Cleanup starting");
    let all = store.find_matches(&MatchFilter::default()).await?;
    let mut report = CleanupReport {
        scanned: all.len(),
        ..CleanupReport::default()
    };

    let (keep, duplicates) = partition_duplicates(all);
    for duplicate in &duplicates {
        let Some(id) = duplicate.id else { continue };
        match store.delete(&id).await {
            Ok(()) => {
                report.removed += 1;
                info!(
                    "🗑️ Removed duplicate {} vs {} ({})",
                    duplicate.home_team.name,
                    duplicate.away_team.name,
                    duplicate.primary_id.as_deref().unwrap_or("-")
                );
            }
            Err(e) => warn!("Could not remove duplicate {}: {}", id, e),
        }
    }

    for record in &keep {
        let Some(id) = record.id else { continue };
        let Some(patch) = logo_patch(record, now) else { continue };
        match store.update_fields(&id, &patch).await {
            Ok(()) => report.logos_backfilled += 1,
            Err(e) => warn!("Could not backfill logos for {}: {}", id, e),
        }
    }

    info!(
        "✅ Cleanup done: scanned={} removed={} logos_backfilled={}",
        report.scanned, report.removed, report.logos_backfilled
    );
    Ok(report)
}

fn missing_logo(side: &TeamSide) -> Option<String> {
    if side.has_logo() {
        return None;
    }
    side.image_id.as_deref().filter(|id| !id.is_empty()).map(logo_url)
}

/// Logo URLs derived from stored image ids, plus the resolved flag.
fn logo_patch(record: &MatchRecord, now: DateTime<Utc>) -> Option<MatchPatch> {
    let home = missing_logo(&record.home_team);
    let away = missing_logo(&record.away_team);
    let resolved = (record.home_team.has_logo() || home.is_some())
        && (record.away_team.has_logo() || away.is_some());

    if home.is_none() && away.is_none() && record.logos_resolved == resolved {
        return None;
    }
    Some(MatchPatch {
        home_logo_url: home,
        away_logo_url: away,
        logos_resolved: Some(record.logos_resolved || resolved),
        updated_at: Some(now),
        ..MatchPatch::default()
    })
}
