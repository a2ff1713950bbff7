use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::database::match_store::LeagueCount;
use crate::models::match_record::{LeagueRef, MatchRecord, MatchStatus, TeamSide, TimelineEntry};
use crate::models::odds::{BothTeamsScore, MainOdds, MatchOdds, OverUnder};

/// Consumer-facing shape of a match. Timestamps are RFC 3339 strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub id: String,
    pub primary_id: Option<String>,
    pub secondary_id: Option<String>,
    pub sport: String,
    pub league: LeagueRef,
    pub country: String,
    pub start_time: String,
    pub status: MatchStatus,
    pub minute: String,
    pub home_team: TeamSide,
    pub away_team: TeamSide,
    pub odds: Option<MainOdds>,
    pub over_under25: Option<OverUnder>,
    pub both_teams_score: Option<BothTeamsScore>,
    pub timeline: Vec<TimelineEntry>,
    pub logos_resolved: bool,
    pub updated_at: String,
}

impl From<&MatchRecord> for MatchView {
    fn from(record: &MatchRecord) -> Self {
        let id = record
            .primary_id
            .clone()
            .or_else(|| record.secondary_id.clone())
            .or_else(|| record.id.map(|oid| oid.to_hex()))
            .unwrap_or_default();

        MatchView {
            id,
            primary_id: record.primary_id.clone(),
            secondary_id: record.secondary_id.clone(),
            sport: record.sport.clone(),
            league: record.league.clone(),
            country: record.country.clone(),
            start_time: record.start_time.to_rfc3339(),
            status: record.status,
            minute: record.minute.clone(),
            home_team: record.home_team.clone(),
            away_team: record.away_team.clone(),
            odds: record.odds.clone(),
            over_under25: record.over_under25.clone(),
            both_teams_score: record.both_teams_score.clone(),
            timeline: record.timeline.clone(),
            logos_resolved: record.logos_resolved,
            updated_at: record.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchListResponse {
    pub matches: Vec<MatchView>,
    pub count: usize,
}

impl MatchListResponse {
    pub fn new(records: &[MatchRecord]) -> Self {
        let matches: Vec<MatchView> = records.iter().map(MatchView::from).collect();
        MatchListResponse {
            count: matches.len(),
            matches,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OddsResponse {
    pub match_id: String,
    #[serde(flatten)]
    pub odds: MatchOdds,
    pub cached: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LeagueSummary {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LeagueGroup {
    pub country: String,
    pub leagues: Vec<LeagueSummary>,
}

/// Groups league counts by country, countries and leagues sorted by name.
pub fn group_leagues(counts: Vec<LeagueCount>) -> Vec<LeagueGroup> {
    let mut by_country: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    for row in counts {
        *by_country
            .entry(row.country)
            .or_default()
            .entry(row.league)
            .or_default() += row.count;
    }
    by_country
        .into_iter()
        .map(|(country, leagues)| LeagueGroup {
            country,
            leagues: leagues
                .into_iter()
                .map(|(name, count)| LeagueSummary { name, count })
                .collect(),
        })
        .collect()
}

#[derive(Debug, Deserialize, Default)]
pub struct MatchListQuery {
    pub league: Option<String>,
    pub country: Option<String>,
    pub status: Option<String>,
    /// `YYYY-MM-DD` in the configured local offset.
    pub date: Option<String>,
}
