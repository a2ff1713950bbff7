// services/event_mapper.rs
//
// Pure conversion of one upstream event into a canonical record candidate.
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::models::match_record::{LeagueRef, MatchRecord, MatchStatus, TeamSide, TimelineEntry};
use crate::models::upstream::{UpstreamEvent, UpstreamTeam};
use crate::services::timeline::build_timeline;

const LOGO_CDN_PREFIX: &str = "https://assets.b365api.com/images/team/m/";

/// Which feed produced an event; decides how identifiers are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Live,
    Upcoming,
    Ended,
    /// Single-event lookup on the generic feed.
    Result,
    AlternateUpcoming,
    AlternateResult,
}

impl SourceKind {
    fn is_alternate(self) -> bool {
        matches!(self, SourceKind::AlternateUpcoming | SourceKind::AlternateResult)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub primary_id: Option<String>,
    pub secondary_id: Option<String>,
    pub sport: String,
    pub league: LeagueRef,
    pub country: String,
    pub start_time: DateTime<Utc>,
    pub status: MatchStatus,
    pub minute: String,
    pub home_team: TeamSide,
    pub away_team: TeamSide,
    /// False when the source carried no score; the team scores are then placeholders.
    pub score_reported: bool,
    pub timeline: Vec<TimelineEntry>,
}

impl Candidate {
    /// First sighting: the candidate becomes a fresh record.
    pub fn into_record(self, now: DateTime<Utc>) -> MatchRecord {
        let logos_resolved = self.home_team.has_logo() && self.away_team.has_logo();
        let finished_at = (self.status == MatchStatus::Finished).then_some(now);
        MatchRecord {
            id: None,
            primary_id: self.primary_id,
            secondary_id: self.secondary_id,
            sport: self.sport,
            league: self.league,
            country: self.country,
            start_time: self.start_time,
            status: self.status,
            minute: self.minute,
            home_team: self.home_team,
            away_team: self.away_team,
            odds: None,
            over_under25: None,
            both_teams_score: None,
            timeline: self.timeline,
            logos_resolved,
            finished_at,
            created_at: now,
            updated_at: now,
        }
    }
}

impl From<&MatchRecord> for Candidate {
    fn from(record: &MatchRecord) -> Self {
        Candidate {
            primary_id: record.primary_id.clone(),
            secondary_id: record.secondary_id.clone(),
            sport: record.sport.clone(),
            league: record.league.clone(),
            country: record.country.clone(),
            start_time: record.start_time,
            status: record.status,
            minute: record.minute.clone(),
            home_team: record.home_team.clone(),
            away_team: record.away_team.clone(),
            score_reported: true,
            timeline: record.timeline.clone(),
        }
    }
}

/// Maps an upstream event; `None` when it has no usable start time.
pub fn map(event: &UpstreamEvent, source: SourceKind, sport: &str) -> Option<Candidate> {
    let start_time = parse_start_time(event)?;

    let (primary_id, secondary_id) = if source.is_alternate() {
        (
            event.our_event_id.clone(),
            event.fixture_id.clone().or_else(|| event.id.clone()),
        )
    } else {
        (event.id.clone(), event.bet365_id.clone())
    };

    let league_name = event
        .league
        .as_ref()
        .and_then(|league| league.name.clone())
        .unwrap_or_else(|| "Unknown League".to_string());
    let league_id = event
        .league
        .as_ref()
        .and_then(|league| league.id.clone())
        .or_else(|| event.league_id.clone());

    let country = event
        .cc
        .clone()
        .or_else(|| event.league.as_ref().and_then(|league| league.cc.clone()))
        .map(|cc| cc.to_uppercase())
        .unwrap_or_else(|| country_from_league(&league_name));

    let status = derive_status(event, source);
    let (home_score, away_score) = event.ss.as_ref().map(parse_score).unwrap_or((0, 0));
    let minute = match (status, event.timer_minute()) {
        (MatchStatus::Live, Some(tm)) => format!("{}'", tm),
        _ => String::new(),
    };

    let home_team = team_side(event.home.as_ref(), "Home", home_score);
    let away_team = team_side(event.away.as_ref(), "Away", away_score);
    let timeline = build_timeline(&event.events, &away_team.name);

    Some(Candidate {
        primary_id,
        secondary_id,
        sport: sport.to_string(),
        league: LeagueRef {
            name: league_name,
            id: league_id,
        },
        country,
        start_time,
        status,
        minute,
        home_team,
        away_team,
        score_reported: event.ss.is_some(),
        timeline,
    })
}

fn parse_start_time(event: &UpstreamEvent) -> Option<DateTime<Utc>> {
    let raw = event.time.as_deref().or(event.start_time.as_deref())?;
    let seconds: i64 = raw.trim().parse().ok()?;
    if seconds <= 0 {
        return None;
    }
    Utc.timestamp_opt(seconds, 0).single()
}

fn derive_status(event: &UpstreamEvent, source: SourceKind) -> MatchStatus {
    if event.has_timer() || source == SourceKind::Live {
        return MatchStatus::Live;
    }
    let is_lookup = matches!(source, SourceKind::Result | SourceKind::AlternateResult);
    let settled = event.ss.is_some() || (is_lookup && event.reported_ended());
    if settled {
        MatchStatus::Finished
    } else {
        MatchStatus::Scheduled
    }
}

/// Parses `"H-A"` or a period map, taking the highest numeric period as full
/// time. Anything unreadable is 0-0.
pub fn parse_score(raw: &Value) -> (u32, u32) {
    match raw {
        Value::String(s) => parse_score_text(s),
        Value::Object(periods) => periods
            .iter()
            .filter_map(|(key, value)| key.trim().parse::<u32>().ok().map(|period| (period, value)))
            .max_by_key(|(period, _)| *period)
            .map(|(_, value)| match value {
                Value::String(s) => parse_score_text(s),
                Value::Object(pair) => (
                    pair.get("home").and_then(score_number).unwrap_or(0),
                    pair.get("away").and_then(score_number).unwrap_or(0),
                ),
                _ => (0, 0),
            })
            .unwrap_or((0, 0)),
        _ => (0, 0),
    }
}

fn parse_score_text(text: &str) -> (u32, u32) {
    let mut parts = text.split(|c| c == '-' || c == ':').map(|part| part.trim().parse::<u32>());
    match (parts.next(), parts.next()) {
        (Some(Ok(home)), Some(Ok(away))) => (home, away),
        _ => (0, 0),
    }
}

fn score_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// First token of the league name, uppercased; `UN` when there is none.
fn country_from_league(league_name: &str) -> String {
    league_name
        .split_whitespace()
        .next()
        .map(str::to_uppercase)
        .unwrap_or_else(|| "UN".to_string())
}

pub fn logo_url(image_id: &str) -> String {
    format!("{}{}.png", LOGO_CDN_PREFIX, image_id)
}

fn team_side(team: Option<&UpstreamTeam>, fallback_name: &str, score: u32) -> TeamSide {
    let name = team
        .and_then(|t| t.name.clone())
        .unwrap_or_else(|| fallback_name.to_string());
    // Explicit image ids win over the generic team id.
    let image_id = team.and_then(|t| {
        t.image_id
            .clone()
            .or_else(|| t.image_group.clone())
            .or_else(|| t.id.clone())
    });
    let logo_url = image_id.as_deref().map(logo_url);
    TeamSide {
        name,
        image_id,
        logo_url,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: Value) -> UpstreamEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn rejects_events_without_start_time() {
        assert!(map(&event(json!({"id": "E1"})), SourceKind::Upcoming, "Football").is_none());
        assert!(map(&event(json!({"id": "E1", "time": "abc"})), SourceKind::Upcoming, "Football").is_none());
        assert!(map(&event(json!({"id": "E1", "time": "0"})), SourceKind::Upcoming, "Football").is_none());
    }

    #[test]
    fn upcoming_event_is_scheduled() {
        let candidate = map(
            &event(json!({
                "id": "E1", "time": "1760813100",
                "league": {"id": "94", "name": "Serie A"},
                "home": {"name": "Inter"}, "away": {"name": "Milan"}
            })),
            SourceKind::Upcoming,
            "Football",
        )
        .unwrap();
        assert_eq!(candidate.status, MatchStatus::Scheduled);
        assert_eq!(candidate.primary_id.as_deref(), Some("E1"));
        assert_eq!(candidate.start_time.timestamp(), 1_760_813_100);
        assert_eq!((candidate.home_team.score, candidate.away_team.score), (0, 0));
    }

    #[test]
    fn timer_means_live_with_minute() {
        let candidate = map(
            &event(json!({"id": "E1", "time": 1760813100, "timer": {"tm": "65"}, "ss": "2-1"})),
            SourceKind::Upcoming,
            "Football",
        )
        .unwrap();
        assert_eq!(candidate.status, MatchStatus::Live);
        assert_eq!(candidate.minute, "65'");
        assert_eq!((candidate.home_team.score, candidate.away_team.score), (2, 1));
    }

    #[test]
    fn settled_score_without_timer_is_finished() {
        let candidate = map(
            &event(json!({"id": "E1", "time": 1760813100, "ss": "2-1"})),
            SourceKind::Ended,
            "Football",
        )
        .unwrap();
        assert_eq!(candidate.status, MatchStatus::Finished);
        assert!(candidate.minute.is_empty());
    }

    #[test]
    fn in_play_listing_is_live_without_timer() {
        let candidate = map(
            &event(json!({"id": "E1", "time": 1760813100, "ss": "0-0"})),
            SourceKind::Live,
            "Football",
        )
        .unwrap();
        assert_eq!(candidate.status, MatchStatus::Live);
    }

    #[test]
    fn result_lookup_honours_ended_status_code() {
        let candidate = map(
            &event(json!({"id": "E1", "time": 1760813100, "time_status": "3"})),
            SourceKind::Result,
            "Football",
        )
        .unwrap();
        assert_eq!(candidate.status, MatchStatus::Finished);
    }

    #[test]
    fn score_string_and_period_map() {
        assert_eq!(parse_score(&json!("2-1")), (2, 1));
        assert_eq!(parse_score(&json!({"1": "1-0", "2": "2-1"})), (2, 1));
        assert_eq!(parse_score(&json!({"2": "2-1", "10": "3-1", "x": "9-9"})), (3, 1));
        assert_eq!(parse_score(&json!({"1": {"home": "1", "away": 0}})), (1, 0));
        assert_eq!(parse_score(&json!("abandoned")), (0, 0));
        assert_eq!(parse_score(&json!(42)), (0, 0));
    }

    #[test]
    fn country_falls_back_to_league_token() {
        let candidate = map(
            &event(json!({"id": "E1", "time": 1760813100, "league": {"name": "England Premier League"}})),
            SourceKind::Upcoming,
            "Football",
        )
        .unwrap();
        assert_eq!(candidate.country, "ENGLAND");

        let with_cc = map(
            &event(json!({"id": "E1", "time": 1760813100, "cc": "it", "league": {"name": "Serie A"}})),
            SourceKind::Upcoming,
            "Football",
        )
        .unwrap();
        assert_eq!(with_cc.country, "IT");
    }

    #[test]
    fn image_id_preferred_over_generic_id() {
        let candidate = map(
            &event(json!({
                "id": "E1", "time": 1760813100,
                "home": {"id": "111", "name": "Inter", "image_id": "555"},
                "away": {"name": "Milan"}
            })),
            SourceKind::Upcoming,
            "Football",
        )
        .unwrap();
        assert_eq!(candidate.home_team.image_id.as_deref(), Some("555"));
        assert_eq!(
            candidate.home_team.logo_url.as_deref(),
            Some("https://assets.b365api.com/images/team/m/555.png")
        );
        assert!(candidate.away_team.logo_url.is_none());
    }

    #[test]
    fn alternate_events_fill_secondary_id() {
        let candidate = map(
            &event(json!({"id": "123", "FI": "FI123", "our_event_id": "E1", "time": 1760813160})),
            SourceKind::AlternateUpcoming,
            "Football",
        )
        .unwrap();
        assert_eq!(candidate.secondary_id.as_deref(), Some("FI123"));
        assert_eq!(candidate.primary_id.as_deref(), Some("E1"));
        assert_eq!(candidate.status, MatchStatus::Scheduled);
    }

    #[test]
    fn generic_events_carry_alternate_id() {
        let candidate = map(
            &event(json!({"id": "E1", "bet365_id": "FI123", "time": 1760813100})),
            SourceKind::Upcoming,
            "Football",
        )
        .unwrap();
        assert_eq!(candidate.secondary_id.as_deref(), Some("FI123"));
    }

    #[test]
    fn mapping_is_deterministic() {
        let raw = event(json!({"id": "E1", "time": 1760813100, "ss": "1-1", "timer": {"tm": 30}}));
        assert_eq!(
            map(&raw, SourceKind::Live, "Football"),
            map(&raw, SourceKind::Live, "Football")
        );
    }
}
