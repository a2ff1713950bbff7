// models/match_record.rs
use bson::{doc, oid::ObjectId, Bson, Document};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::odds::{BothTeamsScore, MainOdds, MatchOdds, OverUnder};

/// Width of the start-time bucket used by the fuzzy identity key.
pub const FUZZY_BUCKET_MS: i64 = 2 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
}

impl MatchStatus {
    /// Lifecycle position; transitions only move to a higher rank.
    pub fn lifecycle_rank(self) -> u8 {
        match self {
            MatchStatus::Scheduled => 0,
            MatchStatus::Live => 1,
            MatchStatus::Finished => 2,
        }
    }

    /// Read-side preference when two rows describe the same fixture.
    pub fn display_rank(self) -> u8 {
        match self {
            MatchStatus::Live => 3,
            MatchStatus::Finished => 2,
            MatchStatus::Scheduled => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::Live => "LIVE",
            MatchStatus::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" => Ok(MatchStatus::Scheduled),
            "LIVE" => Ok(MatchStatus::Live),
            "FINISHED" => Ok(MatchStatus::Finished),
            other => Err(format!("unknown match status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeagueRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSide {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub score: u32,
}

impl TeamSide {
    pub fn has_logo(&self) -> bool {
        self.logo_url.as_deref().map_or(false, |url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineKind {
    Goal,
    Card,
    Substitution,
    Var,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub minute: String,
    #[serde(rename = "type")]
    pub kind: TimelineKind,
    pub text: String,
    pub side: Side,
    pub score: String,
}

/// Canonical fixture as stored in the `matches` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    // Unique sparse index: never serialize a null here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_id: Option<String>,

    pub sport: String,
    pub league: LeagueRef,
    pub country: String,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,

    pub status: MatchStatus,
    #[serde(default)]
    pub minute: String,

    pub home_team: TeamSide,
    pub away_team: TeamSide,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds: Option<MainOdds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub over_under25: Option<OverUnder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub both_teams_score: Option<BothTeamsScore>,

    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,

    #[serde(default)]
    pub logos_resolved: bool,

    #[serde(default, with = "optional_bson_datetime", skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn fuzzy_key(&self) -> Option<FuzzyKey> {
        FuzzyKey::new(
            &self.league.name,
            &self.home_team.name,
            &self.away_team.name,
            self.start_time,
        )
    }

    pub fn has_secondary_id(&self) -> bool {
        self.secondary_id.as_deref().map_or(false, |id| !id.trim().is_empty())
    }

    pub fn both_logos(&self) -> bool {
        self.home_team.has_logo() && self.away_team.has_logo()
    }

    /// Compares everything except the store id and bookkeeping timestamps.
    pub fn same_content(&self, other: &MatchRecord) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        a.id = None;
        b.id = None;
        a.updated_at = b.updated_at;
        a.created_at = b.created_at;
        a == b
    }

    pub fn odds_bundle(&self) -> MatchOdds {
        MatchOdds {
            main: self.odds.clone(),
            over_under25: self.over_under25.clone(),
            both_teams_score: self.both_teams_score.clone(),
        }
    }

    /// Whether `any_id` is this record's primary, secondary or store id.
    pub fn answers_to(&self, any_id: &str) -> bool {
        self.primary_id.as_deref() == Some(any_id)
            || self.secondary_id.as_deref() == Some(any_id)
            || self.id.map(|oid| oid.to_hex()) == Some(any_id.to_string())
    }
}

/// Derived identity used when providers disagree on ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuzzyKey {
    pub league: String,
    pub home: String,
    pub away: String,
    pub bucket: i64,
}

impl FuzzyKey {
    pub fn new(league: &str, home: &str, away: &str, start_time: DateTime<Utc>) -> Option<Self> {
        let (league, home, away) = (league.trim(), home.trim(), away.trim());
        let millis = start_time.timestamp_millis();
        if league.is_empty() || home.is_empty() || away.is_empty() || millis <= 0 {
            return None;
        }
        Some(FuzzyKey {
            league: league.to_string(),
            home: home.to_string(),
            away: away.to_string(),
            bucket: time_bucket(start_time),
        })
    }
}

/// Rounds a start time to the nearest two-minute bucket.
pub fn time_bucket(start_time: DateTime<Utc>) -> i64 {
    (start_time.timestamp_millis() + FUZZY_BUCKET_MS / 2).div_euclid(FUZZY_BUCKET_MS)
}

/// Partial update applied through `MatchStore::update_fields`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchPatch {
    pub status: Option<MatchStatus>,
    pub minute: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
    pub timeline: Option<Vec<TimelineEntry>>,
    pub odds: Option<MatchOdds>,
    pub home_logo_url: Option<String>,
    pub away_logo_url: Option<String>,
    pub logos_resolved: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MatchPatch {
    pub fn is_empty(&self) -> bool {
        *self == MatchPatch::default()
    }

    pub fn apply(&self, record: &mut MatchRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(minute) = &self.minute {
            record.minute = minute.clone();
        }
        if let Some(finished_at) = self.finished_at {
            record.finished_at = Some(finished_at);
        }
        if let Some(timeline) = &self.timeline {
            record.timeline = timeline.clone();
        }
        if let Some(odds) = &self.odds {
            // Partial odds never blank markets already stored.
            if odds.main.is_some() {
                record.odds = odds.main.clone();
            }
            if odds.over_under25.is_some() {
                record.over_under25 = odds.over_under25.clone();
            }
            if odds.both_teams_score.is_some() {
                record.both_teams_score = odds.both_teams_score.clone();
            }
        }
        if let Some(url) = &self.home_logo_url {
            record.home_team.logo_url = Some(url.clone());
        }
        if let Some(url) = &self.away_logo_url {
            record.away_team.logo_url = Some(url.clone());
        }
        if let Some(flag) = self.logos_resolved {
            record.logos_resolved = flag;
        }
        if let Some(updated_at) = self.updated_at {
            record.updated_at = updated_at;
        }
    }

    pub fn to_set_document(&self) -> bson::ser::Result<Document> {
        let mut set = doc! {};
        if let Some(status) = self.status {
            set.insert("status", status.as_str());
        }
        if let Some(minute) = &self.minute {
            set.insert("minute", minute.as_str());
        }
        if let Some(finished_at) = self.finished_at {
            set.insert("finishedAt", bson::DateTime::from_chrono(finished_at));
        }
        if let Some(timeline) = &self.timeline {
            set.insert("timeline", bson::to_bson(timeline)?);
        }
        if let Some(odds) = &self.odds {
            if let Some(main) = &odds.main {
                set.insert("odds", bson::to_bson(main)?);
            }
            if let Some(over_under) = &odds.over_under25 {
                set.insert("overUnder25", bson::to_bson(over_under)?);
            }
            if let Some(btts) = &odds.both_teams_score {
                set.insert("bothTeamsScore", bson::to_bson(btts)?);
            }
        }
        if let Some(url) = &self.home_logo_url {
            set.insert("homeTeam.logoUrl", Bson::String(url.clone()));
        }
        if let Some(url) = &self.away_logo_url {
            set.insert("awayTeam.logoUrl", Bson::String(url.clone()));
        }
        if let Some(flag) = self.logos_resolved {
            set.insert("logosResolved", flag);
        }
        if let Some(updated_at) = self.updated_at {
            set.insert("updatedAt", bson::DateTime::from_chrono(updated_at));
        }
        Ok(set)
    }
}

mod optional_bson_datetime {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_some(&bson::DateTime::from_chrono(*dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<bson::DateTime>::deserialize(deserializer)?;
        Ok(value.map(|dt| dt.to_chrono()))
    }
}
