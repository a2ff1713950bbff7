// database/match_store.rs
use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document};
use chrono::{DateTime, Duration, Utc};
use futures_util::TryStreamExt;
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, Result};
use crate::models::match_record::{MatchPatch, MatchRecord, MatchStatus};

pub const MATCHES_COLLECTION: &str = "matches";

/// Same league and teams, start time within `window` of `start_time`.
#[derive(Debug, Clone)]
pub struct FuzzyQuery {
    pub league: String,
    pub home: String,
    pub away: String,
    pub start_time: DateTime<Utc>,
    pub window: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct MatchFilter {
    pub league: Option<String>,
    pub country: Option<String>,
    pub status: Option<MatchStatus>,
    pub starts_from: Option<DateTime<Utc>>,
    pub starts_before: Option<DateTime<Utc>>,
}

impl MatchFilter {
    pub fn matches(&self, record: &MatchRecord) -> bool {
        self.league.as_ref().map_or(true, |league| &record.league.name == league)
            && self
                .country
                .as_ref()
                .map_or(true, |country| record.country.eq_ignore_ascii_case(country))
            && self.status.map_or(true, |status| record.status == status)
            && self.starts_from.map_or(true, |from| record.start_time >= from)
            && self.starts_before.map_or(true, |before| record.start_time < before)
    }

    fn to_document(&self) -> Document {
        let mut filter = doc! {};
        if let Some(league) = &self.league {
            filter.insert("league.name", league.as_str());
        }
        if let Some(country) = &self.country {
            filter.insert("country", country.to_uppercase());
        }
        if let Some(status) = self.status {
            filter.insert("status", status.as_str());
        }
        let mut range = doc! {};
        if let Some(from) = self.starts_from {
            range.insert("$gte", bson::DateTime::from_chrono(from));
        }
        if let Some(before) = self.starts_before {
            range.insert("$lt", bson::DateTime::from_chrono(before));
        }
        if !range.is_empty() {
            filter.insert("startTime", range);
        }
        filter
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueCount {
    pub country: String,
    pub league: String,
    pub count: u64,
}

/// Canonical match storage. Correctness under overlapping passes relies on
/// `upsert` enforcing a unique `primary_id`.
#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn find_by_primary_or_secondary_id(
        &self,
        primary_id: Option<&str>,
        secondary_id: Option<&str>,
    ) -> Result<Vec<MatchRecord>>;

    async fn find_by_fuzzy_key(&self, query: &FuzzyQuery) -> Result<Vec<MatchRecord>>;

    async fn find_by_status(&self, status: MatchStatus) -> Result<Vec<MatchRecord>>;

    async fn find_by_record_id(&self, id: &ObjectId) -> Result<Option<MatchRecord>>;

    /// Sorted by start time, earliest first.
    async fn find_matches(&self, filter: &MatchFilter) -> Result<Vec<MatchRecord>>;

    /// Inserts records without a store id, replaces (or re-creates) the rest.
    /// A clash on `primary_id` fails with `AppError::IdentityConflict`.
    async fn upsert(&self, record: &MatchRecord) -> Result<MatchRecord>;

    async fn update_fields(&self, id: &ObjectId, patch: &MatchPatch) -> Result<()>;

    async fn delete(&self, id: &ObjectId) -> Result<()>;

    async fn league_counts(&self) -> Result<Vec<LeagueCount>>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct MongoMatchStore {
    db: Database,
    collection: Collection<MatchRecord>,
}

impl MongoMatchStore {
    pub fn new(db: Database) -> Self {
        let collection = db.collection::<MatchRecord>(MATCHES_COLLECTION);
        MongoMatchStore { db, collection }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique_primary = IndexModel::builder()
            .keys(doc! { "primaryId": 1 })
            .options(IndexOptions::builder().unique(true).sparse(true).build())
            .build();
        let secondary = IndexModel::builder().keys(doc! { "secondaryId": 1 }).build();
        let status = IndexModel::builder().keys(doc! { "status": 1 }).build();
        let fuzzy = IndexModel::builder()
            .keys(doc! { "league.name": 1, "homeTeam.name": 1, "awayTeam.name": 1, "startTime": 1 })
            .build();

        self.collection
            .create_indexes(vec![unique_primary, secondary, status, fuzzy])
            .await?;
        tracing::info!("✅ Indexes ensured on '{}'", MATCHES_COLLECTION);
        Ok(())
    }
}

#[async_trait]
impl MatchStore for MongoMatchStore {
    async fn find_by_primary_or_secondary_id(
        &self,
        primary_id: Option<&str>,
        secondary_id: Option<&str>,
    ) -> Result<Vec<MatchRecord>> {
        let mut clauses = Vec::new();
        if let Some(id) = primary_id {
            clauses.push(doc! { "primaryId": id });
        }
        if let Some(id) = secondary_id {
            clauses.push(doc! { "secondaryId": id });
        }
        if clauses.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self.collection.find(doc! { "$or": clauses }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_fuzzy_key(&self, query: &FuzzyQuery) -> Result<Vec<MatchRecord>> {
        let from = bson::DateTime::from_chrono(query.start_time - query.window);
        let to = bson::DateTime::from_chrono(query.start_time + query.window);
        let filter = doc! {
            "league.name": query.league.trim(),
            "homeTeam.name": query.home.trim(),
            "awayTeam.name": query.away.trim(),
            "startTime": { "$gte": from, "$lte": to },
        };
        let cursor = self.collection.find(filter).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_status(&self, status: MatchStatus) -> Result<Vec<MatchRecord>> {
        let cursor = self
            .collection
            .find(doc! { "status": status.as_str() })
            .sort(doc! { "startTime": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_by_record_id(&self, id: &ObjectId) -> Result<Option<MatchRecord>> {
        Ok(self.collection.find_one(doc! { "_id": *id }).await?)
    }

    async fn find_matches(&self, filter: &MatchFilter) -> Result<Vec<MatchRecord>> {
        let cursor = self
            .collection
            .find(filter.to_document())
            .sort(doc! { "startTime": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn upsert(&self, record: &MatchRecord) -> Result<MatchRecord> {
        let primary_id = record.primary_id.as_deref();
        let mut saved = record.clone();
        match record.id {
            Some(id) => {
                self.collection
                    .replace_one(doc! { "_id": id }, record)
                    .upsert(true)
                    .await
                    .map_err(|e| AppError::from_write(e, primary_id))?;
            }
            None => {
                let inserted = self
                    .collection
                    .insert_one(record)
                    .await
                    .map_err(|e| AppError::from_write(e, primary_id))?;
                saved.id = inserted.inserted_id.as_object_id();
            }
        }
        Ok(saved)
    }

    async fn update_fields(&self, id: &ObjectId, patch: &MatchPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let set = patch.to_set_document()?;
        let result = self
            .collection
            .update_one(doc! { "_id": *id }, doc! { "$set": set })
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::not_found(format!("match record {}", id)));
        }
        Ok(())
    }

    async fn delete(&self, id: &ObjectId) -> Result<()> {
        self.collection.delete_one(doc! { "_id": *id }).await?;
        Ok(())
    }

    async fn league_counts(&self) -> Result<Vec<LeagueCount>> {
        let pipeline = vec![
            doc! { "$group": {
                "_id": { "country": "$country", "league": "$league.name" },
                "count": { "$sum": 1 },
            }},
            doc! { "$project": {
                "_id": 0,
                "country": "$_id.country",
                "league": "$_id.league",
                "count": 1,
            }},
            doc! { "$sort": { "country": 1, "league": 1 } },
        ];
        let cursor = self.collection.aggregate(pipeline).await?;
        let rows: Vec<Document> = cursor.try_collect().await?;
        Ok(rows
            .into_iter()
            .map(|row| LeagueCount {
                country: row.get_str("country").unwrap_or("UN").to_string(),
                league: row.get_str("league").unwrap_or_default().to_string(),
                count: row
                    .get_i32("count")
                    .map(|n| n as i64)
                    .or_else(|_| row.get_i64("count"))
                    .unwrap_or(0)
                    .max(0) as u64,
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
