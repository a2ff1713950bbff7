// database/memory_store.rs
//
// In-process MatchStore used by the test suite. Enforces the same unique
// primary-id constraint as the MongoDB index.
use async_trait::async_trait;
use bson::oid::ObjectId;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::database::match_store::{FuzzyQuery, LeagueCount, MatchFilter, MatchStore};
use crate::errors::{AppError, Result};
use crate::models::match_record::{MatchPatch, MatchRecord, MatchStatus};

#[derive(Default)]
pub struct MemoryMatchStore {
    rows: Mutex<Vec<MatchRecord>>,
    /// Hides id lookups for the next N calls, simulating a concurrent pass
    /// that inserted between our read and our write.
    blind_id_lookups: Mutex<usize>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<MatchRecord>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.rows.lock().unwrap();
            for mut row in rows {
                row.id.get_or_insert_with(ObjectId::new);
                guard.push(row);
            }
        }
        store
    }

    pub fn blind_next_id_lookups(&self, count: usize) {
        *self.blind_id_lookups.lock().unwrap() = count;
    }

    pub fn all(&self) -> Vec<MatchRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl MatchStore for MemoryMatchStore {
    async fn find_by_primary_or_secondary_id(
        &self,
        primary_id: Option<&str>,
        secondary_id: Option<&str>,
    ) -> Result<Vec<MatchRecord>> {
        {
            let mut blind = self.blind_id_lookups.lock().unwrap();
            if *blind > 0 {
                *blind -= 1;
                return Ok(Vec::new());
            }
        }
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| {
                (primary_id.is_some() && row.primary_id.as_deref() == primary_id)
                    || (secondary_id.is_some() && row.secondary_id.as_deref() == secondary_id)
            })
            .cloned()
            .collect())
    }

    async fn find_by_fuzzy_key(&self, query: &FuzzyQuery) -> Result<Vec<MatchRecord>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|row| {
                row.league.name.trim() == query.league.trim()
                    && row.home_team.name.trim() == query.home.trim()
                    && row.away_team.name.trim() == query.away.trim()
                    && (row.start_time - query.start_time).abs() <= query.window
            })
            .cloned()
            .collect())
    }

    async fn find_by_status(&self, status: MatchStatus) -> Result<Vec<MatchRecord>> {
        let mut found: Vec<MatchRecord> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|row| row.start_time);
        Ok(found)
    }

    async fn find_by_record_id(&self, id: &ObjectId) -> Result<Option<MatchRecord>> {
        Ok(self.rows.lock().unwrap().iter().find(|row| row.id == Some(*id)).cloned())
    }

    async fn find_matches(&self, filter: &MatchFilter) -> Result<Vec<MatchRecord>> {
        let mut found: Vec<MatchRecord> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect();
        found.sort_by_key(|row| row.start_time);
        Ok(found)
    }

    async fn upsert(&self, record: &MatchRecord) -> Result<MatchRecord> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(primary_id) = record.primary_id.as_deref() {
            let clash = rows
                .iter()
                .any(|row| row.primary_id.as_deref() == Some(primary_id) && row.id != record.id);
            if clash {
                return Err(AppError::IdentityConflict {
                    primary_id: primary_id.to_string(),
                });
            }
        }
        let mut saved = record.clone();
        let id = *saved.id.get_or_insert_with(ObjectId::new);
        match rows.iter_mut().find(|row| row.id == Some(id)) {
            Some(row) => *row = saved.clone(),
            None => rows.push(saved.clone()),
        }
        Ok(saved)
    }

    async fn update_fields(&self, id: &ObjectId, patch: &MatchPatch) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|row| row.id == Some(*id))
            .ok_or_else(|| AppError::not_found(format!("match record {}", id)))?;
        patch.apply(row);
        Ok(())
    }

    async fn delete(&self, id: &ObjectId) -> Result<()> {
        self.rows.lock().unwrap().retain(|row| row.id != Some(*id));
        Ok(())
    }

    async fn league_counts(&self) -> Result<Vec<LeagueCount>> {
        let mut counts: BTreeMap<(String, String), u64> = BTreeMap::new();
        for row in self.rows.lock().unwrap().iter() {
            *counts
                .entry((row.country.clone(), row.league.name.clone()))
                .or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|((country, league), count)| LeagueCount { country, league, count })
            .collect())
    }
}
