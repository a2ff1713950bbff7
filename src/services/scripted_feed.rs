// services/scripted_feed.rs
//
// Test double for FeedProvider. Each call answers from a script that tests
// mutate between passes; unscripted pages come back empty and unscripted
// lookups come back as `None`.
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::errors::{AppError, Result};
use crate::models::upstream::UpstreamEvent;
use crate::services::feed_client::FeedProvider;

#[derive(Default)]
pub struct ScriptedFeed {
    pub live: Mutex<Option<Vec<UpstreamEvent>>>,
    pub upcoming: Mutex<HashMap<u32, Vec<UpstreamEvent>>>,
    pub ended: Mutex<HashMap<(String, u32), Vec<UpstreamEvent>>>,
    pub alternate_upcoming: Mutex<HashMap<u32, Vec<UpstreamEvent>>>,
    pub results: Mutex<HashMap<String, UpstreamEvent>>,
    pub alternate_results: Mutex<HashMap<String, UpstreamEvent>>,
    pub prematch_odds: Mutex<HashMap<String, Value>>,
    pub event_odds: Mutex<HashMap<String, Value>>,
    /// Units that fail with `UpstreamUnavailable`, e.g. "upcoming:2" or "result:E1".
    pub failing: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_live(&self, events: Vec<UpstreamEvent>) {
        *self.live.lock().unwrap() = Some(events);
    }

    pub fn set_result(&self, id: &str, event: UpstreamEvent) {
        self.results.lock().unwrap().insert(id.to_string(), event);
    }

    pub fn fail(&self, unit: &str) {
        self.failing.lock().unwrap().insert(unit.to_string());
    }

    pub fn recover(&self, unit: &str) {
        self.failing.lock().unwrap().remove(unit);
    }

    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, unit: String) -> Result<()> {
        self.calls.lock().unwrap().push(unit.clone());
        if self.failing.lock().unwrap().contains(&unit) {
            return Err(AppError::upstream_unavailable(format!("scripted failure: {}", unit)));
        }
        Ok(())
    }
}

#[async_trait]
impl FeedProvider for ScriptedFeed {
    async fn list_live(&self, _sport_id: &str) -> Result<Vec<UpstreamEvent>> {
        self.record("live".to_string())?;
        Ok(self.live.lock().unwrap().clone().unwrap_or_default())
    }

    async fn list_upcoming(&self, _sport_id: &str, page: u32) -> Result<Vec<UpstreamEvent>> {
        self.record(format!("upcoming:{}", page))?;
        Ok(self.upcoming.lock().unwrap().get(&page).cloned().unwrap_or_default())
    }

    async fn list_ended(&self, _sport_id: &str, day: &str, page: u32) -> Result<Vec<UpstreamEvent>> {
        self.record(format!("ended:{}:{}", day, page))?;
        Ok(self
            .ended
            .lock()
            .unwrap()
            .get(&(day.to_string(), page))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_event_by_id(&self, event_id: &str) -> Result<Option<UpstreamEvent>> {
        self.record(format!("result:{}", event_id))?;
        Ok(self.results.lock().unwrap().get(event_id).cloned())
    }

    async fn get_alternate_upcoming(&self, _sport_id: &str, page: u32) -> Result<Vec<UpstreamEvent>> {
        self.record(format!("alternate_upcoming:{}", page))?;
        Ok(self
            .alternate_upcoming
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_alternate_result(&self, fixture_id: &str) -> Result<Option<UpstreamEvent>> {
        self.record(format!("alternate_result:{}", fixture_id))?;
        Ok(self.alternate_results.lock().unwrap().get(fixture_id).cloned())
    }

    async fn get_prematch_odds(&self, fixture_id: &str) -> Result<Value> {
        self.record(format!("prematch:{}", fixture_id))?;
        Ok(self
            .prematch_odds
            .lock()
            .unwrap()
            .get(fixture_id)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn get_event_odds(&self, event_id: &str) -> Result<Value> {
        self.record(format!("event_odds:{}", event_id))?;
        Ok(self
            .event_odds
            .lock()
            .unwrap()
            .get(event_id)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn get_league_table(&self, league_id: &str) -> Result<Value> {
        self.record(format!("table:{}", league_id))?;
        Ok(serde_json::json!({ "league_id": league_id, "tables": [] }))
    }
}
