// services/enrichment.rs
//
// On-demand enrichment for the read API: odds (cache, then upstream) and the
// incident timeline. Failures degrade to whatever is already stored.
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::database::match_store::MatchStore;
use crate::models::match_record::{MatchPatch, MatchRecord, MatchStatus};
use crate::models::odds::MatchOdds;
use crate::services::feed_client::FeedProvider;
use crate::services::odds_normalizer::normalize;
use crate::services::timeline::build_timeline;

#[derive(Clone)]
pub struct Enricher {
    store: Arc<dyn MatchStore>,
    feed: Arc<dyn FeedProvider>,
    odds_cache: Arc<RwLock<HashMap<String, (Instant, MatchOdds)>>>,
    odds_ttl: Duration,
}

impl Enricher {
    pub fn new(store: Arc<dyn MatchStore>, feed: Arc<dyn FeedProvider>, odds_ttl: Duration) -> Self {
        Enricher {
            store,
            feed,
            odds_cache: Arc::new(RwLock::new(HashMap::new())),
            odds_ttl,
        }
    }

    fn cache_key(record: &MatchRecord) -> Option<String> {
        record
            .id
            .map(|oid| oid.to_hex())
            .or_else(|| record.primary_id.clone())
    }

    fn cached_odds(&self, key: &str) -> Option<MatchOdds> {
        let cache = self.odds_cache.read().ok()?;
        let (stored_at, odds) = cache.get(key)?;
        (stored_at.elapsed() < self.odds_ttl).then(|| odds.clone())
    }

    /// Cache first, then at most two sequential upstream attempts: pre-match
    /// odds by alternate fixture id, then event odds by primary id. The bool
    /// says whether the answer came from the cache.
    pub async fn odds(&self, record: &MatchRecord) -> (MatchOdds, bool) {
        let key = Self::cache_key(record);
        if let Some(odds) = key.as_deref().and_then(|k| self.cached_odds(k)) {
            debug!("Odds cache hit for {:?}", key);
            return (odds, true);
        }

        let mut found = None;
        if let Some(fixture_id) = record.secondary_id.as_deref().filter(|id| !id.is_empty()) {
            match self.feed.get_prematch_odds(fixture_id).await {
                Ok(payload) => found = Some(normalize(&payload)).filter(|o| !o.is_empty()),
                Err(e) => warn!("Pre-match odds for {} unavailable: {}", fixture_id, e),
            }
        }
        if found.is_none() {
            if let Some(event_id) = record.primary_id.as_deref() {
                match self.feed.get_event_odds(event_id).await {
                    Ok(payload) => found = Some(normalize(&payload)).filter(|o| !o.is_empty()),
                    Err(e) => warn!("Event odds for {} unavailable: {}", event_id, e),
                }
            }
        }

        let Some(odds) = found else {
            return (record.odds_bundle(), false);
        };

        if let Some(id) = record.id {
            let patch = MatchPatch {
                odds: Some(odds.clone()),
                updated_at: Some(Utc::now()),
                ..MatchPatch::default()
            };
            if let Err(e) = self.store.update_fields(&id, &patch).await {
                warn!("Could not store odds for {}: {}", id, e);
            }
        }
        if let Some(key) = key {
            if let Ok(mut cache) = self.odds_cache.write() {
                let ttl = self.odds_ttl;
                cache.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
                cache.insert(key, (Instant::now(), odds.clone()));
            }
        }
        (odds, false)
    }

    /// Refreshes the timeline of live matches, and of finished ones that never
    /// got one. Returns the record as it should be shown.
    pub async fn timeline(&self, mut record: MatchRecord) -> MatchRecord {
        let wanted = record.status == MatchStatus::Live
            || (record.status == MatchStatus::Finished && record.timeline.is_empty());
        let Some(event_id) = record.primary_id.clone().filter(|_| wanted) else {
            return record;
        };

        let event = match self.feed.get_event_by_id(&event_id).await {
            Ok(Some(event)) => event,
            Ok(None) => return record,
            Err(e) => {
                warn!("Event view for {} unavailable: {}", event_id, e);
                return record;
            }
        };

        let timeline = build_timeline(&event.events, &record.away_team.name);
        if timeline.is_empty() || timeline == record.timeline {
            return record;
        }

        if let Some(id) = record.id {
            let now = Utc::now();
            let patch = MatchPatch {
                timeline: Some(timeline.clone()),
                updated_at: Some(now),
                ..MatchPatch::default()
            };
            match self.store.update_fields(&id, &patch).await {
                Ok(()) => {
                    info!("📝 Timeline for {} updated ({} entries)", event_id, timeline.len());
                    record.updated_at = now;
                }
                Err(e) => warn!("Could not store timeline for {}: {}", event_id, e),
            }
        }
        record.timeline = timeline;
        record
    }
}
