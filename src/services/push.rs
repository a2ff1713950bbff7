// services/push.rs
//
// Fan-out of full match snapshots to WebSocket subscribers.
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use crate::database::match_store::{MatchFilter, MatchStore};
use crate::dtos::match_dtos::MatchView;
use crate::errors::Result;
use crate::models::match_record::{MatchRecord, MatchStatus};
use crate::services::dedupe::dedupe;

const CHANNEL_CAPACITY: usize = 16;

pub struct PushHub {
    sender: broadcast::Sender<Arc<str>>,
    latest: RwLock<Arc<str>>,
}

impl Default for PushHub {
    fn default() -> Self {
        Self::new()
    }
}

impl PushHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        PushHub {
            sender,
            latest: RwLock::new(Arc::from("[]")),
        }
    }

    /// Current snapshot plus a receiver for every later one.
    pub fn subscribe(&self) -> (Arc<str>, broadcast::Receiver<Arc<str>>) {
        let receiver = self.sender.subscribe();
        (self.latest(), receiver)
    }

    pub fn latest(&self) -> Arc<str> {
        match self.latest.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns how many subscribers received it.
    pub fn publish(&self, records: &[MatchRecord]) -> Result<usize> {
        let views: Vec<MatchView> = records.iter().map(MatchView::from).collect();
        let payload: Arc<str> = Arc::from(serde_json::to_string(&views)?);

        match self.latest.write() {
            Ok(mut guard) => *guard = payload.clone(),
            Err(poisoned) => *poisoned.into_inner() = payload.clone(),
        }
        // No receivers is not an error: nobody is listening yet.
        Ok(self.sender.send(payload).unwrap_or(0))
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Deduplicated records starting within [now-24h, now+48h], plus every LIVE
/// record regardless of start time.
pub async fn build_snapshot(store: &dyn MatchStore, now: DateTime<Utc>) -> Result<Vec<MatchRecord>> {
    let mut records = store
        .find_matches(&MatchFilter {
            starts_from: Some(now - Duration::hours(24)),
            starts_before: Some(now + Duration::hours(48)),
            ..MatchFilter::default()
        })
        .await?;

    for live in store.find_by_status(MatchStatus::Live).await? {
        if !records.iter().any(|r| r.id.is_some() && r.id == live.id) {
            records.push(live);
        }
    }
    Ok(dedupe(records))
}
