use std::sync::Arc;
use std::time::Duration;

use crate::config::SyncSettings;
use crate::database::match_store::MatchStore;
use crate::services::enrichment::Enricher;
use crate::services::feed_client::FeedProvider;
use crate::services::push::PushHub;
use crate::services::reconciler::Reconciler;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MatchStore>,
    pub feed: Arc<dyn FeedProvider>,
    pub reconciler: Arc<Reconciler>,
    pub push: Arc<PushHub>,
    pub enricher: Enricher,
    pub settings: Arc<SyncSettings>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MatchStore>,
        feed: Arc<dyn FeedProvider>,
        settings: SyncSettings,
        odds_cache_ttl: Duration,
    ) -> Self {
        let push = Arc::new(PushHub::new());
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            feed.clone(),
            push.clone(),
            settings.clone(),
        ));
        let enricher = Enricher::new(store.clone(), feed.clone(), odds_cache_ttl);

        AppState {
            store,
            feed,
            reconciler,
            push,
            enricher,
            settings: Arc::new(settings),
        }
    }
}
