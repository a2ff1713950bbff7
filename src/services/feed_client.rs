// services/feed_client.rs
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::upstream::UpstreamEvent;

/// Read-only view of the upstream sports feeds. Every call is one unit of work:
/// a failure here skips only that page, day or lookup.
#[async_trait]
pub trait FeedProvider: Send + Sync {
    async fn list_live(&self, sport_id: &str) -> Result<Vec<UpstreamEvent>>;

    /// An empty page ends pagination.
    async fn list_upcoming(&self, sport_id: &str, page: u32) -> Result<Vec<UpstreamEvent>>;

    /// `day` is `YYYYMMDD`.
    async fn list_ended(&self, sport_id: &str, day: &str, page: u32) -> Result<Vec<UpstreamEvent>>;

    async fn get_event_by_id(&self, event_id: &str) -> Result<Option<UpstreamEvent>>;

    async fn get_alternate_upcoming(&self, sport_id: &str, page: u32) -> Result<Vec<UpstreamEvent>>;

    async fn get_alternate_result(&self, fixture_id: &str) -> Result<Option<UpstreamEvent>>;

    /// Raw payload, handed to the odds normalizer as-is.
    async fn get_prematch_odds(&self, fixture_id: &str) -> Result<Value>;

    async fn get_event_odds(&self, event_id: &str) -> Result<Value>;

    async fn get_league_table(&self, league_id: &str) -> Result<Value>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Value,
    #[serde(default)]
    results: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_detail: Option<String>,
}

impl Envelope {
    fn succeeded(&self) -> bool {
        match &self.success {
            Value::Bool(flag) => *flag,
            Value::Number(n) => n.as_i64() == Some(1),
            Value::Null => self.error.is_none(),
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct HttpFeedClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpFeedClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpFeedClient {
            client,
            base_url: config.feed_base_url.trim_end_matches('/').to_string(),
            token: config.feed_api_token.clone(),
        })
    }

    /// Fetches `path` and returns the whole envelope body once `success` checks out.
    async fn get_body(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .query(params)
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response.json().await?;
        let envelope: Envelope = serde_json::from_value(body.clone())?;
        if !envelope.succeeded() {
            let reason = envelope
                .error
                .or(envelope.error_detail)
                .unwrap_or_else(|| "success flag not set".to_string());
            return Err(AppError::upstream_unavailable(format!("{} rejected: {}", path, reason)));
        }
        Ok(body)
    }

    async fn get_events(&self, path: &str, params: &[(&str, &str)]) -> Result<Vec<UpstreamEvent>> {
        let body = self.get_body(path, params).await?;
        page_events(path, &body)
    }
}

/// Events of an accepted envelope. A `results` that is neither a list nor an
/// event means the provider changed shape, not that the page is empty.
pub fn page_events(path: &str, body: &Value) -> Result<Vec<UpstreamEvent>> {
    match body.get("results").unwrap_or(&Value::Null) {
        Value::Null => Ok(Vec::new()),
        results @ (Value::Array(_) | Value::Object(_)) => Ok(decode_events(path, results)),
        other => Err(AppError::upstream_malformed(format!(
            "{} results has unexpected shape: {}",
            path, other
        ))),
    }
}

/// Decodes element by element so one bad event never costs the page.
pub fn decode_events(source: &str, results: &Value) -> Vec<UpstreamEvent> {
    let items: Vec<&Value> = match results {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![results],
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<UpstreamEvent>(item.clone()) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Skipping malformed event from {}: {}", source, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl FeedProvider for HttpFeedClient {
    async fn list_live(&self, sport_id: &str) -> Result<Vec<UpstreamEvent>> {
        self.get_events("v1/events/inplay", &[("sport_id", sport_id)]).await
    }

    async fn list_upcoming(&self, sport_id: &str, page: u32) -> Result<Vec<UpstreamEvent>> {
        let page = page.to_string();
        self.get_events("v1/events/upcoming", &[("sport_id", sport_id), ("page", &page)])
            .await
    }

    async fn list_ended(&self, sport_id: &str, day: &str, page: u32) -> Result<Vec<UpstreamEvent>> {
        let page = page.to_string();
        self.get_events(
            "v1/events/ended",
            &[("sport_id", sport_id), ("day", day), ("page", &page)],
        )
        .await
    }

    async fn get_event_by_id(&self, event_id: &str) -> Result<Option<UpstreamEvent>> {
        let events = self.get_events("v1/event/view", &[("event_id", event_id)]).await?;
        Ok(events.into_iter().next())
    }

    async fn get_alternate_upcoming(&self, sport_id: &str, page: u32) -> Result<Vec<UpstreamEvent>> {
        let page = page.to_string();
        self.get_events("v1/bet365/upcoming", &[("sport_id", sport_id), ("page", &page)])
            .await
    }

    async fn get_alternate_result(&self, fixture_id: &str) -> Result<Option<UpstreamEvent>> {
        let events = self.get_events("v1/bet365/result", &[("event_id", fixture_id)]).await?;
        Ok(events.into_iter().next())
    }

    async fn get_prematch_odds(&self, fixture_id: &str) -> Result<Value> {
        self.get_body("v3/bet365/prematch", &[("FI", fixture_id)]).await
    }

    async fn get_event_odds(&self, event_id: &str) -> Result<Value> {
        self.get_body("v2/event/odds", &[("event_id", event_id)]).await
    }

    async fn get_league_table(&self, league_id: &str) -> Result<Value> {
        let body = self.get_body("v2/league/table", &[("league_id", league_id)]).await?;
        Ok(body.get("results").cloned().unwrap_or(Value::Null))
    }
}
