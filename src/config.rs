// config.rs
use chrono::{Duration, FixedOffset};
use std::env;
use std::str::FromStr;

use crate::errors::{AppError, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_name: String,
    pub feed_api_token: String,
    pub feed_base_url: String,
    pub http_timeout_secs: u64,
    pub host: String,
    pub port: u16,
    pub log_level: tracing::Level,
    pub odds_cache_ttl_secs: u64,
    pub sync: SyncSettings,
}

/// Knobs for the scheduled passes. Delays and page counts are fixed; there is
/// no adaptive backoff.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub sport_id: String,
    pub sport_name: String,
    pub live_pass_every: std::time::Duration,
    pub full_pass_every: std::time::Duration,
    pub request_delay: std::time::Duration,
    pub max_upcoming_pages: u32,
    pub max_ended_pages: u32,
    pub max_alternate_pages: u32,
    pub ended_days: u32,
    pub local_offset: FixedOffset,
    pub stale_live_after: Duration,
    pub finished_refresh_window: Duration,
    pub missed_result_grace: Duration,
    pub missed_result_lookback: Duration,
    pub max_recovery_fetches: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            sport_id: "1".to_string(),
            sport_name: "Football".to_string(),
            live_pass_every: std::time::Duration::from_secs(20),
            full_pass_every: std::time::Duration::from_secs(150),
            request_delay: std::time::Duration::from_millis(500),
            max_upcoming_pages: 20,
            max_ended_pages: 10,
            max_alternate_pages: 20,
            ended_days: 3,
            local_offset: FixedOffset::east_opt(3600).expect("one hour is a valid UTC offset"),
            stale_live_after: Duration::minutes(150),
            finished_refresh_window: Duration::hours(6),
            missed_result_grace: Duration::minutes(180),
            missed_result_lookback: Duration::hours(48),
            max_recovery_fetches: 25,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = SyncSettings::default();

        let offset_minutes: i32 = parse_or("LOCAL_UTC_OFFSET_MINUTES", 60)?;
        let local_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
            AppError::configuration(format!("LOCAL_UTC_OFFSET_MINUTES out of range: {}", offset_minutes))
        })?;

        let sync = SyncSettings {
            sport_id: env::var("SPORT_ID").unwrap_or(defaults.sport_id),
            sport_name: env::var("SPORT_NAME").unwrap_or(defaults.sport_name),
            live_pass_every: std::time::Duration::from_secs(parse_or("LIVE_PASS_SECS", 20)?),
            full_pass_every: std::time::Duration::from_secs(parse_or("FULL_PASS_SECS", 150)?),
            request_delay: std::time::Duration::from_millis(parse_or("REQUEST_DELAY_MS", 500)?),
            max_upcoming_pages: parse_or("MAX_UPCOMING_PAGES", defaults.max_upcoming_pages)?,
            max_ended_pages: parse_or("MAX_ENDED_PAGES", defaults.max_ended_pages)?,
            max_alternate_pages: parse_or("MAX_ALTERNATE_PAGES", defaults.max_alternate_pages)?,
            ended_days: parse_or("ENDED_DAYS", defaults.ended_days)?,
            local_offset,
            stale_live_after: Duration::minutes(parse_or("STALE_LIVE_MINUTES", 150)?),
            finished_refresh_window: Duration::hours(parse_or("FINISHED_REFRESH_HOURS", 6)?),
            missed_result_grace: Duration::minutes(parse_or("MISSED_RESULT_GRACE_MINUTES", 180)?),
            missed_result_lookback: Duration::hours(parse_or("MISSED_RESULT_LOOKBACK_HOURS", 48)?),
            max_recovery_fetches: parse_or("MAX_RECOVERY_FETCHES", defaults.max_recovery_fetches)?,
        };

        Ok(AppConfig {
            database_url: required("DATABASE_URL")?,
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "livescore".to_string()),
            feed_api_token: required("FEED_API_TOKEN")?,
            feed_base_url: env::var("FEED_BASE_URL")
                .unwrap_or_else(|_| "https://api.b365api.com".to_string()),
            http_timeout_secs: parse_or("HTTP_TIMEOUT_SECS", 15)?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("PORT", 3000)?,
            log_level: parse_or("LOG_LEVEL", tracing::Level::INFO)?,
            odds_cache_ttl_secs: parse_or("ODDS_CACHE_TTL_SECS", 300)?,
            sync,
        })
    }

    pub fn get_config_info(&self) -> serde_json::Value {
        serde_json::json!({
            "database_name": self.database_name,
            "feed_base_url": self.feed_base_url,
            "feed_token_set": !self.feed_api_token.is_empty(),
            "sport_id": self.sync.sport_id,
            "live_pass_secs": self.sync.live_pass_every.as_secs(),
            "full_pass_secs": self.sync.full_pass_every.as_secs(),
            "ended_days": self.sync.ended_days,
            "port": self.port,
            "host": self.host,
        })
    }
}

fn required(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::configuration(format!("{} must be set", key))),
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::configuration(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_when_unset() {
        let value: u32 = parse_or("MATCHSYNC_TEST_UNSET_KEY", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn parse_or_rejects_garbage() {
        env::set_var("MATCHSYNC_TEST_BAD_NUMBER", "twelve");
        let result: Result<u32> = parse_or("MATCHSYNC_TEST_BAD_NUMBER", 1);
        assert!(matches!(result, Err(AppError::ConfigurationError(_))));
    }

    #[test]
    fn required_rejects_blank_values() {
        env::set_var("MATCHSYNC_TEST_BLANK", "   ");
        assert!(required("MATCHSYNC_TEST_BLANK").is_err());
    }

    #[test]
    fn default_settings_use_reference_thresholds() {
        let settings = SyncSettings::default();
        assert_eq!(settings.stale_live_after, Duration::minutes(150));
        assert_eq!(settings.local_offset.local_minus_utc(), 3600);
    }
}
