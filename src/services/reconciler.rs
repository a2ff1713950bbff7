// services/reconciler.rs
//
// Scheduled feed pulls. Every upstream call is its own unit of work: a failure
// is logged and counted, and the pass moves on.
use chrono::{DateTime, Duration, FixedOffset, Utc};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::SyncSettings;
use crate::database::match_store::{MatchFilter, MatchStore};
use crate::models::match_record::{MatchPatch, MatchRecord, MatchStatus};
use crate::models::upstream::UpstreamEvent;
use crate::services::event_mapper::{self, Candidate, SourceKind};
use crate::services::feed_client::FeedProvider;
use crate::services::match_resolver::{IngestOutcome, MatchResolver};
use crate::services::push::{build_snapshot, PushHub};

/// The ended feed pages in blocks of this size; a shorter page is the last.
const ENDED_PAGE_SIZE: usize = 50;

/// Trailing window used by the `resync` command.
pub const RESYNC_DAYS: u32 = 30;

#[derive(Debug, Default, Clone)]
pub struct PassReport {
    pub pass: &'static str,
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub recovered: usize,
    pub skipped: usize,
    pub failed_units: usize,
    pub transitions: usize,
}

impl PassReport {
    fn new(pass: &'static str) -> Self {
        PassReport {
            pass,
            ..PassReport::default()
        }
    }

    fn log(&self) {
        info!(
            "✅ {} pass done: fetched={} created={} updated={} unchanged={} recovered={} skipped={} failed_units={} transitions={}",
            self.pass,
            self.fetched,
            self.created,
            self.updated,
            self.unchanged,
            self.recovered,
            self.skipped,
            self.failed_units,
            self.transitions
        );
    }
}

/// Which lookup to try first when re-checking a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupOrder {
    PrimaryFirst,
    AlternateFirst,
}

pub struct Reconciler {
    store: Arc<dyn MatchStore>,
    feed: Arc<dyn FeedProvider>,
    resolver: MatchResolver,
    push: Arc<PushHub>,
    settings: SyncSettings,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn MatchStore>,
        feed: Arc<dyn FeedProvider>,
        push: Arc<PushHub>,
        settings: SyncSettings,
    ) -> Self {
        Reconciler {
            resolver: MatchResolver::new(store.clone()),
            store,
            feed,
            push,
            settings,
        }
    }

    /// Runs both passes on their own fixed periods until the runtime stops.
    pub fn spawn(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        let live = {
            let this = self.clone();
            tokio::spawn(async move {
                let mut ticker = interval(this.settings.live_pass_every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    this.live_pass(Utc::now()).await;
                }
            })
        };
        let full = tokio::spawn(async move {
            let mut ticker = interval(self.settings.full_pass_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.full_pass(Utc::now()).await;
            }
        });
        vec![live, full]
    }

    pub async fn live_pass(&self, now: DateTime<Utc>) -> PassReport {
        info!("⚡ Live pass starting");
        let mut report = PassReport::new("live");

        let events = match self.feed.list_live(&self.settings.sport_id).await {
            Ok(events) => events,
            Err(e) => {
                // Without the live set we cannot tell who disappeared.
                warn!("Live list unavailable, pass aborted: {}", e);
                report.failed_units += 1;
                report.log();
                return report;
            }
        };
        report.fetched += events.len();

        let mut live_ids: HashSet<String> = HashSet::new();
        for event in &events {
            live_ids.extend(event.id.iter().cloned());
            live_ids.extend(event.bet365_id.iter().cloned());
        }
        let touched = self.ingest_events(&events, SourceKind::Live, now, &mut report).await;

        let stored_live = match self.store.find_by_status(MatchStatus::Live).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Could not load stored LIVE records: {}", e);
                report.failed_units += 1;
                Vec::new()
            }
        };

        for record in stored_live {
            let still_listed = record.id.map_or(false, |id| touched.contains(&id))
                || record.primary_id.as_ref().map_or(false, |id| live_ids.contains(id))
                || record.secondary_id.as_ref().map_or(false, |id| live_ids.contains(id));
            if still_listed {
                continue;
            }

            match self.fetch_result(&record, LookupOrder::PrimaryFirst, &mut report).await {
                Some(candidate) if candidate.status == MatchStatus::Finished => {
                    self.ingest_candidate(candidate, now, &mut report).await;
                }
                _ => debug!(
                    "{} vs {} missing from live feed, no settled result yet; left LIVE",
                    record.home_team.name, record.away_team.name
                ),
            }
        }

        self.publish_snapshot(now).await;
        report.log();
        report
    }

    pub async fn full_pass(&self, now: DateTime<Utc>) -> PassReport {
        info!("🔄 Full pass starting");
        let mut report = PassReport::new("full");

        self.pull_upcoming(now, &mut report).await;
        self.pull_ended(self.settings.ended_days, now, &mut report).await;
        self.pull_alternate_upcoming(now, &mut report).await;

        self.scan_stale_live(now, &mut report).await;
        self.refresh_recent_finished(now, &mut report).await;
        self.backfill_missed_results(now, &mut report).await;

        self.publish_snapshot(now).await;
        report.log();
        report
    }

    /// Ended-events backfill over `days` trailing days.
    pub async fn backfill_ended(&self, days: u32, now: DateTime<Utc>) -> PassReport {
        info!("📚 Ended backfill over {} days starting", days);
        let mut report = PassReport::new("ended-backfill");
        self.pull_ended(days, now, &mut report).await;
        self.publish_snapshot(now).await;
        report.log();
        report
    }

    pub async fn resync(&self, now: DateTime<Utc>) -> (PassReport, PassReport) {
        let backfill = self.backfill_ended(RESYNC_DAYS, now).await;
        let full = self.full_pass(now).await;
        (backfill, full)
    }

    async fn pause(&self) {
        if !self.settings.request_delay.is_zero() {
            tokio::time::sleep(self.settings.request_delay).await;
        }
    }

    async fn pull_upcoming(&self, now: DateTime<Utc>, report: &mut PassReport) {
        for page in 1..=self.settings.max_upcoming_pages {
            self.pause().await;
            match self.feed.list_upcoming(&self.settings.sport_id, page).await {
                Ok(events) if events.is_empty() => break,
                Ok(events) => {
                    report.fetched += events.len();
                    self.ingest_events(&events, SourceKind::Upcoming, now, report).await;
                }
                Err(e) => {
                    warn!("Upcoming page {} skipped: {}", page, e);
                    report.failed_units += 1;
                }
            }
        }
    }

    async fn pull_ended(&self, days: u32, now: DateTime<Utc>, report: &mut PassReport) {
        for day in ended_days(now, days, self.settings.local_offset) {
            for page in 1..=self.settings.max_ended_pages {
                self.pause().await;
                match self.feed.list_ended(&self.settings.sport_id, &day, page).await {
                    Ok(events) => {
                        let count = events.len();
                        if count == 0 {
                            break;
                        }
                        report.fetched += count;
                        self.ingest_events(&events, SourceKind::Ended, now, report).await;
                        if count < ENDED_PAGE_SIZE {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Ended day {} page {} skipped: {}", day, page, e);
                        report.failed_units += 1;
                    }
                }
            }
        }
    }

    async fn pull_alternate_upcoming(&self, now: DateTime<Utc>, report: &mut PassReport) {
        for page in 1..=self.settings.max_alternate_pages {
            self.pause().await;
            match self.feed.get_alternate_upcoming(&self.settings.sport_id, page).await {
                Ok(events) if events.is_empty() => break,
                Ok(events) => {
                    report.fetched += events.len();
                    self.ingest_events(&events, SourceKind::AlternateUpcoming, now, report)
                        .await;
                }
                Err(e) => {
                    warn!("Alternate upcoming page {} skipped: {}", page, e);
                    report.failed_units += 1;
                }
            }
        }
    }

    /// LIVE past the staleness threshold: settle from a fetched result, or
    /// force FINISHED when none is available.
    async fn scan_stale_live(&self, now: DateTime<Utc>, report: &mut PassReport) {
        let cutoff = now - self.settings.stale_live_after;
        let stale: Vec<MatchRecord> = match self.store.find_by_status(MatchStatus::Live).await {
            Ok(records) => records
                .into_iter()
                .filter(|r| r.start_time < cutoff)
                .take(self.settings.max_recovery_fetches)
                .collect(),
            Err(e) => {
                warn!("Stale-LIVE scan skipped: {}", e);
                report.failed_units += 1;
                return;
            }
        };

        for record in stale {
            let fetched = self.fetch_result(&record, LookupOrder::PrimaryFirst, report).await;
            if let Some(candidate) = fetched.filter(|c| c.status == MatchStatus::Finished) {
                self.ingest_candidate(candidate, now, report).await;
                continue;
            }

            let Some(id) = record.id else { continue };
            let patch = MatchPatch {
                status: Some(MatchStatus::Finished),
                minute: Some(String::new()),
                finished_at: Some(now),
                updated_at: Some(now),
                ..MatchPatch::default()
            };
            match self.store.update_fields(&id, &patch).await {
                Ok(()) => {
                    report.transitions += 1;
                    info!(
                        "{} vs {} ({}): LIVE -> FINISHED after staleness threshold",
                        record.home_team.name,
                        record.away_team.name,
                        record.primary_id.as_deref().unwrap_or("-")
                    );
                }
                Err(e) => {
                    warn!("Could not force-finish {}: {}", id, e);
                    report.failed_units += 1;
                }
            }
        }
    }

    /// Late score corrections on recently finished fixtures.
    async fn refresh_recent_finished(&self, now: DateTime<Utc>, report: &mut PassReport) {
        let filter = MatchFilter {
            status: Some(MatchStatus::Finished),
            starts_from: Some(now - self.settings.finished_refresh_window),
            starts_before: Some(now),
            ..MatchFilter::default()
        };
        let recent = match self.store.find_matches(&filter).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Recent-FINISHED refresh skipped: {}", e);
                report.failed_units += 1;
                return;
            }
        };

        for record in recent.into_iter().take(self.settings.max_recovery_fetches) {
            let fetched = self.fetch_result(&record, LookupOrder::PrimaryFirst, report).await;
            if let Some(candidate) = fetched.filter(|c| c.status == MatchStatus::Finished) {
                self.ingest_candidate(candidate, now, report).await;
            }
        }
    }

    /// SCHEDULED fixtures whose kickoff passed more than the grace period ago.
    async fn backfill_missed_results(&self, now: DateTime<Utc>, report: &mut PassReport) {
        let filter = MatchFilter {
            status: Some(MatchStatus::Scheduled),
            starts_from: Some(now - self.settings.missed_result_lookback),
            starts_before: Some(now - self.settings.missed_result_grace),
            ..MatchFilter::default()
        };
        let missed = match self.store.find_matches(&filter).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Missed-result backfill skipped: {}", e);
                report.failed_units += 1;
                return;
            }
        };

        for record in missed.into_iter().take(self.settings.max_recovery_fetches) {
            let fetched = self.fetch_result(&record, LookupOrder::AlternateFirst, report).await;
            if let Some(candidate) = fetched.filter(|c| c.status != MatchStatus::Scheduled) {
                self.ingest_candidate(candidate, now, report).await;
            }
        }
    }

    /// Looks the record up on both providers in `order`. A settled result
    /// stops the search; otherwise the first mapped event is returned.
    async fn fetch_result(
        &self,
        record: &MatchRecord,
        order: LookupOrder,
        report: &mut PassReport,
    ) -> Option<Candidate> {
        let lookups = match order {
            LookupOrder::PrimaryFirst => [false, true],
            LookupOrder::AlternateFirst => [true, false],
        };

        let mut first_seen = None;
        for alternate in lookups {
            let id = if alternate {
                record.secondary_id.as_deref()
            } else {
                record.primary_id.as_deref()
            };
            let Some(id) = id.filter(|id| !id.trim().is_empty()) else {
                continue;
            };

            self.pause().await;
            let looked_up = if alternate {
                self.feed.get_alternate_result(id).await
            } else {
                self.feed.get_event_by_id(id).await
            };
            let source = if alternate {
                SourceKind::AlternateResult
            } else {
                SourceKind::Result
            };

            let event = match looked_up {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Result lookup for {} ({:?}) failed: {}", id, source, e);
                    report.failed_units += 1;
                    continue;
                }
            };
            report.fetched += 1;

            let Some(mut candidate) = event_mapper::map(&event, source, &self.settings.sport_name)
            else {
                continue;
            };
            // Lookups may omit ids; the record we asked about supplies them.
            if candidate.primary_id.is_none() {
                candidate.primary_id = record.primary_id.clone();
            }
            if candidate.secondary_id.is_none() {
                candidate.secondary_id = record.secondary_id.clone();
            }

            if candidate.status == MatchStatus::Finished {
                return Some(candidate);
            }
            first_seen.get_or_insert(candidate);
        }
        first_seen
    }

    /// Maps and ingests a page. Returns the store ids of every record touched.
    async fn ingest_events(
        &self,
        events: &[UpstreamEvent],
        source: SourceKind,
        now: DateTime<Utc>,
        report: &mut PassReport,
    ) -> HashSet<bson::oid::ObjectId> {
        let mut touched = HashSet::new();
        for event in events {
            let Some(candidate) = event_mapper::map(event, source, &self.settings.sport_name) else {
                debug!("Dropping {:?} event {:?} without a start time", source, event.id);
                report.skipped += 1;
                continue;
            };
            if let Some(id) = self.ingest_candidate(candidate, now, report).await {
                touched.insert(id);
            }
        }
        touched
    }

    async fn ingest_candidate(
        &self,
        candidate: Candidate,
        now: DateTime<Utc>,
        report: &mut PassReport,
    ) -> Option<bson::oid::ObjectId> {
        let label = candidate
            .primary_id
            .clone()
            .or_else(|| candidate.secondary_id.clone())
            .unwrap_or_else(|| format!("{} vs {}", candidate.home_team.name, candidate.away_team.name));

        match self.resolver.ingest(candidate, now).await {
            Ok(ingested) => {
                match ingested.outcome {
                    IngestOutcome::Created => report.created += 1,
                    IngestOutcome::Updated => report.updated += 1,
                    IngestOutcome::Unchanged => report.unchanged += 1,
                    IngestOutcome::Recovered => report.recovered += 1,
                }
                if ingested.transition.is_some() {
                    report.transitions += 1;
                }
                ingested.record.id
            }
            Err(e) => {
                warn!("Ingest of {} failed: {}", label, e);
                report.failed_units += 1;
                None
            }
        }
    }

    async fn publish_snapshot(&self, now: DateTime<Utc>) {
        match build_snapshot(self.store.as_ref(), now).await {
            Ok(records) => match self.push.publish(&records) {
                Ok(receivers) => debug!("📡 Snapshot of {} matches sent to {} subscribers", records.len(), receivers),
                Err(e) => warn!("Snapshot publish failed: {}", e),
            },
            Err(e) => warn!("Snapshot build failed: {}", e),
        }
    }
}

/// `YYYYMMDD` days covering the trailing window in both UTC and the local
/// offset, newest first, without repeats.
pub fn ended_days(now: DateTime<Utc>, days: u32, local_offset: FixedOffset) -> Vec<String> {
    let mut set = BTreeSet::new();
    for back in 0..days {
        let moment = now - Duration::days(i64::from(back));
        set.insert(moment.format("%Y%m%d").to_string());
        set.insert(moment.with_timezone(&local_offset).format("%Y%m%d").to_string());
    }
    set.into_iter().rev().collect()
}
