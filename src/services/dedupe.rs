// services/dedupe.rs
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::match_record::{FuzzyKey, MatchRecord};

/// Keeps one record per fuzzy key, sorted by start time. Records without a
/// usable key are passed through.
pub fn dedupe(records: Vec<MatchRecord>) -> Vec<MatchRecord> {
    let mut keyed: HashMap<FuzzyKey, MatchRecord> = HashMap::new();
    let mut unkeyed = Vec::new();

    for record in records {
        match record.fuzzy_key() {
            Some(key) => match keyed.get_mut(&key) {
                Some(kept) => {
                    if prefer(&record, kept) == Ordering::Greater {
                        *kept = record;
                    }
                }
                None => {
                    keyed.insert(key, record);
                }
            },
            None => unkeyed.push(record),
        }
    }

    let mut out: Vec<MatchRecord> = keyed.into_values().chain(unkeyed).collect();
    out.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.primary_id.cmp(&b.primary_id)));
    out
}

/// `Greater` when `a` is the better representative. Ties keep `b`.
pub fn prefer(a: &MatchRecord, b: &MatchRecord) -> Ordering {
    a.status
        .display_rank()
        .cmp(&b.status.display_rank())
        .then_with(|| a.timeline.len().cmp(&b.timeline.len()))
        .then_with(|| a.has_secondary_id().cmp(&b.has_secondary_id()))
        .then_with(|| a.updated_at.cmp(&b.updated_at))
}

/// Splits records into the representative of each fuzzy group and the rows
/// it supersedes. Used by the administrative cleanup.
pub fn partition_duplicates(records: Vec<MatchRecord>) -> (Vec<MatchRecord>, Vec<MatchRecord>) {
    let mut groups: HashMap<FuzzyKey, Vec<MatchRecord>> = HashMap::new();
    let mut keep = Vec::new();
    for record in records {
        match record.fuzzy_key() {
            Some(key) => groups.entry(key).or_default().push(record),
            None => keep.push(record),
        }
    }

    let mut drop = Vec::new();
    for (_, mut group) in groups {
        let mut best = 0;
        for i in 1..group.len() {
            if prefer(&group[i], &group[best]) == Ordering::Greater {
                best = i;
            }
        }
        keep.push(group.swap_remove(best));
        drop.extend(group);
    }
    (keep, drop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::match_record::fixtures::{kickoff, record};
    use crate::models::match_record::{MatchStatus, Side, TimelineEntry, TimelineKind};
    use chrono::Duration;

    fn entry() -> TimelineEntry {
        TimelineEntry {
            minute: "5".to_string(),
            kind: TimelineKind::Card,
            text: "5' - 1st Yellow Card - Milan".to_string(),
            side: Side::Away,
            score: String::new(),
        }
    }

    #[test]
    fn live_beats_finished_beats_scheduled() {
        let scheduled = record(Some("E1"), "Inter", "Milan");
        let mut finished = record(Some("E2"), "Inter", "Milan");
        finished.status = MatchStatus::Finished;
        let mut live = record(Some("E3"), "Inter", "Milan");
        live.status = MatchStatus::Live;

        let out = dedupe(vec![scheduled.clone(), finished.clone()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].primary_id.as_deref(), Some("E2"));

        let out = dedupe(vec![finished, live, scheduled]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].primary_id.as_deref(), Some("E3"));
    }

    #[test]
    fn richer_timeline_then_secondary_id_then_recency() {
        let plain = record(Some("E1"), "Inter", "Milan");
        let mut rich = record(Some("E2"), "Inter", "Milan");
        rich.timeline = vec![entry()];
        assert_eq!(dedupe(vec![rich.clone(), plain.clone()])[0].primary_id.as_deref(), Some("E2"));

        let mut with_fi = record(Some("E3"), "Inter", "Milan");
        with_fi.secondary_id = Some("FI1".to_string());
        assert_eq!(dedupe(vec![plain.clone(), with_fi])[0].primary_id.as_deref(), Some("E3"));

        let mut fresher = record(Some("E4"), "Inter", "Milan");
        fresher.updated_at = kickoff();
        assert_eq!(dedupe(vec![fresher, plain])[0].primary_id.as_deref(), Some("E4"));
    }

    #[test]
    fn keeps_distinct_fixtures_in_start_order() {
        let mut late = record(Some("E1"), "Inter", "Milan");
        late.start_time = kickoff() + Duration::hours(3);
        let early = record(Some("E2"), "Roma", "Lazio");
        let mut unnamed = record(Some("E3"), "", "Lazio");
        unnamed.start_time = kickoff() + Duration::hours(1);

        let out = dedupe(vec![late, unnamed, early]);
        let ids: Vec<_> = out.iter().filter_map(|r| r.primary_id.as_deref()).collect();
        assert_eq!(ids, vec!["E2", "E3", "E1"]);
    }

    #[test]
    fn partition_keeps_one_per_group() {
        let a = record(Some("E1"), "Inter", "Milan");
        let mut b = record(Some("E2"), "Inter", "Milan");
        b.status = MatchStatus::Live;
        let c = record(Some("E3"), "Roma", "Lazio");

        let (keep, drop) = partition_duplicates(vec![a, b, c]);
        assert_eq!(keep.len(), 2);
        assert_eq!(drop.len(), 1);
        assert_eq!(drop[0].primary_id.as_deref(), Some("E1"));
    }
}
