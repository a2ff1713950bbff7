// services/timeline.rs
//
// Keyword-driven incident classifier. Side detection by team-name substring is
// a best-effort heuristic: overlapping names ("Inter" / "Inter Miami") can be
// misattributed.
use crate::models::match_record::{Side, TimelineEntry, TimelineKind};
use crate::models::upstream::UpstreamIncident;

/// Ordered keyword rules; the first match wins.
const KIND_RULES: &[(&str, TimelineKind)] = &[
    ("goal", TimelineKind::Goal),
    ("card", TimelineKind::Card),
    ("substitut", TimelineKind::Substitution),
    ("var", TimelineKind::Var),
];

pub fn classify_kind(text: &str) -> TimelineKind {
    let lower = text.to_lowercase();
    KIND_RULES
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, kind)| *kind)
        .unwrap_or(TimelineKind::Unknown)
}

/// Away is checked first; anything not naming the away side is credited to home.
pub fn detect_side(text: &str, away_name: &str) -> Side {
    let lower = text.to_lowercase();
    let away = away_name.trim().to_lowercase();
    if !away.is_empty() && lower.contains(&away) {
        return Side::Away;
    }
    Side::Home
}

/// Leading minute marker such as `45+2'`, without the apostrophes.
fn leading_minute(text: &str) -> String {
    text.chars()
        .take_while(|c| c.is_ascii_digit() || *c == '\'' || *c == '+')
        .filter(|c| *c != '\'')
        .collect()
}

/// First `N-M` pair embedded in the text.
fn embedded_score(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i + 1 < bytes.len() && bytes[i] == b'-' && bytes[i + 1].is_ascii_digit() {
                let mut end = i + 1;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
                return text[start..end].to_string();
            }
        } else {
            i += 1;
        }
    }
    String::new()
}

pub fn classify_incident(text: &str, away_name: &str) -> Option<TimelineEntry> {
    let minute = leading_minute(text);
    // Summary lines ("Score After Full Time") carry no minute.
    if minute.is_empty() && !text.contains("Goal") {
        return None;
    }
    Some(TimelineEntry {
        minute,
        kind: classify_kind(text),
        text: text.to_string(),
        side: detect_side(text, away_name),
        score: embedded_score(text),
    })
}

pub fn build_timeline(incidents: &[UpstreamIncident], away_name: &str) -> Vec<TimelineEntry> {
    incidents
        .iter()
        .filter_map(|incident| incident.text.as_deref())
        .filter_map(|text| classify_incident(text, away_name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_apply_in_order() {
        assert_eq!(classify_kind("23' - 1st Goal - (Inter) -"), TimelineKind::Goal);
        assert_eq!(classify_kind("40' - 2nd Yellow Card - (Milan)"), TimelineKind::Card);
        assert_eq!(classify_kind("60' - Substitution - Inter"), TimelineKind::Substitution);
        assert_eq!(classify_kind("70' - VAR check"), TimelineKind::Var);
        assert_eq!(classify_kind("75' - Corner"), TimelineKind::Unknown);
    }

    #[test]
    fn goal_outranks_var_when_both_present() {
        assert_eq!(classify_kind("80' - Goal confirmed after VAR"), TimelineKind::Goal);
    }

    #[test]
    fn side_defaults_to_home() {
        assert_eq!(detect_side("12' - Corner - (Milan)", "Milan"), Side::Away);
        assert_eq!(detect_side("12' - Corner - (Inter)", "Milan"), Side::Home);
        assert_eq!(detect_side("12' - Corner", "Milan"), Side::Home);
    }

    #[test]
    fn overlapping_names_resolve_to_away_first() {
        // Home "Inter Miami" contains away "Inter": credited to the away side.
        assert_eq!(detect_side("5' - Goal - (Inter Miami)", "Inter"), Side::Away);
    }

    #[test]
    fn incident_extracts_minute_and_score() {
        let entry = classify_incident("45+2' - 2nd Goal - (Milan) - 1-1", "Milan").unwrap();
        assert_eq!(entry.minute, "45+2");
        assert_eq!(entry.kind, TimelineKind::Goal);
        assert_eq!(entry.side, Side::Away);
        assert_eq!(entry.score, "1-1");
    }

    #[test]
    fn summary_lines_are_dropped() {
        assert!(classify_incident("Score After Full Time - 2-1", "Milan").is_none());
        assert!(classify_incident("Goal disallowed", "Milan").is_some());
    }

    #[test]
    fn timeline_skips_incidents_without_text() {
        let incidents = vec![
            UpstreamIncident { id: Some("1".into()), text: None },
            UpstreamIncident { id: Some("2".into()), text: Some("10' - 1st Corner - (Inter)".into()) },
        ];
        let timeline = build_timeline(&incidents, "Milan");
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].minute, "10");
    }
}
