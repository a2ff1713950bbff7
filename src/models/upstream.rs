// models/upstream.rs
//
// Wire types for the upstream feeds. Every field is optional and lenient:
// ids and times arrive as strings or numbers, and nested objects with the
// wrong shape are treated as absent instead of failing the whole event.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamEvent {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,

    /// Alternate-provider fixture id (pre-match odds key).
    #[serde(rename = "FI", default, deserialize_with = "lenient_string")]
    pub fixture_id: Option<String>,

    /// Alternate fixture id as exposed on generic events.
    #[serde(default, deserialize_with = "lenient_string")]
    pub bet365_id: Option<String>,

    /// Generic id as exposed on alternate-provider events.
    #[serde(default, deserialize_with = "lenient_string")]
    pub our_event_id: Option<String>,

    /// Unix seconds.
    #[serde(default, deserialize_with = "lenient_string")]
    pub time: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub start_time: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub time_status: Option<String>,

    #[serde(default, deserialize_with = "lenient_struct")]
    pub league: Option<UpstreamLeague>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub league_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub cc: Option<String>,

    #[serde(default, deserialize_with = "lenient_struct")]
    pub home: Option<UpstreamTeam>,

    #[serde(default, deserialize_with = "lenient_struct")]
    pub away: Option<UpstreamTeam>,

    /// Live timer; presence alone means the match is in play.
    #[serde(default, deserialize_with = "non_null")]
    pub timer: Option<Value>,

    /// Score: `"H-A"` or a map keyed by period number.
    #[serde(default, deserialize_with = "non_null")]
    pub ss: Option<Value>,

    #[serde(default, deserialize_with = "lenient_list")]
    pub events: Vec<UpstreamIncident>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamLeague {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cc: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamTeam {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub image_id: Option<String>,
    #[serde(rename = "IG", default, deserialize_with = "lenient_string")]
    pub image_group: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamIncident {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: Option<String>,
}

impl UpstreamEvent {
    /// Minute shown by the live timer, if the timer carries one.
    pub fn timer_minute(&self) -> Option<String> {
        let timer = self.timer.as_ref()?;
        match timer.get("tm")? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn has_timer(&self) -> bool {
        matches!(self.timer, Some(Value::Object(_)))
    }

    /// Upstream status code "3" means ended.
    pub fn reported_ended(&self) -> bool {
        self.time_status.as_deref() == Some("3")
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_struct<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(from_object))
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(from_object)
            .collect(),
        _ => Vec::new(),
    })
}

/// Derived struct deserializers also accept sequences, so the shape is checked first.
fn from_object<T: DeserializeOwned>(value: Value) -> Option<T> {
    match value {
        Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    }
}

fn non_null<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.filter(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Bool(b) => *b,
        _ => true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_ids_and_times_become_strings() {
        let ev: UpstreamEvent = serde_json::from_value(json!({
            "id": 9912, "time": 1760813100, "league": {"id": 94, "name": "Serie A"}
        }))
        .unwrap();
        assert_eq!(ev.id.as_deref(), Some("9912"));
        assert_eq!(ev.time.as_deref(), Some("1760813100"));
        assert_eq!(ev.league.unwrap().id.as_deref(), Some("94"));
    }

    #[test]
    fn wrong_shaped_nested_objects_are_dropped() {
        let ev: UpstreamEvent = serde_json::from_value(json!({
            "id": "E1", "league": "Serie A", "home": ["Inter"], "events": "none"
        }))
        .unwrap();
        assert!(ev.league.is_none());
        assert!(ev.home.is_none());
        assert!(ev.events.is_empty());
    }

    #[test]
    fn positional_arrays_do_not_fill_nested_structs() {
        let ev: UpstreamEvent = serde_json::from_value(json!({
            "id": "E1",
            "league": [94, "Serie A"],
            "away": ["Milan", "Milan"],
            "events": [["1", "Goal"], {"id": "2", "text": "65' - 1st Goal - Inter"}]
        }))
        .unwrap();
        assert!(ev.league.is_none());
        assert!(ev.away.is_none());
        assert_eq!(ev.events.len(), 1);
        assert_eq!(ev.events[0].id.as_deref(), Some("2"));
    }

    #[test]
    fn timer_minute_accepts_strings_and_numbers() {
        let a: UpstreamEvent = serde_json::from_value(json!({"timer": {"tm": "65"}})).unwrap();
        let b: UpstreamEvent = serde_json::from_value(json!({"timer": {"tm": 12}})).unwrap();
        assert_eq!(a.timer_minute().as_deref(), Some("65"));
        assert_eq!(b.timer_minute().as_deref(), Some("12"));
        assert!(a.has_timer());
    }

    #[test]
    fn null_and_empty_scores_are_absent() {
        let a: UpstreamEvent = serde_json::from_value(json!({"ss": null})).unwrap();
        let b: UpstreamEvent = serde_json::from_value(json!({"ss": ""})).unwrap();
        assert!(a.ss.is_none());
        assert!(b.ss.is_none());
    }
}
