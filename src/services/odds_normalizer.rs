// services/odds_normalizer.rs
//
// One normalizer for every odds payload shape we have seen upstream. Shapes are
// tried in a fixed order and the first one yielding any market wins outright:
// markets from different shapes are never combined.
use serde_json::Value;

use crate::models::odds::{BothTeamsScore, MainOdds, MatchOdds, OverUnder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OddsShape {
    /// `{"bookmakers": [{"markets": [{"key": "1x2", "outcomes": [...]}]}]}`
    BookmakerMarkets,
    /// `{"odds": {"1_1": [{"home_od": ..}], "1_3": [{"handicap": "2.5", ..}]}}`
    CodedMarkets,
    /// `[{"FI": .., "main": {"sp": {"full_time_result": {"odds": [..]}}}}]`
    Prematch,
    /// `[{"name": "1", "odds": "3/1"}, ..]`
    NamedOutcomes,
}

pub const SHAPE_PRIORITY: [OddsShape; 4] = [
    OddsShape::BookmakerMarkets,
    OddsShape::CodedMarkets,
    OddsShape::Prematch,
    OddsShape::NamedOutcomes,
];

/// Sections of a pre-match payload that may hold named sub-markets.
const PREMATCH_SECTIONS: [&str; 4] = ["main", "goals", "half", "others"];

impl OddsShape {
    pub fn name(self) -> &'static str {
        match self {
            OddsShape::BookmakerMarkets => "bookmaker_markets",
            OddsShape::CodedMarkets => "coded_markets",
            OddsShape::Prematch => "prematch",
            OddsShape::NamedOutcomes => "named_outcomes",
        }
    }

    pub fn extract(self, payload: &Value) -> MatchOdds {
        match self {
            OddsShape::BookmakerMarkets => extract_bookmaker_markets(payload),
            OddsShape::CodedMarkets => extract_coded_markets(payload),
            OddsShape::Prematch => extract_prematch(payload),
            OddsShape::NamedOutcomes => extract_named_outcomes(payload),
        }
    }
}

pub fn normalize(payload: &Value) -> MatchOdds {
    let payload = unwrap_envelope(payload);
    for shape in SHAPE_PRIORITY {
        let odds = shape.extract(payload);
        if !odds.is_empty() {
            tracing::debug!("odds matched shape {}", shape.name());
            return odds;
        }
    }
    MatchOdds::default()
}

/// Provider responses wrap the interesting part in `results`.
fn unwrap_envelope(payload: &Value) -> &Value {
    match payload.get("results") {
        Some(inner) if !inner.is_null() => inner,
        _ => payload,
    }
}

/// Fractional `a/b` becomes `a/b + 1`; decimals pass through.
pub fn parse_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            match s.split_once('/') {
                Some((num, den)) => {
                    let num: f64 = num.trim().parse().ok()?;
                    let den: f64 = den.trim().parse().ok()?;
                    if den == 0.0 {
                        return None;
                    }
                    num / den + 1.0
                }
                None => s.parse().ok()?,
            }
        }
        _ => return None,
    };
    (price.is_finite() && price > 0.0).then_some(price)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Home,
    Draw,
    Away,
    Over,
    Under,
    Yes,
    No,
}

fn outcome_of(label: &str) -> Option<Outcome> {
    match label.trim().to_lowercase().as_str() {
        "1" | "home" => Some(Outcome::Home),
        "x" | "draw" | "tie" => Some(Outcome::Draw),
        "2" | "away" => Some(Outcome::Away),
        "over" | "over 2.5" => Some(Outcome::Over),
        "under" | "under 2.5" => Some(Outcome::Under),
        "yes" => Some(Outcome::Yes),
        "no" => Some(Outcome::No),
        _ => None,
    }
}

fn is_two_and_half(line: &Value) -> bool {
    match line {
        Value::String(s) => s.trim().trim_start_matches(['O', 'U', 'o', 'u', ' ']).trim() == "2.5",
        Value::Number(n) => n.as_f64() == Some(2.5),
        _ => false,
    }
}

#[derive(Debug, Default)]
struct MarketAccumulator {
    main: MainOdds,
    over_under: OverUnder,
    btts: BothTeamsScore,
}

impl MarketAccumulator {
    fn set(&mut self, outcome: Outcome, price: f64) {
        let slot = match outcome {
            Outcome::Home => &mut self.main.home,
            Outcome::Draw => &mut self.main.draw,
            Outcome::Away => &mut self.main.away,
            Outcome::Over => &mut self.over_under.over,
            Outcome::Under => &mut self.over_under.under,
            Outcome::Yes => &mut self.btts.yes,
            Outcome::No => &mut self.btts.no,
        };
        if slot.is_none() {
            *slot = Some(price);
        }
    }

    fn finish(self) -> MatchOdds {
        MatchOdds {
            main: self.main.non_empty(),
            over_under25: self.over_under.non_empty(),
            both_teams_score: self.btts.non_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarketKind {
    MatchResult,
    Totals,
    BothTeamsScore,
}

fn market_kind(label: &str) -> Option<MarketKind> {
    let label = label.trim().to_lowercase().replace([' ', '-'], "_");
    match label.as_str() {
        "1x2" | "h2h" | "match_winner" | "full_time_result" | "match_result" | "fulltime_result" => {
            Some(MarketKind::MatchResult)
        }
        "totals" | "over_under" | "goals_over_under" | "over/under" | "match_goals" => Some(MarketKind::Totals),
        "btts" | "both_teams_to_score" | "both_teams_score" => Some(MarketKind::BothTeamsScore),
        _ => None,
    }
}

fn outcome_price(outcome: &Value) -> Option<f64> {
    ["odds", "price", "od", "value"]
        .iter()
        .find_map(|key| outcome.get(*key).and_then(parse_price))
}

fn outcome_label(outcome: &Value) -> Option<&str> {
    ["name", "header", "label"]
        .iter()
        .find_map(|key| outcome.get(*key).and_then(Value::as_str))
}

/// Applies one named market's outcomes. Totals only count on the 2.5 line.
fn apply_market(acc: &mut MarketAccumulator, kind: MarketKind, outcomes: &[Value]) {
    for outcome in outcomes {
        let Some(price) = outcome_price(outcome) else {
            continue;
        };
        match kind {
            MarketKind::MatchResult => {
                if let Some(o @ (Outcome::Home | Outcome::Draw | Outcome::Away)) =
                    outcome_label(outcome).and_then(outcome_of)
                {
                    acc.set(o, price);
                }
            }
            MarketKind::Totals => {
                let side = outcome
                    .get("header")
                    .and_then(Value::as_str)
                    .and_then(outcome_of)
                    .or_else(|| outcome.get("name").and_then(Value::as_str).and_then(outcome_of));
                let line = outcome
                    .get("handicap")
                    .or_else(|| outcome.get("point"))
                    .or_else(|| outcome.get("name"));
                let on_line = line.map_or(false, is_two_and_half)
                    || outcome
                        .get("name")
                        .and_then(Value::as_str)
                        .map_or(false, |name| name.trim().ends_with("2.5"));
                if let (Some(o @ (Outcome::Over | Outcome::Under)), true) = (side, on_line) {
                    acc.set(o, price);
                }
            }
            MarketKind::BothTeamsScore => {
                if let Some(o @ (Outcome::Yes | Outcome::No)) = outcome_label(outcome).and_then(outcome_of) {
                    acc.set(o, price);
                }
            }
        }
    }
}

fn extract_bookmaker_markets(payload: &Value) -> MatchOdds {
    let Some(bookmakers) = payload.get("bookmakers").and_then(Value::as_array) else {
        return MatchOdds::default();
    };
    // First bookmaker that prices anything is authoritative.
    for bookmaker in bookmakers {
        let mut acc = MarketAccumulator::default();
        let markets = bookmaker.get("markets").and_then(Value::as_array);
        for market in markets.into_iter().flatten() {
            let label = market.get("key").or_else(|| market.get("name")).and_then(Value::as_str);
            let Some(kind) = label.and_then(market_kind) else {
                continue;
            };
            if let Some(outcomes) = market.get("outcomes").and_then(Value::as_array) {
                apply_market(&mut acc, kind, outcomes);
            }
        }
        let odds = acc.finish();
        if !odds.is_empty() {
            return odds;
        }
    }
    MatchOdds::default()
}

/// Most recent quote in a coded market list; upstream puts it first.
fn latest_quote<'a>(odds: &'a Value, code: &str) -> Option<&'a Value> {
    match odds.get(code)? {
        Value::Array(quotes) => quotes.first(),
        quote @ Value::Object(_) => Some(quote),
        _ => None,
    }
}

fn extract_coded_markets(payload: &Value) -> MatchOdds {
    let Some(odds) = payload.get("odds").filter(|odds| odds.is_object()) else {
        return MatchOdds::default();
    };
    let main = latest_quote(odds, "1_1").and_then(|quote| {
        MainOdds {
            home: quote.get("home_od").and_then(parse_price),
            draw: quote.get("draw_od").and_then(parse_price),
            away: quote.get("away_od").and_then(parse_price),
        }
        .non_empty()
    });
    let over_under25 = match odds.get("1_3") {
        Some(Value::Array(quotes)) => quotes.iter().find(|quote| {
            quote.get("handicap").map_or(false, is_two_and_half)
        }),
        Some(quote @ Value::Object(_)) if quote.get("handicap").map_or(false, is_two_and_half) => Some(quote),
        _ => None,
    }
    .and_then(|quote| {
        OverUnder {
            over: quote.get("over_od").and_then(parse_price),
            under: quote.get("under_od").and_then(parse_price),
        }
        .non_empty()
    });
    MatchOdds {
        main,
        over_under25,
        both_teams_score: None,
    }
}

fn extract_prematch(payload: &Value) -> MatchOdds {
    let fixture = match payload {
        Value::Array(items) => items.first(),
        obj @ Value::Object(_) => Some(obj),
        _ => None,
    };
    let Some(fixture) = fixture else {
        return MatchOdds::default();
    };

    let mut acc = MarketAccumulator::default();
    for section in PREMATCH_SECTIONS {
        let Some(sub_markets) = fixture.get(section).and_then(|s| s.get("sp")).and_then(Value::as_object) else {
            continue;
        };
        for (name, market) in sub_markets {
            let Some(kind) = market_kind(name) else {
                continue;
            };
            if let Some(outcomes) = market.get("odds").and_then(Value::as_array) {
                apply_market(&mut acc, kind, outcomes);
            }
        }
    }
    acc.finish()
}

fn extract_named_outcomes(payload: &Value) -> MatchOdds {
    let outcomes = match payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(_) => match payload.get("odds").and_then(Value::as_array) {
            Some(items) => items.as_slice(),
            None => return MatchOdds::default(),
        },
        _ => return MatchOdds::default(),
    };

    let mut acc = MarketAccumulator::default();
    for outcome in outcomes {
        let (Some(label), Some(price)) = (outcome_label(outcome), outcome_price(outcome)) else {
            continue;
        };
        let Some(kind) = outcome_of(label) else {
            continue;
        };
        // Bare "over"/"under" has no line; only accept explicit 2.5.
        if matches!(kind, Outcome::Over | Outcome::Under) && !label.trim().ends_with("2.5") {
            continue;
        }
        acc.set(kind, price);
    }
    acc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fractional_and_decimal_prices() {
        assert_eq!(parse_price(&json!("3/1")), Some(4.0));
        assert_eq!(parse_price(&json!("1.85")), Some(1.85));
        assert_eq!(parse_price(&json!(2.5)), Some(2.5));
        assert_eq!(parse_price(&json!("1/0")), None);
        assert_eq!(parse_price(&json!("-")), None);
    }

    #[test]
    fn bookmaker_markets_shape() {
        let payload = json!({
            "bookmakers": [
                {"name": "Empty", "markets": []},
                {"name": "Book", "markets": [
                    {"key": "h2h", "outcomes": [
                        {"name": "Home", "price": "2.10"},
                        {"name": "Draw", "price": "3.40"},
                        {"name": "Away", "price": "7/2"}
                    ]},
                    {"key": "totals", "outcomes": [
                        {"name": "Over", "point": 2.5, "price": 1.9},
                        {"name": "Under", "point": 2.5, "price": 1.95},
                        {"name": "Over", "point": 3.5, "price": 3.1}
                    ]}
                ]}
            ]
        });
        let odds = normalize(&payload);
        let main = odds.main.unwrap();
        assert_eq!(main.home, Some(2.10));
        assert_eq!(main.away, Some(4.5));
        assert_eq!(odds.over_under25.unwrap().over, Some(1.9));
        assert!(odds.both_teams_score.is_none());
    }

    #[test]
    fn coded_markets_shape_inside_envelope() {
        let payload = json!({
            "success": 1,
            "results": {"odds": {
                "1_1": [{"home_od": "1.85", "draw_od": "3.50", "away_od": "4.20"},
                        {"home_od": "1.90", "draw_od": "3.40", "away_od": "4.00"}],
                "1_3": [{"handicap": "3.5", "over_od": "2.9", "under_od": "1.4"},
                        {"handicap": "2.5", "over_od": "1.75", "under_od": "2.05"}]
            }}
        });
        let odds = normalize(&payload);
        assert_eq!(odds.main.unwrap().home, Some(1.85));
        let ou = odds.over_under25.unwrap();
        assert_eq!(ou.over, Some(1.75));
        assert_eq!(ou.under, Some(2.05));
    }

    #[test]
    fn prematch_shape_reads_nested_sections() {
        let payload = json!({"results": [{
            "FI": "FI123",
            "main": {"sp": {"full_time_result": {"odds": [
                {"name": "1", "odds": "5/4"},
                {"name": "X", "odds": "12/5"},
                {"name": "2", "odds": "2/1"}
            ]}}},
            "goals": {"sp": {
                "goals_over_under": {"odds": [
                    {"name": "2.5", "header": "Over", "odds": "4/5"},
                    {"name": "2.5", "header": "Under", "odds": "1/1"}
                ]},
                "both_teams_to_score": {"odds": [
                    {"name": "Yes", "odds": "8/11"},
                    {"name": "No", "odds": "1/1"}
                ]}
            }}
        }]});
        let odds = normalize(&payload);
        assert_eq!(odds.main.unwrap().home, Some(2.25));
        assert_eq!(odds.over_under25.unwrap().under, Some(2.0));
        assert_eq!(odds.both_teams_score.unwrap().no, Some(2.0));
    }

    #[test]
    fn named_outcomes_shape() {
        let payload = json!([
            {"name": "1", "odds": "3/1"},
            {"name": "X", "odds": "2.9"},
            {"name": "2", "odds": "2.2"},
            {"name": "Over", "odds": "1.5"},
            {"name": "Over 2.5", "odds": "1.8"}
        ]);
        let odds = normalize(&payload);
        assert_eq!(odds.main.as_ref().unwrap().home, Some(4.0));
        assert_eq!(odds.over_under25.unwrap().over, Some(1.8));
    }

    #[test]
    fn first_matching_shape_wins_without_mixing() {
        // The bookmaker list only prices totals; the coded 1X2 must not be
        // merged into it.
        let payload = json!({
            "bookmakers": [{"markets": [{"key": "totals", "outcomes": [
                {"name": "Over", "point": 2.5, "price": 1.9}
            ]}]}],
            "odds": {"1_1": [{"home_od": "2.0", "draw_od": "3.0", "away_od": "4.0"}]}
        });
        assert!(OddsShape::CodedMarkets.extract(&payload).main.is_some());

        let odds = normalize(&payload);
        assert_eq!(odds.over_under25.unwrap().over, Some(1.9));
        assert!(odds.main.is_none());
    }

    #[test]
    fn unknown_payload_yields_nothing() {
        assert!(normalize(&json!({"success": 0, "error": "PARAM_INVALID"})).is_empty());
        assert!(normalize(&json!(null)).is_empty());
        assert!(normalize(&json!("garbage")).is_empty());
    }
}
