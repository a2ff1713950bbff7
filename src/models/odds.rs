use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MainOdds {
    pub home: Option<f64>,
    pub draw: Option<f64>,
    pub away: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverUnder {
    pub over: Option<f64>,
    pub under: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BothTeamsScore {
    pub yes: Option<f64>,
    pub no: Option<f64>,
}

/// Canonical market structure produced by the odds normalizer. Each market is
/// `None` when the payload did not carry a usable price for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOdds {
    pub main: Option<MainOdds>,
    pub over_under25: Option<OverUnder>,
    pub both_teams_score: Option<BothTeamsScore>,
}

impl MatchOdds {
    pub fn is_empty(&self) -> bool {
        self.main.is_none() && self.over_under25.is_none() && self.both_teams_score.is_none()
    }
}

impl MainOdds {
    /// A market with no price at all is reported as absent.
    pub fn non_empty(self) -> Option<Self> {
        (self.home.is_some() || self.draw.is_some() || self.away.is_some()).then_some(self)
    }
}

impl OverUnder {
    pub fn non_empty(self) -> Option<Self> {
        (self.over.is_some() || self.under.is_some()).then_some(self)
    }
}

impl BothTeamsScore {
    pub fn non_empty(self) -> Option<Self> {
        (self.yes.is_some() || self.no.is_some()).then_some(self)
    }
}
