//! Assessment domain types
//!
//! The scoring record attached to a job once analysis has completed.

use serde::{Deserialize, Serialize};

use super::serde_helpers::{null_as_empty, string_or_list};

/// Lowest score the service assigns
pub const MIN_SCORE: u8 = 1;

/// Highest score the service assigns
pub const MAX_SCORE: u8 = 10;

/// Investment assessment produced by the analysis service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Quality and experience of the founding team
    pub team_strength: u8,

    /// Size and growth potential of the target market
    pub market_opportunity: u8,

    /// Technical differentiation
    pub product_innovation: u8,

    /// Revenue viability and scalability
    pub business_model: u8,

    /// Weighted or model-generated overall score
    pub overall_score: f64,

    #[serde(default, deserialize_with = "string_or_list")]
    pub strengths: Vec<String>,

    #[serde(default, deserialize_with = "string_or_list")]
    pub concerns: Vec<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub investment_thesis: String,
}

impl Assessment {
    /// Returns the four sub-scores with display labels, in service order
    pub fn score_breakdown(&self) -> [(&'static str, u8); 4] {
        [
            ("Team", self.team_strength),
            ("Market", self.market_opportunity),
            ("Product", self.product_innovation),
            ("Business model", self.business_model),
        ]
    }

    /// Classifies the overall score
    pub fn band(&self) -> ScoreBand {
        ScoreBand::from_score(self.overall_score)
    }

    /// Whether every score lies within the documented 1..=10 range
    pub fn scores_in_range(&self) -> bool {
        let range = MIN_SCORE..=MAX_SCORE;
        let subs_ok = self
            .score_breakdown()
            .iter()
            .all(|(_, score)| range.contains(score));

        subs_ok
            && self.overall_score >= f64::from(MIN_SCORE)
            && self.overall_score <= f64::from(MAX_SCORE)
    }
}

/// Coarse classification of an overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Strong,
    Promising,
    Weak,
}

impl ScoreBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            ScoreBand::Strong
        } else if score >= 6.0 {
            ScoreBand::Promising
        } else {
            ScoreBand::Weak
        }
    }
}

impl std::fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreBand::Strong => write!(f, "Strong"),
            ScoreBand::Promising => write!(f, "Promising"),
            ScoreBand::Weak => write!(f, "Weak"),
        }
    }
}
