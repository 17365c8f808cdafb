mod error;

pub use error::{PipelineError, Result};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchResult {
    Loss,
    Draw,
    Win,
}

impl MatchResult {
    pub fn code(self) -> i8 {
        match self {
            MatchResult::Win => 1,
            MatchResult::Draw => 0,
            MatchResult::Loss => -1,
        }
    }

    #[cfg(test)]
    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            1 => Some(MatchResult::Win),
            0 => Some(MatchResult::Draw),
            -1 => Some(MatchResult::Loss),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            MatchResult::Win => "W",
            MatchResult::Draw => "D",
            MatchResult::Loss => "L",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "W" => Some(MatchResult::Win),
            "D" => Some(MatchResult::Draw),
            "L" => Some(MatchResult::Loss),
            _ => None,
        }
    }
}

/// Box-score numbers for one side of a played match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    pub goals_for: f64,
    pub goals_against: f64,
    pub shots: f64,
    pub shots_on_target: f64,
    pub expected_goals: f64,
    pub expected_goals_against: f64,
}

impl MatchStats {
    /// Short column names used by the match CSV, in `values()` order.
    pub const COLUMNS: [&'static str; 6] = ["gf", "ga", "sh", "sot", "xg", "xga"];

    pub fn values(&self) -> [f64; 6] {
        [
            self.goals_for,
            self.goals_against,
            self.shots,
            self.shots_on_target,
            self.expected_goals,
            self.expected_goals_against,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.values().iter().all(|v| v.is_finite())
    }
}

/// One fixture as seen from `team`'s side. Unplayed fixtures carry no
/// result and no stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: String,
    pub date: NaiveDate,
    pub time: String,
    pub team: String,
    pub opponent: String,
    pub venue: String,
    pub result: Option<MatchResult>,
    pub stats: Option<MatchStats>,
}

impl MatchRecord {
    /// Stats usable as history. Non-finite numbers count as not played.
    pub fn played_stats(&self) -> Option<&MatchStats> {
        self.stats.as_ref().filter(|stats| stats.is_finite())
    }
}

/// Trailing means of `MatchStats` over an entity's previous matches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingStats {
    pub goals_for: f64,
    pub goals_against: f64,
    pub shots: f64,
    pub shots_on_target: f64,
    pub expected_goals: f64,
    pub expected_goals_against: f64,
}

impl RollingStats {
    pub fn from_values(values: [f64; 6]) -> Self {
        Self {
            goals_for: values[0],
            goals_against: values[1],
            shots: values[2],
            shots_on_target: values[3],
            expected_goals: values[4],
            expected_goals_against: values[5],
        }
    }

    pub fn values(&self) -> [f64; 6] {
        [
            self.goals_for,
            self.goals_against,
            self.shots,
            self.shots_on_target,
            self.expected_goals,
            self.expected_goals_against,
        ]
    }

    /// Column names for a window, e.g. `gf_rolling3` or `opp_gf_rolling3`.
    pub fn column_names(prefix: &str, window: usize) -> Vec<String> {
        MatchStats::COLUMNS
            .iter()
            .map(|col| format!("{}{}_rolling{}", prefix, col, window))
            .collect()
    }
}

/// Rolling features for the record at `record_index` of the input slice.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingFeatureRow {
    pub record_index: usize,
    pub entity: String,
    pub date: NaiveDate,
    pub rolling: RollingStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledFeatureRow {
    pub record: MatchRecord,
    pub venue_code: usize,
    pub opp_code: usize,
    pub rolling: RollingStats,
    pub opp_rolling: RollingStats,
}

impl AssembledFeatureRow {
    pub const FEATURE_COUNT: usize = 14;

    pub fn feature_names(window: usize) -> Vec<String> {
        let mut names = vec!["venue_code".to_string(), "opp_code".to_string()];
        names.extend(RollingStats::column_names("", window));
        names.extend(RollingStats::column_names("opp_", window));
        names
    }

    /// Feature vector in `feature_names` order.
    pub fn features(&self) -> [f64; Self::FEATURE_COUNT] {
        let mut out = [0.0; Self::FEATURE_COUNT];
        out[0] = self.venue_code as f64;
        out[1] = self.opp_code as f64;
        out[2..8].copy_from_slice(&self.rolling.values());
        out[8..14].copy_from_slice(&self.opp_rolling.values());
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub record: MatchRecord,
    pub home_win_prob: f64,
    pub draw_prob: f64,
    pub away_win_prob: f64,
    pub predicted: MatchResult,
    pub actual: Option<MatchResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureSummary {
    pub id: String,
    pub date: String,
    pub time: String,
    pub team: String,
    pub opponent: String,
}

impl From<&MatchRecord> for FixtureSummary {
    fn from(record: &MatchRecord) -> Self {
        Self {
            id: record.id.clone(),
            date: record.date.format("%Y-%m-%d").to_string(),
            time: record.time.clone(),
            team: record.team.clone(),
            opponent: record.opponent.clone(),
        }
    }
}

/// Outcome probabilities as percentages rounded to one decimal place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixturePrediction {
    pub home_win_prob: f64,
    pub draw_prob: f64,
    pub away_win_prob: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRow {
    pub date: String,
    pub team: String,
    pub opponent: String,
    pub actual: Option<String>,
    pub predicted: String,
    pub home_win_prob: f64,
    pub draw_prob: f64,
    pub away_win_prob: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub cutoff: NaiveDate,
    pub training_rows: usize,
    pub scored_rows: usize,
    pub precision: f64,
    pub rows: Vec<BacktestRow>,
}

// API Response types
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}
