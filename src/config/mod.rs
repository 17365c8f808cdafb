use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::models::{PipelineError, Result};
use crate::services::classifier::ClassifierSettings;
use crate::services::normalizer::{parse_alias_list, TeamNameTable};

pub const DEFAULT_MATCHES_CSV: &str = "matches.csv";
pub const DEFAULT_WINDOW: usize = 3;
pub const DEFAULT_CUTOFF: &str = "2022-01-01";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_path: PathBuf,
    pub window: usize,
    pub cutoff: NaiveDate,
    pub team_names: TeamNameTable,
    pub classifier: ClassifierSettings,
}

impl PipelineConfig {
    /// Read settings from the process environment (after `.env` is loaded).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_path = lookup("MATCHES_CSV").unwrap_or_else(|| DEFAULT_MATCHES_CSV.to_string());

        let window: usize = parse_or(&lookup, "ROLLING_WINDOW", DEFAULT_WINDOW)?;
        if window == 0 {
            return Err(PipelineError::Config("ROLLING_WINDOW must be at least 1".to_string()));
        }

        let cutoff_raw = lookup("TRAIN_CUTOFF").unwrap_or_else(|| DEFAULT_CUTOFF.to_string());
        let cutoff = NaiveDate::parse_from_str(cutoff_raw.trim(), "%Y-%m-%d")
            .map_err(|e| PipelineError::Config(format!("TRAIN_CUTOFF '{}': {}", cutoff_raw, e)))?;

        let team_names = match lookup("TEAM_ALIASES") {
            Some(raw) => TeamNameTable::with_extra_aliases(&parse_alias_list(&raw)?)?,
            None => TeamNameTable::premier_league(),
        };

        let defaults = ClassifierSettings::default();
        let classifier = ClassifierSettings {
            max_iterations: parse_or(&lookup, "CLASSIFIER_MAX_ITERATIONS", defaults.max_iterations)?,
            l2: parse_or(&lookup, "CLASSIFIER_L2", defaults.l2)?,
            gradient_tolerance: parse_or(&lookup, "CLASSIFIER_TOLERANCE", defaults.gradient_tolerance)?,
        };

        Ok(Self {
            data_path: PathBuf::from(data_path),
            window,
            cutoff,
            team_names,
            classifier,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| PipelineError::Config(format!("{} '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}
