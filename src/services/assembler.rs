use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::models::{AssembledFeatureRow, MatchRecord, Result, RollingFeatureRow, RollingStats};
use crate::services::rolling::{compute_rolling, GroupKey};

/// Category codes for venue and opponent: index into the sorted distinct
/// values seen across the whole dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCodes {
    venues: Vec<String>,
    opponents: Vec<String>,
}

impl CategoryCodes {
    pub fn from_records(records: &[MatchRecord]) -> Self {
        let venues: BTreeSet<&str> = records.iter().map(|r| r.venue.as_str()).collect();
        let opponents: BTreeSet<&str> = records.iter().map(|r| r.opponent.as_str()).collect();
        Self {
            venues: venues.into_iter().map(String::from).collect(),
            opponents: opponents.into_iter().map(String::from).collect(),
        }
    }

    pub fn venue_code(&self, venue: &str) -> Option<usize> {
        self.venues.binary_search_by(|v| v.as_str().cmp(venue)).ok()
    }

    pub fn opp_code(&self, opponent: &str) -> Option<usize> {
        self.opponents.binary_search_by(|o| o.as_str().cmp(opponent)).ok()
    }
}

/// Join team-side rolling rows to the opponent's own rolling form on the
/// same date.
///
/// `opponent_rows` must come from `GroupKey::Opponent`, so their `entity` is
/// the opponent's name. A fixture (A, B, D) picks up the row for entity B on
/// date D. Fixtures without one are dropped; every returned row carries both
/// feature blocks. Categorical codes and record fields always come from the
/// team side.
pub fn assemble(
    records: &[MatchRecord],
    team_rows: &[RollingFeatureRow],
    opponent_rows: &[RollingFeatureRow],
    codes: &CategoryCodes,
) -> Vec<AssembledFeatureRow> {
    let mut opponent_form: HashMap<(&str, NaiveDate), &RollingStats> = HashMap::new();
    for row in opponent_rows {
        opponent_form
            .entry((row.entity.as_str(), row.date))
            .or_insert(&row.rolling);
    }

    let mut assembled = Vec::with_capacity(team_rows.len());
    let mut unmatched = 0usize;

    for row in team_rows {
        let record = &records[row.record_index];
        let Some(opp_rolling) = opponent_form.get(&(record.opponent.as_str(), record.date)) else {
            unmatched += 1;
            continue;
        };
        let (Some(venue_code), Some(opp_code)) =
            (codes.venue_code(&record.venue), codes.opp_code(&record.opponent))
        else {
            tracing::warn!("No category code for fixture {}; skipping", record.id);
            continue;
        };

        assembled.push(AssembledFeatureRow {
            record: record.clone(),
            venue_code,
            opp_code,
            rolling: row.rolling,
            opp_rolling: **opp_rolling,
        });
    }

    if unmatched > 0 {
        tracing::debug!("{} fixtures dropped for missing opponent form", unmatched);
    }

    assembled
}

/// Run both rolling passes over `records` and assemble the feature rows.
pub fn build_feature_rows(records: &[MatchRecord], window: usize) -> Result<Vec<AssembledFeatureRow>> {
    let team_rows = compute_rolling(records, GroupKey::Team, window)?;
    let opponent_rows = compute_rolling(records, GroupKey::Opponent, window)?;
    let codes = CategoryCodes::from_records(records);
    Ok(assemble(records, &team_rows, &opponent_rows, &codes))
}
