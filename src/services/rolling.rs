use std::collections::BTreeMap;

use chrono::NaiveDate;
use statrs::statistics::Statistics;

use crate::models::{MatchRecord, MatchStats, PipelineError, Result, RollingFeatureRow, RollingStats};

/// Which side of a record the rolling window is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Team,
    Opponent,
}

impl GroupKey {
    pub fn name(self) -> &'static str {
        match self {
            GroupKey::Team => "team",
            GroupKey::Opponent => "opponent",
        }
    }

    pub fn entity(self, record: &MatchRecord) -> &str {
        match self {
            GroupKey::Team => &record.team,
            GroupKey::Opponent => &record.opponent,
        }
    }
}

/// Trailing means over the `window` previous played matches of each entity.
///
/// Records are partitioned by `key`, ordered by date (stable, so same-day
/// records keep input order) and averaged over earlier dates only. Records
/// without finite stats are unplayed fixtures: they can receive features but
/// never feed a window. Records with fewer than `window` prior played matches are
/// left out. Output is in input order.
pub fn compute_rolling(
    records: &[MatchRecord],
    key: GroupKey,
    window: usize,
) -> Result<Vec<RollingFeatureRow>> {
    if window == 0 {
        return Err(PipelineError::Config("rolling window must be at least 1".to_string()));
    }
    if records.is_empty() {
        return Err(PipelineError::InsufficientHistory { key: key.name() });
    }

    let mut partitions: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, record) in records.iter().enumerate() {
        partitions.entry(key.entity(record)).or_default().push(index);
    }

    let mut rows = Vec::new();
    let mut cold_start = 0usize;

    for (entity, mut indices) in partitions {
        indices.sort_by_key(|&i| records[i].date);

        let mut history: Vec<&MatchStats> = Vec::new();
        let mut same_day: Vec<&MatchStats> = Vec::new();
        let mut current_date: Option<NaiveDate> = None;

        for index in indices {
            let record = &records[index];
            if current_date != Some(record.date) {
                history.append(&mut same_day);
                current_date = Some(record.date);
            }

            if history.len() >= window {
                rows.push(RollingFeatureRow {
                    record_index: index,
                    entity: entity.to_string(),
                    date: record.date,
                    rolling: window_mean(&history[history.len() - window..]),
                });
            } else {
                cold_start += 1;
            }

            if let Some(stats) = record.played_stats() {
                same_day.push(stats);
            }
        }
    }

    rows.sort_by_key(|row| row.record_index);

    tracing::debug!(
        "Rolling {} window {}: {} rows, {} cold-start rows dropped",
        key.name(),
        window,
        rows.len(),
        cold_start
    );

    Ok(rows)
}

/// Form going into the team's next fixture: means over its last `window`
/// played matches, or `None` without enough history.
pub fn current_form(records: &[MatchRecord], team: &str, window: usize) -> Option<RollingStats> {
    if window == 0 {
        return None;
    }
    let mut played: Vec<&MatchRecord> = records
        .iter()
        .filter(|r| r.team == team && r.played_stats().is_some())
        .collect();
    played.sort_by_key(|r| r.date);
    if played.len() < window {
        return None;
    }
    let recent: Vec<&MatchStats> = played[played.len() - window..]
        .iter()
        .filter_map(|r| r.played_stats())
        .collect();
    Some(window_mean(&recent))
}

fn window_mean(window: &[&MatchStats]) -> RollingStats {
    let mut means = [0.0; 6];
    for (column, mean) in means.iter_mut().enumerate() {
        *mean = window.iter().map(|stats| stats.values()[column]).mean();
    }
    RollingStats::from_values(means)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::MatchResult;

    pub(crate) fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub(crate) fn stats(gf: f64, ga: f64) -> MatchStats {
        MatchStats {
            goals_for: gf,
            goals_against: ga,
            shots: gf * 5.0,
            shots_on_target: gf * 2.0,
            expected_goals: gf * 0.9,
            expected_goals_against: ga * 1.1,
        }
    }

    pub(crate) fn played(id: &str, day: &str, team: &str, opponent: &str, gf: f64, ga: f64) -> MatchRecord {
        let result = match gf.partial_cmp(&ga) {
            Some(std::cmp::Ordering::Greater) => MatchResult::Win,
            Some(std::cmp::Ordering::Less) => MatchResult::Loss,
            _ => MatchResult::Draw,
        };
        MatchRecord {
            id: id.to_string(),
            date: date(day),
            time: "15:00".to_string(),
            team: team.to_string(),
            opponent: opponent.to_string(),
            venue: "Home".to_string(),
            result: Some(result),
            stats: Some(stats(gf, ga)),
        }
    }

    pub(crate) fn unplayed(id: &str, day: &str, team: &str, opponent: &str) -> MatchRecord {
        MatchRecord {
            id: id.to_string(),
            date: date(day),
            time: "20:00".to_string(),
            team: team.to_string(),
            opponent: opponent.to_string(),
            venue: "Away".to_string(),
            result: None,
            stats: None,
        }
    }

    #[test]
    fn test_window_uses_three_preceding_matches() {
        let records = vec![
            played("1", "2021-01-01", "Arsenal", "Chelsea", 1.0, 0.0),
            played("2", "2021-01-08", "Arsenal", "Everton", 2.0, 2.0),
            played("3", "2021-01-15", "Arsenal", "Leeds", 3.0, 1.0),
            played("4", "2021-01-22", "Arsenal", "Burnley", 9.0, 9.0),
        ];

        let rows = compute_rolling(&records, GroupKey::Team, 3).unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.record_index, 3);
        assert_eq!(row.date, date("2021-01-22"));
        assert!((row.rolling.goals_for - 2.0).abs() < 1e-12);
        assert!((row.rolling.goals_against - 1.0).abs() < 1e-12);
        assert!((row.rolling.shots - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_current_match_does_not_leak_into_its_features() {
        let mut records = vec![
            played("1", "2021-01-01", "Arsenal", "Chelsea", 1.0, 0.0),
            played("2", "2021-01-08", "Arsenal", "Everton", 2.0, 2.0),
            played("3", "2021-01-15", "Arsenal", "Leeds", 3.0, 1.0),
        ];
        let before = compute_rolling(&records, GroupKey::Team, 2).unwrap();
        records[2].stats = Some(stats(40.0, 40.0));
        let after = compute_rolling(&records, GroupKey::Team, 2).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_window_counts_matches_not_days() {
        let records = vec![
            played("1", "2020-09-01", "Leeds", "Fulham", 1.0, 1.0),
            played("2", "2021-03-01", "Leeds", "Fulham", 3.0, 1.0),
            played("3", "2021-03-05", "Leeds", "Fulham", 0.0, 2.0),
        ];
        let rows = compute_rolling(&records, GroupKey::Team, 2).unwrap();
        assert_eq!(rows.len(), 1);
        assert!((rows[0].rolling.goals_for - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_input_order_does_not_matter_for_distinct_dates() {
        let records = vec![
            played("3", "2021-01-15", "Arsenal", "Leeds", 3.0, 1.0),
            played("1", "2021-01-01", "Arsenal", "Chelsea", 1.0, 0.0),
            played("2", "2021-01-08", "Arsenal", "Everton", 2.0, 2.0),
        ];
        let rows = compute_rolling(&records, GroupKey::Team, 2).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(records[rows[0].record_index].id, "3");
        assert!((rows[0].rolling.goals_for - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_same_day_records_do_not_see_each_other() {
        let records = vec![
            played("1", "2021-01-01", "Arsenal", "Chelsea", 1.0, 0.0),
            played("2", "2021-01-08", "Arsenal", "Everton", 2.0, 2.0),
            played("3", "2021-01-08", "Arsenal", "Leeds", 7.0, 1.0),
        ];
        let rows = compute_rolling(&records, GroupKey::Team, 1).unwrap();
        let by_id: Vec<(&str, f64)> = rows
            .iter()
            .map(|r| (records[r.record_index].id.as_str(), r.rolling.goals_for))
            .collect();
        assert_eq!(by_id, vec![("2", 1.0), ("3", 1.0)]);
    }

    #[test]
    fn test_unplayed_fixture_gets_features_but_feeds_no_window() {
        let records = vec![
            played("1", "2021-12-01", "Arsenal", "Chelsea", 1.0, 0.0),
            played("2", "2021-12-08", "Arsenal", "Everton", 3.0, 2.0),
            unplayed("3", "2022-01-05", "Arsenal", "Leeds"),
            unplayed("4", "2022-01-12", "Arsenal", "Burnley"),
        ];
        let rows = compute_rolling(&records, GroupKey::Team, 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rolling, rows[1].rolling);
        assert!((rows[1].rolling.goals_for - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_stats_feed_no_window() {
        let mut records = vec![
            played("1", "2021-01-01", "Arsenal", "Chelsea", 1.0, 0.0),
            played("2", "2021-01-08", "Arsenal", "Everton", 2.0, 2.0),
            played("3", "2021-01-15", "Arsenal", "Leeds", 3.0, 1.0),
            played("4", "2021-01-22", "Arsenal", "Burnley", 5.0, 1.0),
        ];
        if let Some(stats) = records[1].stats.as_mut() {
            stats.shots = f64::NAN;
        }

        let rows = compute_rolling(&records, GroupKey::Team, 2).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].record_index, 3);
        assert!((rows[0].rolling.goals_for - 2.0).abs() < 1e-12);
        assert!(rows[0].rolling.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_groups_by_opponent() {
        let records = vec![
            played("1", "2021-01-01", "Arsenal", "Chelsea", 1.0, 0.0),
            played("2", "2021-01-08", "Everton", "Chelsea", 2.0, 2.0),
            played("3", "2021-01-15", "Leeds", "Chelsea", 4.0, 1.0),
            played("4", "2021-01-15", "Arsenal", "Everton", 1.0, 1.0),
        ];
        let rows = compute_rolling(&records, GroupKey::Opponent, 2).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity, "Chelsea");
        assert_eq!(rows[0].record_index, 2);
        assert!((rows[0].rolling.goals_for - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let err = compute_rolling(&[], GroupKey::Opponent, 3).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientHistory { key: "opponent" }));
    }

    #[test]
    fn test_short_history_is_not_an_error() {
        let records = vec![played("1", "2021-01-01", "Arsenal", "Chelsea", 1.0, 0.0)];
        assert!(compute_rolling(&records, GroupKey::Team, 3).unwrap().is_empty());
    }

    #[test]
    fn test_current_form_includes_latest_match() {
        let records = vec![
            played("1", "2021-01-01", "Arsenal", "Chelsea", 1.0, 0.0),
            played("2", "2021-01-08", "Arsenal", "Everton", 2.0, 2.0),
            played("3", "2021-01-15", "Arsenal", "Leeds", 3.0, 1.0),
            unplayed("4", "2021-01-22", "Arsenal", "Burnley"),
        ];
        let form = current_form(&records, "Arsenal", 2).unwrap();
        assert!((form.goals_for - 2.5).abs() < 1e-12);
        assert!(current_form(&records, "Arsenal", 4).is_none());
        assert!(current_form(&records, "Chelsea", 1).is_none());
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let records = vec![played("1", "2021-01-01", "Arsenal", "Chelsea", 1.0, 0.0)];
        assert!(matches!(
            compute_rolling(&records, GroupKey::Team, 0),
            Err(PipelineError::Config(_))
        ));
    }
}
