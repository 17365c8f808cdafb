use std::collections::HashSet;

use chrono::NaiveDate;

use crate::models::AssembledFeatureRow;

/// Keep one row per physical fixture: the first row seen for each date and
/// unordered (team, opponent) pair. Only meant for the inference side.
pub fn dedup_fixtures(rows: Vec<AssembledFeatureRow>) -> Vec<AssembledFeatureRow> {
    let mut seen: HashSet<(NaiveDate, String, String)> = HashSet::with_capacity(rows.len());
    let before = rows.len();

    let kept: Vec<AssembledFeatureRow> = rows
        .into_iter()
        .filter(|row| {
            let (a, b) = pair_key(&row.record.team, &row.record.opponent);
            seen.insert((row.record.date, a.to_string(), b.to_string()))
        })
        .collect();

    tracing::debug!("Deduplicated fixtures: {} -> {}", before, kept.len());
    kept
}

fn pair_key<'a>(team: &'a str, opponent: &'a str) -> (&'a str, &'a str) {
    if team <= opponent {
        (team, opponent)
    } else {
        (opponent, team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchRecord, RollingStats};
    use crate::services::rolling::tests::unplayed;

    fn row(record: MatchRecord) -> AssembledFeatureRow {
        let zero = RollingStats::from_values([0.0; 6]);
        AssembledFeatureRow {
            record,
            venue_code: 0,
            opp_code: 0,
            rolling: zero,
            opp_rolling: zero,
        }
    }

    #[test]
    fn test_mirrored_fixture_collapses_to_first_row() {
        let rows = vec![
            row(unplayed("1", "2022-01-15", "Arsenal", "Chelsea")),
            row(unplayed("2", "2022-01-15", "Chelsea", "Arsenal")),
        ];
        let kept = dedup_fixtures(rows);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].record.id, "1");
    }

    #[test]
    fn test_same_pair_on_other_dates_is_kept() {
        let rows = vec![
            row(unplayed("1", "2022-01-15", "Arsenal", "Chelsea")),
            row(unplayed("2", "2022-04-02", "Chelsea", "Arsenal")),
            row(unplayed("3", "2022-01-15", "Leeds", "Everton")),
        ];
        let kept = dedup_fixtures(rows);
        let ids: Vec<&str> = kept.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let rows = vec![
            row(unplayed("1", "2022-01-15", "Arsenal", "Chelsea")),
            row(unplayed("2", "2022-01-15", "Leeds", "Everton")),
            row(unplayed("3", "2022-01-15", "Chelsea", "Arsenal")),
            row(unplayed("4", "2022-01-15", "Everton", "Leeds")),
            row(unplayed("5", "2022-01-22", "Everton", "Leeds")),
        ];
        let once = dedup_fixtures(rows);
        let twice = dedup_fixtures(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }
}
