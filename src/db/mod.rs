use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::models::{BacktestReport, MatchRecord, MatchResult, MatchStats, PipelineError, Result};
use crate::services::normalizer::TeamNameTable;

/// Header positions of the columns the pipeline reads.
struct Columns {
    id: Option<usize>,
    date: usize,
    time: Option<usize>,
    team: usize,
    opponent: usize,
    venue: Option<usize>,
    result: Option<usize>,
    stats: [Option<usize>; 6],
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let required = |name: &str| {
            find(name).ok_or_else(|| PipelineError::MalformedInput {
                row: 0,
                reason: format!("missing column '{}'", name),
            })
        };

        // Exports written with a dataframe index have an unnamed first column.
        let id = find("id").or_else(|| (headers.get(0) == Some("")).then_some(0));

        Ok(Self {
            id,
            date: required("date")?,
            time: find("time"),
            team: required("team")?,
            opponent: required("opponent")?,
            venue: find("venue"),
            result: find("result"),
            stats: MatchStats::COLUMNS.map(find),
        })
    }
}

pub fn load_matches(path: &Path, names: &TeamNameTable) -> Result<Vec<MatchRecord>> {
    let file = File::open(path)?;
    let records = read_matches(file, names)?;
    tracing::info!("Loaded {} match records from {}", records.len(), path.display());
    Ok(records)
}

/// Parse match rows, normalizing team names. Rows missing a date, team or
/// opponent are dropped; it is an error only if no row survives.
pub fn read_matches<R: Read>(reader: R, names: &TeamNameTable) -> Result<Vec<MatchRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let columns = Columns::from_headers(reader.headers()?)?;

    let mut records = Vec::new();
    let mut lines = Vec::new();
    let mut dropped = 0usize;

    for (index, row) in reader.records().enumerate() {
        let line = index + 1;
        let parsed = row
            .map_err(PipelineError::from)
            .and_then(|raw| parse_row(&raw, &columns, line, names));
        match parsed {
            Ok(record) => {
                records.push(record);
                lines.push(line);
            }
            Err(e) => {
                tracing::warn!("Skipping row: {}", e);
                dropped += 1;
            }
        }
    }

    if records.is_empty() {
        return Err(PipelineError::MalformedInput {
            row: 0,
            reason: format!("no valid match rows ({} dropped)", dropped),
        });
    }
    if dropped > 0 {
        tracing::warn!("Dropped {} malformed rows, kept {}", dropped, records.len());
    }

    ensure_unique_ids(&mut records, &lines);

    Ok(records)
}

/// Ids must be unique for fixture lookups. Index columns written by
/// concatenating per-team frames repeat values; those files get line-number
/// ids instead.
fn ensure_unique_ids(records: &mut [MatchRecord], lines: &[usize]) {
    let duplicate = {
        let mut seen = HashSet::with_capacity(records.len());
        records.iter().find(|r| !seen.insert(r.id.as_str())).map(|r| r.id.clone())
    };

    if let Some(id) = duplicate {
        tracing::warn!("Duplicate match id '{}'; using line numbers as ids", id);
        for (record, line) in records.iter_mut().zip(lines) {
            record.id = line.to_string();
        }
    }
}

fn parse_row(raw: &StringRecord, columns: &Columns, line: usize, names: &TeamNameTable) -> Result<MatchRecord> {
    let field = |index: Option<usize>| index.and_then(|i| raw.get(i)).filter(|v| !v.is_empty());
    let malformed = |reason: &str| PipelineError::MalformedInput {
        row: line,
        reason: reason.to_string(),
    };

    let date_raw = field(Some(columns.date)).ok_or_else(|| malformed("missing date"))?;
    let date = parse_date(date_raw).ok_or_else(|| malformed(&format!("bad date '{}'", date_raw)))?;
    let team = field(Some(columns.team)).ok_or_else(|| malformed("missing team"))?;
    let opponent = field(Some(columns.opponent)).ok_or_else(|| malformed("missing opponent"))?;

    let stats = parse_stats(columns.stats.map(|i| {
        field(i)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }));

    Ok(MatchRecord {
        id: field(columns.id).map_or_else(|| line.to_string(), str::to_string),
        date,
        time: field(columns.time).unwrap_or_default().to_string(),
        team: names.normalize(team),
        opponent: names.normalize(opponent),
        venue: field(columns.venue).unwrap_or_default().to_string(),
        result: field(columns.result).and_then(MatchResult::from_symbol),
        stats,
    })
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time component.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn parse_stats(values: [Option<f64>; 6]) -> Option<MatchStats> {
    let [Some(gf), Some(ga), Some(sh), Some(sot), Some(xg), Some(xga)] = values else {
        return None;
    };
    Some(MatchStats {
        goals_for: gf,
        goals_against: ga,
        shots: sh,
        shots_on_target: sot,
        expected_goals: xg,
        expected_goals_against: xga,
    })
}

/// Write the per-fixture backtest table as CSV.
pub fn export_backtest(path: &Path, report: &BacktestReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    for row in &report.rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    tracing::info!("Exported {} backtest rows to {}", report.rows.len(), path.display());
    Ok(())
}
