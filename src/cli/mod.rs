use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;

use crate::config::PipelineConfig;
use crate::db::{export_backtest, load_matches};
use crate::models::{MatchRecord, MatchResult, RollingStats};
use crate::services::rolling::current_form;
use crate::services::PredictionEngine;
use crate::utils::{calculate_win_percentage, results_to_form, to_percent};

pub fn list_fixtures(config: &PipelineConfig, page: usize, page_size: usize) -> Result<()> {
    let records = load_matches(&config.data_path, &config.team_names)?;
    let engine = PredictionEngine::from_config(config);

    let listing = engine.list_future_fixtures(&records, page, page_size)?;

    if listing.items.is_empty() {
        println!("📭 No upcoming fixtures on or after {}", config.cutoff);
        return Ok(());
    }

    println!(
        "📅 Upcoming fixtures (page {}, {} of {}):\n",
        listing.page,
        listing.items.len(),
        listing.total
    );
    for fixture in &listing.items {
        println!(
            "   [{}] {} {} {} vs {}",
            fixture.id, fixture.date, fixture.time, fixture.team, fixture.opponent
        );
    }

    Ok(())
}

pub fn predict(config: &PipelineConfig, fixture_id: Option<&str>) -> Result<()> {
    let records = load_matches(&config.data_path, &config.team_names)?;
    let engine = PredictionEngine::from_config(config);

    if let Some(id) = fixture_id {
        let prediction = engine.predict_fixture(&records, id)?;
        println!("🔮 Fixture {}:", id);
        println!(
            "   Home win: {:.1}% | Draw: {:.1}% | Away win: {:.1}%",
            prediction.home_win_prob, prediction.draw_prob, prediction.away_win_prob
        );
        return Ok(());
    }

    println!("🔮 Generating predictions for fixtures on or after {}...", config.cutoff);
    let run = engine.run(&records)?;
    println!(
        "✅ Trained on {} rows, predicted {} fixtures\n",
        run.training_rows,
        run.predictions.len()
    );

    for prediction in &run.predictions {
        println!(
            "{} {} vs {}: Home {:.1}% | Draw {:.1}% | Away {:.1}% -> {}",
            prediction.record.date.format("%Y-%m-%d"),
            prediction.record.team,
            prediction.record.opponent,
            to_percent(prediction.home_win_prob),
            to_percent(prediction.draw_prob),
            to_percent(prediction.away_win_prob),
            prediction.predicted.symbol()
        );
    }

    Ok(())
}

pub fn backtest(config: &PipelineConfig, export: Option<&Path>) -> Result<()> {
    let records = load_matches(&config.data_path, &config.team_names)?;
    let engine = PredictionEngine::from_config(config);

    let report = engine.backtest(&records)?;

    println!(
        "{:<12} {:<20} {:<20} {:>6} {:>9}",
        "date", "team", "opponent", "actual", "predicted"
    );
    for row in &report.rows {
        println!(
            "{:<12} {:<20} {:<20} {:>6} {:>9}",
            row.date,
            row.team,
            row.opponent,
            row.actual.as_deref().unwrap_or("-"),
            row.predicted
        );
    }

    println!(
        "\n🎯 Precision: {:.4} ({} scored fixtures, {} training rows, cutoff {})",
        report.precision, report.scored_rows, report.training_rows, report.cutoff
    );

    if let Some(path) = export {
        export_backtest(path, &report)?;
        println!("💾 Exported predictions to {}", path.display());
    }

    Ok(())
}

pub fn query_team(config: &PipelineConfig, team_name: &str) -> Result<()> {
    let records = load_matches(&config.data_path, &config.team_names)?;
    let team = config.team_names.normalize(team_name.trim());

    println!("🔍 Searching for team: {}", team);

    let known: BTreeSet<&str> = records.iter().map(|r| r.team.as_str()).collect();
    if !known.contains(team.as_str()) {
        println!("❌ No team named '{}'", team);
        let suggestions = suggest_teams(&known, &team, 3);
        if !suggestions.is_empty() {
            println!("\n💡 Did you mean:");
            for name in suggestions {
                println!("   • {}", name);
            }
        }
        return Ok(());
    }

    let mut history: Vec<&MatchRecord> = records
        .iter()
        .filter(|r| r.team == team && r.result.is_some())
        .collect();
    history.sort_by_key(|r| r.date);
    let results: Vec<MatchResult> = history.iter().filter_map(|r| r.result).collect();
    let count = |outcome: MatchResult| results.iter().filter(|r| **r == outcome).count() as u32;

    println!("📊 Team Details:");
    println!("   Matches played: {}", results.len());
    println!(
        "   W/D/L: {}/{}/{} ({:.1}% of points)",
        count(MatchResult::Win),
        count(MatchResult::Draw),
        count(MatchResult::Loss),
        calculate_win_percentage(count(MatchResult::Win), count(MatchResult::Draw), count(MatchResult::Loss))
    );
    println!("   Form: {}", results_to_form(&results, 5));

    match current_form(&records, &team, config.window) {
        Some(form) => print_form(&form, config.window),
        None => println!("   Fewer than {} played matches; no rolling form", config.window),
    }

    println!("\n📅 Upcoming Matches:");
    let mut upcoming: Vec<&MatchRecord> = records
        .iter()
        .filter(|r| r.team == team && r.result.is_none())
        .collect();
    upcoming.sort_by_key(|r| r.date);
    if upcoming.is_empty() {
        println!("   No upcoming matches found");
    }
    for fixture in upcoming.iter().take(5) {
        let venue = if fixture.venue.eq_ignore_ascii_case("away") { "at" } else { "vs" };
        println!(
            "   [{}] {} {} {}",
            fixture.id,
            fixture.date.format("%Y-%m-%d"),
            venue,
            fixture.opponent
        );
    }

    Ok(())
}

fn print_form(form: &RollingStats, window: usize) {
    println!("\n📈 Rolling form (last {} matches):", window);
    for (name, value) in RollingStats::column_names("", window).iter().zip(form.values()) {
        println!("   {:<16} {:.2}", name, value);
    }
}

/// Closest known names by Jaro-Winkler similarity.
fn suggest_teams<'a>(known: &BTreeSet<&'a str>, query: &str, limit: usize) -> Vec<&'a str> {
    let query = query.to_lowercase();
    let mut scored: Vec<(f64, &str)> = known
        .iter()
        .map(|name| (strsim::jaro_winkler(&name.to_lowercase(), &query), *name))
        .filter(|(score, _)| *score >= 0.7)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(limit).map(|(_, name)| name).collect()
}
