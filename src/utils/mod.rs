use std::collections::BTreeSet;

use crate::models::{MatchResult, Page};

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// Probability (0-1) as a percentage rounded to one decimal place.
pub fn to_percent(probability: f64) -> f64 {
    (probability * 1000.0).round() / 10.0
}

/// Slice a list into a 1-based page. Page 0 is treated as page 1 and the
/// page size is clamped to `1..=MAX_PAGE_SIZE`.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let total = items.len();
    let items = items
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    Page {
        page,
        page_size,
        total,
        items,
    }
}

/// Macro-averaged precision over `(actual, predicted)` pairs. Every outcome
/// that appears on either side counts; one that was never predicted scores 0.
pub fn macro_precision(pairs: &[(MatchResult, MatchResult)]) -> f64 {
    let labels: BTreeSet<MatchResult> = pairs.iter().flat_map(|&(a, p)| [a, p]).collect();
    if labels.is_empty() {
        return 0.0;
    }

    let total: f64 = labels
        .iter()
        .map(|&label| {
            let predicted = pairs.iter().filter(|(_, p)| *p == label).count();
            if predicted == 0 {
                return 0.0;
            }
            let correct = pairs.iter().filter(|(a, p)| *p == label && *a == label).count();
            correct as f64 / predicted as f64
        })
        .sum();

    total / labels.len() as f64
}

/// Calculate win percentage from wins, draws, and losses
pub fn calculate_win_percentage(wins: u32, draws: u32, losses: u32) -> f64 {
    let total_games = wins + losses + draws;
    if total_games == 0 {
        return 0.0;
    }

    let points = wins * 3 + draws;
    (points as f64) / ((total_games * 3) as f64) * 100.0
}

/// Form string with the most recent result first (e.g. "WLWDW").
pub fn results_to_form(results: &[MatchResult], limit: usize) -> String {
    results.iter().rev().take(limit).map(|r| r.symbol()).collect()
}
