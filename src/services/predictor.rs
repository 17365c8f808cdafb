use std::sync::Arc;

use chrono::NaiveDate;
use nalgebra::DMatrix;

use crate::config::PipelineConfig;
use crate::models::{
    AssembledFeatureRow, BacktestReport, BacktestRow, FixturePrediction, FixtureSummary, MatchRecord,
    MatchResult, Page, PipelineError, PredictionResult, Result,
};
use crate::services::assembler::build_feature_rows;
use crate::services::classifier::{Classifier, SoftmaxRegression};
use crate::services::dedup::dedup_fixtures;
use crate::utils::{macro_precision, paginate, to_percent};

const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Assembled rows split at the cutoff date.
#[derive(Debug, Clone)]
pub struct SplitSets {
    /// Labelled rows before the cutoff, both perspectives of each fixture.
    pub training: Vec<AssembledFeatureRow>,
    /// Rows on or after the cutoff, one per physical fixture.
    pub inference: Vec<AssembledFeatureRow>,
}

pub fn split_by_cutoff(rows: Vec<AssembledFeatureRow>, cutoff: NaiveDate) -> SplitSets {
    let (before, after): (Vec<_>, Vec<_>) = rows.into_iter().partition(|row| row.record.date < cutoff);

    let unlabelled = before.iter().filter(|row| row.record.result.is_none()).count();
    if unlabelled > 0 {
        tracing::warn!("{} rows before {} have no result; left out of training", unlabelled, cutoff);
    }
    let training = before.into_iter().filter(|row| row.record.result.is_some()).collect();

    SplitSets {
        training,
        inference: dedup_fixtures(after),
    }
}

/// Fit on `training` and score every row of `inference`.
pub fn predict_rows(
    classifier: &dyn Classifier,
    training: &[AssembledFeatureRow],
    inference: &[AssembledFeatureRow],
    cutoff: NaiveDate,
) -> Result<Vec<PredictionResult>> {
    if training.is_empty() {
        return Err(PipelineError::EmptyTrainingSet { cutoff });
    }
    if inference.is_empty() {
        return Err(PipelineError::EmptyInferenceSet { cutoff });
    }

    let labels: Vec<MatchResult> = training.iter().filter_map(|row| row.record.result).collect();
    let model = classifier.fit(&feature_matrix(training), &labels)?;
    let probabilities = model.predict_proba(&feature_matrix(inference))?;
    let classes = model.classes();

    if probabilities.nrows() != inference.len() || probabilities.ncols() != classes.len() {
        return Err(PipelineError::Classifier(format!(
            "expected {}x{} probabilities, got {}x{}",
            inference.len(),
            classes.len(),
            probabilities.nrows(),
            probabilities.ncols()
        )));
    }

    inference
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let scores: Vec<f64> = probabilities.row(i).iter().copied().collect();
            let (home_win_prob, draw_prob, away_win_prob) = map_probabilities(classes, &scores)?;
            Ok(PredictionResult {
                record: row.record.clone(),
                home_win_prob,
                draw_prob,
                away_win_prob,
                predicted: most_likely(home_win_prob, draw_prob, away_win_prob),
                actual: row.record.result,
            })
        })
        .collect()
}

/// Map one probability row to `(home_win, draw, away_win)` using the
/// classifier's own class order. Classes the model never saw score 0.
pub fn map_probabilities(classes: &[MatchResult], scores: &[f64]) -> Result<(f64, f64, f64)> {
    if classes.len() != scores.len() {
        return Err(PipelineError::Classifier(format!(
            "{} classes but {} scores",
            classes.len(),
            scores.len()
        )));
    }
    if scores.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(PipelineError::Classifier(format!("invalid probabilities {:?}", scores)));
    }

    let lookup = |outcome: MatchResult| {
        classes
            .iter()
            .position(|class| *class == outcome)
            .map(|i| scores[i])
            .unwrap_or(0.0)
    };
    let home = lookup(MatchResult::Win);
    let draw = lookup(MatchResult::Draw);
    let away = lookup(MatchResult::Loss);

    let total = home + draw + away;
    if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(PipelineError::Classifier(format!(
            "probabilities sum to {} for classes {:?}",
            total, classes
        )));
    }

    Ok((home, draw, away))
}

/// Argmax outcome; ties go to Win, then Draw.
pub fn most_likely(home_win_prob: f64, draw_prob: f64, away_win_prob: f64) -> MatchResult {
    let mut best = (MatchResult::Win, home_win_prob);
    for candidate in [(MatchResult::Draw, draw_prob), (MatchResult::Loss, away_win_prob)] {
        if candidate.1 > best.1 {
            best = candidate;
        }
    }
    best.0
}

fn feature_matrix(rows: &[AssembledFeatureRow]) -> DMatrix<f64> {
    let data: Vec<f64> = rows.iter().flat_map(|row| row.features()).collect();
    DMatrix::from_row_slice(rows.len(), AssembledFeatureRow::FEATURE_COUNT, &data)
}

/// Pipeline entry point shared by the CLI and the API.
#[derive(Clone)]
pub struct PredictionEngine {
    classifier: Arc<dyn Classifier>,
    window: usize,
    cutoff: NaiveDate,
}

/// Everything one full run produced.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub training_rows: usize,
    pub predictions: Vec<PredictionResult>,
}

impl PredictionEngine {
    pub fn new(classifier: Arc<dyn Classifier>, window: usize, cutoff: NaiveDate) -> Self {
        Self {
            classifier,
            window,
            cutoff,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            Arc::new(SoftmaxRegression::new(config.classifier.clone())),
            config.window,
            config.cutoff,
        )
    }

    /// Build features and split them; no training happens here.
    pub fn prepare(&self, records: &[MatchRecord]) -> Result<SplitSets> {
        let rows = build_feature_rows(records, self.window)?;
        let sets = split_by_cutoff(rows, self.cutoff);
        tracing::debug!("Features: {}", AssembledFeatureRow::feature_names(self.window).join(", "));
        tracing::info!(
            "Prepared {} training rows and {} fixtures to predict (cutoff {}, window {})",
            sets.training.len(),
            sets.inference.len(),
            self.cutoff,
            self.window
        );
        Ok(sets)
    }

    /// Train and predict every fixture on or after the cutoff.
    pub fn run(&self, records: &[MatchRecord]) -> Result<PipelineRun> {
        let sets = self.prepare(records)?;
        let predictions = predict_rows(self.classifier.as_ref(), &sets.training, &sets.inference, self.cutoff)?;
        Ok(PipelineRun {
            training_rows: sets.training.len(),
            predictions,
        })
    }

    /// Upcoming fixtures, one per physical match, earliest first.
    pub fn list_future_fixtures(
        &self,
        records: &[MatchRecord],
        page: usize,
        page_size: usize,
    ) -> Result<Page<FixtureSummary>> {
        let mut fixtures = self.prepare(records)?.inference;
        fixtures.sort_by(|a, b| (a.record.date, &a.record.time).cmp(&(b.record.date, &b.record.time)));
        let summaries: Vec<FixtureSummary> = fixtures.iter().map(|row| FixtureSummary::from(&row.record)).collect();
        Ok(paginate(summaries, page, page_size))
    }

    /// Outcome percentages for a single upcoming fixture.
    pub fn predict_fixture(&self, records: &[MatchRecord], fixture_id: &str) -> Result<FixturePrediction> {
        let sets = self.prepare(records)?;
        if sets.inference.is_empty() {
            return Err(PipelineError::EmptyInferenceSet { cutoff: self.cutoff });
        }
        let target = sets
            .inference
            .iter()
            .find(|row| row.record.id == fixture_id)
            .ok_or_else(|| PipelineError::NotFound {
                fixture_id: fixture_id.to_string(),
            })?;

        let prediction = predict_rows(
            self.classifier.as_ref(),
            &sets.training,
            std::slice::from_ref(target),
            self.cutoff,
        )?
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::Classifier("no prediction returned".to_string()))?;

        tracing::info!(
            "Predicted {} vs {} ({}): Home {:.1}%, Draw {:.1}%, Away {:.1}%",
            prediction.record.team,
            prediction.record.opponent,
            prediction.record.date,
            prediction.home_win_prob * 100.0,
            prediction.draw_prob * 100.0,
            prediction.away_win_prob * 100.0
        );

        Ok(FixturePrediction {
            home_win_prob: to_percent(prediction.home_win_prob),
            draw_prob: to_percent(prediction.draw_prob),
            away_win_prob: to_percent(prediction.away_win_prob),
        })
    }

    /// Date-holdout backtest: macro precision over fixtures on or after the
    /// cutoff that already have a result.
    pub fn backtest(&self, records: &[MatchRecord]) -> Result<BacktestReport> {
        let run = self.run(records)?;

        let scored: Vec<(MatchResult, MatchResult)> = run
            .predictions
            .iter()
            .filter_map(|p| p.actual.map(|actual| (actual, p.predicted)))
            .collect();
        let precision = macro_precision(&scored);

        let mut rows: Vec<BacktestRow> = run
            .predictions
            .iter()
            .map(|p| BacktestRow {
                date: p.record.date.format("%Y-%m-%d").to_string(),
                team: p.record.team.clone(),
                opponent: p.record.opponent.clone(),
                actual: p.actual.map(|r| r.symbol().to_string()),
                predicted: p.predicted.symbol().to_string(),
                home_win_prob: p.home_win_prob,
                draw_prob: p.draw_prob,
                away_win_prob: p.away_win_prob,
            })
            .collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date));

        tracing::info!("Backtest precision {:.3} over {} fixtures", precision, scored.len());

        Ok(BacktestReport {
            cutoff: self.cutoff,
            training_rows: run.training_rows,
            scored_rows: scored.len(),
            precision,
            rows,
        })
    }
}
