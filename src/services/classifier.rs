use std::collections::BTreeSet;

use linfa::traits::Fit;
use linfa::Dataset;
use linfa_logistic::{MultiFittedLogisticRegression, MultiLogisticRegression};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

use crate::models::{MatchResult, PipelineError, Result};

/// Anything that can be trained on a feature table and outcome labels.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    fn fit(&self, features: &DMatrix<f64>, labels: &[MatchResult]) -> Result<Box<dyn FittedClassifier>>;
}

pub trait FittedClassifier: Send + Sync {
    /// Outcome for each column returned by `predict_proba`.
    fn classes(&self) -> &[MatchResult];

    /// One row per input row, one column per entry of `classes()`.
    fn predict_proba(&self, features: &DMatrix<f64>) -> Result<DMatrix<f64>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierSettings {
    pub max_iterations: u64,
    pub l2: f64,
    pub gradient_tolerance: f64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            l2: 1e-2,
            gradient_tolerance: 1e-4,
        }
    }
}

/// Multinomial logistic regression (linfa, L-BFGS) on standardized features.
#[derive(Debug, Clone, Default)]
pub struct SoftmaxRegression {
    settings: ClassifierSettings,
}

impl SoftmaxRegression {
    pub fn new(settings: ClassifierSettings) -> Self {
        Self { settings }
    }
}

impl Classifier for SoftmaxRegression {
    fn name(&self) -> &str {
        "softmax_regression"
    }

    fn fit(&self, features: &DMatrix<f64>, labels: &[MatchResult]) -> Result<Box<dyn FittedClassifier>> {
        let (n, d) = features.shape();
        if n == 0 {
            return Err(PipelineError::Classifier("cannot fit on zero rows".to_string()));
        }
        if n != labels.len() {
            return Err(PipelineError::Classifier(format!(
                "{} feature rows but {} labels",
                n,
                labels.len()
            )));
        }

        let classes: Vec<MatchResult> = labels.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if let [only] = classes[..] {
            tracing::warn!("Only {:?} outcomes in training data; predicting it with certainty", only);
            return Ok(Box::new(SingleOutcome { class: only, features: d }));
        }

        let scaler = Standardizer::fit(features);
        let dataset = Dataset::new(scaler.transform(features), Array1::from(labels.to_vec()));
        let model = MultiLogisticRegression::default()
            .alpha(self.settings.l2)
            .max_iterations(self.settings.max_iterations)
            .gradient_tolerance(self.settings.gradient_tolerance)
            .fit(&dataset)
            .map_err(|e| PipelineError::Classifier(e.to_string()))?;

        tracing::debug!(
            "Fitted {} on {} rows x {} features, class codes {:?}",
            self.name(),
            n,
            d,
            model.classes().iter().map(|c| c.code()).collect::<Vec<_>>()
        );

        Ok(Box::new(FittedSoftmax { scaler, model }))
    }
}

/// Per-column mean and standard deviation from the training rows.
struct Standardizer {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl Standardizer {
    fn fit(features: &DMatrix<f64>) -> Self {
        let (means, scales) = features
            .column_iter()
            .map(|column| {
                let std_dev = column.variance().sqrt();
                (column.mean(), if std_dev > 1e-12 { std_dev } else { 1.0 })
            })
            .unzip();
        Self { means, scales }
    }

    fn transform(&self, features: &DMatrix<f64>) -> Array2<f64> {
        Array2::from_shape_fn(features.shape(), |(i, j)| (features[(i, j)] - self.means[j]) / self.scales[j])
    }
}

fn check_width(features: &DMatrix<f64>, expected: usize) -> Result<()> {
    if features.ncols() != expected {
        return Err(PipelineError::Classifier(format!(
            "expected {} features, got {}",
            expected,
            features.ncols()
        )));
    }
    Ok(())
}

struct FittedSoftmax {
    scaler: Standardizer,
    model: MultiFittedLogisticRegression<f64, MatchResult>,
}

impl FittedClassifier for FittedSoftmax {
    fn classes(&self) -> &[MatchResult] {
        self.model.classes()
    }

    fn predict_proba(&self, features: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        check_width(features, self.scaler.means.len())?;
        let probs = self.model.predict_probabilities(&self.scaler.transform(features));
        Ok(DMatrix::from_fn(probs.nrows(), probs.ncols(), |i, j| probs[(i, j)]))
    }
}

struct SingleOutcome {
    class: MatchResult,
    features: usize,
}

impl FittedClassifier for SingleOutcome {
    fn classes(&self) -> &[MatchResult] {
        std::slice::from_ref(&self.class)
    }

    fn predict_proba(&self, features: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        check_width(features, self.features)?;
        Ok(DMatrix::from_element(features.nrows(), 1, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_data() -> (DMatrix<f64>, Vec<MatchResult>) {
        let xs = [-3.0, -2.5, -2.0, -0.25, 0.0, 0.25, 2.0, 2.5, 3.0];
        let labels = [
            MatchResult::Loss,
            MatchResult::Loss,
            MatchResult::Loss,
            MatchResult::Draw,
            MatchResult::Draw,
            MatchResult::Draw,
            MatchResult::Win,
            MatchResult::Win,
            MatchResult::Win,
        ];
        (DMatrix::from_column_slice(xs.len(), 1, &xs), labels.to_vec())
    }

    #[test]
    fn test_classes_are_sorted_by_code() {
        let (x, y) = toy_data();
        let model = SoftmaxRegression::default().fit(&x, &y).unwrap();
        assert_eq!(model.classes(), &[MatchResult::Loss, MatchResult::Draw, MatchResult::Win]);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = toy_data();
        let model = SoftmaxRegression::default().fit(&x, &y).unwrap();
        let inputs = DMatrix::from_column_slice(4, 1, &[-10.0, 0.0, 1.3, 50.0]);
        let probs = model.predict_proba(&inputs).unwrap();
        assert_eq!(probs.shape(), (4, 3));
        for row in probs.row_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
            assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn test_learns_separable_outcomes() {
        let (x, y) = toy_data();
        let model = SoftmaxRegression::default().fit(&x, &y).unwrap();
        let inputs = DMatrix::from_column_slice(3, 1, &[-3.0, 0.0, 3.0]);
        let probs = model.predict_proba(&inputs).unwrap();

        assert!(probs[(0, 0)] > probs[(0, 2)]);
        assert!(probs[(2, 2)] > probs[(2, 0)]);
        assert!(probs[(1, 1)] > probs[(2, 1)]);
    }

    #[test]
    fn test_single_class_predicts_certainty() {
        let x = DMatrix::from_column_slice(3, 1, &[1.0, 2.0, 3.0]);
        let y = vec![MatchResult::Draw; 3];
        let model = SoftmaxRegression::default().fit(&x, &y).unwrap();
        assert_eq!(model.classes(), &[MatchResult::Draw]);
        let probs = model.predict_proba(&x).unwrap();
        assert!(probs.iter().all(|p| (p - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_rejects_mismatched_shapes() {
        let (x, y) = toy_data();
        assert!(SoftmaxRegression::default().fit(&x, &y[..3]).is_err());

        let model = SoftmaxRegression::default().fit(&x, &y).unwrap();
        let wide = DMatrix::<f64>::zeros(2, 2);
        assert!(matches!(model.predict_proba(&wide), Err(PipelineError::Classifier(_))));
    }
}
