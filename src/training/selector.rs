//! Best-variant selection from held-out accuracy

use super::bank::{ModelBank, VariantKind, VariantSettings};
use super::cross_validation::{CvResults, KFold};
use crate::error::{CropwiseError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Scores recorded for one surviving variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// Accuracy on the held-out test split; this alone drives selection
    pub accuracy: f64,
    /// Mean k-fold accuracy on the training split, reported but not used
    /// for selection
    pub cv_mean: f64,
    pub cv_std: f64,
}

/// Outcome of a selection pass.
#[derive(Debug, Clone)]
pub struct Selection {
    pub best: VariantKind,
    /// Records in registry order for every variant that survived evaluation
    pub records: Vec<(VariantKind, EvaluationRecord)>,
}

/// Evaluates every surviving variant and picks a winner.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub cv_folds: usize,
    pub seed: u64,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self {
            cv_folds: 5,
            seed: 42,
        }
    }
}

impl ModelSelector {
    pub fn new(cv_folds: usize, seed: u64) -> Self {
        Self { cv_folds, seed }
    }

    /// Score every variant in `bank` and pick the one with the highest
    /// held-out accuracy. A variant whose evaluation errors is dropped the
    /// same way a fit failure would be. On a tie the variant registered
    /// first wins.
    pub fn select(
        &self,
        bank: &ModelBank,
        x_train: &Array2<f64>,
        y_train: &Array1<f64>,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
        settings: &VariantSettings,
    ) -> Result<Selection> {
        let mut records: Vec<(VariantKind, EvaluationRecord)> = Vec::new();
        let mut eval_failures: Vec<(VariantKind, CropwiseError)> = Vec::new();

        for kind in bank.kinds() {
            let model = bank
                .get(kind)
                .ok_or_else(|| CropwiseError::ComputationError("variant vanished from bank".to_string()))?;

            let record = model
                .predict(x_test)
                .map(|preds| accuracy(&preds, y_test))
                .and_then(|acc| {
                    let cv = self.cross_validate(kind, x_train, y_train, settings)?;
                    Ok(EvaluationRecord {
                        accuracy: acc,
                        cv_mean: cv.mean_score,
                        cv_std: cv.std_score,
                    })
                });

            match record {
                Ok(record) => {
                    info!(
                        variant = kind.name(),
                        accuracy = record.accuracy,
                        cv_mean = record.cv_mean,
                        "variant evaluated"
                    );
                    records.push((kind, record));
                }
                Err(err) => {
                    warn!(variant = kind.name(), error = %err, "variant failed evaluation, excluding");
                    eval_failures.push((kind, err));
                }
            }
        }

        if records.is_empty() {
            let causes: Vec<String> = bank
                .failures()
                .iter()
                .chain(eval_failures.iter())
                .map(|(kind, err)| format!("{}: {}", kind.name(), err))
                .collect();
            return Err(CropwiseError::NoViableModel(causes.join("; ")));
        }

        // Strict > keeps the earliest record on ties
        let mut best = records[0].0;
        let mut best_accuracy = records[0].1.accuracy;
        for (kind, record) in &records[1..] {
            if record.accuracy > best_accuracy {
                best = *kind;
                best_accuracy = record.accuracy;
            }
        }

        info!(variant = best.name(), accuracy = best_accuracy, "variant selected");
        Ok(Selection { best, records })
    }

    /// K-fold accuracy on the training split with a fresh model per fold.
    fn cross_validate(
        &self,
        kind: VariantKind,
        x: &Array2<f64>,
        y: &Array1<f64>,
        settings: &VariantSettings,
    ) -> Result<CvResults> {
        let kfold = KFold {
            n_splits: self.cv_folds,
            shuffle: true,
            seed: self.seed,
        };
        let splits = kfold.split(x.nrows())?;

        let mut scores = Vec::with_capacity(splits.len());
        for split in &splits {
            let x_fit = x.select(Axis(0), &split.train_indices);
            let y_fit: Array1<f64> =
                Array1::from_vec(split.train_indices.iter().map(|&i| y[i]).collect());
            let x_val = x.select(Axis(0), &split.test_indices);
            let y_val: Array1<f64> =
                Array1::from_vec(split.test_indices.iter().map(|&i| y[i]).collect());

            let mut model = kind.build(settings);
            model.fit(&x_fit, &y_fit)?;
            let preds = model.predict(&x_val)?;
            let score = accuracy(&preds, &y_val);
            debug!(variant = kind.name(), fold = split.fold, score, "fold scored");
            scores.push(score);
        }
        Ok(CvResults::from_scores(scores))
    }
}

/// Fraction of predictions matching the integer-coded targets.
pub fn accuracy(predictions: &Array1<f64>, targets: &Array1<f64>) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let correct = predictions
        .iter()
        .zip(targets.iter())
        .filter(|(p, t)| p.round() as i64 == t.round() as i64)
        .count();
    correct as f64 / targets.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::REGISTRY;
    use ndarray::{Array1, Array2};

    fn separable_data(n_per_class: usize) -> (Array2<f64>, Array1<f64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n_per_class {
            let j = i as f64 * 0.05;
            rows.extend_from_slice(&[j, j]);
            labels.push(0.0);
            rows.extend_from_slice(&[8.0 + j, 8.0 - j]);
            labels.push(1.0);
        }
        (
            Array2::from_shape_vec((2 * n_per_class, 2), rows).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_accuracy_metric() {
        let preds = Array1::from_vec(vec![0.0, 1.0, 1.0, 0.0]);
        let targets = Array1::from_vec(vec![0.0, 1.0, 0.0, 0.0]);
        assert!((accuracy(&preds, &targets) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_tie_prefers_registry_order() {
        // Cleanly separable data drives every variant to perfect held-out
        // accuracy, so the first registered variant must win
        let (x, y) = separable_data(10);
        let settings = VariantSettings {
            n_estimators: 10,
            seed: 42,
        };
        let bank = ModelBank::train(&x, &y, &settings);
        assert_eq!(bank.len(), 3);

        let selector = ModelSelector::new(5, 42);
        let selection = selector
            .select(&bank, &x, &y, &x, &y, &settings)
            .unwrap();
        assert_eq!(selection.best, REGISTRY[0]);
    }

    #[test]
    fn test_records_in_registry_order() {
        let (x, y) = separable_data(10);
        let settings = VariantSettings {
            n_estimators: 10,
            seed: 42,
        };
        let bank = ModelBank::train(&x, &y, &settings);
        let selector = ModelSelector::default();
        let selection = selector
            .select(&bank, &x, &y, &x, &y, &settings)
            .unwrap();

        let kinds: Vec<VariantKind> = selection.records.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, REGISTRY.to_vec());
    }

    #[test]
    fn test_no_survivors_is_an_error() {
        // Single training sample: every variant fails to fit
        let x = Array2::from_shape_vec((1, 2), vec![1.0, 2.0]).unwrap();
        let y = Array1::from_vec(vec![0.0]);
        let settings = VariantSettings {
            n_estimators: 5,
            seed: 42,
        };
        let bank = ModelBank::train(&x, &y, &settings);
        assert!(bank.is_empty());

        let selector = ModelSelector::default();
        let err = selector
            .select(&bank, &x, &y, &x, &y, &settings)
            .unwrap_err();
        assert!(matches!(err, CropwiseError::NoViableModel(_)));
    }
}
