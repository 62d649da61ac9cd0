//! Gradient boosted trees with a one-vs-rest multiclass wrapper

use super::decision_tree::CartTree;
use crate::error::{CropwiseError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Boosting hyperparameters, shared by every per-class booster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingConfig {
    /// Boosting rounds per class
    pub n_estimators: usize,
    /// Shrinkage applied to each tree's contribution
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Row fraction sampled per round
    pub subsample: f64,
    /// Column fraction sampled per round
    pub colsample: f64,
    pub seed: u64,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 6,
            min_samples_leaf: 1,
            subsample: 0.8,
            colsample: 0.8,
            seed: 42,
        }
    }
}

/// One binary logistic booster: trees fitted to log-loss residuals.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinaryBooster {
    trees: Vec<CartTree>,
    tree_features: Vec<Vec<usize>>,
    initial_log_odds: f64,
}

impl BinaryBooster {
    /// Raw log-odds for each row of `x`.
    fn score(&self, x: &Array2<f64>, learning_rate: f64) -> Result<Array1<f64>> {
        let mut log_odds = Array1::from_elem(x.nrows(), self.initial_log_odds);
        for (tree, features) in self.trees.iter().zip(&self.tree_features) {
            let x_sub = x.select(Axis(1), features);
            let pred = tree.predict(&x_sub)?;
            log_odds.zip_mut_with(&pred, |lo, &p| *lo += learning_rate * p);
        }
        Ok(log_odds)
    }
}

/// Multiclass gradient boosting classifier.
///
/// Trains one logistic booster per class against the rest; class
/// probabilities are the per-class sigmoids normalized to sum to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    config: BoostingConfig,
    boosters: Vec<BinaryBooster>,
    classes: Vec<i64>,
    n_features: usize,
    importances: Option<Array1<f64>>,
}

impl GradientBoostedTrees {
    pub fn new(config: BoostingConfig) -> Self {
        Self {
            config,
            boosters: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
            importances: None,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(CropwiseError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        let mut classes: Vec<i64> = y.iter().map(|&v| v.round() as i64).collect();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(CropwiseError::TrainingError(
                "boosting requires at least 2 distinct classes".to_string(),
            ));
        }

        self.n_features = x.ncols();
        self.classes = classes;

        // One booster per class, each with its own derived seed
        let boosters: Vec<Result<BinaryBooster>> = self
            .classes
            .par_iter()
            .enumerate()
            .map(|(k, &cls)| {
                let targets: Array1<f64> =
                    y.mapv(|v| if v.round() as i64 == cls { 1.0 } else { 0.0 });
                self.fit_binary(x, &targets, self.config.seed.wrapping_add(k as u64))
            })
            .collect();

        let mut fitted = Vec::with_capacity(self.classes.len());
        for b in boosters {
            fitted.push(b?);
        }
        self.boosters = fitted;
        self.accumulate_importances();
        Ok(self)
    }

    fn fit_binary(&self, x: &Array2<f64>, y: &Array1<f64>, seed: u64) -> Result<BinaryBooster> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

        let p = y.mean().unwrap_or(0.5);
        let initial_log_odds = (p / (1.0 - p + 1e-10)).max(1e-10).ln();

        let mut log_odds = Array1::from_elem(n_samples, initial_log_odds);
        let mut trees = Vec::with_capacity(self.config.n_estimators);
        let mut tree_features = Vec::with_capacity(self.config.n_estimators);

        for _ in 0..self.config.n_estimators {
            // Log-loss gradient: y - sigmoid(log_odds)
            let residuals: Array1<f64> = y
                .iter()
                .zip(log_odds.iter())
                .map(|(yi, &lo)| yi - 1.0 / (1.0 + (-lo).exp()))
                .collect();

            let rows = sampled_indices(n_samples, self.config.subsample, &mut rng);
            let cols = sampled_indices(n_features, self.config.colsample, &mut rng);

            let x_sub = x.select(Axis(0), &rows).select(Axis(1), &cols);
            let r_sub: Array1<f64> = Array1::from_vec(rows.iter().map(|&i| residuals[i]).collect());

            let mut tree = CartTree::regressor()
                .with_max_depth(self.config.max_depth)
                .with_min_samples_leaf(self.config.min_samples_leaf);
            tree.fit(&x_sub, &r_sub)?;

            let pred = tree.predict(&x_sub)?;
            for (i, &row) in rows.iter().enumerate() {
                log_odds[row] += self.config.learning_rate * pred[i];
            }

            trees.push(tree);
            tree_features.push(cols);
        }

        Ok(BinaryBooster {
            trees,
            tree_features,
            initial_log_odds,
        })
    }

    fn accumulate_importances(&mut self) {
        let mut totals = vec![0.0; self.n_features];
        for booster in &self.boosters {
            for (tree, features) in booster.trees.iter().zip(&booster.tree_features) {
                if let Some(imp) = tree.feature_importances() {
                    for (local, &global) in features.iter().enumerate() {
                        totals[global] += imp[local];
                    }
                }
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            for t in &mut totals {
                *t /= sum;
            }
        }
        self.importances = Some(Array1::from_vec(totals));
    }

    /// Class probabilities, columns ordered like [`classes`](Self::classes).
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.boosters.is_empty() {
            return Err(CropwiseError::ModelNotFitted);
        }

        let n = x.nrows();
        let mut proba = Array2::zeros((n, self.classes.len()));
        for (k, booster) in self.boosters.iter().enumerate() {
            let scores = booster.score(x, self.config.learning_rate)?;
            for i in 0..n {
                proba[[i, k]] = 1.0 / (1.0 + (-scores[i]).exp());
            }
        }

        for i in 0..n {
            let row_sum: f64 = proba.row(i).sum();
            if row_sum > 0.0 {
                for k in 0..self.classes.len() {
                    proba[[i, k]] /= row_sum;
                }
            } else {
                let uniform = 1.0 / self.classes.len() as f64;
                proba.row_mut(i).fill(uniform);
            }
        }
        Ok(proba)
    }

    /// Class with the highest one-vs-rest probability per row.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        let out: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let row = proba.row(i);
                let mut best = 0;
                for k in 1..row.len() {
                    if row[k] > row[best] {
                        best = k;
                    }
                }
                self.classes[best] as f64
            })
            .collect();
        Ok(Array1::from_vec(out))
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.importances.as_ref()
    }
}

/// Shuffle, truncate to the requested fraction, and restore order.
fn sampled_indices(n: usize, fraction: f64, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
    let size = (((n as f64) * fraction).ceil() as usize).clamp(1, n);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(size);
    indices.sort_unstable();
    indices
}
