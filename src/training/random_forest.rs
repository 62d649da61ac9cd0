//! Bagged ensemble of CART trees

use super::decision_tree::CartTree;
use crate::error::{CropwiseError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Random forest classifier.
///
/// Each tree trains on a bootstrap sample of the rows and a random subset of
/// `ceil(sqrt(n_features))` columns. Trees grow in parallel; tree `i` derives
/// its RNG from `seed + i` so results are reproducible regardless of thread
/// scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestClassifier {
    trees: Vec<CartTree>,
    tree_features: Vec<Vec<usize>>,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub seed: u64,
    classes: Vec<i64>,
    n_features: usize,
    importances: Option<Array1<f64>>,
}

impl ForestClassifier {
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            tree_features: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_leaf: 1,
            seed: 42,
            classes: Vec::new(),
            n_features: 0,
            importances: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(CropwiseError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if self.n_estimators == 0 {
            return Err(CropwiseError::ValidationError(
                "forest needs at least one tree".to_string(),
            ));
        }

        self.n_features = n_features;
        let mut classes: Vec<i64> = y.iter().map(|&v| v.round() as i64).collect();
        classes.sort_unstable();
        classes.dedup();
        self.classes = classes;

        let subset_size = ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features);

        let fitted: Vec<Result<(CartTree, Vec<usize>)>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(tree_idx as u64));

                let row_indices: Vec<usize> = (0..n_samples)
                    .map(|_| (rng.next_u64() as usize) % n_samples)
                    .collect();

                let mut features: Vec<usize> = (0..n_features).collect();
                features.shuffle(&mut rng);
                features.truncate(subset_size);
                features.sort_unstable();

                let x_boot = x.select(Axis(0), &row_indices).select(Axis(1), &features);
                let y_boot: Array1<f64> =
                    Array1::from_vec(row_indices.iter().map(|&i| y[i]).collect());

                let mut tree = CartTree::classifier().with_min_samples_leaf(self.min_samples_leaf);
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }
                tree.fit(&x_boot, &y_boot)?;
                Ok((tree, features))
            })
            .collect();

        let mut trees = Vec::with_capacity(self.n_estimators);
        let mut tree_features = Vec::with_capacity(self.n_estimators);
        for item in fitted {
            let (tree, features) = item?;
            trees.push(tree);
            tree_features.push(features);
        }
        self.trees = trees;
        self.tree_features = tree_features;
        self.accumulate_importances();
        Ok(self)
    }

    /// Average per-tree importances, scattering subset indices back onto the
    /// full feature space.
    fn accumulate_importances(&mut self) {
        let mut totals = vec![0.0; self.n_features];
        for (tree, features) in self.trees.iter().zip(&self.tree_features) {
            if let Some(imp) = tree.feature_importances() {
                for (local, &global) in features.iter().enumerate() {
                    totals[global] += imp[local];
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

    fn tree_votes(&self, x: &Array2<f64>) -> Result<Vec<Array1<f64>>> {
        if self.trees.is_empty() {
            return Err(CropwiseError::ModelNotFitted);
        }
        self.trees
            .par_iter()
            .zip(&self.tree_features)
            .map(|(tree, features)| {
                let x_sub = x.select(Axis(1), features);
                tree.predict(&x_sub)
            })
            .collect()
    }

    /// Majority vote over all trees.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let votes = self.tree_votes(x)?;
        let out: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let mut tally: HashMap<i64, usize> = HashMap::new();
                for v in &votes {
                    *tally.entry(v[i].round() as i64).or_insert(0) += 1;
                }
                // Split votes go to the lowest class id, matching the leaves
                tally
                    .into_iter()
                    .max_by_key(|&(class, c)| (c, std::cmp::Reverse(class)))
                    .map(|(class, _)| class as f64)
                    .unwrap_or(0.0)
            })
            .collect();
        Ok(Array1::from_vec(out))
    }

    /// Vote shares per class, columns ordered like [`classes`](Self::classes).
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let votes = self.tree_votes(x)?;
        let n_trees = votes.len() as f64;
        let mut proba = Array2::zeros((x.nrows(), self.classes.len()));

        for i in 0..x.nrows() {
            for v in &votes {
                let class = v[i].round() as i64;
                if let Ok(col) = self.classes.binary_search(&class) {
                    proba[[i, col]] += 1.0;
                }
            }
            for j in 0..self.classes.len() {
                proba[[i, j]] /= n_trees;
            }
        }
        Ok(proba)
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.importances.as_ref()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
