//! CART decision tree used by both tree ensembles

use crate::error::{CropwiseError, Result};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Split quality criterion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SplitCriterion {
    /// Gini impurity, used when leaves hold class ids
    Gini,
    /// Variance reduction, used when leaves hold residuals
    Variance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Branch {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Binary CART tree over `f64` features.
///
/// With [`SplitCriterion::Gini`] the targets are integer class ids and leaves
/// predict the majority class; with [`SplitCriterion::Variance`] the targets
/// are continuous and leaves predict the mean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartTree {
    root: Option<Node>,
    pub criterion: SplitCriterion,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    n_features: usize,
    importances: Option<Array1<f64>>,
}

impl CartTree {
    pub fn classifier() -> Self {
        Self {
            root: None,
            criterion: SplitCriterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            n_features: 0,
            importances: None,
        }
    }

    pub fn regressor() -> Self {
        Self {
            criterion: SplitCriterion::Variance,
            ..Self::classifier()
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    /// Grow the tree on `x`/`y`.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(CropwiseError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples < self.min_samples_split {
            return Err(CropwiseError::ValidationError(format!(
                "need at least {} samples to grow a tree, got {}",
                self.min_samples_split, n_samples
            )));
        }

        self.n_features = x.ncols();
        let mut importances = vec![0.0; self.n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.grow(x, y, &indices, 0, &mut importances));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    fn grow(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
    ) -> Node {
        let targets: Vec<f64> = indices.iter().map(|&i| y[i]).collect();

        let at_limit = self.max_depth.map_or(false, |d| depth >= d);
        if indices.len() < self.min_samples_split || at_limit || Self::is_uniform(&targets) {
            return Node::Leaf {
                value: self.leaf_value(&targets),
            };
        }

        let split = match self.best_split(x, y, indices) {
            Some(s) => s,
            None => {
                return Node::Leaf {
                    value: self.leaf_value(&targets),
                }
            }
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, split.feature]] <= split.threshold);

        if left_idx.len() < self.min_samples_leaf || right_idx.len() < self.min_samples_leaf {
            return Node::Leaf {
                value: self.leaf_value(&targets),
            };
        }

        // Importance is the impurity decrease weighted by the node size
        importances[split.feature] += indices.len() as f64 * split.gain;

        let left = Box::new(self.grow(x, y, &left_idx, depth + 1, importances));
        let right = Box::new(self.grow(x, y, &right_idx, depth + 1, importances));

        Node::Branch {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        }
    }

    /// Scan all features in parallel and keep the split with the best gain.
    fn best_split(&self, x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> Option<Candidate> {
        let parent = self.impurity_of(indices.iter().map(|&i| y[i]));
        let n = indices.len() as f64;

        (0..x.ncols())
            .into_par_iter()
            .filter_map(|feature| {
                // Sweep sorted values with running left-side statistics so each
                // candidate threshold costs O(1)
                let mut order: Vec<usize> = indices.to_vec();
                order.sort_by(|&a, &b| {
                    x[[a, feature]]
                        .partial_cmp(&x[[b, feature]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut left = RunningStats::default();
                let mut right = RunningStats::default();
                for &i in &order {
                    right.push(y[i]);
                }

                let mut best: Option<Candidate> = None;
                for w in 0..order.len() - 1 {
                    let yi = y[order[w]];
                    left.push(yi);
                    right.pop(yi);

                    let lo = x[[order[w], feature]];
                    let hi = x[[order[w + 1], feature]];
                    if hi <= lo {
                        continue;
                    }
                    if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                        continue;
                    }

                    let weighted = (left.count as f64 * left.impurity(self.criterion)
                        + right.count as f64 * right.impurity(self.criterion))
                        / n;
                    let gain = parent - weighted;
                    if gain > best.as_ref().map_or(0.0, |b| b.gain) {
                        best = Some(Candidate {
                            feature,
                            threshold: (lo + hi) / 2.0,
                            gain,
                        });
                    }
                }
                best
            })
            .max_by(|a, b| a.gain.partial_cmp(&b.gain).unwrap_or(std::cmp::Ordering::Equal))
    }

    fn impurity_of(&self, values: impl Iterator<Item = f64>) -> f64 {
        let mut stats = RunningStats::default();
        for v in values {
            stats.push(v);
        }
        stats.impurity(self.criterion)
    }

    fn leaf_value(&self, targets: &[f64]) -> f64 {
        if targets.is_empty() {
            return 0.0;
        }
        match self.criterion {
            SplitCriterion::Gini => {
                let mut counts: HashMap<i64, usize> = HashMap::new();
                for &t in targets {
                    *counts.entry(t.round() as i64).or_insert(0) += 1;
                }
                // Ties go to the lowest class id so refits stay deterministic
                counts
                    .into_iter()
                    .max_by_key(|&(class, c)| (c, std::cmp::Reverse(class)))
                    .map(|(class, _)| class as f64)
                    .unwrap_or(0.0)
            }
            SplitCriterion::Variance => targets.iter().sum::<f64>() / targets.len() as f64,
        }
    }

    fn is_uniform(targets: &[f64]) -> bool {
        targets
            .first()
            .map_or(true, |&first| targets.iter().all(|&t| (t - first).abs() < 1e-12))
    }

    /// Predict one value per row of `x`.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(CropwiseError::ModelNotFitted)?;
        let out: Vec<f64> = (0..x.nrows())
            .map(|i| {
                let row = x.row(i);
                let mut node = root;
                loop {
                    match node {
                        Node::Leaf { value } => break *value,
                        Node::Branch {
                            feature,
                            threshold,
                            left,
                            right,
                        } => {
                            node = if row[*feature] <= *threshold { left } else { right };
                        }
                    }
                }
            })
            .collect();
        Ok(Array1::from_vec(out))
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.importances.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 1,
                Node::Branch { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root.as_ref().map_or(0, walk)
    }
}

struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Incremental node statistics for the threshold sweep.
#[derive(Default)]
struct RunningStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
    class_counts: HashMap<i64, usize>,
}

impl RunningStats {
    fn push(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        self.sq_sum += v * v;
        *self.class_counts.entry(v.round() as i64).or_insert(0) += 1;
    }

    fn pop(&mut self, v: f64) {
        self.count -= 1;
        self.sum -= v;
        self.sq_sum -= v * v;
        let key = v.round() as i64;
        if let Some(c) = self.class_counts.get_mut(&key) {
            *c -= 1;
            if *c == 0 {
                self.class_counts.remove(&key);
            }
        }
    }

    fn impurity(&self, criterion: SplitCriterion) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        match criterion {
            SplitCriterion::Gini => {
                let sum_sq: f64 = self
                    .class_counts
                    .values()
                    .map(|&c| (c as f64 / n).powi(2))
                    .sum();
                1.0 - sum_sq
            }
            // Var = E[X²] - E[X]²; clamp to guard against fp cancellation
            SplitCriterion::Variance => (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0),
        }
    }
}
