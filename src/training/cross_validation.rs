//! K-fold cross-validation

use crate::error::{CropwiseError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// One train/validation split.
#[derive(Debug, Clone)]
pub struct CvSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold: usize,
}

/// K-fold splitter with a seeded shuffle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub seed: u64,
}

impl Default for KFold {
    fn default() -> Self {
        Self {
            n_splits: 5,
            shuffle: true,
            seed: 42,
        }
    }
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            ..Default::default()
        }
    }

    /// Partition `0..n_samples` into folds; every index lands in exactly one
    /// test set.
    pub fn split(&self, n_samples: usize) -> Result<Vec<CvSplit>> {
        if self.n_splits < 2 {
            return Err(CropwiseError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < self.n_splits {
            return Err(CropwiseError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, self.n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
            indices.shuffle(&mut rng);
        }

        // The first n_samples % n_splits folds take one extra sample
        let base = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut splits = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for fold in 0..self.n_splits {
            let size = if fold < remainder { base + 1 } else { base };
            let test_indices: Vec<usize> = indices[start..start + size].to_vec();
            let train_indices: Vec<usize> = indices[..start]
                .iter()
                .chain(indices[start + size..].iter())
                .copied()
                .collect();
            splits.push(CvSplit {
                train_indices,
                test_indices,
                fold,
            });
            start += size;
        }
        Ok(splits)
    }
}

/// Aggregated cross-validation scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvResults {
    pub scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
}

impl CvResults {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean_score = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean_score).powi(2)).sum::<f64>() / n;
        Self {
            scores,
            mean_score,
            std_score: variance.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folds_cover_all_indices() {
        let kf = KFold {
            n_splits: 5,
            shuffle: false,
            seed: 0,
        };
        let splits = kf.split(103).unwrap();
        assert_eq!(splits.len(), 5);

        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort_unstable();
        assert_eq!(all_test, (0..103).collect::<Vec<_>>());
    }

    #[test]
    fn test_uneven_fold_sizes() {
        let kf = KFold {
            n_splits: 4,
            shuffle: false,
            seed: 0,
        };
        let splits = kf.split(10).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2]);
    }

    #[test]
    fn test_train_and_test_disjoint() {
        let kf = KFold::default();
        let splits = kf.split(50).unwrap();
        for split in &splits {
            for idx in &split.test_indices {
                assert!(!split.train_indices.contains(idx));
            }
        }
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let a = KFold { n_splits: 5, shuffle: true, seed: 42 }.split(40).unwrap();
        let b = KFold { n_splits: 5, shuffle: true, seed: 42 }.split(40).unwrap();
        for (sa, sb) in a.iter().zip(b.iter()) {
            assert_eq!(sa.test_indices, sb.test_indices);
        }
    }

    #[test]
    fn test_too_few_samples() {
        let kf = KFold::new(5);
        assert!(kf.split(3).is_err());
    }

    #[test]
    fn test_cv_results_stats() {
        let r = CvResults::from_scores(vec![0.8, 0.9, 1.0]);
        assert!((r.mean_score - 0.9).abs() < 1e-12);
        assert!(r.std_score > 0.0);
    }
}
