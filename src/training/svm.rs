//! Kernel support vector classifier trained with SMO

use crate::error::{CropwiseError, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Hard cap on eager kernel matrix size; training refuses larger inputs
/// rather than risk OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Kernel {
    /// K(a, b) = a · b
    Linear,
    /// K(a, b) = exp(-gamma * ||a - b||²). A non-positive gamma resolves
    /// to 1 / n_features when fitting.
    Rbf { gamma: f64 },
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::Rbf { gamma: 0.0 }
    }
}

impl Kernel {
    fn eval(&self, a: &Array1<f64>, b: &Array1<f64>) -> f64 {
        match self {
            Kernel::Linear => a.dot(b),
            Kernel::Rbf { gamma } => {
                let diff = a - b;
                (-gamma * diff.dot(&diff)).exp()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmConfig {
    /// Regularization strength
    pub c: f64,
    pub kernel: Kernel,
    /// KKT violation tolerance
    pub tol: f64,
    pub max_iter: usize,
    pub seed: u64,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: Kernel::default(),
            tol: 1e-3,
            max_iter: 1000,
            seed: 42,
        }
    }
}

/// Support vectors and multipliers for one binary problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinaryMachine {
    support_vectors: Array2<f64>,
    alphas: Array1<f64>,
    support_labels: Array1<f64>,
    bias: f64,
}

impl BinaryMachine {
    fn score(&self, sample: &Array1<f64>, kernel: &Kernel) -> f64 {
        let mut sum = self.bias;
        for j in 0..self.support_vectors.nrows() {
            let k = kernel.eval(sample, &self.support_vectors.row(j).to_owned());
            sum += self.alphas[j] * self.support_labels[j] * k;
        }
        sum
    }
}

/// Kernel SVM classifier.
///
/// Binary problems train a single machine; more classes train one machine
/// per class against the rest, and prediction takes the highest decision
/// score. Probabilities come from a softmax over the per-class scores (a
/// sigmoid on the single score in the binary case).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelClassifier {
    config: SvmConfig,
    kernel: Kernel,
    machines: Vec<BinaryMachine>,
    classes: Vec<i64>,
}

impl KernelClassifier {
    pub fn new(config: SvmConfig) -> Self {
        Self {
            kernel: config.kernel,
            config,
            machines: Vec::new(),
            classes: Vec::new(),
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(CropwiseError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        self.kernel = match self.config.kernel {
            Kernel::Rbf { gamma } if gamma <= 0.0 => Kernel::Rbf {
                gamma: 1.0 / x.ncols() as f64,
            },
            k => k,
        };

        let mut classes: Vec<i64> = y.iter().map(|&v| v.round() as i64).collect();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(CropwiseError::TrainingError(
                "support vector machine requires at least 2 distinct classes".to_string(),
            ));
        }
        self.classes = classes;

        if self.classes.len() == 2 {
            // Single machine separating class[1] (positive) from class[0]
            let positive = self.classes[1];
            let targets: Array1<f64> =
                y.mapv(|v| if v.round() as i64 == positive { 1.0 } else { -1.0 });
            let machine = self.train_binary(x, &targets)?;
            self.machines = vec![machine];
        } else {
            let mut machines = Vec::with_capacity(self.classes.len());
            for &cls in &self.classes.clone() {
                let targets: Array1<f64> =
                    y.mapv(|v| if v.round() as i64 == cls { 1.0 } else { -1.0 });
                machines.push(self.train_binary(x, &targets)?);
            }
            self.machines = machines;
        }
        Ok(self)
    }

    /// Simplified SMO over a precomputed kernel matrix.
    fn train_binary(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<BinaryMachine> {
        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(CropwiseError::TrainingError(format!(
                "{} samples exceed the {} sample kernel matrix limit",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }
        if n < 2 {
            return Err(CropwiseError::TrainingError(
                "support vector machine needs at least 2 samples".to_string(),
            ));
        }

        let k = self.kernel_matrix(x);
        let mut alphas: Array1<f64> = Array1::zeros(n);
        let mut bias = 0.0;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);

        let decision = |alphas: &Array1<f64>, bias: f64, idx: usize| -> f64 {
            let mut sum = bias;
            for i in 0..n {
                sum += alphas[i] * y[i] * k[[i, idx]];
            }
            sum
        };

        let max_quiet_passes = 5;
        let mut quiet_passes = 0;
        let mut iterations = 0;

        while quiet_passes < max_quiet_passes && iterations < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = decision(&alphas, bias, i) - y[i];
                let violates = (y[i] * e_i < -self.config.tol && alphas[i] < self.config.c)
                    || (y[i] * e_i > self.config.tol && alphas[i] > 0.0);
                if !violates {
                    continue;
                }

                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };
                let e_j = decision(&alphas, bias, j) - y[j];

                let (alpha_i_old, alpha_j_old) = (alphas[i], alphas[j]);
                let (lo, hi) = if y[i] != y[j] {
                    (
                        (alphas[j] - alphas[i]).max(0.0),
                        (self.config.c + alphas[j] - alphas[i]).min(self.config.c),
                    )
                } else {
                    (
                        (alphas[i] + alphas[j] - self.config.c).max(0.0),
                        (alphas[i] + alphas[j]).min(self.config.c),
                    )
                };
                if (hi - lo).abs() < 1e-10 {
                    continue;
                }

                let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                alphas[j] = (alphas[j] - y[j] * (e_i - e_j) / eta).clamp(lo, hi);
                if (alphas[j] - alpha_j_old).abs() < 1e-5 {
                    continue;
                }
                alphas[i] += y[i] * y[j] * (alpha_j_old - alphas[j]);

                let b1 = bias
                    - e_i
                    - y[i] * (alphas[i] - alpha_i_old) * k[[i, i]]
                    - y[j] * (alphas[j] - alpha_j_old) * k[[i, j]];
                let b2 = bias
                    - e_j
                    - y[i] * (alphas[i] - alpha_i_old) * k[[i, j]]
                    - y[j] * (alphas[j] - alpha_j_old) * k[[j, j]];
                bias = if alphas[i] > 0.0 && alphas[i] < self.config.c {
                    b1
                } else if alphas[j] > 0.0 && alphas[j] < self.config.c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                num_changed += 1;
            }

            iterations += 1;
            if num_changed == 0 {
                quiet_passes += 1;
            } else {
                quiet_passes = 0;
            }
        }

        // Only vectors with nonzero multipliers matter at inference
        let support: Vec<usize> = alphas
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 1e-8)
            .map(|(i, _)| i)
            .collect();

        let mut support_vectors = Array2::zeros((support.len(), x.ncols()));
        let mut support_labels = Array1::zeros(support.len());
        let mut support_alphas = Array1::zeros(support.len());
        for (row, &idx) in support.iter().enumerate() {
            support_vectors.row_mut(row).assign(&x.row(idx));
            support_labels[row] = y[idx];
            support_alphas[row] = alphas[idx];
        }

        Ok(BinaryMachine {
            support_vectors,
            alphas: support_alphas,
            support_labels,
            bias,
        })
    }

    fn kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let mut k = Array2::zeros((n, n));
        for i in 0..n {
            let row_i = x.row(i).to_owned();
            for j in i..n {
                let v = self.kernel.eval(&row_i, &x.row(j).to_owned());
                k[[i, j]] = v;
                k[[j, i]] = v;
            }
        }
        k
    }

    fn decision_scores(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.machines.is_empty() {
            return Err(CropwiseError::ModelNotFitted);
        }
        let n = x.nrows();
        let mut scores = Array2::zeros((n, self.machines.len()));
        for i in 0..n {
            let sample = x.row(i).to_owned();
            for (m, machine) in self.machines.iter().enumerate() {
                scores[[i, m]] = machine.score(&sample, &self.kernel);
            }
        }
        Ok(scores)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.decision_scores(x)?;
        let out: Vec<f64> = (0..x.nrows())
            .map(|i| {
                if self.classes.len() == 2 {
                    let idx = if scores[[i, 0]] >= 0.0 { 1 } else { 0 };
                    self.classes[idx] as f64
                } else {
                    let row = scores.row(i);
                    let mut best = 0;
                    for m in 1..row.len() {
                        if row[m] > row[best] {
                            best = m;
                        }
                    }
                    self.classes[best] as f64
                }
            })
            .collect();
        Ok(Array1::from_vec(out))
    }

    /// Class probabilities, columns ordered like [`classes`](Self::classes).
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let scores = self.decision_scores(x)?;
        let n = x.nrows();
        let n_classes = self.classes.len();
        let mut proba = Array2::zeros((n, n_classes));

        if n_classes == 2 {
            for i in 0..n {
                let p = 1.0 / (1.0 + (-scores[[i, 0]]).exp());
                proba[[i, 0]] = 1.0 - p;
                proba[[i, 1]] = p;
            }
        } else {
            // Softmax over OvR decision scores, max-shifted for stability
            for i in 0..n {
                let row = scores.row(i);
                let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let exps: Vec<f64> = row.iter().map(|&s| (s - max).exp()).collect();
                let total: f64 = exps.iter().sum();
                for (m, e) in exps.iter().enumerate() {
                    proba[[i, m]] = e / total;
                }
            }
        }
        Ok(proba)
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn n_support_vectors(&self) -> usize {
        self.machines.iter().map(|m| m.support_vectors.nrows()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_clusters() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec(
            (10, 2),
            vec![
                1.0, 1.0, 1.5, 1.2, 2.0, 2.0, 1.2, 1.8, 0.8, 1.5, 5.0, 5.0, 5.5, 5.2, 6.0, 6.0,
                5.2, 5.8, 4.8, 5.5,
            ],
        )
        .unwrap();
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        (x, y)
    }

    #[test]
    fn test_binary_linear() {
        let (x, y) = binary_clusters();
        let config = SvmConfig {
            kernel: Kernel::Linear,
            ..Default::default()
        };
        let mut svm = KernelClassifier::new(config);
        svm.fit(&x, &y).unwrap();

        let preds = svm.predict(&x).unwrap();
        let correct = preds.iter().zip(y.iter()).filter(|(p, a)| p == a).count();
        assert!(correct >= 9, "only {} of 10 correct", correct);
    }

    #[test]
    fn test_multiclass_rbf() {
        let x = Array2::from_shape_vec(
            (15, 2),
            vec![
                1.0, 1.0, 1.5, 1.2, 2.0, 2.0, 1.2, 1.8, 0.8, 1.5, 5.0, 5.0, 5.5, 5.2, 6.0, 6.0,
                5.2, 5.8, 4.8, 5.5, 1.0, 5.0, 1.5, 5.2, 2.0, 6.0, 1.2, 5.8, 0.8, 5.5,
            ],
        )
        .unwrap();
        let y = Array1::from_vec(vec![
            0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0,
        ]);

        let config = SvmConfig {
            c: 10.0,
            kernel: Kernel::Rbf { gamma: 0.5 },
            ..Default::default()
        };
        let mut svm = KernelClassifier::new(config);
        svm.fit(&x, &y).unwrap();

        let preds = svm.predict(&x).unwrap();
        let correct = preds.iter().zip(y.iter()).filter(|(p, a)| p == a).count();
        assert!(correct >= 10, "only {} of 15 correct", correct);
    }

    #[test]
    fn test_proba_rows_sum_to_one() {
        let (x, y) = binary_clusters();
        let mut svm = KernelClassifier::new(SvmConfig::default());
        svm.fit(&x, &y).unwrap();

        let proba = svm.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 2);
        for i in 0..proba.nrows() {
            let s: f64 = proba.row(i).sum();
            assert!((s - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_single_class_rejected() {
        let x = Array2::from_shape_vec((3, 2), vec![1.0; 6]).unwrap();
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0]);
        let mut svm = KernelClassifier::new(SvmConfig::default());
        assert!(matches!(
            svm.fit(&x, &y).unwrap_err(),
            CropwiseError::TrainingError(_)
        ));
    }

    #[test]
    fn test_predict_before_fit() {
        let svm = KernelClassifier::new(SvmConfig::default());
        let x = Array2::zeros((1, 2));
        assert!(matches!(
            svm.predict(&x).unwrap_err(),
            CropwiseError::ModelNotFitted
        ));
    }
}
