//! Classifier variant registry and training bank

use super::gradient_boosting::{BoostingConfig, GradientBoostedTrees};
use super::random_forest::ForestClassifier;
use super::svm::{KernelClassifier, SvmConfig};
use crate::error::{CropwiseError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The classifier variants competing for selection, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantKind {
    /// Bagged decision trees
    EnsembleTree,
    /// Gradient boosted trees
    GradientBoostedTree,
    /// Kernel support vector machine
    KernelSupportVector,
}

/// Fixed evaluation order; ties between equal accuracies resolve to the
/// earliest entry.
pub const REGISTRY: [VariantKind; 3] = [
    VariantKind::EnsembleTree,
    VariantKind::GradientBoostedTree,
    VariantKind::KernelSupportVector,
];

impl VariantKind {
    pub fn name(&self) -> &'static str {
        match self {
            VariantKind::EnsembleTree => "ensemble_tree",
            VariantKind::GradientBoostedTree => "gradient_boosted_tree",
            VariantKind::KernelSupportVector => "kernel_support_vector",
        }
    }

    /// Construct an unfitted classifier of this variant.
    pub fn build(&self, settings: &VariantSettings) -> Box<dyn CropClassifier> {
        match self {
            VariantKind::EnsembleTree => Box::new(
                ForestClassifier::new(settings.n_estimators).with_seed(settings.seed),
            ),
            VariantKind::GradientBoostedTree => Box::new(GradientBoostedTrees::new(BoostingConfig {
                n_estimators: settings.n_estimators,
                seed: settings.seed,
                ..Default::default()
            })),
            VariantKind::KernelSupportVector => Box::new(KernelClassifier::new(SvmConfig {
                seed: settings.seed,
                ..Default::default()
            })),
        }
    }
}

impl std::fmt::Display for VariantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Hyperparameters shared across variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantSettings {
    pub n_estimators: usize,
    pub seed: u64,
}

impl Default for VariantSettings {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            seed: 42,
        }
    }
}

/// Common interface over the competing classifier variants.
pub trait CropClassifier: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
    /// Class probabilities, columns aligned with [`classes`](Self::classes).
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;
    /// Sorted distinct class ids seen during fit.
    fn classes(&self) -> &[i64];
    /// Normalized per-feature importances, when the variant supports them.
    fn feature_importances(&self) -> Option<Array1<f64>>;
}

impl CropClassifier for ForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        ForestClassifier::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        ForestClassifier::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        ForestClassifier::predict_proba(self, x)
    }

    fn classes(&self) -> &[i64] {
        ForestClassifier::classes(self)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        ForestClassifier::feature_importances(self).cloned()
    }
}

impl CropClassifier for GradientBoostedTrees {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GradientBoostedTrees::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        GradientBoostedTrees::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        GradientBoostedTrees::predict_proba(self, x)
    }

    fn classes(&self) -> &[i64] {
        GradientBoostedTrees::classes(self)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        GradientBoostedTrees::feature_importances(self).cloned()
    }
}

impl CropClassifier for KernelClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        KernelClassifier::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        KernelClassifier::predict(self, x)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        KernelClassifier::predict_proba(self, x)
    }

    fn classes(&self) -> &[i64] {
        KernelClassifier::classes(self)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        // Support vector machines carry no per-feature attribution
        None
    }
}

/// Every variant that trained without error, plus the failures that were
/// dropped along the way.
pub struct ModelBank {
    models: Vec<(VariantKind, Box<dyn CropClassifier>)>,
    failures: Vec<(VariantKind, CropwiseError)>,
}

impl ModelBank {
    /// Train every registered variant on `x`/`y`. A variant that fails to
    /// fit is logged and excluded rather than aborting the others.
    pub fn train(x: &Array2<f64>, y: &Array1<f64>, settings: &VariantSettings) -> Self {
        let mut models = Vec::new();
        let mut failures = Vec::new();

        for kind in REGISTRY {
            let mut model = kind.build(settings);
            match model.fit(x, y) {
                Ok(()) => models.push((kind, model)),
                Err(err) => {
                    warn!(variant = kind.name(), error = %err, "variant failed to train, excluding");
                    failures.push((kind, err));
                }
            }
        }

        Self { models, failures }
    }

    pub fn get(&self, kind: VariantKind) -> Option<&dyn CropClassifier> {
        self.models
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, m)| m.as_ref())
    }

    /// Surviving variants in registry order.
    pub fn kinds(&self) -> impl Iterator<Item = VariantKind> + '_ {
        self.models.iter().map(|(k, _)| *k)
    }

    pub fn failures(&self) -> &[(VariantKind, CropwiseError)] {
        &self.failures
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    fn cluster_data() -> (Array2<f64>, Array1<f64>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..6 {
            let j = i as f64 * 0.1;
            rows.extend_from_slice(&[j, j]);
            labels.push(0.0);
            rows.extend_from_slice(&[5.0 + j, 5.0 - j]);
            labels.push(1.0);
        }
        (
            Array2::from_shape_vec((12, 2), rows).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_all_variants_train_on_clean_data() {
        let (x, y) = cluster_data();
        let settings = VariantSettings {
            n_estimators: 10,
            seed: 42,
        };
        let bank = ModelBank::train(&x, &y, &settings);
        assert_eq!(bank.len(), 3);
        assert!(bank.failures().is_empty());
    }

    #[test]
    fn test_single_class_degrades_gracefully() {
        // One class: boosting and the SVM refuse to fit, the forest survives
        let x = Array2::from_shape_vec((4, 2), vec![1.0, 2.0, 1.1, 2.1, 0.9, 1.9, 1.2, 2.2])
            .unwrap();
        let y = Array1::from_vec(vec![0.0; 4]);
        let settings = VariantSettings {
            n_estimators: 5,
            seed: 42,
        };

        let bank = ModelBank::train(&x, &y, &settings);
        assert!(bank.get(VariantKind::EnsembleTree).is_some());
        assert!(bank.get(VariantKind::GradientBoostedTree).is_none());
        assert!(bank.get(VariantKind::KernelSupportVector).is_none());
        assert_eq!(bank.failures().len(), 2);
    }

    #[test]
    fn test_registry_order() {
        let names: Vec<&str> = REGISTRY.iter().map(|k| k.name()).collect();
        assert_eq!(
            names,
            vec!["ensemble_tree", "gradient_boosted_tree", "kernel_support_vector"]
        );
    }
}
