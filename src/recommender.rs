//! Crop recommendation service
//!
//! Owns the full pipeline: load, split, scale, train every classifier
//! variant, select the best by held-out accuracy, and answer prediction
//! queries against the winner.

use crate::dataset::{CropDataset, DatasetLoader, FEATURE_COLUMNS};
use crate::error::{CropwiseError, Result};
use crate::preprocessing::StandardScaler;
use crate::training::{
    EvaluationRecord, ModelBank, ModelSelector, VariantKind, VariantSettings,
};
use ndarray::Array2;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

/// Pipeline parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// Held-out fraction of the dataset
    pub test_size: f64,
    /// Seed for the split shuffle and every variant's RNG
    pub seed: u64,
    /// Folds for the reported cross-validation scores
    pub cv_folds: usize,
    /// Trees per ensemble (forest trees; boosting rounds per class)
    pub n_estimators: usize,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            cv_folds: 5,
            n_estimators: 100,
        }
    }
}

/// A single recommendation with the full probability breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    /// Recommended crop
    pub label: String,
    /// Index of `label` in the label vocabulary
    pub class_id: usize,
    /// Probability per crop, aligned with the sorted label vocabulary
    pub probabilities: Vec<(String, f64)>,
}

impl Prediction {
    /// Probability assigned to the recommended crop.
    pub fn confidence(&self) -> f64 {
        self.probabilities
            .get(self.class_id)
            .map(|(_, p)| *p)
            .unwrap_or(0.0)
    }

    /// Crops ranked by descending probability.
    pub fn ranked(&self) -> Vec<(String, f64)> {
        let mut ranked = self.probabilities.clone();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

/// Trained crop recommender.
///
/// Construction trains all classifier variants and keeps every one that
/// survives, so callers can inspect per-variant scores; predictions always
/// come from the variant with the best held-out accuracy.
pub struct CropRecommender {
    config: RecommenderConfig,
    labels: Vec<String>,
    scaler: StandardScaler,
    bank: ModelBank,
    best: VariantKind,
    records: Vec<(VariantKind, EvaluationRecord)>,
}

// The bank holds trait objects, so summarize it by the variants it trained.
impl std::fmt::Debug for CropRecommender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CropRecommender")
            .field("config", &self.config)
            .field("labels", &self.labels)
            .field("best", &self.best)
            .field("trained", &self.bank.kinds().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl CropRecommender {
    /// Train a recommender from a CSV file with default parameters.
    pub fn from_csv(path: &str) -> Result<Self> {
        Self::from_csv_with(path, RecommenderConfig::default())
    }

    /// Train a recommender from a CSV file.
    pub fn from_csv_with(path: &str, config: RecommenderConfig) -> Result<Self> {
        let dataset = DatasetLoader::new()
            .with_test_size(config.test_size)
            .with_seed(config.seed)
            .load_csv(path)?;
        Self::from_dataset(dataset, config)
    }

    /// Train a recommender from an in-memory DataFrame.
    pub fn from_dataframe(df: &DataFrame, config: RecommenderConfig) -> Result<Self> {
        let dataset = CropDataset::from_dataframe(df, config.test_size, config.seed)?;
        Self::from_dataset(dataset, config)
    }

    fn from_dataset(dataset: CropDataset, config: RecommenderConfig) -> Result<Self> {
        info!(
            samples = dataset.n_samples(),
            crops = dataset.n_classes(),
            "training crop recommender"
        );

        let mut scaler = StandardScaler::new();
        let x_train = scaler.fit_transform(&dataset.x_train())?;
        let x_test = scaler.transform(&dataset.x_test())?;
        let y_train = dataset.y_train();
        let y_test = dataset.y_test();

        let settings = VariantSettings {
            n_estimators: config.n_estimators,
            seed: config.seed,
        };

        let bank = ModelBank::train(&x_train, &y_train, &settings);
        let selector = ModelSelector::new(config.cv_folds, config.seed);
        let selection = selector.select(&bank, &x_train, &y_train, &x_test, &y_test, &settings)?;

        Ok(Self {
            config,
            labels: dataset.labels().to_vec(),
            scaler,
            bank,
            best: selection.best,
            records: selection.records,
        })
    }

    /// Recommend a crop for one measurement vector.
    ///
    /// `features` must hold exactly the seven values in
    /// [`FEATURE_COLUMNS`] order: N, P, K, temperature, humidity, ph,
    /// rainfall.
    pub fn predict(&self, features: &[f64]) -> Result<Prediction> {
        if features.len() != FEATURE_COLUMNS.len() {
            return Err(CropwiseError::ShapeError {
                expected: format!("{} features", FEATURE_COLUMNS.len()),
                actual: format!("{} features", features.len()),
            });
        }

        let model = self.bank.get(self.best).ok_or(CropwiseError::NotInitialized)?;

        let row = Array2::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(CropwiseError::from)?;
        let scaled = self.scaler.transform(&row)?;

        let proba = model.predict_proba(&scaled)?;
        let classes = model.classes();

        // Expand the model's observed-class columns onto the full label
        // vocabulary; crops absent from the training split get zero.
        let mut full = vec![0.0; self.labels.len()];
        for (col, &cls) in classes.iter().enumerate() {
            let idx = cls as usize;
            if idx < full.len() {
                full[idx] = proba[[0, col]];
            }
        }

        if full.is_empty() {
            return Err(CropwiseError::ComputationError(
                "empty probability vector".to_string(),
            ));
        }
        // Strict > keeps the lowest class id on exact ties, matching the
        // tie-break inside the tree ensembles
        let mut class_id = 0;
        for (i, &p) in full.iter().enumerate().skip(1) {
            if p > full[class_id] {
                class_id = i;
            }
        }

        Ok(Prediction {
            label: self.labels[class_id].clone(),
            class_id,
            probabilities: self
                .labels
                .iter()
                .cloned()
                .zip(full)
                .collect(),
        })
    }

    /// Per-variant evaluation scores, in registry order.
    pub fn model_scores(&self) -> Vec<(&'static str, &EvaluationRecord)> {
        self.records
            .iter()
            .map(|(kind, record)| (kind.name(), record))
            .collect()
    }

    /// Evaluation scores as a JSON object keyed by variant name.
    pub fn model_scores_json(&self) -> Result<String> {
        let mut map = serde_json::Map::new();
        for (kind, record) in &self.records {
            map.insert(kind.name().to_string(), json!(record));
        }
        serde_json::to_string_pretty(&serde_json::Value::Object(map))
            .map_err(CropwiseError::from)
    }

    /// Per-feature importances paired with the feature column names.
    ///
    /// Importances always come from the bagged-tree variant, whichever
    /// variant serves predictions; the other variants either lack a
    /// comparable attribution or (for the SVM) have none at all.
    pub fn feature_importance(&self) -> Result<Vec<(&'static str, f64)>> {
        let forest = self
            .bank
            .get(VariantKind::EnsembleTree)
            .ok_or(CropwiseError::ModelNotFitted)?;
        let importances = forest
            .feature_importances()
            .ok_or(CropwiseError::ModelNotFitted)?;

        Ok(FEATURE_COLUMNS
            .iter()
            .copied()
            .zip(importances.iter().copied())
            .collect())
    }

    /// Sorted crop label vocabulary.
    pub fn crop_labels(&self) -> &[String] {
        &self.labels
    }

    /// Name of the variant serving predictions.
    pub fn best_model_name(&self) -> &'static str {
        self.best.name()
    }

    /// The variant serving predictions.
    pub fn best_variant(&self) -> VariantKind {
        self.best
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }
}
