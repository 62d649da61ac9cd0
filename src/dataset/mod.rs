//! Dataset loading and preparation
//!
//! Loads the labeled agronomic table, validates the required columns,
//! encodes crop labels to class ids, and performs the single deterministic
//! train/test split the rest of the pipeline consumes.

mod loader;

pub use loader::DatasetLoader;

use crate::error::{CropwiseError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Feature columns, in the fixed order every inference vector must follow.
pub const FEATURE_COLUMNS: [&str; 7] = [
    "N",
    "P",
    "K",
    "temperature",
    "humidity",
    "ph",
    "rainfall",
];

/// Target column holding the crop name.
pub const LABEL_COLUMN: &str = "label";

/// A loaded and split crop dataset.
///
/// Labels are encoded as class ids: the id of a crop is its index in the
/// ascending-sorted label vocabulary, so probability vectors indexed by
/// class id are automatically aligned to [`CropDataset::labels`].
#[derive(Debug, Clone)]
pub struct CropDataset {
    features: Array2<f64>,
    targets: Array1<f64>,
    labels: Vec<String>,
    train_indices: Vec<usize>,
    test_indices: Vec<usize>,
}

impl CropDataset {
    /// Build a dataset from an in-memory DataFrame and split it once.
    ///
    /// The split is an 80/20 (for `test_size = 0.2`) seeded shuffle; it is
    /// performed exactly here and never redone for this instance.
    pub fn from_dataframe(df: &DataFrame, test_size: f64, seed: u64) -> Result<Self> {
        if df.height() == 0 {
            return Err(CropwiseError::EmptyDataset);
        }
        if !(0.0..1.0).contains(&test_size) {
            return Err(CropwiseError::ValidationError(format!(
                "test_size must be in [0, 1), got {test_size}"
            )));
        }

        let features = columns_to_array2(df, &FEATURE_COLUMNS)?;
        let raw_labels = extract_labels(df)?;

        let mut labels: Vec<String> = raw_labels.clone();
        labels.sort();
        labels.dedup();

        let targets: Array1<f64> = raw_labels
            .iter()
            .map(|l| {
                // Vocabulary was built from these exact strings, so the
                // lookup cannot fail.
                labels.binary_search(l).unwrap_or(0) as f64
            })
            .collect();

        let n = df.height();
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let n_test = ((n as f64) * test_size).ceil() as usize;
        let n_test = n_test.min(n.saturating_sub(1));
        let test_indices = indices[..n_test].to_vec();
        let train_indices = indices[n_test..].to_vec();

        if train_indices.is_empty() {
            return Err(CropwiseError::ValidationError(
                "train/test split produced an empty training set".to_string(),
            ));
        }

        Ok(Self {
            features,
            targets,
            labels,
            train_indices,
            test_indices,
        })
    }

    /// Training feature matrix.
    pub fn x_train(&self) -> Array2<f64> {
        self.features.select(ndarray::Axis(0), &self.train_indices)
    }

    /// Held-out test feature matrix.
    pub fn x_test(&self) -> Array2<f64> {
        self.features.select(ndarray::Axis(0), &self.test_indices)
    }

    /// Training class ids.
    pub fn y_train(&self) -> Array1<f64> {
        Array1::from_iter(self.train_indices.iter().map(|&i| self.targets[i]))
    }

    /// Held-out test class ids.
    pub fn y_test(&self) -> Array1<f64> {
        Array1::from_iter(self.test_indices.iter().map(|&i| self.targets[i]))
    }

    /// Sorted, duplicate-free crop label vocabulary.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Total number of samples.
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    /// Number of distinct crop labels.
    pub fn n_classes(&self) -> usize {
        self.labels.len()
    }

    /// Class id of a label, if present in the vocabulary.
    pub fn class_id(&self, label: &str) -> Option<usize> {
        self.labels.binary_search_by(|l| l.as_str().cmp(label)).ok()
    }
}

/// Extract named columns from a DataFrame into a row-major Array2<f64>.
fn columns_to_array2(df: &DataFrame, col_names: &[&str]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let series = df
                .column(col_name)
                .map_err(|_| CropwiseError::MissingColumn(col_name.to_string()))?;
            let series_f64 = series
                .cast(&DataType::Float64)
                .map_err(|e| CropwiseError::DataError(e.to_string()))?;
            let values: Vec<f64> = series_f64
                .f64()
                .map_err(|e| CropwiseError::DataError(e.to_string()))?
                .into_iter()
                .map(|v| {
                    v.ok_or_else(|| {
                        CropwiseError::DataError(format!("null value in column '{col_name}'"))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| {
        col_refs[c][r]
    }))
}

fn extract_labels(df: &DataFrame) -> Result<Vec<String>> {
    let column = df
        .column(LABEL_COLUMN)
        .map_err(|_| CropwiseError::MissingColumn(LABEL_COLUMN.to_string()))?;
    let ca = column
        .str()
        .map_err(|e| CropwiseError::DataError(e.to_string()))?;

    ca.into_iter()
        .enumerate()
        .map(|(i, opt)| match opt {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            Some(_) => Err(CropwiseError::ValidationError(format!(
                "empty crop label at row {i}"
            ))),
            None => Err(CropwiseError::DataError(format!(
                "null crop label at row {i}"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_df() -> DataFrame {
        df!(
            "N" => &[90.0, 85.0, 60.0, 74.0, 78.0, 69.0, 80.0, 61.0, 96.0, 90.0],
            "P" => &[42.0, 58.0, 55.0, 35.0, 42.0, 37.0, 40.0, 44.0, 41.0, 44.0],
            "K" => &[43.0, 41.0, 44.0, 40.0, 42.0, 42.0, 40.0, 41.0, 43.0, 39.0],
            "temperature" => &[20.8, 21.7, 23.0, 26.4, 20.1, 23.0, 26.8, 24.9, 23.9, 25.5],
            "humidity" => &[82.0, 80.3, 82.3, 80.1, 81.6, 83.3, 80.8, 83.5, 83.0, 81.4],
            "ph" => &[6.5, 7.0, 7.8, 6.9, 7.6, 7.0, 7.0, 6.5, 6.8, 7.1],
            "rainfall" => &[202.9, 226.6, 263.9, 242.8, 262.7, 251.0, 271.3, 230.4, 221.2, 213.3],
            "label" => &["rice", "rice", "rice", "rice", "rice", "maize", "maize", "maize", "maize", "maize"]
        )
        .unwrap()
    }

    #[test]
    fn test_labels_sorted_and_deduped() {
        let ds = CropDataset::from_dataframe(&sample_df(), 0.2, 42).unwrap();
        assert_eq!(ds.labels(), &["maize".to_string(), "rice".to_string()]);
        assert_eq!(ds.n_classes(), 2);
    }

    #[test]
    fn test_split_disjoint_and_covering() {
        let ds = CropDataset::from_dataframe(&sample_df(), 0.2, 42).unwrap();
        assert_eq!(ds.train_indices.len(), 8);
        assert_eq!(ds.test_indices.len(), 2);

        let mut all: Vec<usize> = ds
            .train_indices
            .iter()
            .chain(ds.test_indices.iter())
            .copied()
            .collect();
        all.sort();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_deterministic() {
        let a = CropDataset::from_dataframe(&sample_df(), 0.2, 42).unwrap();
        let b = CropDataset::from_dataframe(&sample_df(), 0.2, 42).unwrap();
        assert_eq!(a.train_indices, b.train_indices);
        assert_eq!(a.test_indices, b.test_indices);
    }

    #[test]
    fn test_empty_dataframe_rejected() {
        let df = sample_df().head(Some(0));
        let err = CropDataset::from_dataframe(&df, 0.2, 42).unwrap_err();
        assert!(matches!(err, CropwiseError::EmptyDataset));
    }

    #[test]
    fn test_missing_column_rejected() {
        let df = sample_df().drop("rainfall").unwrap();
        let err = CropDataset::from_dataframe(&df, 0.2, 42).unwrap_err();
        assert!(matches!(err, CropwiseError::MissingColumn(c) if c == "rainfall"));
    }

    #[test]
    fn test_class_ids_match_sorted_vocabulary() {
        let ds = CropDataset::from_dataframe(&sample_df(), 0.2, 42).unwrap();
        assert_eq!(ds.class_id("maize"), Some(0));
        assert_eq!(ds.class_id("rice"), Some(1));
        assert_eq!(ds.class_id("wheat"), None);

        // First five rows are rice
        assert_eq!(ds.targets[0], 1.0);
        assert_eq!(ds.targets[9], 0.0);
    }
}
