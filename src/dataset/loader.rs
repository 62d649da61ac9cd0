//! CSV loading for crop datasets

use super::CropDataset;
use crate::error::{CropwiseError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Loads crop recommendation data from CSV files.
///
/// The loader owns the split parameters so a dataset is split exactly once,
/// at load time, with a fixed seed.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    test_size: f64,
    seed: u64,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetLoader {
    /// Create a loader with the standard 80/20 split and fixed seed.
    pub fn new() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
        }
    }

    /// Set the held-out test fraction.
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    /// Set the shuffle seed for the split.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Load a CSV file into a split [`CropDataset`].
    ///
    /// Fails with [`CropwiseError::DataNotFound`] if the file does not exist
    /// and [`CropwiseError::EmptyDataset`] if it holds zero data rows.
    pub fn load_csv(&self, path: &str) -> Result<CropDataset> {
        let df = self.read_csv(path)?;
        CropDataset::from_dataframe(&df, self.test_size, self.seed)
    }

    fn read_csv(&self, path: &str) -> Result<DataFrame> {
        if !Path::new(path).exists() {
            return Err(CropwiseError::DataNotFound(path.to_string()));
        }

        let file = File::open(path).map_err(|e| CropwiseError::DataError(e.to_string()))?;

        let reader = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .into_reader_with_file_handle(file);

        reader
            .finish()
            .map_err(|e| CropwiseError::DataError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv(rows: &[&str]) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "N,P,K,temperature,humidity,ph,rainfall,label").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file
    }

    #[test]
    fn test_load_csv() {
        let file = create_test_csv(&[
            "90,42,43,20.8,82.0,6.5,202.9,rice",
            "85,58,41,21.7,80.3,7.0,226.6,rice",
            "60,55,44,23.0,82.3,7.8,263.9,rice",
            "71,54,16,22.6,63.6,5.7,87.7,maize",
            "61,44,17,26.1,71.5,6.2,102.2,maize",
        ]);

        let loader = DatasetLoader::new().with_test_size(0.2);
        let dataset = loader.load_csv(file.path().to_str().unwrap()).unwrap();

        assert_eq!(dataset.n_samples(), 5);
        assert_eq!(dataset.labels(), &["maize".to_string(), "rice".to_string()]);
    }

    #[test]
    fn test_missing_file() {
        let loader = DatasetLoader::new();
        let err = loader.load_csv("/nonexistent/crops.csv").unwrap_err();
        assert!(matches!(err, CropwiseError::DataNotFound(_)));
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let file = create_test_csv(&[]);
        let loader = DatasetLoader::new();
        let err = loader.load_csv(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, CropwiseError::EmptyDataset));
    }
}
