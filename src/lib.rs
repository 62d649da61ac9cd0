//! Cropwise - crop recommendation engine
//!
//! Recommends a crop to plant from soil and climate measurements
//! (N, P, K, temperature, humidity, pH, rainfall) by training several
//! classifier variants on a labeled agronomic dataset, selecting the best
//! performer by held-out accuracy, and serving predictions with confidence
//! scores.
//!
//! # Modules
//!
//! - [`dataset`] - CSV loading, validation, label encoding, train/test split
//! - [`preprocessing`] - Feature standardization
//! - [`training`] - Classifier variants, cross-validation, model bank and selector
//! - [`recommender`] - The [`CropRecommender`] prediction service
//! - [`advisory`] - Deterministic agronomic lookups (irrigation, economics, rotation)
//!
//! # Example
//!
//! ```no_run
//! use cropwise::CropRecommender;
//!
//! let recommender = CropRecommender::from_csv("crop_recommendation.csv")?;
//! let prediction = recommender.predict(&[90.0, 42.0, 43.0, 20.8, 82.0, 6.5, 202.9])?;
//! println!("{} ({:.1}% confident)", prediction.label, prediction.confidence() * 100.0);
//! # Ok::<(), cropwise::CropwiseError>(())
//! ```

// Core error handling
pub mod error;

// Core pipeline modules
pub mod dataset;
pub mod preprocessing;
pub mod training;
pub mod recommender;

// Agronomic lookup tables
pub mod advisory;

pub use error::{CropwiseError, Result};
pub use recommender::{CropRecommender, Prediction, RecommenderConfig};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{CropwiseError, Result};

    // Dataset
    pub use crate::dataset::{CropDataset, DatasetLoader, FEATURE_COLUMNS, LABEL_COLUMN};

    // Preprocessing
    pub use crate::preprocessing::StandardScaler;

    // Training
    pub use crate::training::{
        CropClassifier, EvaluationRecord, ModelBank, ModelSelector, VariantKind, VariantSettings,
    };

    // Prediction service
    pub use crate::recommender::{CropRecommender, Prediction, RecommenderConfig};

    // Advisory lookups
    pub use crate::advisory::{CropRotationPlanner, EconomicAnalyzer, IrrigationScheduler, Season};
}
