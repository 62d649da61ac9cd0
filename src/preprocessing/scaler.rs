//! Standard (z-score) feature scaling

use crate::error::{CropwiseError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature parameters learned during fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerState {
    means: Array1<f64>,
    stds: Array1<f64>,
}

/// Standard scaler: (x - mean) / std per feature.
///
/// `fit` is callable exactly once per instance; the learned state is frozen
/// afterwards so test data and inference vectors are scaled with exactly
/// the parameters learned from the training subset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    state: Option<ScalerState>,
}

impl StandardScaler {
    /// Create an unfitted scaler.
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Learn per-feature mean and standard deviation from `x`.
    ///
    /// Fails with [`CropwiseError::AlreadyFitted`] on a second call; the
    /// scaling parameters of a pipeline instance are never refit.
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if self.state.is_some() {
            return Err(CropwiseError::AlreadyFitted);
        }
        if x.nrows() == 0 {
            return Err(CropwiseError::ValidationError(
                "cannot fit scaler on zero rows".to_string(),
            ));
        }

        let n = x.nrows() as f64;
        let means = x.mean_axis(Axis(0)).ok_or_else(|| {
            CropwiseError::ComputationError("mean of empty axis".to_string())
        })?;

        let stds: Array1<f64> = (0..x.ncols())
            .map(|j| {
                let mean = means[j];
                let var = x.column(j).iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                // Constant features scale by 1.0 instead of dividing by zero
                if std == 0.0 {
                    1.0
                } else {
                    std
                }
            })
            .collect();

        self.state = Some(ScalerState { means, stds });
        Ok(self)
    }

    /// Apply the learned standardization to `x`.
    ///
    /// Accepts any row count, including a one-row matrix built from a
    /// single inference vector.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let state = self.state.as_ref().ok_or(CropwiseError::ModelNotFitted)?;
        self.check_width(x, state)?;

        let mut out = x.clone();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let mean = state.means[j];
            let std = state.stds[j];
            col.mapv_inplace(|v| (v - mean) / std);
        }
        Ok(out)
    }

    /// Undo the standardization: z * std + mean per feature.
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let state = self.state.as_ref().ok_or(CropwiseError::ModelNotFitted)?;
        self.check_width(x, state)?;

        let mut out = x.clone();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let mean = state.means[j];
            let std = state.stds[j];
            col.mapv_inplace(|v| v * std + mean);
        }
        Ok(out)
    }

    /// Fit and transform in one step.
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Whether `fit` has been called.
    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn check_width(&self, x: &Array2<f64>, state: &ScalerState) -> Result<()> {
        if x.ncols() != state.means.len() {
            return Err(CropwiseError::ShapeError {
                expected: format!("{} columns", state.means.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok(())
    }
}
