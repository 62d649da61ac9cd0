//! Feature preprocessing
//!
//! Standardization of the numeric feature matrix. The scaler is fitted on
//! the training subset only, then applied unchanged to the test subset and
//! to every inference vector.

mod scaler;

pub use scaler::StandardScaler;
