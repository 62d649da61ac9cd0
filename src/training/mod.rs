//! Classifier variants, training, and selection

mod bank;
mod cross_validation;
mod decision_tree;
mod gradient_boosting;
mod random_forest;
mod selector;
mod svm;

pub use bank::{CropClassifier, ModelBank, VariantKind, VariantSettings, REGISTRY};
pub use cross_validation::{CvResults, CvSplit, KFold};
pub use decision_tree::{CartTree, SplitCriterion};
pub use gradient_boosting::{BoostingConfig, GradientBoostedTrees};
pub use random_forest::ForestClassifier;
pub use selector::{accuracy, EvaluationRecord, ModelSelector, Selection};
pub use svm::{Kernel, KernelClassifier, SvmConfig};
