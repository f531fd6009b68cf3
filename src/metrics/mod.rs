//! Segmentation metrics comparing a predicted mask against ground truth.

pub mod avd;
pub mod dice;
pub mod instance;

pub use avd::normalized_avd;
pub use dice::dice;
pub use instance::{instance_counts, instance_recall_precision};
