//! Evaluation helpers that run a backbone over labelled data.

mod accuracy;
mod extract;
mod loss;

pub use accuracy::{compute_accuracy, Accuracy};
pub use extract::{classify, extract_features, Classifier, FeatureExtractor, Logits};
pub use loss::check_loss;
