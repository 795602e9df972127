//! Helpers for feeding labelled data through a network.

mod batch;
mod one_hot_encode;

pub use batch::LabeledBatch;
