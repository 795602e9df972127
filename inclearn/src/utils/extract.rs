use inclearn_core::prelude::*;

use crate::convnet::CifarResNet;

/// A network that maps a batch of images to one feature vector per image.
pub trait FeatureExtractor<E: Dtype> {
    fn try_extract(&self, x: Tensor<E>) -> Result<Tensor<E>, Error>;

    fn extract(&self, x: Tensor<E>) -> Tensor<E> {
        self.try_extract(x).unwrap()
    }
}

/// The activated features of the last stage, `(batch, 64)`.
impl<E: Dtype> FeatureExtractor<E> for CifarResNet<E> {
    fn try_extract(&self, x: Tensor<E>) -> Result<Tensor<E>, Error> {
        Ok(self.try_forward(x)?.features)
    }
}

/// Output of a classifier: either one `(batch, classes)` tensor, or one per
/// task for multi-head classifiers.
#[derive(Debug, Clone)]
pub enum Logits<E: Dtype> {
    Single(Tensor<E>),
    PerTask(Vec<Tensor<E>>),
}

impl<E: Dtype> Logits<E> {
    /// The logits predictions are read from: the only tensor, or the one of
    /// the most recent task.
    pub fn last(&self) -> Option<&Tensor<E>> {
        match self {
            Self::Single(t) => Some(t),
            Self::PerTask(ts) => ts.last(),
        }
    }
}

pub trait Classifier<E: Dtype> {
    fn try_logits(&self, x: Tensor<E>) -> Result<Logits<E>, Error>;
}

/// Runs `model` over every batch of `loader` and stacks the features and
/// targets, keeping the order of the loader.
pub fn extract_features<E, M, L>(model: &M, loader: L) -> Result<(Tensor<E>, Vec<usize>), Error>
where
    E: Dtype,
    M: FeatureExtractor<E>,
    L: IntoIterator<Item = LabeledBatch<E>>,
{
    let mut features = Vec::new();
    let mut targets = Vec::new();
    for batch in loader {
        let f = model.try_extract(batch.inputs)?;
        if f.shape().first() != Some(&batch.targets.len()) {
            return Err(Error::WrongNumElements {
                expected: batch.targets.len(),
                found: f.shape().first().copied().unwrap_or(0),
            });
        }
        features.push(f);
        targets.extend(batch.targets);
    }
    if features.is_empty() {
        return Err(Error::EmptyInput("extract_features"));
    }
    Ok((Tensor::try_concat_along(&features, 0)?, targets))
}

/// Predicts the arg max class of the last logits for every image of
/// `loader`. Returns `(predictions, targets)` in loader order.
pub fn classify<E, M, L>(model: &M, loader: L) -> Result<(Vec<usize>, Vec<usize>), Error>
where
    E: Dtype,
    M: Classifier<E>,
    L: IntoIterator<Item = LabeledBatch<E>>,
{
    let mut predictions = Vec::new();
    let mut targets = Vec::new();
    for batch in loader {
        let logits = model.try_logits(batch.inputs)?;
        let last = logits.last().ok_or(Error::EmptyInput("classify"))?;
        let preds = last.try_argmax_last()?;
        if preds.len() != batch.targets.len() {
            return Err(Error::WrongNumElements {
                expected: batch.targets.len(),
                found: preds.len(),
            });
        }
        predictions.extend(preds);
        targets.extend(batch.targets);
    }
    Ok((predictions, targets))
}
