use crate::{
    dtypes::Dtype,
    tensor::{Error, Tensor},
};

/// One item of a labelled data source: a batch of images, one class label per
/// image, and an auxiliary id per image (for example a memory flag telling
/// exemplars apart from new data). `aux` may be left empty.
#[derive(Clone, Debug)]
pub struct LabeledBatch<E: Dtype> {
    pub inputs: Tensor<E>,
    pub targets: Vec<usize>,
    pub aux: Vec<usize>,
}

impl<E: Dtype> LabeledBatch<E> {
    /// Checks that `targets`, and `aux` when given, have one entry per image.
    pub fn try_new(inputs: Tensor<E>, targets: Vec<usize>, aux: Vec<usize>) -> Result<Self, Error> {
        let batch = inputs
            .shape()
            .first()
            .copied()
            .ok_or_else(|| Error::WrongRank {
                op: "labeled_batch",
                expected: 1,
                found: inputs.shape().to_vec(),
            })?;
        for (len, optional) in [(targets.len(), false), (aux.len(), true)] {
            if len != batch && !(optional && len == 0) {
                return Err(Error::WrongNumElements {
                    expected: batch,
                    found: len,
                });
            }
        }
        Ok(Self {
            inputs,
            targets,
            aux,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.targets.len()
    }
}
