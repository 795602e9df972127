use crate::{
    dtypes::Dtype,
    tensor::{Cpu, Error, Tensor},
};

impl Cpu {
    /// One hot encodes class labels into a `(labels.len(), n)` tensor of
    /// probability vectors. A label `>= n` is an error.
    ///
    /// ```rust
    /// # use inclearn_core::prelude::*;
    /// let dev: Cpu = Default::default();
    /// let probs: Tensor<f32> = dev.one_hot_encode(3, &[0, 2, 1]);
    /// assert_eq!(&probs.as_vec(), &[
    ///     1.0, 0.0, 0.0,
    ///     0.0, 0.0, 1.0,
    ///     0.0, 1.0, 0.0,
    /// ]);
    /// ```
    pub fn try_one_hot_encode<E: Dtype>(&self, n: usize, labels: &[usize]) -> Result<Tensor<E>, Error> {
        let mut t = self.try_zeros(&[labels.len(), n])?;
        let data = t.data_mut();
        for (i, &l) in labels.iter().enumerate() {
            if l >= n {
                return Err(Error::InvalidConfig(format!(
                    "label {l} out of range for {n} classes"
                )));
            }
            data[i * n + l] = E::one();
        }
        Ok(t)
    }

    pub fn one_hot_encode<E: Dtype>(&self, n: usize, labels: &[usize]) -> Tensor<E> {
        self.try_one_hot_encode(n, labels).unwrap()
    }
}
