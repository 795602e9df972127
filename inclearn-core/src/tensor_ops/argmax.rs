use crate::{
    dtypes::Dtype,
    tensor::{Error, Tensor},
};

impl<E: Dtype> Tensor<E> {
    /// Index of the largest value in every row of a `(batch, classes)` tensor.
    /// Ties resolve to the lowest index, NaNs are never selected unless the
    /// whole row is NaN.
    pub fn try_argmax_last(&self) -> Result<Vec<usize>, Error> {
        let [_, c] = self.try_dims2("argmax")?;
        if c == 0 {
            return Err(Error::EmptyInput("argmax"));
        }
        Ok(self
            .as_slice()
            .chunks_exact(c)
            .map(|row| {
                let mut best = 0;
                for (i, x) in row.iter().enumerate().skip(1) {
                    if *x > row[best] || (row[best].is_nan() && !x.is_nan()) {
                        best = i;
                    }
                }
                best
            })
            .collect())
    }
}
