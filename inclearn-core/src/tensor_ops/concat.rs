use crate::{
    dtypes::Dtype,
    tensor::{num_elements, Error, Tensor},
};

impl<E: Dtype> Tensor<E> {
    /// Concatenates `tensors` along `axis`. Every other dimension must agree.
    /// The result lives on the device of the first tensor.
    ///
    /// **Pytorch equivalent**: `torch.cat(tensors, dim=axis)`
    pub fn try_concat_along(tensors: &[Tensor<E>], axis: usize) -> Result<Tensor<E>, Error> {
        let first = tensors.first().ok_or(Error::EmptyInput("concat_along"))?;
        if axis >= first.rank() {
            return Err(Error::WrongRank {
                op: "concat_along",
                expected: axis + 1,
                found: first.shape.clone(),
            });
        }
        let mut shape = first.shape.clone();
        shape[axis] = 0;
        for t in tensors {
            let agrees = t.rank() == first.rank()
                && t.shape
                    .iter()
                    .zip(first.shape.iter())
                    .enumerate()
                    .all(|(i, (a, b))| i == axis || a == b);
            if !agrees {
                return Err(Error::ShapeMismatch {
                    op: "concat_along",
                    lhs: first.shape.clone(),
                    rhs: t.shape.clone(),
                });
            }
            shape[axis] += t.shape[axis];
        }

        let outer = num_elements(&first.shape[..axis])?;
        let mut data = first
            .device
            .try_alloc_elem(num_elements(&shape)?, E::zero())?;
        let mut offset = 0;
        for o in 0..outer {
            for t in tensors {
                let chunk = num_elements(&t.shape[axis..])?;
                let src = &t.as_slice()[o * chunk..(o + 1) * chunk];
                data[offset..offset + chunk].copy_from_slice(src);
                offset += chunk;
            }
        }
        Ok(first.device.wrap(data, shape))
    }

    /// Appends as many all-zero channels as `self` already has, doubling the
    /// channel dimension of a `(batch, chan, height, width)` tensor.
    ///
    /// **Pytorch equivalent**: `torch.cat((x, x.mul(0)), 1)`
    pub fn try_pad_zero_channels(&self) -> Result<Self, Error> {
        self.try_dims4("pad_zero_channels")?;
        Self::try_concat_along(&[self.clone(), self.try_zeros_like()?], 1)
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::*;

    #[test]
    fn test_concat_along_batch() {
        let dev: TestDevice = Default::default();
        let a: Tensor<TestDtype> = dev.tensor_from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]);
        let b: Tensor<TestDtype> = dev.tensor_from_vec(vec![5.0, 6.0], &[1, 2]);
        let c = Tensor::try_concat_along(&[a, b], 0).unwrap();
        assert_eq!(c.shape(), &[3, 2]);
        assert_close_to_literal!(c, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_concat_along_inner_axis() {
        let dev: TestDevice = Default::default();
        let a: Tensor<TestDtype> = dev.tensor_from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]);
        let b: Tensor<TestDtype> = dev.tensor_from_vec(vec![5.0, 6.0], &[2, 1]);
        let c = Tensor::try_concat_along(&[a, b], 1).unwrap();
        assert_eq!(c.shape(), &[2, 3]);
        assert_close_to_literal!(c, [1.0, 2.0, 5.0, 3.0, 4.0, 6.0]);
    }

    #[test]
    fn test_concat_errors() {
        let dev: TestDevice = Default::default();
        let a: Tensor<TestDtype> = dev.zeros(&[2, 2]);
        let b: Tensor<TestDtype> = dev.zeros(&[2, 3]);
        assert!(matches!(
            Tensor::try_concat_along(&[a.clone(), b], 0),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(matches!(
            Tensor::<TestDtype>::try_concat_along(&[], 0),
            Err(Error::EmptyInput(_))
        ));
        assert!(Tensor::try_concat_along(&[a], 2).is_err());
    }

    #[test]
    fn test_pad_zero_channels() {
        let dev: TestDevice = Default::default();
        let x: Tensor<TestDtype> = dev.tensor_from_vec(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
            &[2, 1, 2, 2],
        );
        let y = x.try_pad_zero_channels().unwrap();
        assert_eq!(y.shape(), &[2, 2, 2, 2]);
        assert_close_to_literal!(
            y,
            [1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0, 5.0, 6.0, 7.0, 8.0, 0.0, 0.0, 0.0, 0.0]
        );
    }
}
