use crate::{dtypes::Dtype, tensor::Tensor};

impl<E: Dtype> Tensor<E> {
    /// `true` if any element is NaN.
    pub fn has_nans(&self) -> bool {
        self.as_slice().iter().any(|x| x.is_nan())
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::*;

    #[test]
    fn test_has_nans() {
        let dev: TestDevice = Default::default();
        let x: Tensor<TestDtype> = dev.tensor_from_vec(vec![1.0, TestDtype::INFINITY], &[2]);
        assert!(!x.has_nans());
        let x: Tensor<TestDtype> = dev.tensor_from_vec(vec![1.0, TestDtype::NAN], &[2]);
        assert!(x.has_nans());
    }
}
