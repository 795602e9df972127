use crate::{
    dtypes::Dtype,
    tensor::{Error, Tensor},
};

use super::Cpu;

use rand::distributions::Distribution;
use std::{sync::Arc, vec::Vec};

pub(crate) fn num_elements(shape: &[usize]) -> Result<usize, Error> {
    shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or(Error::OutOfMemory)
}

impl Cpu {
    #[inline]
    pub(crate) fn try_alloc_elem<E: Copy>(&self, numel: usize, elem: E) -> Result<Vec<E>, Error> {
        let mut data: Vec<E> = Vec::new();
        data.try_reserve(numel).map_err(|_| Error::OutOfMemory)?;
        data.resize(numel, elem);
        Ok(data)
    }

    #[inline]
    pub(crate) fn wrap<E: Dtype>(&self, data: Vec<E>, shape: Vec<usize>) -> Tensor<E> {
        Tensor {
            data: Arc::new(data),
            shape,
            device: self.clone(),
        }
    }

    pub fn try_full<E: Dtype>(&self, shape: &[usize], value: E) -> Result<Tensor<E>, Error> {
        let data = self.try_alloc_elem(num_elements(shape)?, value)?;
        Ok(self.wrap(data, shape.to_vec()))
    }

    pub fn try_zeros<E: Dtype>(&self, shape: &[usize]) -> Result<Tensor<E>, Error> {
        self.try_full(shape, E::zero())
    }

    pub fn zeros<E: Dtype>(&self, shape: &[usize]) -> Tensor<E> {
        self.try_zeros(shape).unwrap()
    }

    pub fn try_ones<E: Dtype>(&self, shape: &[usize]) -> Result<Tensor<E>, Error> {
        self.try_full(shape, E::one())
    }

    pub fn ones<E: Dtype>(&self, shape: &[usize]) -> Tensor<E> {
        self.try_ones(shape).unwrap()
    }

    /// Takes ownership of `data` laid out in row major order.
    pub fn try_tensor_from_vec<E: Dtype>(
        &self,
        data: Vec<E>,
        shape: &[usize],
    ) -> Result<Tensor<E>, Error> {
        let expected = num_elements(shape)?;
        if data.len() != expected {
            return Err(Error::WrongNumElements {
                expected,
                found: data.len(),
            });
        }
        Ok(self.wrap(data, shape.to_vec()))
    }

    pub fn tensor_from_vec<E: Dtype>(&self, data: Vec<E>, shape: &[usize]) -> Tensor<E> {
        self.try_tensor_from_vec(data, shape).unwrap()
    }

    /// Samples every element from `distr`. Sampling happens in `f64` and is cast
    /// down to `E`.
    pub fn try_sample<E: Dtype, D: Distribution<f64>>(
        &self,
        shape: &[usize],
        distr: D,
    ) -> Result<Tensor<E>, Error> {
        let mut t = self.try_zeros(shape)?;
        t.try_fill_with_distr(distr)?;
        Ok(t)
    }

    pub fn try_sample_normal<E: Dtype>(&self, shape: &[usize]) -> Result<Tensor<E>, Error> {
        self.try_sample(shape, rand_distr::StandardNormal)
    }

    pub fn sample_normal<E: Dtype>(&self, shape: &[usize]) -> Tensor<E> {
        self.try_sample_normal(shape).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::*;

    #[test]
    fn test_zeros_ones() {
        let dev: TestDevice = Default::default();
        let z = dev.zeros::<TestDtype>(&[2, 3]);
        assert_eq!(z.shape(), &[2, 3]);
        assert!(z.as_vec().iter().all(|x| *x == 0.0));
        let o = dev.ones::<TestDtype>(&[4]);
        assert_eq!(o.as_vec(), [1.0; 4]);
    }

    #[test]
    fn test_wrong_num_elements() {
        let dev: TestDevice = Default::default();
        let r = dev.try_tensor_from_vec::<TestDtype>(vec![1.0, 2.0, 3.0], &[2, 2]);
        assert!(matches!(
            r,
            Err(Error::WrongNumElements {
                expected: 4,
                found: 3
            })
        ));
    }

    #[test]
    fn test_overflowing_shape_is_oom() {
        let dev: TestDevice = Default::default();
        let r = dev.try_zeros::<TestDtype>(&[usize::MAX, 2]);
        assert!(matches!(r, Err(Error::OutOfMemory)));
    }

    #[test]
    fn test_sample_uniform_in_range() {
        let dev: TestDevice = Default::default();
        let t: Tensor<TestDtype> = dev
            .try_sample(&[100], rand_distr::Uniform::new(-0.5, 0.5))
            .unwrap();
        assert!(t.as_vec().iter().all(|x| (-0.5..0.5).contains(x)));
    }
}
