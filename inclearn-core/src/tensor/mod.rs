//! The [Tensor] struct, the [Cpu] device, and the [Error] type shared by
//! every fallible op.
//!
//! Tensors are contiguous, row major, and carry their shape at runtime. The
//! storage lives behind an [Arc], so cloning a tensor is cheap and ops that
//! mutate in place only copy when the storage is shared.
//!
//! ```rust
//! # use inclearn_core::prelude::*;
//! let dev: Cpu = Default::default();
//! let a: Tensor<f32> = dev.zeros(&[2, 3]);
//! let b = a.clone();
//! assert_eq!(b.shape(), &[2, 3]);
//! ```

mod cpu;
mod error;
#[cfg(feature = "safetensors")]
mod safetensors;

pub use cpu::Cpu;
pub(crate) use cpu::num_elements;
pub use error::Error;

use crate::dtypes::Dtype;
use rand::distributions::Distribution;
use std::sync::Arc;

/// An n dimensional array of `E` owned by a [Cpu] device.
#[derive(Clone, Debug)]
pub struct Tensor<E: Dtype> {
    pub(crate) data: Arc<Vec<E>>,
    pub(crate) shape: Vec<usize>,
    pub(crate) device: Cpu,
}

impl<E: Dtype> Tensor<E> {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn device(&self) -> &Cpu {
        &self.device
    }

    pub fn as_slice(&self) -> &[E] {
        self.data.as_slice()
    }

    pub fn as_vec(&self) -> Vec<E> {
        self.data.as_ref().clone()
    }

    /// Mutable access to the storage, copying it first if it is shared.
    pub(crate) fn data_mut(&mut self) -> &mut Vec<E> {
        Arc::make_mut(&mut self.data)
    }

    /// Returns `[d0, d1, d2, d3]` or [Error::WrongRank].
    pub fn try_dims4(&self, op: &'static str) -> Result<[usize; 4], Error> {
        match self.shape.as_slice() {
            &[a, b, c, d] => Ok([a, b, c, d]),
            _ => Err(Error::WrongRank {
                op,
                expected: 4,
                found: self.shape.clone(),
            }),
        }
    }

    /// Returns `[d0, d1]` or [Error::WrongRank].
    pub fn try_dims2(&self, op: &'static str) -> Result<[usize; 2], Error> {
        match self.shape.as_slice() {
            &[a, b] => Ok([a, b]),
            _ => Err(Error::WrongRank {
                op,
                expected: 2,
                found: self.shape.clone(),
            }),
        }
    }

    pub fn try_zeros_like(&self) -> Result<Self, Error> {
        self.device.try_zeros(&self.shape)
    }

    pub fn try_fill_with(&mut self, value: E) -> Result<(), Error> {
        self.data_mut().fill(value);
        Ok(())
    }

    pub fn try_fill_with_zeros(&mut self) -> Result<(), Error> {
        self.try_fill_with(E::zero())
    }

    pub fn try_fill_with_ones(&mut self) -> Result<(), Error> {
        self.try_fill_with(E::one())
    }

    /// Replaces every element with a sample from `distr`, drawn from the owning
    /// device's rng.
    pub fn try_fill_with_distr<D: Distribution<f64>>(&mut self, distr: D) -> Result<(), Error> {
        let device = self.device.clone();
        let data = self.data_mut();
        device.with_rng(|rng| {
            for x in data.iter_mut() {
                *x = E::from_f64(distr.sample(rng));
            }
        });
        Ok(())
    }

    /// Overwrites the storage with `src`, which must have [Tensor::numel] elements.
    pub fn copy_from(&mut self, src: &[E]) -> Result<(), Error> {
        if src.len() != self.numel() {
            return Err(Error::WrongNumElements {
                expected: self.numel(),
                found: src.len(),
            });
        }
        self.data_mut().copy_from_slice(src);
        Ok(())
    }

    /// Copies the storage into a new allocation owned by `device`.
    pub fn try_to_device(&self, device: &Cpu) -> Result<Self, Error> {
        let mut data = device.try_alloc_elem(self.numel(), E::zero())?;
        data.copy_from_slice(self.as_slice());
        Ok(device.wrap(data, self.shape.clone()))
    }
}
