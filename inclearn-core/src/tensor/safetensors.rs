use super::{Error, Tensor};
use crate::dtypes::Dtype;
use safetensors::tensor::{SafeTensorError, SafeTensors};
use std::vec::Vec;

impl<E: Dtype> Tensor<E> {
    /// Loads data from the [SafeTensors] entry stored under `key`.
    ///
    /// The stored shape and dtype must match this tensor exactly.
    pub fn load_safetensor(
        &mut self,
        tensors: &SafeTensors,
        key: &str,
        skip_missing: bool,
    ) -> Result<(), Error> {
        let tensor_view = match tensors.tensor(key) {
            Ok(ok) => ok,
            Err(SafeTensorError::TensorNotFound(_name)) if skip_missing => {
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        if tensor_view.shape() != self.shape() {
            return Err(Error::ShapeMismatch {
                op: "load_safetensor",
                lhs: self.shape.clone(),
                rhs: tensor_view.shape().to_vec(),
            });
        }
        if tensor_view.dtype() != E::SAFETENSORS_DTYPE {
            return Err(Error::InvalidConfig(format!(
                "safetensors entry {key} has dtype {:?}, expected {:?}",
                tensor_view.dtype(),
                E::SAFETENSORS_DTYPE
            )));
        }
        let v = tensor_view.data();
        let mut c = Vec::with_capacity(v.len() / E::NUM_BYTES);
        for chunk in v.chunks_exact(E::NUM_BYTES) {
            c.push(E::from_le_chunk(chunk).ok_or(Error::WrongNumElements {
                expected: E::NUM_BYTES,
                found: chunk.len(),
            })?);
        }
        self.copy_from(&c)
    }

    /// Encodes this tensor as a `(name, dtype, shape, bytes)` entry.
    pub fn to_safetensor_entry(&self, key: &str) -> (String, safetensors::Dtype, Vec<usize>, Vec<u8>) {
        let mut bytes = Vec::with_capacity(self.numel() * E::NUM_BYTES);
        for x in self.as_slice() {
            x.extend_le_bytes(&mut bytes);
        }
        (
            key.to_string(),
            E::SAFETENSORS_DTYPE,
            self.shape.clone(),
            bytes,
        )
    }
}
