//! Traits shared by every neural network module.

mod vecs;

use crate::{
    dtypes::Dtype,
    tensor::{Cpu, Error, Tensor},
};

/// A unit of computation taking an `X` and producing [Module::Output].
///
/// [Module::try_forward] is inference: it never mutates the module.
/// [Module::try_forward_mut] is the training mode pass, which is allowed to
/// update internal state such as running statistics.
pub trait Module<X> {
    type Output;

    fn try_forward(&self, x: X) -> Result<Self::Output, Error>;

    fn try_forward_mut(&mut self, x: X) -> Result<Self::Output, Error> {
        self.try_forward(x)
    }

    fn forward(&self, x: X) -> Self::Output {
        self.try_forward(x).unwrap()
    }

    fn forward_mut(&mut self, x: X) -> Self::Output {
        self.try_forward_mut(x).unwrap()
    }
}

/// Something that can allocate a module. Usually a config struct.
pub trait BuildOnDevice<E: Dtype>: Clone {
    type Built: Clone + std::fmt::Debug;
    fn build_on_device(&self, device: &Cpu) -> Self::Built {
        self.try_build_on_device(device).unwrap()
    }
    fn try_build_on_device(&self, device: &Cpu) -> Result<Self::Built, Error>;
}

/// Re-initializes every parameter of a module.
pub trait ResetParams {
    fn reset_params(&mut self) {
        self.try_reset_params().unwrap()
    }
    fn try_reset_params(&mut self) -> Result<(), Error>;
}

/// Builds a module and immediately resets its parameters.
///
/// ```rust
/// # use inclearn_core::prelude::*;
/// # #[derive(Clone, Debug)]
/// # struct Bias(usize);
/// # #[derive(Clone, Debug)]
/// # struct BiasModule(Tensor<f32>);
/// # impl BuildOnDevice<f32> for Bias {
/// #     type Built = BiasModule;
/// #     fn try_build_on_device(&self, dev: &Cpu) -> Result<BiasModule, Error> {
/// #         Ok(BiasModule(dev.try_zeros(&[self.0])?))
/// #     }
/// # }
/// # impl ResetParams for BiasModule {
/// #     fn try_reset_params(&mut self) -> Result<(), Error> {
/// #         self.0.try_fill_with_ones()
/// #     }
/// # }
/// let dev: Cpu = Default::default();
/// let m = dev.build_module::<f32, _>(Bias(3));
/// assert_eq!(m.0.as_vec(), [1.0; 3]);
/// ```
pub trait BuildModuleExt {
    fn try_build_module<E: Dtype, M: BuildOnDevice<E>>(&self, m: M) -> Result<M::Built, Error>
    where
        M::Built: ResetParams;

    fn build_module<E: Dtype, M: BuildOnDevice<E>>(&self, m: M) -> M::Built
    where
        M::Built: ResetParams,
    {
        self.try_build_module(m).unwrap()
    }
}

impl BuildModuleExt for Cpu {
    fn try_build_module<E: Dtype, M: BuildOnDevice<E>>(&self, m: M) -> Result<M::Built, Error>
    where
        M::Built: ResetParams,
    {
        let mut module = m.try_build_on_device(self)?;
        module.try_reset_params()?;
        Ok(module)
    }
}

/// Copies a module, with the same structure and values, onto another device.
pub trait ToDevice: Sized {
    fn try_to_device(&self, device: &Cpu) -> Result<Self, Error>;

    fn to_device(&self, device: &Cpu) -> Self {
        self.try_to_device(device).unwrap()
    }
}

/// Number of trainable scalars a module holds. Buffers such as running
/// statistics are not counted.
pub trait NumParams {
    fn num_params(&self) -> usize;
}

/// Tensor entry as written into a safetensors file: `(name, dtype, shape, bytes)`.
#[cfg(feature = "safetensors")]
pub type SafeTensorEntry = (String, safetensors::Dtype, Vec<usize>, Vec<u8>);

#[cfg(feature = "safetensors")]
pub trait SaveSafeTensors {
    fn save_safetensors<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Error> {
        let mut tensors = Vec::new();
        self.write_safetensors("", &mut tensors);
        let views = tensors
            .iter()
            .map(|(k, dtype, shape, data)| {
                safetensors::tensor::TensorView::new(*dtype, shape.clone(), data)
                    .map(|view| (k.clone(), view))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let views = views.iter().map(|(k, v)| (k.clone(), v)).collect::<Vec<_>>();
        safetensors::serialize_to_file(views, &None, path.as_ref())?;
        Ok(())
    }

    fn write_safetensors(&self, location: &str, tensors: &mut Vec<SafeTensorEntry>);
}

#[cfg(feature = "safetensors")]
pub trait LoadSafeTensors {
    fn load_safetensors<P: AsRef<std::path::Path>>(&mut self, path: P) -> Result<(), Error> {
        let f = std::fs::File::open(path)?;
        // SAFETY: the file is only read while the map is alive and is not
        // expected to be modified concurrently.
        let buffer = unsafe { memmap2::MmapOptions::new().map(&f)? };
        let tensors = safetensors::SafeTensors::deserialize(&buffer)?;
        self.read_safetensors("", &tensors)
    }

    fn read_safetensors(
        &mut self,
        location: &str,
        tensors: &safetensors::SafeTensors<'_>,
    ) -> Result<(), Error>;
}

/// Joins a parent location and a field name with a `.`, skipping the
/// separator at the root.
pub fn join_location(location: &str, field: &str) -> String {
    if location.is_empty() {
        field.to_string()
    } else {
        format!("{location}.{field}")
    }
}

impl<E: Dtype> ToDevice for Tensor<E> {
    fn try_to_device(&self, device: &Cpu) -> Result<Self, Error> {
        Tensor::try_to_device(self, device)
    }
}

impl<E: Dtype> NumParams for Tensor<E> {
    fn num_params(&self) -> usize {
        self.numel()
    }
}

#[cfg(feature = "safetensors")]
impl<E: Dtype> SaveSafeTensors for Tensor<E> {
    fn write_safetensors(&self, location: &str, tensors: &mut Vec<SafeTensorEntry>) {
        tensors.push(self.to_safetensor_entry(location));
    }
}

#[cfg(feature = "safetensors")]
impl<E: Dtype> LoadSafeTensors for Tensor<E> {
    fn read_safetensors(
        &mut self,
        location: &str,
        tensors: &safetensors::SafeTensors<'_>,
    ) -> Result<(), Error> {
        self.load_safetensor(tensors, location, false)
    }
}
