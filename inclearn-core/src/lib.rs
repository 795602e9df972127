//! # inclearn-core
//!
//! The tensor and module plumbing underneath the `inclearn` backbones.
//!
//! # Tensors & Devices
//!
//! *See [dtypes] and [tensor] for more information.*
//!
//! A [`tensor::Tensor`] is a contiguous, row major nd-array whose shape is
//! known at run time. The depth of a network and the size of the images it
//! sees are configuration values, so nothing here is tracked at compile time.
//!
//! Tensors are allocated by a [`tensor::Cpu`] device, which also owns the
//! random number generator used to initialize parameters:
//!
//! ```rust
//! # use inclearn_core::prelude::*;
//! let dev = Cpu::seed_from_u64(0);
//! let w: Tensor<f32> = dev.sample_normal(&[16, 3, 3, 3]);
//! assert_eq!(w.numel(), 16 * 3 * 3 * 3);
//! ```
//!
//! # Tensor Operations
//!
//! *See [tensor_ops] for more information.*
//!
//! | Operation | inclearn-core | pytorch |
//! | --- | --- | --- |
//! | 2d Convolution | `x.try_conv2d(&w, stride, padding)` | `torch.conv2d` |
//! | ReLU | `x.try_relu()` | `torch.relu` |
//! | Strided subsample | `x.try_stride_subsample(2)` | `x[..., ::2, ::2]` |
//! | Concat | `Tensor::try_concat_along(&[a, b], axis)` | `torch.cat` |
//! | Global average pool | `x.try_mean_spatial()` | `F.adaptive_avg_pool2d(x, 1)` |
//! | Argmax | `x.try_argmax_last()` | `x.argmax(-1)` |
//!
//! # Modules
//!
//! *See [nn_traits] for more information.*
//!
//! Neural network building blocks implement [`nn_traits::Module`], are built
//! from a config with [`nn_traits::BuildOnDevice`] and initialized with
//! [`nn_traits::ResetParams`].

pub mod data;
pub mod dtypes;
pub mod nn_traits;
pub mod tensor;
pub mod tensor_ops;

/// Contains subset of all public exports.
pub mod prelude {
    pub use crate::data::*;
    pub use crate::dtypes::Dtype;
    pub use crate::nn_traits::*;
    pub use crate::tensor::*;
    pub use crate::tensor_ops::*;
}
