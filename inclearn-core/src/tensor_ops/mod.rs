//! Operations on [crate::tensor::Tensor].
//!
//! Every op comes in a fallible `try_*` flavor returning
//! [crate::tensor::Error]. The most common ones also have a panicking
//! counterpart without the prefix.
//!
//! Ops that take `self` by value reuse its storage when it is not shared, so
//! chaining them allocates as little as possible:
//!
//! ```rust
//! # use inclearn_core::prelude::*;
//! let dev: Cpu = Default::default();
//! let x: Tensor<f32> = dev.tensor_from_vec(vec![-1.0, 2.0], &[2]);
//! let y = x.relu().add(&dev.ones(&[2]));
//! assert_eq!(y.as_vec(), [1.0, 3.0]);
//! ```

mod add;
mod argmax;
mod concat;
mod conv2d;
mod matmul;
mod nans;
mod normalize;
mod pool_global;
mod relu;
mod subsample;

pub use conv2d::conv2d_out_dim;
pub use matmul::MatMulImpl;
