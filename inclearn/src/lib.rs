//! Cifar residual backbones for class-incremental learning, built on
//! [inclearn_core].
//!
//! # Building a backbone
//!
//! A [convnet::CifarResNet] is fully described by a [convnet::ResNetConfig],
//! which can be written by hand or read from TOML:
//!
//! ```rust
//! # use inclearn::prelude::*;
//! let config = ResNetConfig::from_toml_str(
//!     r#"
//!     n = 1
//!     preact = false
//!     zero_residual = true
//!     image_size = 16
//!     "#,
//! )
//! .unwrap();
//! let dev = Cpu::seed_from_u64(0);
//! let net = get_convnet::<f32>("rebuffi", &config, &dev).unwrap();
//! ```
//!
//! # Running it
//!
//! [nn_traits::Module::forward] is the inference pass, and
//! [nn_traits::Module::forward_mut] the training pass that also updates the
//! batch norm running statistics. Both return the raw and the activated
//! pooled features. [convnet::CifarResNet::forward_with] can also return
//! the output of every stage:
//!
//! ```rust
//! # use inclearn::prelude::*;
//! # let config = ResNetConfig { n: 1, image_size: 16, ..Default::default() };
//! # let dev = Cpu::seed_from_u64(0);
//! # let net = get_convnet::<f32>("rebuffi", &config, &dev).unwrap();
//! let x: Tensor<f32> = dev.sample_normal(&[4, 3, 16, 16]);
//! let out = net.forward_with(x, true);
//! assert_eq!(out.features.shape(), &[4, 64]);
//! let [s1, _, _, s4] = out.attention.unwrap();
//! assert_eq!(s1.shape(), &[4, 16, 16, 16]);
//! assert_eq!(s4.shape(), &[4, 64, 4, 4]);
//! ```
//!
//! # Logging
//!
//! Construction and initialization are reported through the [log] facade.
//! No logger is installed by this crate.

pub mod convnet;
pub mod nn;
pub mod utils;

pub use inclearn_core::{data, dtypes, nn_traits, tensor, tensor_ops};

/// Contains subset of all public exports.
pub mod prelude {
    pub use crate::convnet::{get_convnet, resnet_rebuffi, CifarResNet, ResNetConfig, ResNetOutput};
    pub use crate::nn::*;
    pub use crate::utils::*;
    pub use inclearn_core::prelude::*;
}
