//! The Cifar residual backbone: block variants, stages, the full network and
//! its initialization policy.
//!
//! Networks are usually obtained by name through [get_convnet]:
//!
//! ```rust
//! # use inclearn::prelude::*;
//! let dev: Cpu = Default::default();
//! let config = ResNetConfig { n: 1, image_size: 8, ..Default::default() };
//! let net = get_convnet::<f32>("rebuffi", &config, &dev).unwrap();
//! assert_eq!(net.out_dim(), 64);
//! assert!(get_convnet::<f32>("resnet18", &config, &dev).is_err());
//! ```

mod block;
mod config;
mod init;
mod preact_block;
mod resnet;
mod shortcut;
mod stage;

pub use block::{Block, BlockConfig, ResidualBlock};
pub use config::{BlockVariant, ResNetConfig, NUM_DOWNSAMPLES};
pub use init::{InitPolicy, ZeroResidual};
pub use preact_block::PreActResidualBlock;
pub use resnet::{CifarResNet, ResNetOutput, FEATURE_DIM, STEM_PLANES};
pub use shortcut::ShortcutAdapter;
pub use stage::{make_stage, Stage, StageConfig};

use inclearn_core::prelude::*;
use log::info;

/// Builds and initializes the backbone registered under `name`. The only
/// backbone is `"rebuffi"`, the [CifarResNet].
pub fn get_convnet<E: Dtype>(
    name: &str,
    config: &ResNetConfig,
    device: &Cpu,
) -> Result<CifarResNet<E>, Error> {
    match name {
        "rebuffi" => {
            info!("Building convnet {name}");
            device.try_build_module::<E, _>(*config)
        }
        _ => Err(Error::InvalidConfig(format!("unknown convnet {name}"))),
    }
}

/// A [CifarResNet] with `n` blocks per stage and every other setting taken
/// from `config`.
pub fn resnet_rebuffi<E: Dtype>(
    n: usize,
    config: ResNetConfig,
    device: &Cpu,
) -> Result<CifarResNet<E>, Error> {
    device.try_build_module::<E, _>(ResNetConfig { n, ..config })
}
