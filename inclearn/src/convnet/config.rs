use std::path::Path;

use inclearn_core::tensor::Error;
use log::debug;
use serde::{Deserialize, Serialize};

/// Number of stride 2 stages, so inputs must be a multiple of `2^2` on a side.
pub const NUM_DOWNSAMPLES: u32 = 2;

/// Which residual unit every stage of a network is built from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockVariant {
    /// conv, bn, relu, conv, bn, then the shortcut is added.
    #[default]
    PostActivation,
    /// bn, relu, conv, bn, relu, conv, then the shortcut is added.
    PreActivation,
}

impl BlockVariant {
    pub fn from_preact(preact: bool) -> Self {
        if preact {
            Self::PreActivation
        } else {
            Self::PostActivation
        }
    }
}

/// Everything needed to build a [crate::convnet::CifarResNet].
///
/// Deserialization is strict: an unknown key is an error, missing keys take
/// their default.
///
/// ```rust
/// # use inclearn::convnet::ResNetConfig;
/// let cfg = ResNetConfig::from_toml_str("n = 3\nzero_residual = false").unwrap();
/// assert_eq!(cfg.n, 3);
/// assert_eq!(cfg.channels, 3);
/// assert!(ResNetConfig::from_toml_str("depth = 3").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ResNetConfig {
    /// Blocks per stage. Stage 2 gets `n - 1` and stage 3 `n - 2` on top of
    /// their dimension increasing block.
    pub n: usize,
    /// Channels of the input images.
    pub channels: usize,
    pub preact: bool,
    /// Zero the last batch norm scale of every post-activation block, so each
    /// block starts out as the identity on its shortcut.
    pub zero_residual: bool,
    /// Side length of the images the network is built for.
    pub image_size: usize,
}

impl Default for ResNetConfig {
    fn default() -> Self {
        Self {
            n: 5,
            channels: 3,
            preact: false,
            zero_residual: true,
            image_size: 32,
        }
    }
}

impl ResNetConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        let config: Self =
            toml::from_str(s).map_err(|e| Error::InvalidConfig(format!("resnet config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        debug!("Reading resnet config from {}", path.as_ref().display());
        let parsing_result = std::fs::read_to_string(path)?;
        Self::from_toml_str(&parsing_result)
    }

    pub fn variant(&self) -> BlockVariant {
        BlockVariant::from_preact(self.preact)
    }

    /// Rejects configurations that cannot produce a well formed graph: no
    /// input channels, or an image size that would reach an odd or empty
    /// spatial extent at a downsampling stage.
    pub fn validate(&self) -> Result<(), Error> {
        if self.channels == 0 {
            return Err(Error::InvalidConfig("channels must be at least 1".into()));
        }
        let factor = 1 << NUM_DOWNSAMPLES;
        if self.image_size == 0 || self.image_size % factor != 0 {
            return Err(Error::InvalidConfig(format!(
                "image_size {} must be a positive multiple of {factor}",
                self.image_size
            )));
        }
        Ok(())
    }

    /// Side length of the feature map coming out of each of the four stages.
    pub fn stage_sides(&self) -> [usize; 4] {
        let s = self.image_size;
        [s, s / 2, s / 4, s / 4]
    }
}
