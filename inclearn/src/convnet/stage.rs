use inclearn_core::prelude::*;

use super::{Block, BlockConfig, BlockVariant};

/// A stage is a plain sequence of blocks, run one after the other.
pub type Stage<E> = Vec<Block<E>>;

/// An optional dimension increasing block followed by `n` blocks that keep
/// the width they are given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageConfig {
    pub variant: BlockVariant,
    pub planes: usize,
    pub n: usize,
    pub increase_dim: bool,
}

/// **Pytorch Equivalent**: `_make_layer(Block, planes, increase_dim, n=n)`
pub fn make_stage(variant: BlockVariant, planes: usize, n: usize, increase_dim: bool) -> StageConfig {
    StageConfig {
        variant,
        planes,
        n,
        increase_dim,
    }
}

impl StageConfig {
    /// Width of every block after the optional increase.
    pub fn out_planes(&self) -> usize {
        if self.increase_dim {
            2 * self.planes
        } else {
            self.planes
        }
    }

    pub fn blocks(&self) -> Vec<BlockConfig> {
        let mut blocks = Vec::with_capacity(self.n + usize::from(self.increase_dim));
        if self.increase_dim {
            blocks.push(BlockConfig::new(self.variant, self.planes, true));
        }
        let planes = self.out_planes();
        blocks.extend((0..self.n).map(|_| BlockConfig::new(self.variant, planes, false)));
        blocks
    }
}

impl<E: Dtype> BuildOnDevice<E> for StageConfig {
    type Built = Stage<E>;
    fn try_build_on_device(&self, device: &Cpu) -> Result<Self::Built, Error> {
        self.blocks().try_build_on_device(device)
    }
}
