use inclearn_core::prelude::*;
use log::debug;

use crate::nn::{ModuleVisitor, NodeMut};

/// Initializes every convolution with Kaiming normal (fan out, ReLU gain) and
/// resets every batch norm to the identity: scale 1, shift 0, running mean 0,
/// running variance 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct InitPolicy {
    pub convs: usize,
    pub batch_norms: usize,
}

impl<E: Dtype> ModuleVisitor<E> for InitPolicy {
    fn visit(&mut self, _location: &str, node: NodeMut<'_, E>) -> Result<(), Error> {
        match node {
            NodeMut::Conv2D(conv) => {
                self.convs += 1;
                conv.try_kaiming_normal_fan_out()
            }
            NodeMut::BatchNorm2D(bn) => {
                self.batch_norms += 1;
                bn.try_reset_params()
            }
            NodeMut::ResidualBlock(_) | NodeMut::PreActResidualBlock(_) => Ok(()),
        }
    }
}

/// Zeroes the scale of the second batch norm of every post-activation block,
/// so that right after initialization each such block outputs its shortcut.
/// Pre-activation blocks are left untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroResidual {
    pub blocks: usize,
}

impl<E: Dtype> ModuleVisitor<E> for ZeroResidual {
    fn visit(&mut self, location: &str, node: NodeMut<'_, E>) -> Result<(), Error> {
        if let NodeMut::ResidualBlock(block) = node {
            debug!("Zeroing {location}.bn_b.scale");
            self.blocks += 1;
            block.bn_b.scale.try_fill_with_zeros()?;
        }
        Ok(())
    }
}
