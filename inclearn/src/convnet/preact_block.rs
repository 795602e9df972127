use inclearn_core::prelude::*;

use super::{block::try_add_shortcut, ShortcutAdapter};
use crate::nn::{BatchNorm2D, Conv2D, ModuleVisitor, NodeMut, VisitModules};

/// Pre-activation residual unit:
/// `out = shortcut(x) + conv_b(relu(bn_b(conv_a(relu(bn_a(x))))))`.
///
/// `bn_a` normalizes the block input, so it has `in_planes` channels, while
/// `bn_b` has the output width. Built through [super::BlockConfig].
#[derive(Debug, Clone)]
pub struct PreActResidualBlock<E: Dtype> {
    pub bn_a: BatchNorm2D<E>,
    pub conv_a: Conv2D<E>,
    pub bn_b: BatchNorm2D<E>,
    pub conv_b: Conv2D<E>,
    pub shortcut: Option<ShortcutAdapter>,
    pub last: bool,
}

impl<E: Dtype> PreActResidualBlock<E> {
    pub fn in_planes(&self) -> usize {
        self.conv_a.dims().1
    }

    pub fn out_planes(&self) -> usize {
        self.conv_b.dims().0
    }
}

impl<E: Dtype> Module<Tensor<E>> for PreActResidualBlock<E> {
    type Output = Tensor<E>;

    fn try_forward(&self, x: Tensor<E>) -> Result<Self::Output, Error> {
        let y = self.bn_a.try_forward(x.clone())?.try_relu()?;
        let y = self.conv_a.try_forward(y)?;
        let y = self.bn_b.try_forward(y)?.try_relu()?;
        let y = self.conv_b.try_forward(y)?;
        try_add_shortcut(self.shortcut.as_ref(), x, y)
    }

    fn try_forward_mut(&mut self, x: Tensor<E>) -> Result<Self::Output, Error> {
        let y = self.bn_a.try_forward_mut(x.clone())?.try_relu()?;
        let y = self.conv_a.try_forward(y)?;
        let y = self.bn_b.try_forward_mut(y)?.try_relu()?;
        let y = self.conv_b.try_forward(y)?;
        try_add_shortcut(self.shortcut.as_ref(), x, y)
    }
}

impl<E: Dtype> NumParams for PreActResidualBlock<E> {
    fn num_params(&self) -> usize {
        self.bn_a.num_params()
            + self.conv_a.num_params()
            + self.bn_b.num_params()
            + self.conv_b.num_params()
    }
}

impl<E: Dtype> ResetParams for PreActResidualBlock<E> {
    fn try_reset_params(&mut self) -> Result<(), Error> {
        self.bn_a.try_reset_params()?;
        self.conv_a.try_reset_params()?;
        self.bn_b.try_reset_params()?;
        self.conv_b.try_reset_params()
    }
}

impl<E: Dtype> ToDevice for PreActResidualBlock<E> {
    fn try_to_device(&self, device: &Cpu) -> Result<Self, Error> {
        Ok(Self {
            bn_a: self.bn_a.try_to_device(device)?,
            conv_a: self.conv_a.try_to_device(device)?,
            bn_b: self.bn_b.try_to_device(device)?,
            conv_b: self.conv_b.try_to_device(device)?,
            shortcut: self.shortcut,
            last: self.last,
        })
    }
}

impl<E: Dtype> VisitModules<E> for PreActResidualBlock<E> {
    fn try_visit_modules<V: ModuleVisitor<E>>(
        &mut self,
        location: &str,
        visitor: &mut V,
    ) -> Result<(), Error> {
        visitor.visit(location, NodeMut::PreActResidualBlock(self))?;
        self.bn_a
            .try_visit_modules(&join_location(location, "bn_a"), visitor)?;
        self.conv_a
            .try_visit_modules(&join_location(location, "conv_a"), visitor)?;
        self.bn_b
            .try_visit_modules(&join_location(location, "bn_b"), visitor)?;
        self.conv_b
            .try_visit_modules(&join_location(location, "conv_b"), visitor)
    }
}

#[cfg(feature = "safetensors")]
impl<E: Dtype> SaveSafeTensors for PreActResidualBlock<E> {
    fn write_safetensors(&self, location: &str, tensors: &mut Vec<SafeTensorEntry>) {
        self.bn_a
            .write_safetensors(&join_location(location, "bn_a"), tensors);
        self.conv_a
            .write_safetensors(&join_location(location, "conv_a"), tensors);
        self.bn_b
            .write_safetensors(&join_location(location, "bn_b"), tensors);
        self.conv_b
            .write_safetensors(&join_location(location, "conv_b"), tensors);
    }
}

#[cfg(feature = "safetensors")]
impl<E: Dtype> LoadSafeTensors for PreActResidualBlock<E> {
    fn read_safetensors(
        &mut self,
        location: &str,
        tensors: &safetensors::SafeTensors<'_>,
    ) -> Result<(), Error> {
        self.bn_a
            .read_safetensors(&join_location(location, "bn_a"), tensors)?;
        self.conv_a
            .read_safetensors(&join_location(location, "conv_a"), tensors)?;
        self.bn_b
            .read_safetensors(&join_location(location, "bn_b"), tensors)?;
        self.conv_b
            .read_safetensors(&join_location(location, "conv_b"), tensors)
    }
}
