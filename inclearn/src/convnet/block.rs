use inclearn_core::prelude::*;
use log::debug;

use super::{BlockVariant, PreActResidualBlock, ShortcutAdapter};
use crate::nn::{
    BatchNorm2D, BatchNorm2DConfig, Conv2D, Conv2DConfig, ModuleVisitor, NodeMut, VisitModules,
};

/// Configuration of a single residual block.
///
/// A dimension increasing block runs its first convolution with stride 2,
/// doubles the channel count, and carries a [ShortcutAdapter]. Any other block
/// keeps both and uses the identity shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockConfig {
    pub variant: BlockVariant,
    pub in_planes: usize,
    pub increase_dim: bool,
    /// Marks the final block of a network. Does not change the computation.
    pub last: bool,
}

impl BlockConfig {
    pub fn new(variant: BlockVariant, in_planes: usize, increase_dim: bool) -> Self {
        Self {
            variant,
            in_planes,
            increase_dim,
            last: false,
        }
    }

    pub fn first_stride(&self) -> usize {
        if self.increase_dim {
            2
        } else {
            1
        }
    }

    pub fn out_planes(&self) -> usize {
        if self.increase_dim {
            2 * self.in_planes
        } else {
            self.in_planes
        }
    }
}

impl<E: Dtype> BuildOnDevice<E> for BlockConfig {
    type Built = Block<E>;
    fn try_build_on_device(&self, device: &Cpu) -> Result<Self::Built, Error> {
        if self.in_planes == 0 {
            return Err(Error::InvalidConfig("residual block with 0 planes".into()));
        }
        let (planes, stride) = (self.out_planes(), self.first_stride());
        debug!(
            "Building {:?} block {} -> {planes} planes, stride {stride}",
            self.variant, self.in_planes
        );
        let bn_a_planes = match self.variant {
            BlockVariant::PostActivation => planes,
            BlockVariant::PreActivation => self.in_planes,
        };
        let conv_a = Conv2DConfig::conv3x3(self.in_planes, planes, stride).try_build_on_device(device)?;
        let bn_a = BatchNorm2DConfig(bn_a_planes).try_build_on_device(device)?;
        let conv_b = Conv2DConfig::conv3x3(planes, planes, 1).try_build_on_device(device)?;
        let bn_b = BatchNorm2DConfig(planes).try_build_on_device(device)?;
        let shortcut = self.increase_dim.then(ShortcutAdapter::default);
        Ok(match self.variant {
            BlockVariant::PostActivation => Block::PostActivation(ResidualBlock {
                conv_a,
                bn_a,
                conv_b,
                bn_b,
                shortcut,
                last: self.last,
            }),
            BlockVariant::PreActivation => Block::PreActivation(PreActResidualBlock {
                bn_a,
                conv_a,
                bn_b,
                conv_b,
                shortcut,
                last: self.last,
            }),
        })
    }
}

/// Post-activation residual unit:
/// `out = shortcut(x) + bn_b(conv_b(relu(bn_a(conv_a(x)))))`.
///
/// There is no nonlinearity after the addition.
#[derive(Debug, Clone)]
pub struct ResidualBlock<E: Dtype> {
    pub conv_a: Conv2D<E>,
    pub bn_a: BatchNorm2D<E>,
    pub conv_b: Conv2D<E>,
    pub bn_b: BatchNorm2D<E>,
    pub shortcut: Option<ShortcutAdapter>,
    pub last: bool,
}

/// `shortcut(x) + y`, where a missing adapter means the identity.
pub(super) fn try_add_shortcut<E: Dtype>(
    shortcut: Option<&ShortcutAdapter>,
    x: Tensor<E>,
    y: Tensor<E>,
) -> Result<Tensor<E>, Error> {
    let x = match shortcut {
        Some(adapter) => adapter.try_forward(x)?,
        None => x,
    };
    x.try_add(&y)
}

impl<E: Dtype> ResidualBlock<E> {
    pub fn in_planes(&self) -> usize {
        self.conv_a.dims().1
    }

    pub fn out_planes(&self) -> usize {
        self.conv_b.dims().0
    }
}

impl<E: Dtype> Module<Tensor<E>> for ResidualBlock<E> {
    type Output = Tensor<E>;

    fn try_forward(&self, x: Tensor<E>) -> Result<Self::Output, Error> {
        let y = self.conv_a.try_forward(x.clone())?;
        let y = self.bn_a.try_forward(y)?.try_relu()?;
        let y = self.bn_b.try_forward(self.conv_b.try_forward(y)?)?;
        try_add_shortcut(self.shortcut.as_ref(), x, y)
    }

    fn try_forward_mut(&mut self, x: Tensor<E>) -> Result<Self::Output, Error> {
        let y = self.conv_a.try_forward(x.clone())?;
        let y = self.bn_a.try_forward_mut(y)?.try_relu()?;
        let y = self.bn_b.try_forward_mut(self.conv_b.try_forward(y)?)?;
        try_add_shortcut(self.shortcut.as_ref(), x, y)
    }
}

impl<E: Dtype> NumParams for ResidualBlock<E> {
    fn num_params(&self) -> usize {
        self.conv_a.num_params()
            + self.bn_a.num_params()
            + self.conv_b.num_params()
            + self.bn_b.num_params()
    }
}

impl<E: Dtype> ResetParams for ResidualBlock<E> {
    fn try_reset_params(&mut self) -> Result<(), Error> {
        self.conv_a.try_reset_params()?;
        self.bn_a.try_reset_params()?;
        self.conv_b.try_reset_params()?;
        self.bn_b.try_reset_params()
    }
}

impl<E: Dtype> ToDevice for ResidualBlock<E> {
    fn try_to_device(&self, device: &Cpu) -> Result<Self, Error> {
        Ok(Self {
            conv_a: self.conv_a.try_to_device(device)?,
            bn_a: self.bn_a.try_to_device(device)?,
            conv_b: self.conv_b.try_to_device(device)?,
            bn_b: self.bn_b.try_to_device(device)?,
            shortcut: self.shortcut,
            last: self.last,
        })
    }
}

impl<E: Dtype> VisitModules<E> for ResidualBlock<E> {
    fn try_visit_modules<V: ModuleVisitor<E>>(
        &mut self,
        location: &str,
        visitor: &mut V,
    ) -> Result<(), Error> {
        visitor.visit(location, NodeMut::ResidualBlock(self))?;
        self.conv_a
            .try_visit_modules(&join_location(location, "conv_a"), visitor)?;
        self.bn_a
            .try_visit_modules(&join_location(location, "bn_a"), visitor)?;
        self.conv_b
            .try_visit_modules(&join_location(location, "conv_b"), visitor)?;
        self.bn_b
            .try_visit_modules(&join_location(location, "bn_b"), visitor)
    }
}

#[cfg(feature = "safetensors")]
impl<E: Dtype> SaveSafeTensors for ResidualBlock<E> {
    fn write_safetensors(&self, location: &str, tensors: &mut Vec<SafeTensorEntry>) {
        self.conv_a
            .write_safetensors(&join_location(location, "conv_a"), tensors);
        self.bn_a
            .write_safetensors(&join_location(location, "bn_a"), tensors);
        self.conv_b
            .write_safetensors(&join_location(location, "conv_b"), tensors);
        self.bn_b
            .write_safetensors(&join_location(location, "bn_b"), tensors);
    }
}

#[cfg(feature = "safetensors")]
impl<E: Dtype> LoadSafeTensors for ResidualBlock<E> {
    fn read_safetensors(
        &mut self,
        location: &str,
        tensors: &safetensors::SafeTensors<'_>,
    ) -> Result<(), Error> {
        self.conv_a
            .read_safetensors(&join_location(location, "conv_a"), tensors)?;
        self.bn_a
            .read_safetensors(&join_location(location, "bn_a"), tensors)?;
        self.conv_b
            .read_safetensors(&join_location(location, "conv_b"), tensors)?;
        self.bn_b
            .read_safetensors(&join_location(location, "bn_b"), tensors)
    }
}

/// A residual block of either variant. The variant is fixed when the block
/// is built.
#[derive(Debug, Clone)]
pub enum Block<E: Dtype> {
    PostActivation(ResidualBlock<E>),
    PreActivation(PreActResidualBlock<E>),
}

impl<E: Dtype> Block<E> {
    pub fn variant(&self) -> BlockVariant {
        match self {
            Self::PostActivation(_) => BlockVariant::PostActivation,
            Self::PreActivation(_) => BlockVariant::PreActivation,
        }
    }

    pub fn in_planes(&self) -> usize {
        match self {
            Self::PostActivation(b) => b.in_planes(),
            Self::PreActivation(b) => b.in_planes(),
        }
    }

    pub fn out_planes(&self) -> usize {
        match self {
            Self::PostActivation(b) => b.out_planes(),
            Self::PreActivation(b) => b.out_planes(),
        }
    }

    pub fn increases_dim(&self) -> bool {
        match self {
            Self::PostActivation(b) => b.shortcut.is_some(),
            Self::PreActivation(b) => b.shortcut.is_some(),
        }
    }
}

impl<E: Dtype> Module<Tensor<E>> for Block<E> {
    type Output = Tensor<E>;

    fn try_forward(&self, x: Tensor<E>) -> Result<Self::Output, Error> {
        match self {
            Self::PostActivation(b) => b.try_forward(x),
            Self::PreActivation(b) => b.try_forward(x),
        }
    }

    fn try_forward_mut(&mut self, x: Tensor<E>) -> Result<Self::Output, Error> {
        match self {
            Self::PostActivation(b) => b.try_forward_mut(x),
            Self::PreActivation(b) => b.try_forward_mut(x),
        }
    }
}

impl<E: Dtype> NumParams for Block<E> {
    fn num_params(&self) -> usize {
        match self {
            Self::PostActivation(b) => b.num_params(),
            Self::PreActivation(b) => b.num_params(),
        }
    }
}

impl<E: Dtype> ResetParams for Block<E> {
    fn try_reset_params(&mut self) -> Result<(), Error> {
        match self {
            Self::PostActivation(b) => b.try_reset_params(),
            Self::PreActivation(b) => b.try_reset_params(),
        }
    }
}

impl<E: Dtype> ToDevice for Block<E> {
    fn try_to_device(&self, device: &Cpu) -> Result<Self, Error> {
        Ok(match self {
            Self::PostActivation(b) => Self::PostActivation(b.try_to_device(device)?),
            Self::PreActivation(b) => Self::PreActivation(b.try_to_device(device)?),
        })
    }
}

impl<E: Dtype> VisitModules<E> for Block<E> {
    fn try_visit_modules<V: ModuleVisitor<E>>(
        &mut self,
        location: &str,
        visitor: &mut V,
    ) -> Result<(), Error> {
        match self {
            Self::PostActivation(b) => b.try_visit_modules(location, visitor),
            Self::PreActivation(b) => b.try_visit_modules(location, visitor),
        }
    }
}

#[cfg(feature = "safetensors")]
impl<E: Dtype> SaveSafeTensors for Block<E> {
    fn write_safetensors(&self, location: &str, tensors: &mut Vec<SafeTensorEntry>) {
        match self {
            Self::PostActivation(b) => b.write_safetensors(location, tensors),
            Self::PreActivation(b) => b.write_safetensors(location, tensors),
        }
    }
}

#[cfg(feature = "safetensors")]
impl<E: Dtype> LoadSafeTensors for Block<E> {
    fn read_safetensors(
        &mut self,
        location: &str,
        tensors: &safetensors::SafeTensors<'_>,
    ) -> Result<(), Error> {
        match self {
            Self::PostActivation(b) => b.read_safetensors(location, tensors),
            Self::PreActivation(b) => b.read_safetensors(location, tensors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    fn post(in_planes: usize, increase_dim: bool) -> BlockConfig {
        BlockConfig::new(BlockVariant::PostActivation, in_planes, increase_dim)
    }

    #[test]
    fn test_block_config_wiring() {
        let cfg = post(16, true);
        assert_eq!((cfg.first_stride(), cfg.out_planes()), (2, 32));
        let cfg = post(16, false);
        assert_eq!((cfg.first_stride(), cfg.out_planes()), (1, 16));
    }

    #[test]
    fn test_residual_block_shapes() {
        let dev: TestDevice = Default::default();
        let block = dev.build_module::<TestDtype, _>(post(4, true));
        assert!(block.increases_dim());
        assert_eq!((block.in_planes(), block.out_planes()), (4, 8));
        let y = block.forward(dev.sample_normal(&[2, 4, 8, 8]));
        assert_eq!(y.shape(), &[2, 8, 4, 4]);

        let block = dev.build_module::<TestDtype, _>(post(4, false));
        assert!(!block.increases_dim());
        let y = block.forward(dev.sample_normal(&[2, 4, 8, 8]));
        assert_eq!(y.shape(), &[2, 4, 8, 8]);
    }

    #[test]
    fn test_residual_block_zero_bn_b_is_shortcut() {
        let dev: TestDevice = Default::default();
        let Block::PostActivation(mut block) = dev.build_module::<TestDtype, _>(post(2, true))
        else {
            panic!("expected a post-activation block");
        };
        block.bn_b.scale.try_fill_with_zeros().unwrap();
        let x: Tensor<TestDtype> = dev.sample_normal(&[1, 2, 4, 4]);
        let expected = ShortcutAdapter::default().forward(x.clone());
        assert_eq!(block.forward(x).as_vec(), expected.as_vec());
    }

    #[test]
    fn test_residual_block_rejects_wrong_channels() {
        let dev: TestDevice = Default::default();
        let block = dev.build_module::<TestDtype, _>(post(4, false));
        let x: Tensor<TestDtype> = dev.zeros(&[1, 3, 4, 4]);
        assert!(matches!(
            block.try_forward(x),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_residual_block_odd_extent_on_increase() {
        let dev: TestDevice = Default::default();
        let block = dev.build_module::<TestDtype, _>(post(2, true));
        let x: Tensor<TestDtype> = dev.zeros(&[1, 2, 5, 5]);
        assert!(block.try_forward(x).is_err());
    }

    #[test]
    fn test_residual_block_train_updates_running_stats() {
        let dev: TestDevice = Default::default();
        let mut block = dev.build_module::<TestDtype, _>(post(2, false));
        let x: Tensor<TestDtype> = dev.sample_normal(&[4, 2, 4, 4]);
        let before = match &block {
            Block::PostActivation(b) => b.bn_a.running_var.as_vec(),
            Block::PreActivation(_) => unreachable!(),
        };
        let y = block.forward_mut(x);
        assert_eq!(y.shape(), &[4, 2, 4, 4]);
        let Block::PostActivation(b) = &block else {
            unreachable!()
        };
        assert_ne!(b.bn_a.running_var.as_vec(), before);
    }

    #[test]
    fn test_zero_planes_rejected() {
        let dev: TestDevice = Default::default();
        let r = BuildOnDevice::<TestDtype>::try_build_on_device(&post(0, false), &dev);
        assert!(r.is_err());
    }
}
