use inclearn_core::prelude::*;
use log::{debug, info};

use super::{
    make_stage, Block, BlockConfig, InitPolicy, ResNetConfig, Stage, StageConfig, ZeroResidual,
    NUM_DOWNSAMPLES,
};
use crate::nn::{
    AvgPoolGlobal, BatchNorm2D, BatchNorm2DConfig, Conv2D, Conv2DConfig, ModuleVisitor,
    VisitModules,
};

/// Channels produced by the stem.
pub const STEM_PLANES: usize = 16;

/// Width of the feature vectors, i.e. the channels of the last stage.
pub const FEATURE_DIM: usize = 64;

/// What a forward pass of [CifarResNet] returns.
#[derive(Debug, Clone)]
pub struct ResNetOutput<E: Dtype> {
    /// Pooled output of the last stage, `(batch, 64)`.
    pub raw_features: Tensor<E>,
    /// Pooled output of the last stage after a ReLU, `(batch, 64)`.
    pub features: Tensor<E>,
    /// The four stage outputs, in order, when requested.
    pub attention: Option<[Tensor<E>; 4]>,
}

/// Residual network for Cifar sized images, as described in
/// [Deep Residual Learning for Image Recognition](https://arxiv.org/abs/1512.03385).
///
/// ```text
/// stem: conv3x3(channels -> 16) -> bn -> relu
/// stage_1: n blocks at 16 planes
/// stage_2: increase to 32, then n - 1 blocks
/// stage_3: increase to 64, then n - 2 blocks
/// stage_4: one block at 64 planes
/// head: global average pooling
/// ```
///
/// Built from a [ResNetConfig]. Building through
/// [BuildModuleExt::build_module] also applies the initialization policy:
///
/// ```rust
/// # use inclearn::prelude::*;
/// let dev: Cpu = Default::default();
/// let config = ResNetConfig { n: 1, image_size: 8, ..Default::default() };
/// let net = dev.build_module::<f32, _>(config);
/// let out = net.forward(dev.sample_normal(&[2, 3, 8, 8]));
/// assert_eq!(out.features.shape(), &[2, 64]);
/// ```
#[derive(Debug, Clone)]
pub struct CifarResNet<E: Dtype> {
    pub config: ResNetConfig,
    pub stem_conv: Conv2D<E>,
    pub stem_bn: BatchNorm2D<E>,
    pub stage_1: Stage<E>,
    pub stage_2: Stage<E>,
    pub stage_3: Stage<E>,
    pub stage_4: Block<E>,
    pub pool: AvgPoolGlobal,
}

impl ResNetConfig {
    /// The stage configs and final block, in order. Stage 2 and 3 shrink by
    /// one and two blocks, saturating at zero.
    pub fn stages(&self) -> ([StageConfig; 3], BlockConfig) {
        let variant = self.variant();
        let stage_1 = make_stage(variant, STEM_PLANES, self.n, false);
        let stage_2 = make_stage(variant, stage_1.out_planes(), self.n.saturating_sub(1), true);
        let stage_3 = make_stage(variant, stage_2.out_planes(), self.n.saturating_sub(2), true);
        let stage_4 = BlockConfig {
            last: true,
            ..BlockConfig::new(variant, stage_3.out_planes(), false)
        };
        ([stage_1, stage_2, stage_3], stage_4)
    }
}

impl<E: Dtype> BuildOnDevice<E> for ResNetConfig {
    type Built = CifarResNet<E>;
    fn try_build_on_device(&self, device: &Cpu) -> Result<Self::Built, Error> {
        self.validate()?;
        let ([s1, s2, s3], s4) = self.stages();
        let mut planes = STEM_PLANES;
        for (i, stage) in [s1, s2, s3].iter().enumerate() {
            if stage.planes != planes {
                return Err(Error::ShapeMismatch {
                    op: "cifar_resnet",
                    lhs: vec![i, planes],
                    rhs: vec![i + 1, stage.planes],
                });
            }
            debug!(
                "stage_{}: {} blocks, {} -> {} planes",
                i + 1,
                stage.n + usize::from(stage.increase_dim),
                stage.planes,
                stage.out_planes()
            );
            planes = stage.out_planes();
        }
        if s4.in_planes != planes || s4.out_planes() != FEATURE_DIM {
            return Err(Error::ShapeMismatch {
                op: "cifar_resnet",
                lhs: vec![3, planes],
                rhs: vec![4, s4.in_planes],
            });
        }
        Ok(CifarResNet {
            config: *self,
            stem_conv: Conv2DConfig::conv3x3(self.channels, STEM_PLANES, 1)
                .try_build_on_device(device)?,
            stem_bn: BatchNorm2DConfig(STEM_PLANES).try_build_on_device(device)?,
            stage_1: s1.try_build_on_device(device)?,
            stage_2: s2.try_build_on_device(device)?,
            stage_3: s3.try_build_on_device(device)?,
            stage_4: s4.try_build_on_device(device)?,
            pool: AvgPoolGlobal,
        })
    }
}

impl<E: Dtype> ResetParams for CifarResNet<E> {
    fn try_reset_params(&mut self) -> Result<(), Error> {
        let mut init = InitPolicy::default();
        self.try_visit_modules("", &mut init)?;
        let mut zeroed = ZeroResidual::default();
        if self.config.zero_residual {
            self.try_visit_modules("", &mut zeroed)?;
        }
        info!(
            "Initialized CifarResNet (n={}, preact={}): {} convs, {} batch norms, {} zeroed residuals, {} parameters",
            self.config.n,
            self.config.preact,
            init.convs,
            init.batch_norms,
            zeroed.blocks,
            self.num_params()
        );
        Ok(())
    }
}

impl<E: Dtype> CifarResNet<E> {
    pub fn out_dim(&self) -> usize {
        FEATURE_DIM
    }

    /// Checks `x` is `(batch, channels, height, width)` with the configured
    /// channels, and a height and width that survive every downsampling.
    pub fn check_input(&self, x: &Tensor<E>) -> Result<(), Error> {
        let [_, c, h, w] = x.try_dims4("cifar_resnet")?;
        if c != self.config.channels {
            return Err(Error::ShapeMismatch {
                op: "cifar_resnet",
                lhs: vec![self.config.channels],
                rhs: x.shape().to_vec(),
            });
        }
        let factor = 1 << NUM_DOWNSAMPLES;
        if h == 0 || w == 0 || h % factor != 0 || w % factor != 0 {
            return Err(Error::IndivisibleSpatial {
                op: "cifar_resnet",
                height: h,
                width: w,
                factor,
            });
        }
        Ok(())
    }

    fn head(
        &self,
        stages: [Tensor<E>; 4],
        attention_hook: bool,
    ) -> Result<ResNetOutput<E>, Error> {
        let x_s4 = &stages[3];
        let raw_features = self.pool.try_forward(x_s4.clone())?;
        let features = self.pool.try_forward(x_s4.clone().try_relu()?)?;
        Ok(ResNetOutput {
            raw_features,
            features,
            attention: attention_hook.then_some(stages),
        })
    }

    /// Inference forward pass. With `attention_hook` the output also carries
    /// the four stage outputs.
    pub fn try_forward_with(
        &self,
        x: Tensor<E>,
        attention_hook: bool,
    ) -> Result<ResNetOutput<E>, Error> {
        self.check_input(&x)?;
        let x = self.stem_conv.try_forward(x)?;
        let x = self.stem_bn.try_forward(x)?.try_relu()?;
        let x_s1 = self.stage_1.try_forward(x)?;
        let x_s2 = self.stage_2.try_forward(x_s1.clone())?;
        let x_s3 = self.stage_3.try_forward(x_s2.clone())?;
        let x_s4 = self.stage_4.try_forward(x_s3.clone())?;
        self.head([x_s1, x_s2, x_s3, x_s4], attention_hook)
    }

    /// Training forward pass: batch norms use batch statistics and update
    /// their running statistics.
    pub fn try_forward_mut_with(
        &mut self,
        x: Tensor<E>,
        attention_hook: bool,
    ) -> Result<ResNetOutput<E>, Error> {
        self.check_input(&x)?;
        let x = self.stem_conv.try_forward(x)?;
        let x = self.stem_bn.try_forward_mut(x)?.try_relu()?;
        let x_s1 = self.stage_1.try_forward_mut(x)?;
        let x_s2 = self.stage_2.try_forward_mut(x_s1.clone())?;
        let x_s3 = self.stage_3.try_forward_mut(x_s2.clone())?;
        let x_s4 = self.stage_4.try_forward_mut(x_s3.clone())?;
        self.head([x_s1, x_s2, x_s3, x_s4], attention_hook)
    }

    pub fn forward_with(&self, x: Tensor<E>, attention_hook: bool) -> ResNetOutput<E> {
        self.try_forward_with(x, attention_hook).unwrap()
    }
}

impl<E: Dtype> Module<Tensor<E>> for CifarResNet<E> {
    type Output = ResNetOutput<E>;

    fn try_forward(&self, x: Tensor<E>) -> Result<Self::Output, Error> {
        self.try_forward_with(x, false)
    }

    fn try_forward_mut(&mut self, x: Tensor<E>) -> Result<Self::Output, Error> {
        self.try_forward_mut_with(x, false)
    }
}

impl<E: Dtype> NumParams for CifarResNet<E> {
    fn num_params(&self) -> usize {
        self.stem_conv.num_params()
            + self.stem_bn.num_params()
            + self.stage_1.num_params()
            + self.stage_2.num_params()
            + self.stage_3.num_params()
            + self.stage_4.num_params()
    }
}

impl<E: Dtype> ToDevice for CifarResNet<E> {
    fn try_to_device(&self, device: &Cpu) -> Result<Self, Error> {
        Ok(Self {
            config: self.config,
            stem_conv: self.stem_conv.try_to_device(device)?,
            stem_bn: self.stem_bn.try_to_device(device)?,
            stage_1: self.stage_1.try_to_device(device)?,
            stage_2: self.stage_2.try_to_device(device)?,
            stage_3: self.stage_3.try_to_device(device)?,
            stage_4: self.stage_4.try_to_device(device)?,
            pool: self.pool,
        })
    }
}

impl<E: Dtype> VisitModules<E> for CifarResNet<E> {
    fn try_visit_modules<V: ModuleVisitor<E>>(
        &mut self,
        location: &str,
        visitor: &mut V,
    ) -> Result<(), Error> {
        self.stem_conv
            .try_visit_modules(&join_location(location, "stem_conv"), visitor)?;
        self.stem_bn
            .try_visit_modules(&join_location(location, "stem_bn"), visitor)?;
        self.stage_1
            .try_visit_modules(&join_location(location, "stage_1"), visitor)?;
        self.stage_2
            .try_visit_modules(&join_location(location, "stage_2"), visitor)?;
        self.stage_3
            .try_visit_modules(&join_location(location, "stage_3"), visitor)?;
        self.stage_4
            .try_visit_modules(&join_location(location, "stage_4"), visitor)
    }
}

#[cfg(feature = "safetensors")]
impl<E: Dtype> SaveSafeTensors for CifarResNet<E> {
    fn write_safetensors(&self, location: &str, tensors: &mut Vec<SafeTensorEntry>) {
        self.stem_conv
            .write_safetensors(&join_location(location, "stem_conv"), tensors);
        self.stem_bn
            .write_safetensors(&join_location(location, "stem_bn"), tensors);
        self.stage_1
            .write_safetensors(&join_location(location, "stage_1"), tensors);
        self.stage_2
            .write_safetensors(&join_location(location, "stage_2"), tensors);
        self.stage_3
            .write_safetensors(&join_location(location, "stage_3"), tensors);
        self.stage_4
            .write_safetensors(&join_location(location, "stage_4"), tensors);
    }
}

#[cfg(feature = "safetensors")]
impl<E: Dtype> LoadSafeTensors for CifarResNet<E> {
    fn read_safetensors(
        &mut self,
        location: &str,
        tensors: &safetensors::SafeTensors<'_>,
    ) -> Result<(), Error> {
        self.stem_conv
            .read_safetensors(&join_location(location, "stem_conv"), tensors)?;
        self.stem_bn
            .read_safetensors(&join_location(location, "stem_bn"), tensors)?;
        self.stage_1
            .read_safetensors(&join_location(location, "stage_1"), tensors)?;
        self.stage_2
            .read_safetensors(&join_location(location, "stage_2"), tensors)?;
        self.stage_3
            .read_safetensors(&join_location(location, "stage_3"), tensors)?;
        self.stage_4
            .read_safetensors(&join_location(location, "stage_4"), tensors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{ModuleInventory, NodeKind, NodeMut};
    use crate::tests::*;

    fn small(n: usize, preact: bool, zero_residual: bool) -> ResNetConfig {
        ResNetConfig {
            n,
            preact,
            zero_residual,
            image_size: 8,
            ..Default::default()
        }
    }

    #[test]
    fn test_stage_widths_chain() {
        for n in 0..5 {
            for preact in [false, true] {
                let dev: TestDevice = Default::default();
                let net = dev.build_module::<TestDtype, _>(small(n, preact, true));
                let mut widths = vec![STEM_PLANES];
                for stage in [&net.stage_1, &net.stage_2, &net.stage_3] {
                    for block in stage {
                        assert_eq!(block.in_planes(), *widths.last().unwrap());
                        widths.push(block.out_planes());
                    }
                }
                assert_eq!(net.stage_4.in_planes(), *widths.last().unwrap());
                assert_eq!(net.stage_4.out_planes(), FEATURE_DIM);
            }
        }
    }

    #[test]
    fn test_stage_depths_saturate() {
        let dev: TestDevice = Default::default();
        let net = dev.build_module::<TestDtype, _>(small(1, false, true));
        assert_eq!(
            (net.stage_1.len(), net.stage_2.len(), net.stage_3.len()),
            (1, 1, 1)
        );
        let net = dev.build_module::<TestDtype, _>(small(3, false, true));
        assert_eq!(
            (net.stage_1.len(), net.stage_2.len(), net.stage_3.len()),
            (3, 3, 2)
        );
        let net = dev.build_module::<TestDtype, _>(small(0, false, true));
        assert_eq!(
            (net.stage_1.len(), net.stage_2.len(), net.stage_3.len()),
            (0, 1, 1)
        );
    }

    #[test]
    fn test_pyramid_shapes() {
        let dev: TestDevice = Default::default();
        let net = dev.build_module::<TestDtype, _>(small(1, false, true));
        for (h, w) in [(8, 8), (16, 8), (4, 12)] {
            let out = net.forward_with(dev.sample_normal(&[2, 3, h, w]), true);
            let [s1, s2, s3, s4] = out.attention.unwrap();
            assert_eq!(s1.shape(), &[2, 16, h, w]);
            assert_eq!(s2.shape(), &[2, 32, h / 2, w / 2]);
            assert_eq!(s3.shape(), &[2, 64, h / 4, w / 4]);
            assert_eq!(s4.shape(), &[2, 64, h / 4, w / 4]);
            assert_eq!(out.raw_features.shape(), &[2, FEATURE_DIM]);
            assert_eq!(out.features.shape(), &[2, FEATURE_DIM]);
        }
    }

    #[test]
    fn test_features_are_relu_of_last_stage() {
        let dev: TestDevice = Default::default();
        let net = dev.build_module::<TestDtype, _>(small(1, false, false));
        let out = net.forward_with(dev.sample_normal(&[2, 3, 8, 8]), true);
        let s4 = out.attention.unwrap()[3].clone();
        assert!(s4.as_vec().iter().any(|x| *x < 0.0), "relu is out of place");
        let raw = s4.clone().try_mean_spatial().unwrap();
        let activated = s4.relu().try_mean_spatial().unwrap();
        assert_eq!(out.raw_features.as_vec(), raw.as_vec());
        assert_eq!(out.features.as_vec(), activated.as_vec());
        assert!(out.features.as_vec().iter().all(|x| *x >= 0.0));
        assert!(net.forward(dev.sample_normal(&[1, 3, 8, 8])).attention.is_none());
    }

    #[test]
    fn test_zero_residual_blocks_output_shortcut() {
        let dev: TestDevice = Default::default();
        let net = dev.build_module::<TestDtype, _>(small(2, false, true));
        let out = net.forward_with(dev.sample_normal(&[2, 3, 8, 8]), true);
        let [s1, s2, s3, _] = out.attention.unwrap();
        // stage 1 keeps its input, so its output is the stem activation
        let x = dev.sample_normal::<TestDtype>(&[1, 16, 8, 8]);
        assert_eq!(net.stage_1.forward(x.clone()).as_vec(), x.as_vec());
        // increasing blocks output downsample + zero pad of their input
        let expected = s1.try_stride_subsample(2).unwrap().try_pad_zero_channels().unwrap();
        assert_eq!(s2.as_vec(), expected.as_vec());
        let expected = s2.try_stride_subsample(2).unwrap().try_pad_zero_channels().unwrap();
        assert_eq!(s3.as_vec(), expected.as_vec());
    }

    #[test]
    fn test_zero_residual_skips_preact() {
        let dev: TestDevice = Default::default();
        let mut net = dev.build_module::<TestDtype, _>(small(1, true, true));
        struct AllScalesOne(usize);
        impl ModuleVisitor<TestDtype> for AllScalesOne {
            fn visit(&mut self, _: &str, node: NodeMut<'_, TestDtype>) -> Result<(), Error> {
                if let NodeMut::BatchNorm2D(bn) = node {
                    assert!(bn.scale.as_vec().iter().all(|s| *s == 1.0));
                    self.0 += 1;
                }
                Ok(())
            }
        }
        let mut check = AllScalesOne(0);
        net.visit_modules(&mut check);
        assert_eq!(check.0, 1 + 2 * 4);
    }

    #[test]
    fn test_init_policy() {
        let dev = TestDevice::seed_from_u64(7);
        let mut net = dev.build_module::<TestDtype, _>(small(1, false, true));
        let mut inventory = ModuleInventory::default();
        net.visit_modules(&mut inventory);
        assert_eq!(inventory.count(NodeKind::Conv2D), 1 + 2 * 4);
        assert_eq!(inventory.count(NodeKind::BatchNorm2D), 1 + 2 * 4);
        assert_eq!(inventory.count(NodeKind::ResidualBlock), 4);
        assert_eq!(inventory.count(NodeKind::PreActResidualBlock), 0);
        assert_eq!(inventory.nodes[0], ("stem_conv".to_string(), NodeKind::Conv2D));
        assert!(inventory
            .locations(NodeKind::BatchNorm2D)
            .any(|loc| loc == "stage_2.0.bn_b"));

        // stage_4 conv_b: 64 * 64 * 9 weights with std sqrt(2 / (64 * 9))
        let Block::PostActivation(b) = &net.stage_4 else {
            panic!("expected a post-activation block");
        };
        let w = b.conv_b.weight.as_vec();
        let n = w.len() as f64;
        let var = w.iter().map(|x| x.as_f64().powi(2)).sum::<f64>() / n;
        let expected = 2.0 / (64.0 * 9.0);
        assert!((var / expected - 1.0).abs() < 0.05, "{var} vs {expected}");
        assert!(b.bn_b.scale.as_vec().iter().all(|s| *s == 0.0));
        assert!(b.bn_a.scale.as_vec().iter().all(|s| *s == 1.0));
        assert!(b.bn_a.bias.as_vec().iter().all(|s| *s == 0.0));
        assert!(net.stem_bn.running_var.as_vec().iter().all(|s| *s == 1.0));
    }

    #[test]
    fn test_num_params() {
        let dev: TestDevice = Default::default();
        let net = dev.build_module::<TestDtype, _>(small(1, false, true));
        assert_eq!(net.num_params(), 148624);
        let net = dev.build_module::<TestDtype, _>(small(1, true, true));
        assert_eq!(net.num_params(), 148528);
    }

    #[test]
    fn test_bad_inputs() {
        let dev: TestDevice = Default::default();
        let net = dev.build_module::<TestDtype, _>(small(1, false, true));
        let odd: Tensor<TestDtype> = dev.zeros(&[1, 3, 6, 8]);
        assert!(matches!(
            net.try_forward(odd),
            Err(Error::IndivisibleSpatial { height: 6, .. })
        ));
        let gray: Tensor<TestDtype> = dev.zeros(&[1, 1, 8, 8]);
        assert!(matches!(
            net.try_forward(gray),
            Err(Error::ShapeMismatch { .. })
        ));
        let flat: Tensor<TestDtype> = dev.zeros(&[3, 8, 8]);
        assert!(net.try_forward(flat).is_err());
    }

    #[test]
    fn test_bad_config_fails_at_construction() {
        let dev: TestDevice = Default::default();
        let cfg = ResNetConfig {
            image_size: 10,
            ..Default::default()
        };
        assert!(BuildOnDevice::<TestDtype>::try_build_on_device(&cfg, &dev).is_err());
    }

    #[test]
    fn test_training_forward_updates_stats_only_in_train_mode() {
        let dev: TestDevice = Default::default();
        let mut net = dev.build_module::<TestDtype, _>(small(1, false, true));
        let x: Tensor<TestDtype> = dev.sample_normal(&[4, 3, 8, 8]);
        let before = net.stem_bn.running_mean.as_vec();
        let _ = net.forward(x.clone());
        assert_eq!(net.stem_bn.running_mean.as_vec(), before);
        let out = net.forward_mut(x);
        assert_eq!(out.features.shape(), &[4, FEATURE_DIM]);
        assert_ne!(net.stem_bn.running_mean.as_vec(), before);
    }

    #[test]
    fn test_to_device_keeps_outputs() {
        let dev: TestDevice = Default::default();
        let net = dev.build_module::<TestDtype, _>(small(1, true, false));
        let other = TestDevice::seed_from_u64(99);
        let moved = net.to_device(&other);
        let x: Tensor<TestDtype> = dev.sample_normal(&[2, 3, 8, 8]);
        assert_eq!(
            net.forward(x.clone()).features.as_vec(),
            moved.forward(x).features.as_vec()
        );
    }

    #[test]
    fn test_seeded_devices_build_identical_networks() {
        let a = TestDevice::seed_from_u64(5).build_module::<TestDtype, _>(small(1, false, true));
        let b = TestDevice::seed_from_u64(5).build_module::<TestDtype, _>(small(1, false, true));
        assert_eq!(a.stem_conv.weight.as_vec(), b.stem_conv.weight.as_vec());
    }
}
