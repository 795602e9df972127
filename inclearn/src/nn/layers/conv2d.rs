use inclearn_core::prelude::*;

use crate::nn::{ModuleVisitor, NodeMut, VisitModules};

/// Performs *unbiased* 2d convolutions on 4d images with a square kernel.
///
/// **Pytorch Equivalent**: `torch.nn.Conv2d(..., bias=False)`
///
/// ```rust
/// # use inclearn::prelude::*;
/// let dev: Cpu = Default::default();
/// let m = dev.build_module::<f32, _>(Conv2DConfig {
///     in_chan: 3,
///     out_chan: 16,
///     kernel_size: 3,
///     stride: 1,
///     padding: 1,
/// });
/// let y = m.forward(dev.zeros(&[2, 3, 32, 32]));
/// assert_eq!(y.shape(), &[2, 16, 32, 32]);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Conv2DConfig {
    pub in_chan: usize,
    pub out_chan: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: usize,
}

impl Conv2DConfig {
    /// The 3x3, padding 1 convolution every residual block is made of.
    pub fn conv3x3(in_chan: usize, out_chan: usize, stride: usize) -> Self {
        Self {
            in_chan,
            out_chan,
            kernel_size: 3,
            stride,
            padding: 1,
        }
    }
}

impl<E: Dtype> BuildOnDevice<E> for Conv2DConfig {
    type Built = Conv2D<E>;
    fn try_build_on_device(&self, device: &Cpu) -> Result<Self::Built, Error> {
        if self.in_chan == 0 || self.out_chan == 0 || self.kernel_size == 0 || self.stride == 0 {
            return Err(Error::InvalidConfig(format!("degenerate convolution {self:?}")));
        }
        let weight = device.try_zeros(&[
            self.out_chan,
            self.in_chan,
            self.kernel_size,
            self.kernel_size,
        ])?;
        Ok(Conv2D {
            weight,
            stride: self.stride,
            padding: self.padding,
        })
    }
}

/// The module built with [Conv2DConfig]. See [Conv2DConfig] for usage.
#[derive(Debug, Clone)]
pub struct Conv2D<E: Dtype> {
    /// `(out_chan, in_chan, kernel_size, kernel_size)`
    pub weight: Tensor<E>,
    pub stride: usize,
    pub padding: usize,
}

impl<E: Dtype> Conv2D<E> {
    /// `(out_chan, in_chan, kernel_size)`
    pub fn dims(&self) -> (usize, usize, usize) {
        let s = self.weight.shape();
        (s[0], s[1], s[2])
    }

    /// Number of weights each input pixel feeds, `out_chan * k * k`.
    pub fn fan_out(&self) -> usize {
        let (o, _, k) = self.dims();
        o * k * k
    }

    /// **Pytorch Equivalent**: `torch.nn.init.kaiming_normal_(w, mode="fan_out", nonlinearity="relu")`
    ///
    /// Samples every weight from `N(0, 2 / fan_out)`.
    pub fn try_kaiming_normal_fan_out(&mut self) -> Result<(), Error> {
        let std = (2.0 / self.fan_out() as f64).sqrt();
        let distr = rand_distr::Normal::new(0.0, std)
            .map_err(|e| Error::InvalidConfig(format!("kaiming init: {e}")))?;
        self.weight.try_fill_with_distr(distr)
    }
}

impl<E: Dtype> ResetParams for Conv2D<E> {
    fn try_reset_params(&mut self) -> Result<(), Error> {
        let (_, i, k) = self.dims();
        let b = (1.0 / (k * k * i) as f64).sqrt();
        self.weight
            .try_fill_with_distr(rand_distr::Uniform::new(-b, b))
    }
}

impl<E: Dtype> Module<Tensor<E>> for Conv2D<E> {
    type Output = Tensor<E>;

    fn try_forward(&self, x: Tensor<E>) -> Result<Self::Output, Error> {
        x.try_conv2d(&self.weight, self.stride, self.padding)
    }
}

impl<E: Dtype> NumParams for Conv2D<E> {
    fn num_params(&self) -> usize {
        self.weight.num_params()
    }
}

impl<E: Dtype> ToDevice for Conv2D<E> {
    fn try_to_device(&self, device: &Cpu) -> Result<Self, Error> {
        Ok(Self {
            weight: ToDevice::try_to_device(&self.weight, device)?,
            stride: self.stride,
            padding: self.padding,
        })
    }
}

impl<E: Dtype> VisitModules<E> for Conv2D<E> {
    fn try_visit_modules<V: ModuleVisitor<E>>(
        &mut self,
        location: &str,
        visitor: &mut V,
    ) -> Result<(), Error> {
        visitor.visit(location, NodeMut::Conv2D(self))
    }
}

#[cfg(feature = "safetensors")]
impl<E: Dtype> SaveSafeTensors for Conv2D<E> {
    fn write_safetensors(&self, location: &str, tensors: &mut Vec<SafeTensorEntry>) {
        self.weight
            .write_safetensors(&join_location(location, "weight"), tensors);
    }
}

#[cfg(feature = "safetensors")]
impl<E: Dtype> LoadSafeTensors for Conv2D<E> {
    fn read_safetensors(
        &mut self,
        location: &str,
        tensors: &safetensors::SafeTensors<'_>,
    ) -> Result<(), Error> {
        self.weight
            .read_safetensors(&join_location(location, "weight"), tensors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    #[test]
    fn test_conv2d_reset_within_bounds() {
        let dev: TestDevice = Default::default();
        let m = dev.build_module::<TestDtype, _>(Conv2DConfig::conv3x3(4, 2, 1));
        let bound = (1.0f64 / 36.0).sqrt();
        assert!(m
            .weight
            .as_vec()
            .iter()
            .all(|w| w.as_f64().abs() <= bound));
        assert!(m.weight.as_vec().iter().any(|w| *w != 0.0));
    }

    #[test]
    fn test_conv2d_kaiming_fan_out_std() {
        let dev = TestDevice::seed_from_u64(3);
        let mut m: Conv2D<TestDtype> = Conv2DConfig::conv3x3(32, 64, 1).build_on_device(&dev);
        assert_eq!(m.fan_out(), 64 * 9);
        m.try_kaiming_normal_fan_out().unwrap();
        let w = m.weight.as_vec();
        let n = w.len() as f64;
        let mean = w.iter().map(|x| x.as_f64()).sum::<f64>() / n;
        let var = w.iter().map(|x| (x.as_f64() - mean).powi(2)).sum::<f64>() / n;
        let expected = 2.0 / (64.0 * 9.0);
        assert!(mean.abs() < 0.01, "{mean}");
        assert!((var / expected - 1.0).abs() < 0.05, "{var} vs {expected}");
    }

    #[test]
    fn test_conv2d_forward_shape() {
        let dev: TestDevice = Default::default();
        let m = dev.build_module::<TestDtype, _>(Conv2DConfig::conv3x3(3, 8, 2));
        let y = m.forward(dev.sample_normal(&[2, 3, 8, 8]));
        assert_eq!(y.shape(), &[2, 8, 4, 4]);
        assert_eq!(m.num_params(), 8 * 3 * 9);
    }

    #[test]
    fn test_conv2d_rejects_degenerate_config() {
        let dev: TestDevice = Default::default();
        let cfg = Conv2DConfig::conv3x3(3, 0, 1);
        assert!(BuildOnDevice::<TestDtype>::try_build_on_device(&cfg, &dev).is_err());
    }
}
