use inclearn_core::prelude::*;

use crate::nn::{ModuleVisitor, NodeMut, VisitModules};

/// Batch normalization for `(batch, chan, height, width)` images.
///
/// **Pytorch Equivalent**: `torch.nn.BatchNorm2d(chan)`
///
/// [Module::try_forward] normalizes with the running statistics.
/// [Module::try_forward_mut] normalizes with the statistics of the batch and
/// folds them into the running statistics with an exponential moving average.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct BatchNorm2DConfig(pub usize);

impl<E: Dtype> BuildOnDevice<E> for BatchNorm2DConfig {
    type Built = BatchNorm2D<E>;
    fn try_build_on_device(&self, device: &Cpu) -> Result<Self::Built, Error> {
        if self.0 == 0 {
            return Err(Error::InvalidConfig("batch norm with 0 channels".into()));
        }
        Ok(BatchNorm2D {
            scale: device.try_ones(&[self.0])?,
            bias: device.try_zeros(&[self.0])?,
            running_mean: device.try_zeros(&[self.0])?,
            running_var: device.try_ones(&[self.0])?,
            epsilon: 1e-5,
            momentum: 0.1,
        })
    }
}

#[derive(Clone, Debug)]
pub struct BatchNorm2D<E: Dtype> {
    pub scale: Tensor<E>,
    pub bias: Tensor<E>,
    pub running_mean: Tensor<E>,
    pub running_var: Tensor<E>,
    pub epsilon: f64,
    pub momentum: f64,
}

impl<E: Dtype> ResetParams for BatchNorm2D<E> {
    fn try_reset_params(&mut self) -> Result<(), Error> {
        self.scale.try_fill_with_ones()?;
        self.bias.try_fill_with_zeros()?;
        self.running_mean.try_fill_with_zeros()?;
        self.running_var.try_fill_with_ones()
    }
}

impl<E: Dtype> Module<Tensor<E>> for BatchNorm2D<E> {
    type Output = Tensor<E>;

    fn try_forward(&self, x: Tensor<E>) -> Result<Self::Output, Error> {
        self.infer_fwd(x)
    }

    fn try_forward_mut(&mut self, x: Tensor<E>) -> Result<Self::Output, Error> {
        self.train_fwd(x)
    }
}

impl<E: Dtype> BatchNorm2D<E> {
    pub fn num_channels(&self) -> usize {
        self.scale.numel()
    }

    /// Computes `x * scale / sqrt(var + eps) + (bias - mean * scale / sqrt(var + eps))`
    /// as one per channel affine map.
    fn normalize(&self, x: &Tensor<E>, mean: &Tensor<E>, var: &Tensor<E>) -> Result<Tensor<E>, Error> {
        let c = self.num_channels();
        let (mut mul, mut add) = (Vec::with_capacity(c), Vec::with_capacity(c));
        for i in 0..c {
            let m = self.scale.as_slice()[i].as_f64()
                / (var.as_slice()[i].as_f64() + self.epsilon).sqrt();
            mul.push(E::from_f64(m));
            add.push(E::from_f64(
                self.bias.as_slice()[i].as_f64() - mean.as_slice()[i].as_f64() * m,
            ));
        }
        let mul = x.device().try_tensor_from_vec(mul, &[c])?;
        let add = x.device().try_tensor_from_vec(add, &[c])?;
        x.try_channel_affine(&mul, &add)
    }

    fn train_fwd(&mut self, x: Tensor<E>) -> Result<Tensor<E>, Error> {
        let (mean_chan, var_chan, n) = x.try_channel_mean_var()?;
        if n < 2 {
            return Err(Error::InvalidConfig(format!(
                "batch norm needs more than 1 value per channel in training, got input {:?}",
                x.shape()
            )));
        }
        if mean_chan.numel() != self.num_channels() {
            return Err(Error::ShapeMismatch {
                op: "batch_norm2d",
                lhs: self.scale.shape().to_vec(),
                rhs: x.shape().to_vec(),
            });
        }
        let n = n as f64;

        self.running_mean
            .try_axpy(1.0 - self.momentum, &mean_chan, self.momentum)?;

        // NOTE: uses unbiased variance in running estimate
        self.running_var.try_axpy(
            1.0 - self.momentum,
            &var_chan,
            self.momentum * n / (n - 1.0),
        )?;

        self.normalize(&x, &mean_chan, &var_chan)
    }

    /// batchnorm forward for inference
    pub fn infer_fwd(&self, x: Tensor<E>) -> Result<Tensor<E>, Error> {
        self.normalize(&x, &self.running_mean, &self.running_var)
    }
}

impl<E: Dtype> NumParams for BatchNorm2D<E> {
    fn num_params(&self) -> usize {
        self.scale.numel() + self.bias.numel()
    }
}

impl<E: Dtype> ToDevice for BatchNorm2D<E> {
    fn try_to_device(&self, device: &Cpu) -> Result<Self, Error> {
        Ok(Self {
            scale: ToDevice::try_to_device(&self.scale, device)?,
            bias: ToDevice::try_to_device(&self.bias, device)?,
            running_mean: ToDevice::try_to_device(&self.running_mean, device)?,
            running_var: ToDevice::try_to_device(&self.running_var, device)?,
            epsilon: self.epsilon,
            momentum: self.momentum,
        })
    }
}

impl<E: Dtype> VisitModules<E> for BatchNorm2D<E> {
    fn try_visit_modules<V: ModuleVisitor<E>>(
        &mut self,
        location: &str,
        visitor: &mut V,
    ) -> Result<(), Error> {
        visitor.visit(location, NodeMut::BatchNorm2D(self))
    }
}

#[cfg(feature = "safetensors")]
impl<E: Dtype> SaveSafeTensors for BatchNorm2D<E> {
    fn write_safetensors(&self, location: &str, tensors: &mut Vec<SafeTensorEntry>) {
        for (name, t) in [
            ("scale", &self.scale),
            ("bias", &self.bias),
            ("running_mean", &self.running_mean),
            ("running_var", &self.running_var),
        ] {
            t.write_safetensors(&join_location(location, name), tensors);
        }
    }
}

#[cfg(feature = "safetensors")]
impl<E: Dtype> LoadSafeTensors for BatchNorm2D<E> {
    fn read_safetensors(
        &mut self,
        location: &str,
        tensors: &safetensors::SafeTensors<'_>,
    ) -> Result<(), Error> {
        for (name, t) in [
            ("scale", &mut self.scale),
            ("bias", &mut self.bias),
            ("running_mean", &mut self.running_mean),
            ("running_var", &mut self.running_var),
        ] {
            t.read_safetensors(&join_location(location, name), tensors)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    #[test]
    fn test_batchnorm2d_train() {
        let dev: TestDevice = Default::default();
        let x: Tensor<TestDtype> = dev.tensor_from_vec(
            vec![1.0, 3.0, 0.0, 0.0, 5.0, 7.0, 2.0, -2.0],
            &[2, 2, 1, 2],
        );
        let mut bn = dev.build_module::<TestDtype, _>(BatchNorm2DConfig(2));
        let y = bn.forward_mut(x);
        // channel 0: mean 4, var 5. channel 1: mean 0, var 2.
        let s0 = 1.0 / (5.0f64 + 1e-5).sqrt();
        let s1 = 1.0 / (2.0f64 + 1e-5).sqrt();
        assert_close_to_literal!(
            y,
            [-3.0 * s0, -s0, 0.0, 0.0, s0, 3.0 * s0, 2.0 * s1, -2.0 * s1],
            1e-5
        );
        assert_close_to_literal!(bn.running_mean, [0.4, 0.0]);
        // unbiased: 5 * 4 / 3, 2 * 4 / 3
        assert_close_to_literal!(
            bn.running_var,
            [0.9 + 0.1 * 20.0 / 3.0, 0.9 + 0.1 * 8.0 / 3.0],
            1e-5
        );
    }

    #[test]
    fn test_batchnorm2d_infer_uses_running_stats() {
        let dev: TestDevice = Default::default();
        let mut bn = dev.build_module::<TestDtype, _>(BatchNorm2DConfig(1));
        bn.running_mean.copy_from(&[1.0]).unwrap();
        bn.running_var.copy_from(&[4.0]).unwrap();
        bn.scale.copy_from(&[2.0]).unwrap();
        bn.bias.copy_from(&[0.5]).unwrap();
        let x: Tensor<TestDtype> = dev.tensor_from_vec(vec![1.0, 3.0], &[1, 1, 1, 2]);
        let y = bn.forward(x);
        let s = 2.0 / (4.0f64 + 1e-5).sqrt();
        assert_close_to_literal!(y, [0.5, 0.5 + 2.0 * s], 1e-5);
        assert_close_to_literal!(bn.running_mean, [1.0]);
    }

    #[test]
    fn test_batchnorm2d_train_single_value_fails() {
        let dev: TestDevice = Default::default();
        let mut bn = dev.build_module::<TestDtype, _>(BatchNorm2DConfig(3));
        let x: Tensor<TestDtype> = dev.ones(&[1, 3, 1, 1]);
        assert!(bn.try_forward_mut(x).is_err());
    }

    #[test]
    fn test_batchnorm2d_channel_mismatch() {
        let dev: TestDevice = Default::default();
        let bn = dev.build_module::<TestDtype, _>(BatchNorm2DConfig(3));
        let x: Tensor<TestDtype> = dev.ones(&[2, 2, 2, 2]);
        assert!(bn.try_forward(x).is_err());
        assert_eq!(bn.num_params(), 6);
    }

    #[test]
    fn test_batchnorm2d_empty_planes() {
        let dev: TestDevice = Default::default();
        let bn = dev.build_module::<TestDtype, _>(BatchNorm2DConfig(2));
        let x: Tensor<TestDtype> = dev.zeros(&[1, 2, 0, 0]);
        assert!(matches!(bn.try_forward(x), Err(Error::EmptySpatial { .. })));
    }
}
