use inclearn_core::prelude::*;

/// Averages each channel over the full spatial extent, whatever its size,
/// and flattens the result.
///
/// **Pytorch Equivalent**: `torch.nn.AdaptiveAvgPool2d(1)` followed by `x.view(x.size(0), -1)`
///
/// ```rust
/// # use inclearn::prelude::*;
/// let dev: Cpu = Default::default();
/// let x: Tensor<f32> = dev.ones(&[2, 64, 8, 8]);
/// assert_eq!(AvgPoolGlobal.forward(x).shape(), &[2, 64]);
/// ```
#[derive(Default, Debug, Clone, Copy)]
pub struct AvgPoolGlobal;

impl<E: Dtype> Module<Tensor<E>> for AvgPoolGlobal {
    type Output = Tensor<E>;

    fn try_forward(&self, input: Tensor<E>) -> Result<Self::Output, Error> {
        input.try_mean_spatial()
    }
}
