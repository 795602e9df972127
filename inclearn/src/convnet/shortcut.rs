use inclearn_core::prelude::*;

use crate::nn::DownsampleStride;

/// Parameter free shortcut of a dimension increasing block: halves the
/// spatial extent, then doubles the channels by appending all-zero channels.
///
/// **Pytorch Equivalent**: `torch.cat((x[..., ::2, ::2], x[..., ::2, ::2].mul(0)), 1)`
#[derive(Debug, Default, Clone, Copy)]
pub struct ShortcutAdapter {
    pub downsample: DownsampleStride,
}

impl<E: Dtype> Module<Tensor<E>> for ShortcutAdapter {
    type Output = Tensor<E>;

    fn try_forward(&self, x: Tensor<E>) -> Result<Self::Output, Error> {
        self.downsample.try_forward(x)?.try_pad_zero_channels()
    }
}
