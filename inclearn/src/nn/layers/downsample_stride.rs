use inclearn_core::prelude::*;

/// Halves the spatial resolution by keeping every second row and column.
/// Has no parameters.
///
/// **Pytorch Equivalent**: `x[..., ::2, ::2]`
///
/// Height and width must be even. Odd extents are rejected with
/// [Error::IndivisibleSpatial].
#[derive(Default, Debug, Clone, Copy)]
pub struct DownsampleStride;

impl DownsampleStride {
    pub const STEP: usize = 2;
}

impl<E: Dtype> Module<Tensor<E>> for DownsampleStride {
    type Output = Tensor<E>;

    fn try_forward(&self, x: Tensor<E>) -> Result<Self::Output, Error> {
        x.try_stride_subsample(Self::STEP)
    }
}
