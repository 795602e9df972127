use crate::{
    dtypes::Dtype,
    tensor::{Error, Tensor},
};

impl<E: Dtype> Tensor<E> {
    /// Keeps every `step`th row and column of a `(batch, chan, height, width)`
    /// tensor, starting at index 0. **Pytorch equivalent**: `x[..., ::step, ::step]`.
    ///
    /// Height and width must both be non zero multiples of `step`, otherwise
    /// [Error::IndivisibleSpatial] is returned instead of silently dropping
    /// the trailing row or column.
    pub fn try_stride_subsample(&self, step: usize) -> Result<Self, Error> {
        let [b, c, h, w] = self.try_dims4("stride_subsample")?;
        if step == 0 || h == 0 || w == 0 || h % step != 0 || w % step != 0 {
            return Err(Error::IndivisibleSpatial {
                op: "stride_subsample",
                height: h,
                width: w,
                factor: step,
            });
        }
        let (h_out, w_out) = (h / step, w / step);
        let mut out = self.device.try_zeros(&[b, c, h_out, w_out])?;
        let src = self.as_slice();
        let dst = out.data_mut();
        let mut i = 0;
        for plane in 0..b * c {
            let base = plane * h * w;
            for y in 0..h_out {
                for x in 0..w_out {
                    dst[i] = src[base + y * step * w + x * step];
                    i += 1;
                }
            }
        }
        Ok(out)
    }
}
