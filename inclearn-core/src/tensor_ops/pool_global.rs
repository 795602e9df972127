use crate::{
    dtypes::Dtype,
    tensor::{Error, Tensor},
};

impl<E: Dtype> Tensor<E> {
    /// Averages a `(batch, chan, height, width)` tensor over its whole spatial
    /// extent, returning `(batch, chan)`.
    pub fn try_mean_spatial(&self) -> Result<Self, Error> {
        let [b, c, h, w] = self.try_dims4("mean_spatial")?;
        if h * w == 0 {
            return Err(Error::EmptySpatial {
                op: "mean_spatial",
                height: h,
                width: w,
            });
        }
        let mut out = self.device.try_zeros(&[b, c])?;
        let inv = 1.0 / (h * w) as f64;
        for (dst, plane) in out
            .data_mut()
            .iter_mut()
            .zip(self.as_slice().chunks_exact(h * w))
        {
            let sum: f64 = plane.iter().map(|x| x.as_f64()).sum();
            *dst = E::from_f64(sum * inv);
        }
        Ok(out)
    }
}
