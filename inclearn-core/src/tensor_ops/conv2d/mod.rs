mod cpu_kernel;

use crate::{
    dtypes::Dtype,
    tensor::{Error, Tensor},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Conv2DOp {
    pub stride: usize,
    pub padding: usize,
    pub kernel: usize,
    pub batch: usize,
    pub chan_in: usize,
    pub chan_out: usize,
    pub h_in: usize,
    pub h_out: usize,
    pub w_in: usize,
    pub w_out: usize,
}

impl Conv2DOp {
    fn new(
        s: usize,
        p: usize,
        k: usize,
        [b, c, h_in, w_in]: [usize; 4],
        o: usize,
    ) -> Result<Self, Error> {
        match (conv2d_out_dim(h_in, k, s, p), conv2d_out_dim(w_in, k, s, p)) {
            (Some(h_out), Some(w_out)) => Ok(Self {
                stride: s,
                padding: p,
                kernel: k,
                batch: b,
                chan_in: c,
                chan_out: o,
                h_in,
                h_out,
                w_in,
                w_out,
            }),
            _ => Err(Error::EmptySpatial {
                op: "conv2d",
                height: h_in,
                width: w_in,
            }),
        }
    }

    pub(super) fn inp_patches_len(&self) -> usize {
        self.chan_in * self.kernel * self.kernel * self.h_out * self.w_out
    }
}

/// Spatial side length produced by a convolution, `None` if the kernel does
/// not fit in the padded input.
pub fn conv2d_out_dim(dim: usize, kernel: usize, stride: usize, padding: usize) -> Option<usize> {
    if stride == 0 || dim == 0 {
        return None;
    }
    (dim + 2 * padding)
        .checked_sub(kernel)
        .map(|v| v / stride + 1)
}

impl<E: Dtype> Tensor<E> {
    /// **Pytorch equivalent**: `torch.nn.functional.conv2d(x, filters, stride=s, padding=p)`
    ///
    /// - `self`: `(batch, chan_in, height, width)`
    /// - `filters`: `(chan_out, chan_in, kernel, kernel)`
    ///
    /// Returns `(batch, chan_out, height_out, width_out)` where
    /// `height_out = (height + 2 * padding - kernel) / stride + 1`.
    pub fn try_conv2d(
        &self,
        filters: &Tensor<E>,
        stride: usize,
        padding: usize,
    ) -> Result<Tensor<E>, Error> {
        let img = self.try_dims4("conv2d")?;
        let [o, c, k1, k2] = filters.try_dims4("conv2d")?;
        if c != img[1] || k1 != k2 {
            return Err(Error::ShapeMismatch {
                op: "conv2d",
                lhs: self.shape.clone(),
                rhs: filters.shape.clone(),
            });
        }
        let op = Conv2DOp::new(stride, padding, k1, img, o)?;
        let mut out = self
            .device
            .try_zeros(&[op.batch, op.chan_out, op.h_out, op.w_out])?;
        self.device
            .conv2d_forward(op, self.as_slice(), filters.as_slice(), out.data_mut())?;
        Ok(out)
    }

    pub fn conv2d(&self, filters: &Tensor<E>, stride: usize, padding: usize) -> Tensor<E> {
        self.try_conv2d(filters, stride, padding).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::*;

    #[test]
    fn test_conv2d_ones_padded() {
        let dev: TestDevice = Default::default();
        let x: Tensor<TestDtype> = dev.ones(&[1, 1, 3, 3]);
        let w: Tensor<TestDtype> = dev.ones(&[1, 1, 3, 3]);
        let y = x.conv2d(&w, 1, 1);
        assert_eq!(y.shape(), &[1, 1, 3, 3]);
        assert_close_to_literal!(y, [4.0, 6.0, 4.0, 6.0, 9.0, 6.0, 4.0, 6.0, 4.0]);
    }

    #[test]
    fn test_conv2d_strided() {
        let dev: TestDevice = Default::default();
        let x: Tensor<TestDtype> = dev.ones(&[2, 1, 4, 4]);
        let w: Tensor<TestDtype> = dev.ones(&[1, 1, 3, 3]);
        let y = x.conv2d(&w, 2, 1);
        assert_eq!(y.shape(), &[2, 1, 2, 2]);
        assert_close_to_literal!(y, [4.0, 6.0, 6.0, 9.0, 4.0, 6.0, 6.0, 9.0]);
    }

    #[test]
    fn test_conv2d_channel_mixing() {
        let dev: TestDevice = Default::default();
        let x: Tensor<TestDtype> = dev.tensor_from_vec(vec![1.0, 2.0], &[1, 2, 1, 1]);
        let w: Tensor<TestDtype> =
            dev.tensor_from_vec(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], &[3, 2, 1, 1]);
        let y = x.conv2d(&w, 1, 0);
        assert_eq!(y.shape(), &[1, 3, 1, 1]);
        assert_close_to_literal!(y, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_conv2d_sizes() {
        let dev: TestDevice = Default::default();
        let x: Tensor<TestDtype> = dev.zeros(&[5, 3, 10, 10]);
        let w = |o: usize, k: usize| dev.zeros::<TestDtype>(&[o, 3, k, k]);
        assert_eq!(x.conv2d(&w(2, 3), 1, 0).shape(), &[5, 2, 8, 8]);
        assert_eq!(x.conv2d(&w(4, 2), 1, 0).shape(), &[5, 4, 9, 9]);
        assert_eq!(x.conv2d(&w(2, 3), 2, 0).shape(), &[5, 2, 4, 4]);
        assert_eq!(x.conv2d(&w(2, 3), 1, 1).shape(), &[5, 2, 10, 10]);
        assert_eq!(x.conv2d(&w(2, 3), 2, 1).shape(), &[5, 2, 5, 5]);
    }

    #[test]
    fn test_conv2d_errors() {
        let dev: TestDevice = Default::default();
        let x: Tensor<TestDtype> = dev.zeros(&[1, 3, 2, 2]);
        let w: Tensor<TestDtype> = dev.zeros(&[4, 3, 5, 5]);
        assert!(matches!(
            x.try_conv2d(&w, 1, 0),
            Err(Error::EmptySpatial { .. })
        ));
        let w: Tensor<TestDtype> = dev.zeros(&[4, 2, 1, 1]);
        assert!(matches!(
            x.try_conv2d(&w, 1, 0),
            Err(Error::ShapeMismatch { .. })
        ));
        let flat: Tensor<TestDtype> = dev.zeros(&[3, 2, 2]);
        assert!(matches!(
            flat.try_conv2d(&w, 1, 0),
            Err(Error::WrongRank { .. })
        ));
    }

    #[test]
    fn test_conv2d_zero_filter_keeps_nan() {
        let dev: TestDevice = Default::default();
        let x: Tensor<TestDtype> = dev.tensor_from_vec(vec![TestDtype::NAN], &[1, 1, 1, 1]);
        let w: Tensor<TestDtype> = dev.zeros(&[1, 1, 1, 1]);
        let y = x.conv2d(&w, 1, 0);
        assert!(y.has_nans());
    }

    #[test]
    fn test_conv2d_out_dim() {
        assert_eq!(conv2d_out_dim(32, 3, 2, 1), Some(16));
        assert_eq!(conv2d_out_dim(32, 3, 1, 1), Some(32));
        assert_eq!(conv2d_out_dim(1, 5, 1, 0), None);
        assert_eq!(conv2d_out_dim(0, 1, 1, 0), None);
    }
}
