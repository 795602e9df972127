use crate::{
    dtypes::Dtype,
    tensor::{Error, Tensor},
};

impl<E: Dtype> Tensor<E> {
    /// Per channel mean and biased variance of a `(batch, chan, height, width)`
    /// tensor, each returned as a `(chan,)` tensor, along with the number of
    /// elements reduced per channel.
    pub fn try_channel_mean_var(&self) -> Result<(Self, Self, usize), Error> {
        let [b, c, h, w] = self.try_dims4("channel_mean_var")?;
        let n = b * h * w;
        if n == 0 {
            return Err(Error::EmptySpatial {
                op: "channel_mean_var",
                height: h,
                width: w,
            });
        }
        let hw = h * w;
        let src = self.as_slice();
        let plane = |i_b: usize, i_c: usize| &src[(i_b * c + i_c) * hw..(i_b * c + i_c + 1) * hw];

        let mut mean = self.device.try_zeros(&[c])?;
        let mut var = self.device.try_zeros(&[c])?;
        {
            let (mean_data, var_data) = (mean.data_mut(), var.data_mut());
            for i_c in 0..c {
                let sum: f64 = (0..b)
                    .flat_map(|i_b| plane(i_b, i_c).iter())
                    .map(|x| x.as_f64())
                    .sum();
                let m = sum / n as f64;
                let sq: f64 = (0..b)
                    .flat_map(|i_b| plane(i_b, i_c).iter())
                    .map(|x| {
                        let d = x.as_f64() - m;
                        d * d
                    })
                    .sum();
                mean_data[i_c] = E::from_f64(m);
                var_data[i_c] = E::from_f64(sq / n as f64);
            }
        }
        Ok((mean, var, n))
    }

    /// `y[b, c, h, w] = x[b, c, h, w] * mul[c] + add[c]`
    pub fn try_channel_affine(&self, mul: &Tensor<E>, add: &Tensor<E>) -> Result<Self, Error> {
        let [_, c, h, w] = self.try_dims4("channel_affine")?;
        if h * w == 0 {
            return Err(Error::EmptySpatial {
                op: "channel_affine",
                height: h,
                width: w,
            });
        }
        for t in [mul, add] {
            if t.shape() != [c] {
                return Err(Error::ShapeMismatch {
                    op: "channel_affine",
                    lhs: self.shape.clone(),
                    rhs: t.shape.clone(),
                });
            }
        }
        let mut out = self.clone();
        let (mul, add) = (mul.as_slice(), add.as_slice());
        for (i, plane) in out.data_mut().chunks_exact_mut(h * w).enumerate() {
            let (m, a) = (mul[i % c], add[i % c]);
            for x in plane.iter_mut() {
                *x = *x * m + a;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::tests::*;

    #[test]
    fn test_channel_mean_var() {
        let dev: TestDevice = Default::default();
        // batch 2, chan 2, 1x2 images
        let x: Tensor<TestDtype> = dev.tensor_from_vec(
            vec![1.0, 3.0, 0.0, 0.0, 5.0, 7.0, 2.0, -2.0],
            &[2, 2, 1, 2],
        );
        let (mean, var, n) = x.try_channel_mean_var().unwrap();
        assert_eq!(n, 4);
        assert_close_to_literal!(mean, [4.0, 0.0]);
        assert_close_to_literal!(var, [5.0, 2.0]);
    }

    #[test]
    fn test_channel_affine() {
        let dev: TestDevice = Default::default();
        let x: Tensor<TestDtype> = dev.ones(&[2, 2, 1, 2]);
        let mul: Tensor<TestDtype> = dev.tensor_from_vec(vec![2.0, 0.0], &[2]);
        let add: Tensor<TestDtype> = dev.tensor_from_vec(vec![1.0, -1.0], &[2]);
        let y = x.try_channel_affine(&mul, &add).unwrap();
        assert_close_to_literal!(y, [3.0, 3.0, -1.0, -1.0, 3.0, 3.0, -1.0, -1.0]);
        let bad: Tensor<TestDtype> = dev.ones(&[3]);
        assert!(x.try_channel_affine(&bad, &add).is_err());
    }

    #[test]
    fn test_channel_affine_empty_planes() {
        let dev: TestDevice = Default::default();
        let x: Tensor<TestDtype> = dev.zeros(&[1, 2, 0, 0]);
        let ones: Tensor<TestDtype> = dev.ones(&[2]);
        assert!(matches!(
            x.try_channel_affine(&ones, &ones),
            Err(Error::EmptySpatial { op: "channel_affine", .. })
        ));
    }
}
