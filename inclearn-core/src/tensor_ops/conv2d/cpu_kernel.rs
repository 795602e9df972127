use crate::dtypes::Dtype;
use crate::tensor::{Cpu, Error};
use crate::tensor_ops::MatMulImpl;

use super::Conv2DOp;

impl Cpu {
    /// Unfolds one image into `(C * K * K, OH * OW)` patches, then multiplies
    /// the `(O, C * K * K)` filters against them.
    #[inline]
    fn conv2d_forward_single<E: Dtype>(
        &self,
        op: &Conv2DOp,
        img: &[E],
        filters: &[E],
        out: &mut [E],
        inp_patches_buf: &mut [E],
    ) {
        inp_patches_buf.fill(E::zero());
        let (kk, ohw) = (op.kernel * op.kernel, op.h_out * op.w_out);
        for c in 0..op.chan_in {
            for k1 in 0..op.kernel {
                for k2 in 0..op.kernel {
                    let row = c * kk + k1 * op.kernel + k2;
                    for oh in 0..op.h_out {
                        let y = (oh * op.stride + k1).wrapping_sub(op.padding);
                        if y >= op.h_in {
                            continue;
                        }
                        for ow in 0..op.w_out {
                            let x = (ow * op.stride + k2).wrapping_sub(op.padding);
                            if x < op.w_in {
                                inp_patches_buf[row * ohw + oh * op.w_out + ow] =
                                    img[c * (op.w_in * op.h_in) + y * op.w_in + x];
                            }
                        }
                    }
                }
            }
        }

        // (O, C * K * K) * (C * K * K, OH * OW) = (O, OH * OW)
        let m = op.chan_out;
        let k = op.chan_in * kk;
        let n = ohw;
        E::matmul(filters, inp_patches_buf, out, (m, k, n));
    }

    pub(super) fn conv2d_forward<E: Dtype>(
        &self,
        op: Conv2DOp,
        lhs: &[E],
        rhs: &[E],
        out: &mut [E],
    ) -> Result<(), Error> {
        let mut patches = self.try_alloc_elem(op.inp_patches_len(), E::zero())?;
        let lstride = op.chan_in * op.h_in * op.w_in;
        let ostride = op.chan_out * op.h_out * op.w_out;
        for i_batch in 0..op.batch {
            self.conv2d_forward_single(
                &op,
                &lhs[i_batch * lstride..(i_batch + 1) * lstride],
                rhs,
                &mut out[i_batch * ostride..(i_batch + 1) * ostride],
                &mut patches,
            );
        }
        Ok(())
    }
}
