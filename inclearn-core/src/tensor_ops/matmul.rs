#[allow(unused)]
fn naive_gemm<F: num_traits::Float>(
    (m, k, n): (usize, usize, usize),
    lhs: &[F],
    rhs: &[F],
    out: &mut [F],
) {
    for i_m in 0..m {
        for i_n in 0..n {
            let mut c = F::zero();
            for i_k in 0..k {
                c = c + lhs[i_m * k + i_k] * rhs[i_k * n + i_n];
            }
            out[i_m * n + i_n] = c;
        }
    }
}

/// Dense row major matrix product, implemented per element type.
///
/// With the `cpu` feature this dispatches to `gemm`, otherwise it falls back
/// to a plain triple loop. Both overwrite `out` and propagate NaN and inf.
pub trait MatMulImpl: Sized {
    /// `out (m, n) = lhs (m, k) * rhs (k, n)`.
    fn matmul(lhs: &[Self], rhs: &[Self], out: &mut [Self], dims: (usize, usize, usize));
}

macro_rules! matmul_impl {
    ($Ty:ty) => {
        impl MatMulImpl for $Ty {
            #[inline]
            fn matmul(lhs: &[$Ty], rhs: &[$Ty], out: &mut [$Ty], (m, k, n): (usize, usize, usize)) {
                assert_eq!(lhs.len(), m * k);
                assert_eq!(rhs.len(), k * n);
                assert_eq!(out.len(), m * n);

                #[cfg(not(feature = "cpu"))]
                naive_gemm((m, k, n), lhs, rhs, out);

                // SAFETY: the asserts above bound every strided access.
                #[cfg(feature = "cpu")]
                unsafe {
                    gemm::gemm(
                        m,
                        n,
                        k,
                        out.as_mut_ptr(),
                        1,
                        n as isize,
                        false,
                        lhs.as_ptr(),
                        1,
                        k as isize,
                        rhs.as_ptr(),
                        1,
                        n as isize,
                        0.0,
                        1.0,
                        false,
                        false,
                        false,
                        gemm::Parallelism::None,
                    )
                }
            }
        }
    };
}

matmul_impl!(f32);
matmul_impl!(f64);
