use inclearn_core::dtypes::Dtype;

/// `true` if `loss` is a usable training loss: not NaN and not negative.
pub fn check_loss<E: Dtype>(loss: E) -> bool {
    !loss.is_nan() && loss >= E::zero()
}
