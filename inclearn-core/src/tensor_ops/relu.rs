use crate::{
    dtypes::Dtype,
    tensor::{Error, Tensor},
};

impl<E: Dtype> Tensor<E> {
    /// [Rectified Linear Unit (ReLU)](https://en.wikipedia.org/wiki/Rectifier_(neural_networks)). `max(0, t)`
    ///
    /// Works in place on the storage unless it is shared with another tensor,
    /// so `x.clone().try_relu()` leaves `x` untouched. NaNs are propagated.
    pub fn try_relu(mut self) -> Result<Self, Error> {
        for x in self.data_mut().iter_mut() {
            if *x < E::zero() {
                *x = E::zero();
            }
        }
        Ok(self)
    }

    pub fn relu(self) -> Self {
        self.try_relu().unwrap()
    }
}
