use crate::{
    dtypes::Dtype,
    tensor::{Error, Tensor},
};

impl<E: Dtype> Tensor<E> {
    /// Element wise `self + rhs`. Shapes must match exactly, there is no broadcasting.
    pub fn try_add(mut self, rhs: &Tensor<E>) -> Result<Self, Error> {
        if self.shape != rhs.shape {
            return Err(Error::ShapeMismatch {
                op: "add",
                lhs: self.shape.clone(),
                rhs: rhs.shape.clone(),
            });
        }
        for (l, &r) in self.data_mut().iter_mut().zip(rhs.as_slice().iter()) {
            *l = *l + r;
        }
        Ok(self)
    }

    pub fn add(self, rhs: &Tensor<E>) -> Self {
        self.try_add(rhs).unwrap()
    }

    /// `self = self * alpha + rhs * beta`, used for running averages.
    pub fn try_axpy(&mut self, alpha: f64, rhs: &Tensor<E>, beta: f64) -> Result<(), Error> {
        if self.shape != rhs.shape {
            return Err(Error::ShapeMismatch {
                op: "axpy",
                lhs: self.shape.clone(),
                rhs: rhs.shape.clone(),
            });
        }
        let (alpha, beta) = (E::from_f64(alpha), E::from_f64(beta));
        for (l, &r) in self.data_mut().iter_mut().zip(rhs.as_slice().iter()) {
            *l = *l * alpha + r * beta;
        }
        Ok(())
    }
}
