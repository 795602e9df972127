use crate::{
    dtypes::Dtype,
    tensor::{Cpu, Error},
};

use super::*;

impl<E: Dtype, T: BuildOnDevice<E>> BuildOnDevice<E> for Vec<T> {
    type Built = Vec<T::Built>;
    fn try_build_on_device(&self, device: &Cpu) -> Result<Self::Built, Error> {
        self.iter()
            .map(|m_i| m_i.try_build_on_device(device))
            .collect()
    }
}

impl<T: ResetParams> ResetParams for Vec<T> {
    fn try_reset_params(&mut self) -> Result<(), Error> {
        for m_i in self.iter_mut() {
            m_i.try_reset_params()?;
        }
        Ok(())
    }
}

impl<T: ToDevice> ToDevice for Vec<T> {
    fn try_to_device(&self, device: &Cpu) -> Result<Self, Error> {
        self.iter().map(|m_i| m_i.try_to_device(device)).collect()
    }
}

impl<T: NumParams> NumParams for Vec<T> {
    fn num_params(&self) -> usize {
        self.iter().map(NumParams::num_params).sum()
    }
}

#[cfg(feature = "safetensors")]
impl<T: SaveSafeTensors> SaveSafeTensors for Vec<T> {
    fn write_safetensors(&self, location: &str, tensors: &mut Vec<SafeTensorEntry>) {
        for (i, t) in self.iter().enumerate() {
            t.write_safetensors(&join_location(location, &i.to_string()), tensors);
        }
    }
}

#[cfg(feature = "safetensors")]
impl<T: LoadSafeTensors> LoadSafeTensors for Vec<T> {
    fn read_safetensors(
        &mut self,
        location: &str,
        tensors: &safetensors::SafeTensors<'_>,
    ) -> Result<(), Error> {
        for (i, t) in self.iter_mut().enumerate() {
            t.read_safetensors(&join_location(location, &i.to_string()), tensors)?;
        }
        Ok(())
    }
}

impl<Input, T: Module<Input, Output = Input>> Module<Input> for Vec<T> {
    type Output = T::Output;

    fn try_forward(&self, mut x: Input) -> Result<Self::Output, Error> {
        for m_i in self.iter() {
            x = m_i.try_forward(x)?;
        }
        Ok(x)
    }

    fn try_forward_mut(&mut self, mut x: Input) -> Result<Self::Output, Error> {
        for m_i in self.iter_mut() {
            x = m_i.try_forward_mut(x)?;
        }
        Ok(x)
    }
}
