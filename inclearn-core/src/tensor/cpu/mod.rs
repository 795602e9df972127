mod allocate;

pub(crate) use allocate::num_elements;

use rand::{rngs::StdRng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};

/// A device that allocates tensors on the heap and runs every op on the host.
///
/// Holds the random number generator used by every sampling op, so two devices
/// created with the same seed produce identical initializations.
#[derive(Clone, Debug)]
pub struct Cpu {
    pub(crate) rng: Arc<Mutex<StdRng>>,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::seed_from_u64(0)
    }
}

impl Cpu {
    pub fn seed_from_u64(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// Runs `f` with exclusive access to the device rng.
    pub(crate) fn with_rng<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;

    #[test]
    fn test_same_seed_same_samples() {
        let a: Tensor<f32> = Cpu::seed_from_u64(7).sample_normal(&[3, 4]);
        let b: Tensor<f32> = Cpu::seed_from_u64(7).sample_normal(&[3, 4]);
        let c: Tensor<f32> = Cpu::seed_from_u64(8).sample_normal(&[3, 4]);
        assert_eq!(a.as_vec(), b.as_vec());
        assert_ne!(a.as_vec(), c.as_vec());
    }

    #[test]
    fn test_clones_share_rng() {
        let dev = Cpu::seed_from_u64(3);
        let other = dev.clone();
        let x: Tensor<f32> = dev.sample_normal(&[4]);
        let y: Tensor<f32> = other.sample_normal(&[4]);
        assert_ne!(x.as_vec(), y.as_vec());
    }
}
