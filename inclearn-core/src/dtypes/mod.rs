//! Element types a [crate::tensor::Tensor] can hold.
//!
//! Only floating point types are supported, since every tensor in this crate
//! either holds network parameters or activations.

/// A floating point element type. Implemented for [f32] and [f64].
pub trait Dtype:
    'static
    + Copy
    + Clone
    + Default
    + std::fmt::Debug
    + std::fmt::Display
    + PartialOrd
    + Send
    + Sync
    + num_traits::Float
    + crate::tensor_ops::MatMulImpl
{
    /// Number of bytes in the little endian encoding.
    const NUM_BYTES: usize;

    #[cfg(feature = "safetensors")]
    const SAFETENSORS_DTYPE: safetensors::Dtype;

    fn from_f64(value: f64) -> Self;
    fn as_f64(self) -> f64;

    fn extend_le_bytes(self, buf: &mut Vec<u8>);
    /// Decodes one element, `None` if `chunk` is not exactly [Dtype::NUM_BYTES] long.
    fn from_le_chunk(chunk: &[u8]) -> Option<Self>;
}

macro_rules! float_dtype {
    ($Ty:ty, $SafeTensors:ident) => {
        impl Dtype for $Ty {
            const NUM_BYTES: usize = std::mem::size_of::<$Ty>();

            #[cfg(feature = "safetensors")]
            const SAFETENSORS_DTYPE: safetensors::Dtype = safetensors::Dtype::$SafeTensors;

            #[inline(always)]
            fn from_f64(value: f64) -> Self {
                value as $Ty
            }

            #[inline(always)]
            fn as_f64(self) -> f64 {
                self as f64
            }

            fn extend_le_bytes(self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.to_le_bytes());
            }

            fn from_le_chunk(chunk: &[u8]) -> Option<Self> {
                chunk.try_into().ok().map(<$Ty>::from_le_bytes)
            }
        }
    };
}

float_dtype!(f32, F32);
float_dtype!(f64, F64);
