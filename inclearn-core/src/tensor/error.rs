/// Represents a number of different errors that can occur from creating tensors,
/// launching tensor operations, or building and configuring modules.
#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// Device is out of memory
    OutOfMemory,
    /// Not enough elements were provided when creating a tensor
    WrongNumElements { expected: usize, found: usize },
    /// An operation received a tensor with the wrong number of dimensions
    WrongRank {
        op: &'static str,
        expected: usize,
        found: Vec<usize>,
    },
    /// Two shapes that have to agree did not
    ShapeMismatch {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },
    /// Height or width is not a multiple of the stride of a subsampling op
    IndivisibleSpatial {
        op: &'static str,
        height: usize,
        width: usize,
        factor: usize,
    },
    /// A convolution or pooling would produce an output with no pixels
    EmptySpatial {
        op: &'static str,
        height: usize,
        width: usize,
    },
    /// A configuration was rejected when building a module
    InvalidConfig(String),
    /// A utility was handed an empty data source
    EmptyInput(&'static str),
    Io(std::io::Error),
    #[cfg(feature = "safetensors")]
    SafeTensors(safetensors::SafeTensorError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[cfg(feature = "safetensors")]
impl From<safetensors::SafeTensorError> for Error {
    fn from(value: safetensors::SafeTensorError) -> Self {
        Self::SafeTensors(value)
    }
}
