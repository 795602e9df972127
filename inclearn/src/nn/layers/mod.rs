mod batch_norm2d;
mod conv2d;
mod downsample_stride;
mod pool_global_avg;

pub use batch_norm2d::{BatchNorm2D, BatchNorm2DConfig};
pub use conv2d::{Conv2D, Conv2DConfig};
pub use downsample_stride::DownsampleStride;
pub use pool_global_avg::AvgPoolGlobal;
