//! Image filters: denoising, pyramids, resampling and thresholding.

pub mod downsample;
pub mod gaussian;
pub mod median;
pub mod orient;
pub mod projection;
pub mod pyramid;
pub mod resample;
pub mod threshold;

pub use downsample::DownsampleFilter;
pub use gaussian::GaussianFilter;
pub use median::MedianFilter;
pub use orient::reorient_to;
pub use projection::max_projection_z;
pub use pyramid::MultiResolutionPyramid;
pub use resample::ResampleFilter;
pub use threshold::{auto_threshold, binarize, otsu_threshold, ProtocolCalibration};
