//! Voxel interpolation at continuous grid indices.

pub mod linear;
pub mod nearest;
pub mod trait_;

pub use linear::LinearInterpolator;
pub use nearest::NearestInterpolator;
pub use trait_::Interpolator;
