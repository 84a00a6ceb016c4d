//! Spatial transforms.

pub mod affine;
pub mod rigid;
pub mod trait_;

pub use affine::Affine;
pub use rigid::RigidTransform;
pub use trait_::Transform;
