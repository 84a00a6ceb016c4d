//! Spatial primitives shared by images, meshes and transforms.
//!
//! All physical quantities are in millimetres, matching the DICOM and
//! NIfTI conventions of the source data.

pub mod direction;
pub mod point;
pub mod spacing;
pub mod vector;

pub use direction::Direction;
pub use point::Point;
pub use spacing::Spacing;
pub use vector::Vector;

/// 3D aliases; the pipeline is exclusively volumetric.
pub type Point3 = Point<3>;
pub type Vector3 = Vector<3>;
pub type Spacing3 = Spacing<3>;
pub type Direction3 = Direction<3>;
