//! Core primitives for the voxreg pipeline: spatial geometry, volumetric
//! images on burn tensors, transforms, interpolation, filters, meshes and
//! vector fields.

pub mod error;
pub mod field;
pub mod filter;
pub mod image;
pub mod interpolation;
pub mod mesh;
pub mod spatial;
pub mod transform;

pub use error::{CoreError, Result};
pub use image::{Grid3, Image};
pub use mesh::{CellType, Mesh};
