//! File IO for the voxreg pipeline: volumes (DICOM, NIfTI, legacy VTK),
//! unstructured meshes (`.vtu`), STL surfaces and affine-matrix dumps.

pub mod dicom_io;
pub mod error;
pub mod nifti_io;
pub mod stl_io;
pub mod transform_io;
pub mod vtk_io;
pub mod vtu_io;
pub mod volume;

pub use error::{IoError, Result};
pub use volume::read_volume;
