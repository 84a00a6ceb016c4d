//! Format-sniffing volume loader.

use std::path::Path;

use burn::tensor::backend::Backend;
use tracing::info;
use voxreg_core::image::Image;

use crate::dicom_io;
use crate::error::{IoError, Result};
use crate::nifti_io;
use crate::vtk_io;

/// Load a volume, picking the reader from the path shape:
/// a directory is a DICOM series, `.nii`/`.nii.gz` is NIfTI, `.vtk` is a
/// legacy structured-points file. Anything else is unsupported.
pub fn read_volume<B: Backend, P: AsRef<Path>>(path: P, device: &B::Device) -> Result<Image<B, 3>> {
    let path = path.as_ref();

    if path.is_dir() {
        info!(path = %path.display(), "reading DICOM series");
        return dicom_io::read_dicom_series(path, device);
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("nii") => {
            info!(path = %path.display(), "reading NIfTI volume");
            nifti_io::read_nifti(path, device)
        }
        Some("gz") if path.to_string_lossy().to_ascii_lowercase().ends_with(".nii.gz") => {
            info!(path = %path.display(), "reading NIfTI volume");
            nifti_io::read_nifti(path, device)
        }
        Some("vtk") => {
            info!(path = %path.display(), "reading legacy VTK volume");
            vtk_io::read_structured_points(path, device)
        }
        _ => Err(IoError::UnsupportedFormat(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use tempfile::tempdir;
    use voxreg_core::spatial::{Direction3, Point3, Spacing3};

    type B = NdArray<f32>;

    #[test]
    fn test_unknown_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("volume.xyz");
        std::fs::write(&path, "junk").unwrap();
        assert!(matches!(
            read_volume::<B, _>(&path, &Default::default()),
            Err(IoError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_vtk_dispatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("volume.vtk");

        let image = Image::<B, 3>::from_raw(
            vec![1.0; 8],
            [2, 2, 2],
            Point3::origin(),
            Spacing3::uniform(1.0),
            Direction3::identity(),
            &Default::default(),
        );
        vtk_io::write_structured_points(&path, &image, false).unwrap();

        let back = read_volume::<B, _>(&path, &Default::default()).unwrap();
        assert_eq!(back.shape(), [2, 2, 2]);
    }
}
