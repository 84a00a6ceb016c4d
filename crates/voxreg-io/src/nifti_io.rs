//! NIfTI volume IO.

use std::path::Path;

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};
use nalgebra::SMatrix;
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use voxreg_core::image::Image;
use voxreg_core::spatial::{Direction, Point, Spacing};

use crate::error::{IoError, Result};

/// Read a 3D NIfTI volume.
///
/// Geometry comes from the sform when set, else the qform, else plain
/// pixdim scaling. Data is permuted from NIfTI's `[X, Y, Z]` into the
/// `[Z, Y, X]` tensor layout.
pub fn read_nifti<B: Backend, P: AsRef<Path>>(path: P, device: &B::Device) -> Result<Image<B, 3>> {
    let path = path.as_ref();
    let obj = ReaderOptions::new()
        .read_file(path)
        .map_err(|e| IoError::parse(path, e.to_string()))?;
    let header = obj.header();

    let affine: [[f32; 4]; 4] = if header.sform_code > 0 {
        [
            header.srow_x,
            header.srow_y,
            header.srow_z,
            [0.0, 0.0, 0.0, 1.0],
        ]
    } else if header.qform_code > 0 {
        // Quaternion form per the NIfTI standard.
        let b = header.quatern_b;
        let c = header.quatern_c;
        let d = header.quatern_d;
        let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();

        let qfac = if header.pixdim[0] == 0.0 {
            1.0
        } else {
            header.pixdim[0]
        };

        let r11 = a * a + b * b - c * c - d * d;
        let r12 = 2.0 * b * c - 2.0 * a * d;
        let r13 = 2.0 * b * d + 2.0 * a * c;
        let r21 = 2.0 * b * c + 2.0 * a * d;
        let r22 = a * a + c * c - b * b - d * d;
        let r23 = 2.0 * c * d - 2.0 * a * b;
        let r31 = 2.0 * b * d - 2.0 * a * c;
        let r32 = 2.0 * c * d + 2.0 * a * b;
        let r33 = a * a + d * d - c * c - b * b;

        let dx = header.pixdim[1];
        let dy = header.pixdim[2];
        let dz = header.pixdim[3] * qfac;

        [
            [r11 * dx, r12 * dy, r13 * dz, header.quatern_x],
            [r21 * dx, r22 * dy, r23 * dz, header.quatern_y],
            [r31 * dx, r32 * dy, r33 * dz, header.quatern_z],
            [0.0, 0.0, 0.0, 1.0],
        ]
    } else {
        let dx = header.pixdim[1];
        let dy = header.pixdim[2];
        let dz = header.pixdim[3];
        [
            [dx, 0.0, 0.0, 0.0],
            [0.0, dy, 0.0, 0.0],
            [0.0, 0.0, dz, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ]
    };

    let origin = Point::new([
        affine[0][3] as f64,
        affine[1][3] as f64,
        affine[2][3] as f64,
    ]);

    // Columns carry direction scaled by spacing.
    let mut columns = [nalgebra::Vector3::zeros(); 3];
    let mut spacing = [0.0f64; 3];
    for c in 0..3 {
        let col = nalgebra::Vector3::new(
            affine[0][c] as f64,
            affine[1][c] as f64,
            affine[2][c] as f64,
        );
        spacing[c] = col.norm();
        columns[c] = if spacing[c] > 1e-9 {
            col / spacing[c]
        } else {
            let mut axis = nalgebra::Vector3::zeros();
            axis[c] = 1.0;
            axis
        };
    }
    let spacing = Spacing::new([
        spacing[0].max(1e-9),
        spacing[1].max(1e-9),
        spacing[2].max(1e-9),
    ]);
    let direction = Direction(SMatrix::<f64, 3, 3>::from_columns(&columns));

    let volume = obj.into_volume();
    let array = volume
        .into_ndarray::<f32>()
        .map_err(|e| IoError::parse(path, e.to_string()))?;

    let shape = array.shape();
    if shape.len() != 3 {
        return Err(IoError::parse(
            path,
            format!("expected a 3D volume, found {} dimensions", shape.len()),
        ));
    }
    let dims = [shape[0], shape[1], shape[2]];

    let values = array.into_raw_vec();
    let tensor = Tensor::<B, 3>::from_data(TensorData::new(values, Shape::new(dims)), device);
    let tensor = tensor.permute([2, 1, 0]);

    Ok(Image::new(tensor, origin, spacing, direction))
}

/// Write a volume as NIfTI.
///
/// The writer keeps voxel values and dims; origin and direction go through
/// the default header, so this output is for inspection rather than as the
/// pipeline's geometric source of truth (that role belongs to legacy VTK).
pub fn write_nifti<B: Backend, P: AsRef<Path>>(path: P, image: &Image<B, 3>) -> Result<()> {
    use ndarray::Array3;
    use nifti::writer::WriterOptions;

    let path = path.as_ref();
    let tensor = image.data().clone().permute([2, 1, 0]);
    let data = tensor.into_data();
    let values = data
        .to_vec::<f32>()
        .map_err(|e| IoError::parse(path, format!("tensor conversion: {e:?}")))?;

    let [nz, ny, nx] = image.shape();
    let array = Array3::from_shape_vec((nx, ny, nz), values)
        .map_err(|e| IoError::parse(path, e.to_string()))?;

    WriterOptions::new(path)
        .write_nifti(&array)
        .map_err(|e| IoError::parse(path, e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use ndarray::Array3;
    use nifti::writer::WriterOptions;
    use tempfile::tempdir;

    type B = NdArray<f32>;

    #[test]
    fn test_read_back_written_volume() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("vol.nii");

        let values: Vec<f32> = (0..3 * 4 * 5).map(|v| v as f32).collect();
        let array = Array3::from_shape_vec((3, 4, 5), values).unwrap();
        WriterOptions::new(&file).write_nifti(&array).unwrap();

        let device = Default::default();
        let image = read_nifti::<B, _>(&file, &device).unwrap();

        // NIfTI [X=3, Y=4, Z=5] becomes tensor [Z=5, Y=4, X=3].
        assert_eq!(image.shape(), [5, 4, 3]);
        let out = image.to_vec();
        assert_eq!(out[0], 0.0);
        assert_eq!(out.len(), 60);
    }

    #[test]
    fn test_missing_file() {
        let device = Default::default();
        assert!(read_nifti::<B, _>("/nonexistent/vol.nii", &device).is_err());
    }
}
