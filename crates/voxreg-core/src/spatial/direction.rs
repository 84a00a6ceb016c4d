//! Direction cosines (orientation of image axes in physical space).

use nalgebra::SMatrix;
use serde::{Deserialize, Serialize};

use super::Vector;

/// Orientation of the image axes as a DxD matrix of direction cosines.
///
/// Column `i` is the physical direction of image axis `i`. For data coming
/// from well-formed DICOM/NIfTI headers this is an orthonormal matrix, but
/// nothing here requires it; geometry code uses the full inverse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Direction<const D: usize>(pub SMatrix<f64, D, D>);

impl<const D: usize> Direction<D> {
    pub fn identity() -> Self {
        Self(SMatrix::identity())
    }

    pub fn from_columns(columns: &[Vector<D>; D]) -> Self {
        let cols: Vec<_> = columns.iter().map(|v| v.0).collect();
        Self(SMatrix::from_columns(&cols))
    }

    /// Whether this matrix is orthogonal within a small tolerance.
    pub fn is_orthogonal(&self) -> bool {
        let product = self.0 * self.0.transpose();
        let identity = SMatrix::<f64, D, D>::identity();
        (0..D).all(|i| (0..D).all(|j| (product[(i, j)] - identity[(i, j)]).abs() < 1e-6))
    }

    pub fn try_inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    pub fn inner(&self) -> &SMatrix<f64, D, D> {
        &self.0
    }
}

impl<const D: usize> std::ops::Index<(usize, usize)> for Direction<D> {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.0[index]
    }
}

impl<const D: usize> std::ops::IndexMut<(usize, usize)> for Direction<D> {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl<const D: usize> std::ops::Mul<Vector<D>> for Direction<D> {
    type Output = Vector<D>;

    fn mul(self, vector: Vector<D>) -> Self::Output {
        Vector(self.0 * vector.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Direction3, Vector3};

    #[test]
    fn test_identity_is_orthogonal() {
        assert!(Direction3::identity().is_orthogonal());
    }

    #[test]
    fn test_axis_permutation() {
        // Swap X and Y axes.
        let d = Direction3::from_columns(&[
            Vector3::new([0.0, 1.0, 0.0]),
            Vector3::new([1.0, 0.0, 0.0]),
            Vector3::new([0.0, 0.0, 1.0]),
        ]);
        assert!(d.is_orthogonal());
        let v = d * Vector3::new([1.0, 0.0, 0.0]);
        assert_eq!(v, Vector3::new([0.0, 1.0, 0.0]));
    }

    #[test]
    fn test_inverse_of_rotation() {
        let angle = std::f64::consts::FRAC_PI_4;
        let d = Direction(nalgebra::Rotation3::from_euler_angles(0.0, 0.0, angle).into_inner());
        let inv = d.try_inverse().unwrap();
        let product = d.0 * inv.0;
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product[(i, j)] - expected).abs() < 1e-12);
            }
        }
    }
}
