//! Homogeneous 4x4 affine transforms on the host.

use nalgebra::{Matrix3, Matrix4, Rotation3, Vector3 as NaVector3};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::spatial::{Point3, Vector3};

/// A 4x4 homogeneous affine transform in physical space.
///
/// This is the exchange format of the pipeline: rigid registration results
/// collapse to one of these, transform dump files store lists of them, and
/// meshes and vector fields are moved by them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine(Matrix4<f64>);

impl Affine {
    pub fn identity() -> Self {
        Self(Matrix4::identity())
    }

    pub fn from_matrix(matrix: Matrix4<f64>) -> Self {
        Self(matrix)
    }

    /// Build from ZYX Euler angles, translation offsets and a fixed
    /// rotation center: the affine of `T(x) = R(x - c) + c + t`.
    pub fn from_euler(angles: [f64; 3], translation: [f64; 3], center: Point3) -> Self {
        let rotation = Rotation3::from_euler_angles(angles[0], angles[1], angles[2]);
        let r = rotation.into_inner();
        let c = NaVector3::new(center[0], center[1], center[2]);
        let t = NaVector3::new(translation[0], translation[1], translation[2]);
        let offset = t + c - r * c;

        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&r);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&offset);
        Self(m)
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.0
    }

    /// The upper-left 3x3 linear part.
    pub fn linear(&self) -> Matrix3<f64> {
        self.0.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// The offset column.
    pub fn offset(&self) -> Vector3 {
        Vector3::new([self.0[(0, 3)], self.0[(1, 3)], self.0[(2, 3)]])
    }

    pub fn apply_point(&self, point: &Point3) -> Point3 {
        let p = NaVector3::new(point[0], point[1], point[2]);
        let out = self.linear() * p + NaVector3::new(self.0[(0, 3)], self.0[(1, 3)], self.0[(2, 3)]);
        Point3::new([out[0], out[1], out[2]])
    }

    /// Apply only the linear part; displacements and flow vectors have no
    /// translation component.
    pub fn apply_vector(&self, vector: &Vector3) -> Vector3 {
        let v = NaVector3::new(vector[0], vector[1], vector[2]);
        let out = self.linear() * v;
        Vector3::new([out[0], out[1], out[2]])
    }

    pub fn apply_points(&self, points: &[Point3]) -> Vec<Point3> {
        points.iter().map(|p| self.apply_point(p)).collect()
    }

    /// Compose: `self.compose(&other)` applies `other` first, then `self`.
    pub fn compose(&self, other: &Affine) -> Affine {
        Affine(self.0 * other.0)
    }

    pub fn inverse(&self) -> Result<Affine> {
        self.0
            .try_inverse()
            .map(Affine)
            .ok_or_else(|| CoreError::DegenerateInput("affine matrix is singular".into()))
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_fixes_points() {
        let a = Affine::identity();
        let p = Point3::new([1.0, -2.0, 3.0]);
        assert_eq!(a.apply_point(&p), p);
    }

    #[test]
    fn test_translation_offset() {
        let a = Affine::from_euler([0.0; 3], [5.0, 0.0, -1.0], Point3::origin());
        let p = a.apply_point(&Point3::new([1.0, 1.0, 1.0]));
        assert_eq!(p.to_array(), [6.0, 1.0, 0.0]);
        // Vectors ignore the translation.
        let v = a.apply_vector(&Vector3::new([1.0, 1.0, 1.0]));
        assert_eq!(v.to_array(), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_center_is_fixed_point() {
        let center = Point3::new([4.0, 5.0, 6.0]);
        let a = Affine::from_euler([0.3, -0.1, 0.7], [0.0; 3], center);
        let out = a.apply_point(&center);
        for i in 0..3 {
            assert_relative_eq!(out[i], center[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_inverse_roundtrip() {
        let a = Affine::from_euler([0.2, 0.4, -0.3], [1.0, 2.0, 3.0], Point3::new([1.0, 1.0, 1.0]));
        let inv = a.inverse().unwrap();
        let p = Point3::new([7.0, -2.0, 0.5]);
        let back = inv.apply_point(&a.apply_point(&p));
        for i in 0..3 {
            assert_relative_eq!(back[i], p[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_compose_order() {
        let shift = Affine::from_euler([0.0; 3], [1.0, 0.0, 0.0], Point3::origin());
        let rot = Affine::from_euler([0.0, 0.0, std::f64::consts::FRAC_PI_2], [0.0; 3], Point3::origin());
        // Rotate first, then shift.
        let combined = shift.compose(&rot);
        let out = combined.apply_point(&Point3::new([1.0, 0.0, 0.0]));
        assert_relative_eq!(out[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(out[1], 1.0, epsilon = 1e-12);
    }
}
