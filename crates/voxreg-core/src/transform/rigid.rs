//! Rigid transform: rotation plus translation about a fixed center.

use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::spatial::Point3;

use super::trait_::Transform;
use super::Affine;

/// 3D rigid transform with a fixed center of rotation.
///
/// Parameterized by 3 Euler angles (ZYX composition, `R = Rz * Ry * Rx`)
/// and 3 translation offsets, both optimizable; the center is fixed and
/// excluded from optimization:
///
/// `T(x) = R(x - c) + c + t`
#[derive(Module, Debug)]
pub struct RigidTransform<B: Backend> {
    rotation: Param<Tensor<B, 1>>,
    translation: Param<Tensor<B, 1>>,
    center: Tensor<B, 1>,
}

impl<B: Backend> RigidTransform<B> {
    /// Create a rigid transform from `[3]` tensors of Euler angles
    /// (radians), translation offsets and the rotation center.
    pub fn new(rotation: Tensor<B, 1>, translation: Tensor<B, 1>, center: Tensor<B, 1>) -> Self {
        Self {
            rotation: Param::from_tensor(rotation),
            translation: Param::from_tensor(translation),
            center,
        }
    }

    /// Identity transform about `center` (or the origin if `None`).
    pub fn identity(center: Option<Tensor<B, 1>>, device: &B::Device) -> Self {
        let rotation = Tensor::<B, 1>::zeros([3], device);
        let translation = Tensor::<B, 1>::zeros([3], device);
        let center = center.unwrap_or_else(|| Tensor::<B, 1>::zeros([3], device));
        Self::new(rotation, translation, center)
    }

    /// Build a transform from a 6-vector `[rx, ry, rz, tx, ty, tz]`.
    pub fn from_params(params: [f64; 6], center: Point3, device: &B::Device) -> Self {
        let rotation = Tensor::<B, 1>::from_floats(
            [params[0] as f32, params[1] as f32, params[2] as f32],
            device,
        );
        let translation = Tensor::<B, 1>::from_floats(
            [params[3] as f32, params[4] as f32, params[5] as f32],
            device,
        );
        let center = Tensor::<B, 1>::from_floats(
            [center[0] as f32, center[1] as f32, center[2] as f32],
            device,
        );
        Self::new(rotation, translation, center)
    }

    pub fn rotation(&self) -> Tensor<B, 1> {
        self.rotation.val()
    }

    pub fn translation(&self) -> Tensor<B, 1> {
        self.translation.val()
    }

    pub fn center(&self) -> Tensor<B, 1> {
        self.center.clone()
    }

    /// Current parameters as `[rx, ry, rz, tx, ty, tz]`.
    pub fn params(&self) -> [f64; 6] {
        let r = tensor_to_array3(self.rotation.val());
        let t = tensor_to_array3(self.translation.val());
        [r[0], r[1], r[2], t[0], t[1], t[2]]
    }

    /// Collapse to a homogeneous 4x4 affine on the host.
    ///
    /// The center is folded into the offset column, so the affine and
    /// `transform_points` agree on every point.
    pub fn affine(&self) -> Affine {
        let [rx, ry, rz, tx, ty, tz] = self.params();
        let c = tensor_to_array3(self.center.clone());
        Affine::from_euler(
            [rx, ry, rz],
            [tx, ty, tz],
            Point3::new([c[0], c[1], c[2]]),
        )
    }

    /// Rotation matrix `[3, 3]` from the Euler angles, differentiable
    /// with respect to the angle parameters.
    fn build_rotation_matrix(&self) -> Tensor<B, 2> {
        let r = self.rotation.val();
        let alpha = r.clone().slice([0..1]);
        let beta = r.clone().slice([1..2]);
        let gamma = r.slice([2..3]);

        let cx = alpha.clone().cos();
        let sx = alpha.sin();
        let cy = beta.clone().cos();
        let sy = beta.sin();
        let cz = gamma.clone().cos();
        let sz = gamma.sin();

        let r11 = cz.clone().mul(cy.clone());
        let r12 = cz
            .clone()
            .mul(sy.clone())
            .mul(sx.clone())
            .sub(sz.clone().mul(cx.clone()));
        let r13 = cz
            .clone()
            .mul(sy.clone())
            .mul(cx.clone())
            .add(sz.clone().mul(sx.clone()));

        let r21 = sz.clone().mul(cy.clone());
        let r22 = sz
            .clone()
            .mul(sy.clone())
            .mul(sx.clone())
            .add(cz.clone().mul(cx.clone()));
        let r23 = sz.mul(sy.clone()).mul(cx.clone()).sub(cz.mul(sx.clone()));

        let r31 = sy.neg();
        let r32 = cy.clone().mul(sx);
        let r33 = cy.mul(cx);

        let row1 = Tensor::cat(vec![r11, r12, r13], 0).reshape([1, 3]);
        let row2 = Tensor::cat(vec![r21, r22, r23], 0).reshape([1, 3]);
        let row3 = Tensor::cat(vec![r31, r32, r33], 0).reshape([1, 3]);

        Tensor::cat(vec![row1, row2, row3], 0)
    }
}

impl<B: Backend> Transform<B> for RigidTransform<B> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        // Row-vector form: y = (x - c) @ R^T + c + t
        let r = self.build_rotation_matrix();
        let t = self.translation.val().reshape([1, 3]);
        let c = self.center.clone().reshape([1, 3]);

        let centered = points - c.clone();
        centered.matmul(r.transpose()) + c + t
    }
}

fn tensor_to_array3<B: Backend>(tensor: Tensor<B, 1>) -> [f64; 3] {
    let data = tensor.into_data();
    let values = data.as_slice::<f32>().unwrap_or(&[0.0; 3]);
    [values[0] as f64, values[1] as f64, values[2] as f64]
}
