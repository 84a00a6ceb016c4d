//! Trilinear interpolation.

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use super::trait_::Interpolator;

/// Trilinear interpolator.
///
/// Differentiable with respect to the sampled indices, which is what lets
/// metric gradients flow back into transform parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn gather<B: Backend>(
        flat: &Tensor<B, 1>,
        xi: &Tensor<B, 1, Int>,
        yi: &Tensor<B, 1, Int>,
        zi: &Tensor<B, 1, Int>,
        stride_y: i32,
        stride_z: i32,
    ) -> Tensor<B, 1> {
        let idx = zi.clone() * stride_z + yi.clone() * stride_y + xi.clone();
        flat.clone().gather(0, idx)
    }
}

impl<B: Backend> Interpolator<B> for LinearInterpolator {
    fn interpolate(&self, data: &Tensor<B, 3>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let [d, h, w] = data.dims();
        let batch = indices.dims()[0];
        let device = indices.device();

        let x = indices.clone().narrow(1, 0, 1).squeeze::<1>(1);
        let y = indices.clone().narrow(1, 1, 1).squeeze::<1>(1);
        let z = indices.narrow(1, 2, 1).squeeze::<1>(1);

        let x0 = x.clone().floor();
        let y0 = y.clone().floor();
        let z0 = z.clone().floor();

        let wx = x - x0.clone();
        let wy = y - y0.clone();
        let wz = z - z0.clone();

        let x1 = x0.clone() + 1.0;
        let y1 = y0.clone() + 1.0;
        let z1 = z0.clone() + 1.0;

        let x0_i = x0.clamp(0.0, (w - 1) as f64).int();
        let y0_i = y0.clamp(0.0, (h - 1) as f64).int();
        let z0_i = z0.clamp(0.0, (d - 1) as f64).int();
        let x1_i = x1.clamp(0.0, (w - 1) as f64).int();
        let y1_i = y1.clamp(0.0, (h - 1) as f64).int();
        let z1_i = z1.clamp(0.0, (d - 1) as f64).int();

        let stride_z = (h * w) as i32;
        let stride_y = w as i32;
        let flat = data.clone().reshape([d * h * w]);

        let v000 = Self::gather(&flat, &x0_i, &y0_i, &z0_i, stride_y, stride_z);
        let v001 = Self::gather(&flat, &x0_i, &y0_i, &z1_i, stride_y, stride_z);
        let v010 = Self::gather(&flat, &x0_i, &y1_i, &z0_i, stride_y, stride_z);
        let v011 = Self::gather(&flat, &x0_i, &y1_i, &z1_i, stride_y, stride_z);
        let v100 = Self::gather(&flat, &x1_i, &y0_i, &z0_i, stride_y, stride_z);
        let v101 = Self::gather(&flat, &x1_i, &y0_i, &z1_i, stride_y, stride_z);
        let v110 = Self::gather(&flat, &x1_i, &y1_i, &z0_i, stride_y, stride_z);
        let v111 = Self::gather(&flat, &x1_i, &y1_i, &z1_i, stride_y, stride_z);

        let one = Tensor::<B, 1>::ones([batch], &device);
        let one_minus_wx = one.clone() - wx.clone();
        let one_minus_wy = one.clone() - wy.clone();
        let one_minus_wz = one - wz.clone();

        // Collapse along X, then Y, then Z.
        let c00 = v000 * one_minus_wx.clone() + v100 * wx.clone();
        let c01 = v001 * one_minus_wx.clone() + v101 * wx.clone();
        let c10 = v010 * one_minus_wx.clone() + v110 * wx.clone();
        let c11 = v011 * one_minus_wx + v111 * wx;

        let c0 = c00 * one_minus_wy.clone() + c10 * wy.clone();
        let c1 = c01 * one_minus_wy + c11 * wy;

        c0 * one_minus_wz + c1 * wz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Shape, TensorData};
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn cube() -> Tensor<B, 3> {
        // [Z=2, Y=2, X=2] with distinctive corner values.
        let values = vec![0.0, 1.0, 10.0, 11.0, 100.0, 101.0, 110.0, 111.0];
        Tensor::from_data(
            TensorData::new(values, Shape::new([2, 2, 2])),
            &Default::default(),
        )
    }

    #[test]
    fn test_exact_grid_points() {
        let device = Default::default();
        let data = cube();
        let indices = Tensor::<B, 2>::from_floats(
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            &device,
        );
        let out = LinearInterpolator::new().interpolate(&data, indices);
        let out = out.into_data();
        let out = out.as_slice::<f32>().unwrap();

        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 1.0);
        assert_eq!(out[2], 10.0);
        assert_eq!(out[3], 100.0);
    }

    #[test]
    fn test_cell_center_averages_corners() {
        let device = Default::default();
        let data = cube();
        let center = Tensor::<B, 2>::from_floats([[0.5, 0.5, 0.5]], &device);
        let out = LinearInterpolator::new().interpolate(&data, center);
        let value = out.into_data().as_slice::<f32>().unwrap()[0];
        let expected = (0.0 + 1.0 + 10.0 + 11.0 + 100.0 + 101.0 + 110.0 + 111.0) / 8.0;
        assert!((value - expected).abs() < 1e-5);
    }

    #[test]
    fn test_out_of_bounds_clamps() {
        let device = Default::default();
        let data = cube();
        let indices = Tensor::<B, 2>::from_floats([[-3.0, -3.0, -3.0], [5.0, 5.0, 5.0]], &device);
        let out = LinearInterpolator::new().interpolate(&data, indices);
        let out = out.into_data();
        let out = out.as_slice::<f32>().unwrap();
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 111.0);
    }
}
