//! Axis projections.

use burn::tensor::backend::Backend;

use crate::image::Image;

/// Maximum-intensity projection along Z.
///
/// Returns the projected `[Y, X]` plane as a host buffer plus its dims.
/// Used by the auto-threshold step, which runs Otsu on the projection
/// rather than the full volume.
pub fn max_projection_z<B: Backend>(image: &Image<B, 3>) -> (Vec<f32>, [usize; 2]) {
    let [d, h, w] = image.shape();
    let values = image.to_vec();

    let mut plane = vec![f32::NEG_INFINITY; h * w];
    for z in 0..d {
        let slab = &values[z * h * w..(z + 1) * h * w];
        for (acc, &v) in plane.iter_mut().zip(slab.iter()) {
            if v > *acc {
                *acc = v;
            }
        }
    }
    (plane, [h, w])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Direction3, Point3, Spacing3};
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_max_projection() {
        let mut values = vec![0.0f32; 3 * 2 * 2];
        // Column (y=0, x=1) peaks in slice z=1.
        values[0 * 4 + 1] = 1.0;
        values[1 * 4 + 1] = 5.0;
        values[2 * 4 + 1] = 3.0;
        let image = Image::<B, 3>::from_raw(
            values,
            [3, 2, 2],
            Point3::origin(),
            Spacing3::uniform(1.0),
            Direction3::identity(),
            &Default::default(),
        );

        let (plane, dims) = max_projection_z(&image);
        assert_eq!(dims, [2, 2]);
        assert_eq!(plane[1], 5.0);
        assert_eq!(plane[0], 0.0);
    }
}
