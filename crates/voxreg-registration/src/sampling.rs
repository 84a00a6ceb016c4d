//! Random voxel sampling for the similarity metric.

use burn::tensor::backend::Backend;
use burn::tensor::{Shape, Tensor, TensorData};
use rand::rngs::StdRng;
use rand::SeedableRng;

use voxreg_core::image::generate_grid;

use crate::error::{RegistrationError, Result};

/// Draws a random subset of fixed-image voxel indices each iteration.
///
/// Index rows come back `(x, y, z)`-ordered, matching the coordinate
/// helpers on [`voxreg_core::image::Image`]. A fraction of 1.0 short
/// circuits to the full grid.
pub struct RandomSampler {
    fraction: f64,
    rng: StdRng,
}

impl RandomSampler {
    pub fn new(fraction: f64, seed: u64) -> Result<Self> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(RegistrationError::invalid_configuration(format!(
                "sampling fraction must be in (0, 1], got {fraction}"
            )));
        }
        Ok(Self {
            fraction,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Sample index rows for a `[Z, Y, X]`-shaped volume.
    pub fn sample<B: Backend>(&mut self, shape: [usize; 3], device: &B::Device) -> Tensor<B, 2> {
        if self.fraction >= 1.0 {
            return generate_grid::<B, 3>(shape, device);
        }

        let [nz, ny, nx] = shape;
        let total = nx * ny * nz;
        let count = ((total as f64 * self.fraction) as usize).max(1);

        let picks = rand::seq::index::sample(&mut self.rng, total, count);
        let mut rows = Vec::with_capacity(count * 3);
        for flat in picks.iter() {
            let x = flat % nx;
            let y = (flat / nx) % ny;
            let z = flat / (nx * ny);
            rows.push(x as f32);
            rows.push(y as f32);
            rows.push(z as f32);
        }

        Tensor::from_data(TensorData::new(rows, Shape::new([count, 3])), device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_rejects_bad_fraction() {
        assert!(RandomSampler::new(0.0, 0).is_err());
        assert!(RandomSampler::new(1.5, 0).is_err());
        assert!(RandomSampler::new(0.9, 0).is_ok());
    }

    #[test]
    fn test_sample_count_and_bounds() {
        let device = Default::default();
        let mut sampler = RandomSampler::new(0.5, 7).unwrap();
        let indices = sampler.sample::<B>([4, 5, 6], &device);
        assert_eq!(indices.dims(), [60, 3]);

        let host = indices.into_data();
        let rows = host.as_slice::<f32>().unwrap();
        for row in rows.chunks_exact(3) {
            assert!(row[0] >= 0.0 && row[0] < 6.0);
            assert!(row[1] >= 0.0 && row[1] < 5.0);
            assert!(row[2] >= 0.0 && row[2] < 4.0);
        }
    }

    #[test]
    fn test_full_fraction_is_whole_grid() {
        let device = Default::default();
        let mut sampler = RandomSampler::new(1.0, 0).unwrap();
        let indices = sampler.sample::<B>([2, 3, 4], &device);
        assert_eq!(indices.dims(), [24, 3]);
    }

    #[test]
    fn test_seed_determinism() {
        let device = Default::default();
        let a = RandomSampler::new(0.3, 99)
            .unwrap()
            .sample::<B>([8, 8, 8], &device)
            .into_data();
        let b = RandomSampler::new(0.3, 99)
            .unwrap()
            .sample::<B>([8, 8, 8], &device)
            .into_data();
        assert_eq!(a.as_slice::<f32>().unwrap(), b.as_slice::<f32>().unwrap());
    }
}
