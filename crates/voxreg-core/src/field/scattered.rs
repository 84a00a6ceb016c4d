//! Scattered-to-grid vector interpolation.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{CoreError, Result};
use crate::image::Grid3;
use crate::spatial::Point3;

use super::vector_field::VectorField;

/// How scattered samples map onto grid points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScatterMethod {
    /// Value of the nearest source point, everywhere.
    Nearest,
    /// Distance-weighted average of source points within `radius` (mm);
    /// grid points with no source inside the radius take the fill value.
    Linear { radius: f64 },
}

/// Vector samples at arbitrary physical positions.
#[derive(Debug, Clone)]
pub struct ScatteredField {
    points: Vec<Point3>,
    vectors: Vec<[f64; 3]>,
}

impl ScatteredField {
    pub fn new(points: Vec<Point3>, vectors: Vec<[f64; 3]>) -> Result<Self> {
        if points.len() != vectors.len() {
            return Err(CoreError::InvalidBufferLength {
                expected: points.len(),
                actual: vectors.len(),
            });
        }
        Ok(Self { points, vectors })
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn vectors(&self) -> &[[f64; 3]] {
        &self.vectors
    }

    /// Interpolate the samples onto a regular grid, per component.
    pub fn resample_to_grid(
        &self,
        target: &Grid3,
        method: ScatterMethod,
        fill: f64,
    ) -> Result<VectorField> {
        if self.points.is_empty() {
            return Err(CoreError::DegenerateInput("empty point cloud".into()));
        }

        let buckets = BucketGrid::build(&self.points, target);
        let n = target.num_points();
        let mut vectors = vec![[fill; 3]; n];
        let mut unsupported = 0usize;

        for flat in 0..n {
            let query = target.point_at(target.unflatten(flat));
            match method {
                ScatterMethod::Nearest => {
                    let idx = buckets.nearest(&query, &self.points);
                    vectors[flat] = self.vectors[idx];
                }
                ScatterMethod::Linear { radius } => {
                    match buckets.weighted_average(&query, &self.points, &self.vectors, radius) {
                        Some(v) => vectors[flat] = v,
                        None => unsupported += 1,
                    }
                }
            }
        }

        debug!(
            grid_points = n,
            sources = self.points.len(),
            unsupported,
            "resampled scattered field"
        );
        VectorField::new(*target, vectors)
    }
}

/// Uniform spatial hash over the source points.
struct BucketGrid {
    cell: f64,
    map: HashMap<[i64; 3], Vec<usize>>,
}

impl BucketGrid {
    fn build(points: &[Point3], target: &Grid3) -> Self {
        // Cell size near the target resolution keeps ring searches short.
        let cell = (0..3)
            .map(|i| target.spacing[i])
            .fold(f64::MIN, f64::max)
            .max(1e-9);

        let mut map: HashMap<[i64; 3], Vec<usize>> = HashMap::new();
        for (i, p) in points.iter().enumerate() {
            map.entry(Self::key(p, cell)).or_default().push(i);
        }
        Self { cell, map }
    }

    fn key(p: &Point3, cell: f64) -> [i64; 3] {
        [
            (p[0] / cell).floor() as i64,
            (p[1] / cell).floor() as i64,
            (p[2] / cell).floor() as i64,
        ]
    }

    /// Index of the source point closest to `query`.
    ///
    /// Searches outward ring by ring; once a candidate is found the search
    /// continues until the ring distance exceeds the best hit, which makes
    /// the result exact.
    fn nearest(&self, query: &Point3, points: &[Point3]) -> usize {
        let center = Self::key(query, self.cell);
        let mut best: Option<(f64, usize)> = None;

        let mut ring = 0i64;
        loop {
            for kz in -ring..=ring {
                for ky in -ring..=ring {
                    for kx in -ring..=ring {
                        if kx.abs().max(ky.abs()).max(kz.abs()) != ring {
                            continue;
                        }
                        let key = [center[0] + kx, center[1] + ky, center[2] + kz];
                        if let Some(indices) = self.map.get(&key) {
                            for &i in indices {
                                let d2 = dist2(query, &points[i]);
                                if best.map_or(true, |(b, _)| d2 < b) {
                                    best = Some((d2, i));
                                }
                            }
                        }
                    }
                }
            }
            if let Some((d2, i)) = best {
                // A point in ring r is at least (r - 1) * cell away, so any
                // closer hit must lie within the rings already visited.
                if (ring as f64) * self.cell >= d2.sqrt() {
                    return i;
                }
            }
            ring += 1;
        }
    }

    /// Inverse-distance-weighted mean of vectors within `radius` of
    /// `query`, or `None` when no source point is in range.
    fn weighted_average(
        &self,
        query: &Point3,
        points: &[Point3],
        vectors: &[[f64; 3]],
        radius: f64,
    ) -> Option<[f64; 3]> {
        let center = Self::key(query, self.cell);
        let reach = (radius / self.cell).ceil() as i64;
        let r2 = radius * radius;

        let mut acc = [0.0f64; 3];
        let mut weight_sum = 0.0f64;

        for kz in -reach..=reach {
            for ky in -reach..=reach {
                for kx in -reach..=reach {
                    let key = [center[0] + kx, center[1] + ky, center[2] + kz];
                    let Some(indices) = self.map.get(&key) else {
                        continue;
                    };
                    for &i in indices {
                        let d2 = dist2(query, &points[i]);
                        if d2 > r2 {
                            continue;
                        }
                        if d2 < 1e-18 {
                            return Some(vectors[i]);
                        }
                        let w = 1.0 / d2.sqrt();
                        for c in 0..3 {
                            acc[c] += w * vectors[i][c];
                        }
                        weight_sum += w;
                    }
                }
            }
        }

        if weight_sum > 0.0 {
            Some([
                acc[0] / weight_sum,
                acc[1] / weight_sum,
                acc[2] / weight_sum,
            ])
        } else {
            None
        }
    }
}

fn dist2(a: &Point3, b: &Point3) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Direction3, Spacing3};

    fn unit_grid(dims: [usize; 3]) -> Grid3 {
        Grid3::new(
            dims,
            Spacing3::uniform(1.0),
            Point3::origin(),
            Direction3::identity(),
        )
    }

    #[test]
    fn test_nearest_picks_closest_source() {
        let field = ScatteredField::new(
            vec![Point3::new([0.0, 0.0, 0.0]), Point3::new([3.0, 0.0, 0.0])],
            vec![[1.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
        )
        .unwrap();

        let out = field
            .resample_to_grid(&unit_grid([4, 1, 1]), ScatterMethod::Nearest, 0.0)
            .unwrap();

        assert_eq!(out.vectors()[0], [1.0, 0.0, 0.0]);
        assert_eq!(out.vectors()[1], [1.0, 0.0, 0.0]);
        assert_eq!(out.vectors()[2], [2.0, 0.0, 0.0]);
        assert_eq!(out.vectors()[3], [2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_linear_fills_unsupported_points() {
        let field = ScatteredField::new(
            vec![Point3::new([0.0, 0.0, 0.0])],
            vec![[4.0, 0.0, 0.0]],
        )
        .unwrap();

        let out = field
            .resample_to_grid(
                &unit_grid([5, 1, 1]),
                ScatterMethod::Linear { radius: 1.5 },
                -1.0,
            )
            .unwrap();

        // x=0 and x=1 are in range, the rest get the fill value.
        assert_eq!(out.vectors()[0], [4.0, 0.0, 0.0]);
        assert_eq!(out.vectors()[1], [4.0, 0.0, 0.0]);
        assert_eq!(out.vectors()[2], [-1.0, -1.0, -1.0]);
        assert_eq!(out.vectors()[4], [-1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_linear_weights_by_distance() {
        let field = ScatteredField::new(
            vec![Point3::new([0.0, 0.0, 0.0]), Point3::new([2.0, 0.0, 0.0])],
            vec![[0.0, 0.0, 0.0], [4.0, 0.0, 0.0]],
        )
        .unwrap();

        let out = field
            .resample_to_grid(
                &unit_grid([3, 1, 1]),
                ScatterMethod::Linear { radius: 3.0 },
                0.0,
            )
            .unwrap();

        // Midpoint is equidistant: plain average.
        assert!((out.vectors()[1][0] - 2.0).abs() < 1e-9);
        // Coincident query returns the exact sample.
        assert_eq!(out.vectors()[0], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_cloud_is_an_error() {
        let field = ScatteredField::new(vec![], vec![]).unwrap();
        assert!(matches!(
            field.resample_to_grid(&unit_grid([2, 2, 2]), ScatterMethod::Nearest, 0.0),
            Err(CoreError::DegenerateInput(_))
        ));
    }
}
