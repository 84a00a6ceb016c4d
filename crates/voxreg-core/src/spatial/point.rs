//! Physical-space position.

use nalgebra::Point as NaPoint;
use serde::{Deserialize, Serialize};

use super::Vector;

/// A position in D-dimensional physical space.
///
/// Thin wrapper around nalgebra's `Point` so that image geometry reads in
/// domain terms (origins, rotation centers) while keeping the full nalgebra
/// toolbox one `.0` away.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point<const D: usize>(pub NaPoint<f64, D>);

impl<const D: usize> Point<D> {
    pub fn new(coords: [f64; D]) -> Self {
        Self(NaPoint::from(coords))
    }

    pub fn origin() -> Self {
        Self(NaPoint::origin())
    }

    pub fn from_slice(coords: &[f64]) -> Self {
        assert_eq!(coords.len(), D, "coordinate slice length must match dimension");
        let mut point = Self::origin();
        for i in 0..D {
            point.0.coords[i] = coords[i];
        }
        point
    }

    pub fn to_array(&self) -> [f64; D] {
        let mut out = [0.0; D];
        for i in 0..D {
            out[i] = self.0.coords[i];
        }
        out
    }

    pub fn inner(&self) -> &NaPoint<f64, D> {
        &self.0
    }
}

impl<const D: usize> std::ops::Index<usize> for Point<D> {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0.coords[index]
    }
}

impl<const D: usize> std::ops::IndexMut<usize> for Point<D> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0.coords[index]
    }
}

impl<const D: usize> std::ops::Sub for Point<D> {
    type Output = Vector<D>;

    fn sub(self, other: Self) -> Self::Output {
        Vector(self.0.coords - other.0.coords)
    }
}

impl<const D: usize> std::ops::Add<Vector<D>> for Point<D> {
    type Output = Self;

    fn add(self, vector: Vector<D>) -> Self::Output {
        Self(self.0 + vector.0)
    }
}
