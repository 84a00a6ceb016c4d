//! Voxel spacing (physical distance between neighbouring samples).

use serde::{Deserialize, Serialize};

/// Physical distance between adjacent voxels along each axis, in mm.
///
/// All components must be strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "[f64; D]: Serialize",
    deserialize = "[f64; D]: Deserialize<'de>"
))]
pub struct Spacing<const D: usize>([f64; D]);

impl<const D: usize> Spacing<D> {
    /// # Panics
    /// Panics if any component is not strictly positive.
    pub fn new(spacing: [f64; D]) -> Self {
        assert!(
            spacing.iter().all(|&s| s > 0.0),
            "spacing components must be positive, got {spacing:?}"
        );
        Self(spacing)
    }

    pub fn uniform(value: f64) -> Self {
        Self::new([value; D])
    }

    pub fn to_array(&self) -> [f64; D] {
        self.0
    }
}

impl<const D: usize> std::ops::Index<usize> for Spacing<D> {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<const D: usize> std::ops::IndexMut<usize> for Spacing<D> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Spacing3;

    #[test]
    fn test_spacing_uniform() {
        let s = Spacing3::uniform(0.5);
        assert_eq!(s.to_array(), [0.5, 0.5, 0.5]);
    }

    #[test]
    #[should_panic(expected = "spacing components must be positive")]
    fn test_spacing_rejects_zero() {
        let _ = Spacing::<3>::new([1.0, 0.0, 1.0]);
    }
}
