//! Vector fields on regular grids and scattered point sets.

pub mod scattered;
pub mod vector_field;

pub use scattered::{ScatterMethod, ScatteredField};
pub use vector_field::{mask_field, VectorField};
