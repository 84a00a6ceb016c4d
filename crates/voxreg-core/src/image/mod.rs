pub mod grid;
#[allow(clippy::module_inception)]
pub mod image;

pub use grid::{generate_grid, Grid3};
pub use image::Image;
