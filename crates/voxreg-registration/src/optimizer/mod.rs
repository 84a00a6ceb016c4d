pub mod adam;
pub mod gradient_descent;
pub mod trait_;

pub use adam::AdamOptimizer;
pub use gradient_descent::GradientDescent;
pub use trait_::Optimizer;
