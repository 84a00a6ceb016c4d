pub mod mean_squares;
pub mod mutual_information;
pub mod trait_;

pub use mean_squares::MeanSquares;
pub use mutual_information::MutualInformation;
pub use trait_::Metric;
