//! Adaptive Local Normalization Core Library
//!
//! Pure Rust implementation of adaptive local intensity normalization for
//! 2D images and per-slice 3D stacks. For every pixel a neighborhood
//! radius is grown until the local dispersion statistic exceeds a noise
//! threshold, then the pixel is normalized with the mean and standard
//! deviation of that neighborhood.

pub mod config;
pub mod float_trait;
pub mod normalize;
pub mod padding;
pub mod radius_map;
pub mod stats;

// Re-export commonly used types at the crate root
pub use config::{AlnConfig, AlnError, DispersionMetric, NeighborhoodShape, SearchStrategy};
pub use float_trait::AlnFloat;
pub use normalize::{normalize_image, normalize_stack};
pub use radius_map::compute_radius_map;
