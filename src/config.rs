//! Configuration for adaptive local normalization.
//!
//! All parameters are fixed for the duration of one invocation; there is no
//! process-wide mutable state. Defaults match the reference module settings.

use crate::float_trait::AlnFloat;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Default threshold fraction of the global standard deviation.
const DEFAULT_THRESHOLD_FRACTION: f64 = 0.5;

/// Default maximum neighborhood radius for the per-pixel search.
const DEFAULT_MAX_RADIUS: usize = 25;

// =============================================================================
// Types
// =============================================================================

/// Errors surfaced by the normalization entry points.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlnError {
    /// Configuration rejected before any computation started.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input image (or stack slice) has a zero-sized dimension.
    #[error("empty input image: shape ({rows}, {cols})")]
    EmptyImage { rows: usize, cols: usize },
}

/// Local dispersion statistic used as the radius-search stopping criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispersionMetric {
    /// Raw local standard deviation.
    #[default]
    Std,
    /// Coefficient of variation, std / (mean + 1). The +1 offset stabilizes
    /// the ratio for non-negative intensity data.
    Cv,
}

/// Neighborhood geometry for local statistics.
///
/// The shape selects the estimator: `Disc` uses exact per-pixel aggregation
/// over a Euclidean disc footprint, `Square` uses the fast separable
/// rolling-sum filter over a (2r+1)x(2r+1) window. The two are an
/// approximation trade-off, not equivalent computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NeighborhoodShape {
    /// Exact Euclidean disc structuring element of radius r.
    Disc,
    /// Axis-aligned (2r+1)x(2r+1) window, separable filtering.
    #[default]
    Square,
}

/// Strategy for computing the per-pixel radius field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStrategy {
    /// Grow the radius at each pixel independently until the dispersion
    /// exceeds the threshold. Faithful to the source algorithm but slow.
    PerPixel,
    /// Precompute whole-image dispersion per radius and assign radii in
    /// increasing order, first exceedance wins.
    #[default]
    Vectorized,
}

/// Configuration for one normalization run.
///
/// Use `Default::default()` for the reference settings. The struct is
/// passed by reference into each call and never mutated mid-run.
#[derive(Debug, Clone)]
pub struct AlnConfig<F: AlnFloat> {
    /// Fraction of the global standard deviation used as the noise
    /// threshold. Must lie in [0, 1). Default: 0.5
    pub threshold_fraction: F,
    /// Largest radius allowed during the per-pixel search. Must be >= 1.
    /// Default: 25
    pub max_radius: usize,
    /// Dispersion statistic compared against the threshold. Default: Std
    pub metric: DispersionMetric,
    /// Neighborhood geometry / estimator selection. Default: Square
    pub shape: NeighborhoodShape,
    /// Radius-field computation strategy. Default: Vectorized
    pub strategy: SearchStrategy,
}

impl<F: AlnFloat> Default for AlnConfig<F> {
    fn default() -> Self {
        Self {
            threshold_fraction: F::from_f64_c(DEFAULT_THRESHOLD_FRACTION),
            max_radius: DEFAULT_MAX_RADIUS,
            metric: DispersionMetric::default(),
            shape: NeighborhoodShape::default(),
            strategy: SearchStrategy::default(),
        }
    }
}

impl<F: AlnFloat> AlnConfig<F> {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration parameters.
    ///
    /// Called by every entry point before computation begins so that bad
    /// parameters surface as a configuration error, never mid-run.
    pub fn validate(&self) -> Result<(), AlnError> {
        if !self.threshold_fraction.is_finite() {
            return Err(AlnError::InvalidConfig(
                "threshold_fraction must be finite".to_string(),
            ));
        }
        if self.threshold_fraction < F::zero() || self.threshold_fraction >= F::one() {
            return Err(AlnError::InvalidConfig(format!(
                "threshold_fraction must lie in [0, 1), got {:?}",
                self.threshold_fraction
            )));
        }
        if self.max_radius == 0 {
            return Err(AlnError::InvalidConfig(
                "max_radius must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
