//! Per-pixel adaptive radius search.
//!
//! For every pixel, find the smallest neighborhood radius at which the
//! local dispersion statistic exceeds a global noise threshold; pixels
//! whose dispersion never exceeds it saturate at the maximum radius.
//!
//! Two strategies produce the same field:
//! - **Vectorized** (default): whole-image dispersion per radius, one
//!   radius at a time so peak memory stays proportional to the image size.
//! - **PerPixel**: independent grow-until-exceed search at each pixel,
//!   parallel over rows. Faithful to the source algorithm.

use crate::config::{AlnConfig, AlnError, DispersionMetric, SearchStrategy};
use crate::float_trait::AlnFloat;
use crate::stats::{local_stats, shape_offsets, stats_at};
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

/// Global thresholds derived once per slice.
///
/// `t_std` doubles as the noise floor during normalization. For the cv
/// metric, `t_cv = t_std / global_mean`; a zero-mean image falls back to
/// `t_std` so the comparison stays deterministic. Both search strategies
/// compare the local std/(mean+1) against the same global `t_cv`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Thresholds<F> {
    pub t_std: F,
    pub t_cv: F,
}

impl<F: AlnFloat> Thresholds<F> {
    pub fn for_metric(&self, metric: DispersionMetric) -> F {
        match metric {
            DispersionMetric::Std => self.t_std,
            DispersionMetric::Cv => self.t_cv,
        }
    }
}

/// Population mean/std of the whole slice, scaled by the threshold
/// fraction.
pub(crate) fn derive_thresholds<F: AlnFloat>(
    image: ArrayView2<F>,
    threshold_fraction: F,
) -> Thresholds<F> {
    let n = F::usize_as(image.len());
    let mean = image.iter().copied().sum::<F>() / n;
    let var = image.iter().map(|&v| (v - mean) * (v - mean)).sum::<F>() / n;
    let t_std = var.sqrt() * threshold_fraction;
    let t_cv = if mean != F::zero() { t_std / mean } else { t_std };
    Thresholds { t_std, t_cv }
}

#[inline]
fn dispersion<F: AlnFloat>(mean: F, std: F, metric: DispersionMetric) -> F {
    match metric {
        DispersionMetric::Std => std,
        // +1 stabilizer for non-negative intensity data
        DispersionMetric::Cv => std / (mean + F::one()),
    }
}

/// Compute the per-pixel radius field for one slice.
///
/// Every entry lies in `[1, max_radius]`.
pub fn compute_radius_map<F: AlnFloat>(
    image: ArrayView2<F>,
    config: &AlnConfig<F>,
) -> Result<Array2<u32>, AlnError> {
    config.validate()?;
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return Err(AlnError::EmptyImage { rows, cols });
    }
    let thresholds = derive_thresholds(image, config.threshold_fraction);
    Ok(radius_map_with_thresholds(image, config, &thresholds))
}

pub(crate) fn radius_map_with_thresholds<F: AlnFloat>(
    image: ArrayView2<F>,
    config: &AlnConfig<F>,
    thresholds: &Thresholds<F>,
) -> Array2<u32> {
    match config.strategy {
        SearchStrategy::Vectorized => radius_map_vectorized(image, config, thresholds),
        SearchStrategy::PerPixel => radius_map_per_pixel(image, config, thresholds),
    }
}

/// Radius-by-radius assignment over the whole image.
///
/// Scans radii in increasing order; the first radius whose dispersion
/// exceeds the threshold wins, so smaller radii take priority. Positions
/// still unassigned after the scan saturate at `max_radius`. Intermediate
/// mean/std arrays live only for one radius iteration.
fn radius_map_vectorized<F: AlnFloat>(
    image: ArrayView2<F>,
    config: &AlnConfig<F>,
    thresholds: &Thresholds<F>,
) -> Array2<u32> {
    let (rows, cols) = image.dim();
    let threshold = thresholds.for_metric(config.metric);
    let mut field = Array2::<u32>::zeros((rows, cols));
    let mut remaining = rows * cols;

    for radius in 1..=config.max_radius {
        if remaining == 0 {
            break;
        }
        let (mean, std) = local_stats(image, config.shape, radius);
        let rad = radius as u32;
        ndarray::Zip::from(&mut field)
            .and(&mean)
            .and(&std)
            .for_each(|f, &m, &s| {
                if *f == 0 && dispersion(m, s, config.metric) > threshold {
                    *f = rad;
                    remaining -= 1;
                }
            });
    }

    if remaining > 0 {
        let max = config.max_radius as u32;
        field.mapv_inplace(|v| if v == 0 { max } else { v });
    }
    field
}

/// Independent grow-until-exceed search at each pixel.
///
/// Structuring elements are built once per radius and shared; boundary
/// reads reflect on demand. Rows are processed in parallel.
fn radius_map_per_pixel<F: AlnFloat>(
    image: ArrayView2<F>,
    config: &AlnConfig<F>,
    thresholds: &Thresholds<F>,
) -> Array2<u32> {
    let (rows, cols) = image.dim();
    let threshold = thresholds.for_metric(config.metric);
    let footprints: Vec<Vec<(isize, isize)>> = (1..=config.max_radius)
        .map(|r| shape_offsets(config.shape, r))
        .collect();
    let saturated = config.max_radius as u32;

    let per_row: Vec<Vec<u32>> = (0..rows)
        .into_par_iter()
        .map(|r| {
            (0..cols)
                .map(|c| {
                    for (i, offsets) in footprints.iter().enumerate() {
                        let (m, s) = stats_at(image, offsets, r, c);
                        if dispersion(m, s, config.metric) > threshold {
                            return (i + 1) as u32;
                        }
                    }
                    saturated
                })
                .collect()
        })
        .collect();

    let mut field = Array2::<u32>::zeros((rows, cols));
    for (r, row) in per_row.into_iter().enumerate() {
        for (c, v) in row.into_iter().enumerate() {
            field[[r, c]] = v;
        }
    }
    field
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NeighborhoodShape, SearchStrategy};
    use ndarray::Array2;
    use rand::prelude::*;

    fn random_image(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_fn((rows, cols), |_| rng.gen::<f64>())
    }

    #[test]
    fn radii_stay_within_bounds() {
        let img = random_image(12, 12, 42);
        let config = AlnConfig::<f64> {
            max_radius: 4,
            ..Default::default()
        };
        let field = compute_radius_map(img.view(), &config).unwrap();
        assert_eq!(field.dim(), (12, 12));
        assert!(field.iter().all(|&r| (1..=4).contains(&r)));
    }

    #[test]
    fn constant_image_saturates_at_max_radius() {
        let img = Array2::<f64>::from_elem((8, 8), 5.0);
        let config = AlnConfig::<f64> {
            max_radius: 3,
            ..Default::default()
        };
        let field = compute_radius_map(img.view(), &config).unwrap();
        assert!(field.iter().all(|&r| r == 3));
    }

    #[test]
    fn zero_threshold_yields_minimal_radius() {
        let img = random_image(10, 10, 1);
        let config = AlnConfig::<f64> {
            threshold_fraction: 0.0,
            max_radius: 5,
            ..Default::default()
        };
        let field = compute_radius_map(img.view(), &config).unwrap();
        assert!(field.iter().all(|&r| r == 1));
    }

    #[test]
    fn outlier_pixel_gets_small_radius_far_field_saturates() {
        let mut img = Array2::<f64>::zeros((9, 9));
        img[[4, 4]] = 100.0;
        let config = AlnConfig::<f64> {
            threshold_fraction: 0.5,
            max_radius: 3,
            ..Default::default()
        };
        let field = compute_radius_map(img.view(), &config).unwrap();
        assert_eq!(field[[4, 4]], 1);
        // A 7x7 window at the far corner never sees the outlier
        assert_eq!(field[[0, 0]], 3);
        assert_eq!(field[[8, 8]], 3);
    }

    #[test]
    fn per_pixel_and_vectorized_agree_for_disc() {
        let img = random_image(8, 8, 99);
        for metric in [DispersionMetric::Std, DispersionMetric::Cv] {
            let vectorized = AlnConfig::<f64> {
                max_radius: 4,
                shape: NeighborhoodShape::Disc,
                metric,
                strategy: SearchStrategy::Vectorized,
                ..Default::default()
            };
            let per_pixel = AlnConfig::<f64> {
                strategy: SearchStrategy::PerPixel,
                ..vectorized.clone()
            };
            let a = compute_radius_map(img.view(), &vectorized).unwrap();
            let b = compute_radius_map(img.view(), &per_pixel).unwrap();
            assert_eq!(a, b, "strategies diverged for {:?}", metric);
        }
    }

    #[test]
    fn per_pixel_and_vectorized_agree_for_square() {
        let img = random_image(8, 8, 5);
        let vectorized = AlnConfig::<f64> {
            max_radius: 3,
            strategy: SearchStrategy::Vectorized,
            ..Default::default()
        };
        let per_pixel = AlnConfig::<f64> {
            strategy: SearchStrategy::PerPixel,
            ..vectorized.clone()
        };
        let a = compute_radius_map(img.view(), &vectorized).unwrap();
        let b = compute_radius_map(img.view(), &per_pixel).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_image() {
        let img = Array2::<f32>::zeros((0, 4));
        let config = AlnConfig::<f32>::default();
        let err = compute_radius_map(img.view(), &config).unwrap_err();
        assert_eq!(err, AlnError::EmptyImage { rows: 0, cols: 4 });
    }

    #[test]
    fn rejects_invalid_config_before_computation() {
        let img = random_image(4, 4, 0);
        let config = AlnConfig::<f64> {
            max_radius: 0,
            ..Default::default()
        };
        assert!(compute_radius_map(img.view(), &config).is_err());
    }
}
