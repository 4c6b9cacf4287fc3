//! Adaptive local normalization driver.
//!
//! Combines the radius field with per-radius local statistics: for each
//! radius value present in the field, local mean/std are computed over the
//! whole image and the normalized values are copied into the positions
//! assigned that radius. The number of distinct radii is bounded by
//! `max_radius`, not by pixel count, so the per-radius broadcast stays
//! cheap relative to recomputing per pixel.
//!
//! 3D stacks are sequences of independent 2D slices, processed in
//! parallel and reassembled in the original order.

use crate::config::{AlnConfig, AlnError};
use crate::float_trait::AlnFloat;
use crate::radius_map::{derive_thresholds, radius_map_with_thresholds};
use crate::stats::local_stats;
use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

/// Absolute floor for the effective local std when the derived noise
/// floor itself is zero (flat image or zero threshold fraction). Keeps
/// the division defined so a flat image normalizes to exactly zero.
const NOISE_FLOOR_EPSILON: f64 = 1e-12;

/// Normalize a 2D image.
///
/// Each output value is `(x - local_mean) / max(local_std, noise_floor)`
/// where the statistics are taken over the pixel's adaptive neighborhood
/// and `noise_floor = threshold_fraction * std(image)`.
pub fn normalize_image<F: AlnFloat>(
    image: ArrayView2<F>,
    config: &AlnConfig<F>,
) -> Result<Array2<F>, AlnError> {
    config.validate()?;
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return Err(AlnError::EmptyImage { rows, cols });
    }
    Ok(normalize_slice(image, config))
}

/// Normalize a 3D stack slice by slice along `Axis(0)`.
///
/// Slices are independent; each derives its own thresholds and radius
/// field. No state crosses slices.
pub fn normalize_stack<F: AlnFloat>(
    stack: ArrayView3<F>,
    config: &AlnConfig<F>,
) -> Result<Array3<F>, AlnError> {
    config.validate()?;
    let (n, rows, cols) = stack.dim();
    if n > 0 && (rows == 0 || cols == 0) {
        return Err(AlnError::EmptyImage { rows, cols });
    }

    let slices: Vec<Array2<F>> = (0..n)
        .into_par_iter()
        .map(|i| normalize_slice(stack.index_axis(Axis(0), i), config))
        .collect();

    let mut output = Array3::<F>::zeros((n, rows, cols));
    for (i, slice) in slices.into_iter().enumerate() {
        output.slice_mut(s![i, .., ..]).assign(&slice);
    }
    Ok(output)
}

/// One slice: derive thresholds once, build the radius field, then apply
/// the per-radius broadcast normalization.
fn normalize_slice<F: AlnFloat>(image: ArrayView2<F>, config: &AlnConfig<F>) -> Array2<F> {
    let thresholds = derive_thresholds(image, config.threshold_fraction);
    let field = radius_map_with_thresholds(image, config, &thresholds);

    let (rows, cols) = image.dim();
    let floor = thresholds.t_std.max(F::from_f64_c(NOISE_FLOOR_EPSILON));

    let mut present = vec![false; config.max_radius + 1];
    for &r in field.iter() {
        present[r as usize] = true;
    }

    let mut output = Array2::<F>::zeros((rows, cols));
    for radius in 1..=config.max_radius {
        if !present[radius] {
            continue;
        }
        // Mean/std live only for this radius iteration
        let (mean, std) = local_stats(image, config.shape, radius);
        let rad = radius as u32;
        ndarray::Zip::from(&mut output)
            .and(&field)
            .and(image)
            .and(&mean)
            .and(&std)
            .for_each(|o, &f, &x, &m, &s| {
                if f == rad {
                    *o = (x - m) / s.max(floor);
                }
            });
    }
    output
}
