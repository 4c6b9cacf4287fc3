//! Local mean / standard deviation estimation.
//!
//! Two estimators share one contract: given an image and a neighborhood
//! radius, produce per-pixel local mean and population standard deviation.
//!
//! - **Exact (disc)**: aggregates intensities under a Euclidean disc
//!   structuring element per pixel. O(pixels * r^2), the ground-truth path.
//! - **Fast (square)**: separable rolling-sum filters over the image and
//!   its pointwise square, std = sqrt(E[X^2] - E[X]^2) on a (2r+1)x(2r+1)
//!   window. O(pixels), independent of r.
//!
//! Both read out-of-bounds positions through symmetric reflection padding.

use crate::float_trait::AlnFloat;
use crate::padding::{pad_symmetric, reflect_index};
use crate::config::NeighborhoodShape;
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

/// Offsets (dy, dx) of a Euclidean disc structuring element of the given
/// radius: all positions with dy^2 + dx^2 <= r^2.
pub fn disc_offsets(radius: usize) -> Vec<(isize, isize)> {
    let r = radius as isize;
    let r2 = r * r;
    let mut offsets = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if dy * dy + dx * dx <= r2 {
                offsets.push((dy, dx));
            }
        }
    }
    offsets
}

/// Offsets of the full (2r+1)x(2r+1) window.
pub fn square_offsets(radius: usize) -> Vec<(isize, isize)> {
    let r = radius as isize;
    let mut offsets = Vec::with_capacity((2 * radius + 1) * (2 * radius + 1));
    for dy in -r..=r {
        for dx in -r..=r {
            offsets.push((dy, dx));
        }
    }
    offsets
}

/// Structuring-element offsets for a shape at the given radius.
pub fn shape_offsets(shape: NeighborhoodShape, radius: usize) -> Vec<(isize, isize)> {
    match shape {
        NeighborhoodShape::Disc => disc_offsets(radius),
        NeighborhoodShape::Square => square_offsets(radius),
    }
}

/// Rolling-window mean filter with a (2r+1)x(2r+1) window.
///
/// Separable: one horizontal and one vertical rolling-sum pass over a
/// symmetric-padded buffer, so cost does not depend on the radius.
pub fn uniform_filter<F: AlnFloat>(image: ArrayView2<F>, radius: usize) -> Array2<F> {
    let (rows, cols) = image.dim();
    let w = 2 * radius + 1;
    let inv_w = F::one() / F::usize_as(w);
    let padded = pad_symmetric(image, radius);

    // Horizontal pass over the padded rows
    let mut horiz = Array2::<F>::zeros((rows + 2 * radius, cols));
    for r in 0..rows + 2 * radius {
        let mut acc = F::zero();
        for c in 0..w {
            acc += padded[[r, c]];
        }
        horiz[[r, 0]] = acc * inv_w;
        for c in 1..cols {
            acc += padded[[r, c + w - 1]] - padded[[r, c - 1]];
            horiz[[r, c]] = acc * inv_w;
        }
    }

    // Vertical pass down to the output shape
    let mut output = Array2::<F>::zeros((rows, cols));
    for c in 0..cols {
        let mut acc = F::zero();
        for r in 0..w {
            acc += horiz[[r, c]];
        }
        output[[0, c]] = acc * inv_w;
        for r in 1..rows {
            acc += horiz[[r + w - 1, c]] - horiz[[r - 1, c]];
            output[[r, c]] = acc * inv_w;
        }
    }
    output
}

/// Replace NaN entries with the mean of the valid entries of the same
/// array. Mirrors the reference std-filter behavior, which repairs NaNs
/// from its own output rather than zeroing them.
pub fn patch_nans<F: AlnFloat>(array: &mut Array2<F>) {
    let mut sum = F::zero();
    let mut valid = 0usize;
    let mut has_nan = false;
    for &v in array.iter() {
        if v.is_nan() {
            has_nan = true;
        } else {
            sum += v;
            valid += 1;
        }
    }
    if !has_nan {
        return;
    }
    let fill = if valid > 0 {
        sum / F::usize_as(valid)
    } else {
        F::zero()
    };
    array.mapv_inplace(|v| if v.is_nan() { fill } else { v });
}

/// Fast local statistics over a (2r+1)x(2r+1) window.
///
/// Variance comes from the E[X^2] - E[X]^2 identity; floating-point
/// cancellation can push it slightly negative near flat regions, so it is
/// clamped to zero before the square root. Surviving NaNs are patched with
/// the mean of the valid std entries.
pub fn local_stats_square<F: AlnFloat>(
    image: ArrayView2<F>,
    radius: usize,
) -> (Array2<F>, Array2<F>) {
    let mean = uniform_filter(image, radius);
    let squared = image.mapv(|x| x * x);
    let mean_sq = uniform_filter(squared.view(), radius);

    let mut std = Array2::<F>::zeros(image.raw_dim());
    ndarray::Zip::from(&mut std)
        .and(&mean)
        .and(&mean_sq)
        .for_each(|s, &m, &m2| {
            let var = (m2 - m * m).max(F::zero());
            *s = var.sqrt();
        });
    patch_nans(&mut std);
    (mean, std)
}

/// Exact local statistics over a disc structuring element.
///
/// Pads once for the radius, then aggregates the footprint per pixel.
/// Rows are processed in parallel; each holds only its own output.
pub fn local_stats_disc<F: AlnFloat>(
    image: ArrayView2<F>,
    radius: usize,
) -> (Array2<F>, Array2<F>) {
    let (rows, cols) = image.dim();
    let padded = pad_symmetric(image, radius);
    let offsets = disc_offsets(radius);
    let count = F::usize_as(offsets.len());
    let m = radius as isize;

    let per_row: Vec<(Vec<F>, Vec<F>)> = (0..rows)
        .into_par_iter()
        .map(|r| {
            let mut mean_row = Vec::with_capacity(cols);
            let mut std_row = Vec::with_capacity(cols);
            for c in 0..cols {
                let mut sum = F::zero();
                let mut sum_sq = F::zero();
                for &(dy, dx) in &offsets {
                    let pr = (r as isize + m + dy) as usize;
                    let pc = (c as isize + m + dx) as usize;
                    let v = padded[[pr, pc]];
                    sum += v;
                    sum_sq += v * v;
                }
                let mean = sum / count;
                let var = (sum_sq / count - mean * mean).max(F::zero());
                mean_row.push(mean);
                std_row.push(var.sqrt());
            }
            (mean_row, std_row)
        })
        .collect();

    let mut mean = Array2::<F>::zeros((rows, cols));
    let mut std = Array2::<F>::zeros((rows, cols));
    for (r, (mean_row, std_row)) in per_row.into_iter().enumerate() {
        for c in 0..cols {
            mean[[r, c]] = mean_row[c];
            std[[r, c]] = std_row[c];
        }
    }
    (mean, std)
}

/// Whole-image local statistics for a shape at the given radius.
pub fn local_stats<F: AlnFloat>(
    image: ArrayView2<F>,
    shape: NeighborhoodShape,
    radius: usize,
) -> (Array2<F>, Array2<F>) {
    match shape {
        NeighborhoodShape::Disc => local_stats_disc(image, radius),
        NeighborhoodShape::Square => local_stats_square(image, radius),
    }
}

/// Mean and population std of the footprint centered at one pixel, with
/// on-demand symmetric reflection. Used by the per-pixel radius search.
pub fn stats_at<F: AlnFloat>(
    image: ArrayView2<F>,
    offsets: &[(isize, isize)],
    row: usize,
    col: usize,
) -> (F, F) {
    let (rows, cols) = image.dim();
    let count = F::usize_as(offsets.len());
    let mut sum = F::zero();
    let mut sum_sq = F::zero();
    for &(dy, dx) in offsets {
        let r = reflect_index(row as isize + dy, rows);
        let c = reflect_index(col as isize + dx, cols);
        let v = image[[r, c]];
        sum += v;
        sum_sq += v * v;
    }
    let mean = sum / count;
    let var = (sum_sq / count - mean * mean).max(F::zero());
    (mean, var.sqrt())
}
