//! Symmetric (mirror) boundary handling.
//!
//! Neighborhood statistics near the image border read out-of-bounds
//! positions; those are resolved by symmetric reflection about the edge,
//! with the edge pixel itself repeated (index -1 maps to 0, -2 to 1, and
//! n maps to n-1). The vectorized paths pad the whole image once per
//! margin instead of reflecting per pixel.

use crate::float_trait::AlnFloat;
use ndarray::{Array2, ArrayView2};

/// Map a possibly out-of-bounds index onto [0, n) by symmetric reflection.
///
/// Repeats the reflection for margins wider than the image, so any finite
/// offset resolves to a valid index.
#[inline]
pub fn reflect_index(index: isize, n: usize) -> usize {
    debug_assert!(n > 0);
    let n = n as isize;
    let mut i = index;
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - 1 - i;
        } else {
            return i as usize;
        }
    }
}

/// Pad an image by `margin` pixels on every side using symmetric reflection.
///
/// Returns a (rows + 2*margin, cols + 2*margin) array. Built once per
/// radius iteration so the filter passes never branch on bounds.
pub fn pad_symmetric<F: AlnFloat>(image: ArrayView2<F>, margin: usize) -> Array2<F> {
    let (rows, cols) = image.dim();
    Array2::from_shape_fn((rows + 2 * margin, cols + 2 * margin), |(r, c)| {
        let src_r = reflect_index(r as isize - margin as isize, rows);
        let src_c = reflect_index(c as isize - margin as isize, cols);
        image[[src_r, src_c]]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn reflect_index_maps_near_borders() {
        assert_eq!(reflect_index(0, 5), 0);
        assert_eq!(reflect_index(4, 5), 4);
        assert_eq!(reflect_index(-1, 5), 0);
        assert_eq!(reflect_index(-2, 5), 1);
        assert_eq!(reflect_index(5, 5), 4);
        assert_eq!(reflect_index(6, 5), 3);
    }

    #[test]
    fn reflect_index_handles_margins_wider_than_image() {
        // n = 2: pattern ... 1 0 | 0 1 | 1 0 | 0 1 ...
        assert_eq!(reflect_index(-3, 2), 1);
        assert_eq!(reflect_index(2, 2), 1);
        assert_eq!(reflect_index(3, 2), 0);
        assert_eq!(reflect_index(4, 2), 0);
        assert_eq!(reflect_index(5, 2), 1);
    }

    #[test]
    fn pad_symmetric_mirrors_edges() {
        let img = array![[1.0f32, 2.0], [3.0, 4.0]];
        let padded = pad_symmetric(img.view(), 1);
        assert_eq!(padded.dim(), (4, 4));
        // Corner reflects both axes: padded[0,0] mirrors img[0,0]
        assert_eq!(padded[[0, 0]], 1.0);
        assert_eq!(padded[[0, 3]], 2.0);
        assert_eq!(padded[[3, 0]], 3.0);
        assert_eq!(padded[[3, 3]], 4.0);
        // Interior is the original image
        assert_eq!(padded[[1, 1]], 1.0);
        assert_eq!(padded[[2, 2]], 4.0);
    }

    #[test]
    fn pad_symmetric_margin_exceeding_size() {
        let img = array![[7.0f64]];
        let padded = pad_symmetric(img.view(), 3);
        assert_eq!(padded.dim(), (7, 7));
        assert!(padded.iter().all(|&v| v == 7.0));
    }
}
