//! Hazard-curve arrays
//!
//! ## Table of Contents
//! - **zero_curves**: The (sites x levels) zero baseline
//! - **agg_curves**: Elementwise probability union of two curve arrays
//! - **mean_curves**: Weighted mean over per-realization curves
//!
//! Curves are plain `Array2<f64>` with shape (number of sites, number of
//! intensity levels), holding probabilities of exceedance in [0, 1].

use crate::assoc::agg_prob;
use ndarray::{Array2, Zip};

/// The all-zero curve array for `n_sites` sites and `n_levels` intensity levels
pub fn zero_curves(n_sites: usize, n_levels: usize) -> Array2<f64> {
    Array2::zeros((n_sites, n_levels))
}

/// Aggregate two curve arrays elementwise as probabilities of independent events
///
/// The zero array is the identity, so partial results can be folded in any
/// order starting from [`zero_curves`].
pub fn agg_curves(acc: Array2<f64>, curves: &Array2<f64>) -> Array2<f64> {
    let mut acc = acc;
    Zip::from(&mut acc).and(curves).for_each(|a, &c| {
        *a = agg_prob(*a, c);
    });
    acc
}

/// Weighted mean over per-realization curves
///
/// The weights are used as given; callers pass realization weights that
/// already sum to 1.
pub fn mean_curves<'a>(
    weighted: impl IntoIterator<Item = (f64, &'a Array2<f64>)>,
    n_sites: usize,
    n_levels: usize,
) -> Array2<f64> {
    let mut mean = zero_curves(n_sites, n_levels);
    for (weight, curves) in weighted {
        mean.scaled_add(weight, curves);
    }
    mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_zero_is_identity() {
        let curves = array![[0.1, 0.5], [0.0, 0.9]];
        let out = agg_curves(zero_curves(2, 2), &curves);
        for (got, want) in out.iter().zip(curves.iter()) {
            assert!((got - want).abs() < 1e-15, "{got} != {want}");
        }
    }

    #[test]
    fn test_agg_is_probability_union() {
        let a = array![[0.5]];
        let b = array![[0.5]];
        let out = agg_curves(a, &b);
        assert!((out[[0, 0]] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_agg_order_independent() {
        let a = array![[0.1, 0.2]];
        let b = array![[0.3, 0.4]];
        let ab = agg_curves(agg_curves(zero_curves(1, 2), &a), &b);
        let ba = agg_curves(agg_curves(zero_curves(1, 2), &b), &a);
        for (x, y) in ab.iter().zip(ba.iter()) {
            assert!((x - y).abs() < 1e-15);
        }
    }

    #[test]
    fn test_mean_curves() {
        let a = array![[1.0, 0.0]];
        let b = array![[0.0, 1.0]];
        let mean = mean_curves([(0.25, &a), (0.75, &b)], 1, 2);
        assert!((mean[[0, 0]] - 0.25).abs() < 1e-12);
        assert!((mean[[0, 1]] - 0.75).abs() < 1e-12);
    }
}
