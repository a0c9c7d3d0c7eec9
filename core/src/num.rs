// Copyright 2017-2024 Peter Williams
// Licensed under the MIT License.

/*!

General helpers for numerics.

Spectra routinely contain blanked channels, stored as NaN. The reductions in
this module all ignore NaN entries, in the manner of NumPy's `nan*`
functions, and return `None` when no finite-or-infinite (that is, non-NaN)
entries remain.

*/

use ndarray::ArrayView1;
use std::cmp::Ordering;

fn non_nan(data: ArrayView1<f64>) -> Vec<f64> {
    data.iter().copied().filter(|x| !x.is_nan()).collect()
}

/// The mean of the non-NaN entries.
pub fn nan_mean(data: ArrayView1<f64>) -> Option<f64> {
    let mut n = 0usize;
    let mut sum = 0.;

    for x in data.iter().filter(|x| !x.is_nan()) {
        n += 1;
        sum += x;
    }

    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// The median of the non-NaN entries.
///
/// For an even number of entries, this is the mean of the middle two.
pub fn nan_median(data: ArrayView1<f64>) -> Option<f64> {
    let mut vals = non_nan(data);

    if vals.is_empty() {
        return None;
    }

    vals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = vals.len() / 2;

    if vals.len() % 2 == 0 {
        Some(0.5 * (vals[mid - 1] + vals[mid]))
    } else {
        Some(vals[mid])
    }
}

/// The population standard deviation (no degrees-of-freedom correction) of
/// the non-NaN entries.
pub fn nan_std(data: ArrayView1<f64>) -> Option<f64> {
    let mean = nan_mean(data)?;
    let mut n = 0usize;
    let mut sumsq = 0.;

    for x in data.iter().filter(|x| !x.is_nan()) {
        let d = x - mean;
        n += 1;
        sumsq += d * d;
    }

    Some((sumsq / n as f64).sqrt())
}

/// The smallest non-NaN entry and the index of its first occurrence.
pub fn nan_argmin(data: ArrayView1<f64>) -> Option<(usize, f64)> {
    nan_extreme(data, |cand, best| cand < best)
}

/// The largest non-NaN entry and the index of its first occurrence.
pub fn nan_argmax(data: ArrayView1<f64>) -> Option<(usize, f64)> {
    nan_extreme(data, |cand, best| cand > best)
}

fn nan_extreme<F>(data: ArrayView1<f64>, better: F) -> Option<(usize, f64)>
where
    F: Fn(f64, f64) -> bool,
{
    let mut best: Option<(usize, f64)> = None;

    for (i, &x) in data.iter().enumerate() {
        if x.is_nan() {
            continue;
        }

        best = match best {
            Some((_, b)) if !better(x, b) => best,
            _ => Some((i, x)),
        };
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn reductions_skip_nan() {
        let a = array![1., f64::NAN, 3., 2.];
        assert_eq!(nan_mean(a.view()), Some(2.));
        assert_eq!(nan_median(a.view()), Some(2.));
        assert_eq!(nan_argmin(a.view()), Some((0, 1.)));
        assert_eq!(nan_argmax(a.view()), Some((2, 3.)));
    }

    #[test]
    fn even_median() {
        let a = array![4., 1., 3., 2.];
        assert_eq!(nan_median(a.view()), Some(2.5));
    }

    #[test]
    fn std_is_population() {
        let a = array![2., 4., 4., 4., 5., 5., 7., 9.];
        assert_eq!(nan_std(a.view()), Some(2.));
    }

    #[test]
    fn first_occurrence_wins() {
        let a = array![0., -3., 1., -3.];
        assert_eq!(nan_argmin(a.view()), Some((1, -3.)));
    }

    #[test]
    fn all_nan_is_none() {
        let a = array![f64::NAN, f64::NAN];
        assert_eq!(nan_mean(a.view()), None);
        assert_eq!(nan_median(a.view()), None);
        assert_eq!(nan_std(a.view()), None);
        assert_eq!(nan_argmin(a.view()), None);
        assert!(nan_argmax(a.view()).is_none());
    }
}
