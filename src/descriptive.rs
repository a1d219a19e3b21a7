//! Descriptive statistics over samples which may contain missing (`NaN`) values.
use num_traits::{Float, FromPrimitive};

/// Arithmetic mean, `NaN` for an empty sample
pub fn mean<T: Float + FromPrimitive>(values: &[T]) -> T {
    if values.is_empty() {
        return T::nan();
    }
    let sum = values.iter().fold(T::zero(), |acc, &x| acc + x);
    sum / T::from_usize(values.len()).expect("usize must fit in `T`")
}

/// Variance with `ddof` delta degrees of freedom, `NaN` when `n <= ddof`
///
/// $$
///     s^2 = \frac{1}{n - \text{ddof}} \sum_i \left(x_i - \bar{x}\right)^2
/// $$
pub fn variance<T: Float + FromPrimitive>(values: &[T], ddof: usize) -> T {
    if values.len() <= ddof {
        return T::nan();
    }
    let centre = mean(values);
    let sum_sq = values
        .iter()
        .fold(T::zero(), |acc, &x| acc + (x - centre).powi(2));
    sum_sq / T::from_usize(values.len() - ddof).expect("usize must fit in `T`")
}

pub fn standard_deviation<T: Float + FromPrimitive>(values: &[T], ddof: usize) -> T {
    variance(values, ddof).sqrt()
}

/// The sample with missing and infinite values removed
pub fn finite<T: Float>(values: &[T]) -> Vec<T> {
    values.iter().copied().filter(|x| x.is_finite()).collect()
}

/// Mean ignoring missing values
pub fn nan_mean<T: Float + FromPrimitive>(values: &[T]) -> T {
    mean(&finite(values))
}

/// Standard deviation ignoring missing values
pub fn nan_standard_deviation<T: Float + FromPrimitive>(values: &[T], ddof: usize) -> T {
    standard_deviation(&finite(values), ddof)
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Quantile of an ascending sorted sample, interpolating linearly between order statistics
///
/// Position $h = (n - 1) q$ lies between $x_{\lfloor h \rfloor}$ and $x_{\lceil h \rceil}$.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    #[allow(clippy::cast_precision_loss)]
    let position = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let below = position.floor() as usize;
    let above = (below + 1).min(sorted.len() - 1);
    let fraction = position - position.floor();
    sorted[below] + (sorted[above] - sorted[below]) * fraction
}

pub fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted = finite(values);
    sorted.sort_by(f64::total_cmp);
    sorted
}

pub fn median(values: &[f64]) -> f64 {
    quantile_sorted(&sorted_finite(values), 0.5)
}

/// Mean, sample standard deviation and size of a group, missing values excluded
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub standard_deviation: f64,
    pub n: usize,
}

impl Summary {
    pub fn of(values: &[f64]) -> Self {
        let values = finite(values);
        Self {
            mean: mean(&values),
            standard_deviation: standard_deviation(&values, 1),
            n: values.len(),
        }
    }
}

/// The elements of a box-and-whisker glyph
///
/// The box spans the quartiles with a line at the median. Whiskers reach the most extreme data
/// points within `whisker` interquartile ranges of the box; anything beyond is an outlier.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxStats {
    pub lower_quartile: f64,
    pub median: f64,
    pub upper_quartile: f64,
    pub mean: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

impl BoxStats {
    pub const WHISKER: f64 = 1.5;

    /// `None` when the sample has no finite values
    pub fn of(values: &[f64], whisker: f64) -> Option<Self> {
        let sorted = sorted_finite(values);
        if sorted.is_empty() {
            return None;
        }

        let lower_quartile = quantile_sorted(&sorted, 0.25);
        let upper_quartile = quantile_sorted(&sorted, 0.75);
        let reach = whisker * (upper_quartile - lower_quartile);
        let low_fence = lower_quartile - reach;
        let high_fence = upper_quartile + reach;

        let inside = sorted
            .iter()
            .copied()
            .filter(|x| (low_fence..=high_fence).contains(x))
            .collect::<Vec<_>>();

        Some(Self {
            lower_quartile,
            median: quantile_sorted(&sorted, 0.5),
            upper_quartile,
            mean: mean(&sorted),
            lower_whisker: inside.first().copied().unwrap_or(lower_quartile),
            upper_whisker: inside.last().copied().unwrap_or(upper_quartile),
            outliers: sorted
                .iter()
                .copied()
                .filter(|x| !(low_fence..=high_fence).contains(x))
                .collect(),
        })
    }
}

/// Equal-width histogram counts
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    /// `bins + 1` ascending bin edges
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub const DEFAULT_BINS: usize = 10;

    /// Bin the finite values between their minimum and maximum
    ///
    /// Every bin is half open except the last, which also holds the maximum. A constant sample
    /// is centred in a unit-wide range.
    pub fn of(values: &[f64], bins: usize) -> Self {
        let values = finite(values);
        let bins = bins.max(1);

        let (mut low, mut high) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        if values.is_empty() {
            (low, high) = (0.0, 1.0);
        } else if low == high {
            (low, high) = (low - 0.5, high + 0.5);
        }

        #[allow(clippy::cast_precision_loss)]
        let width = (high - low) / bins as f64;
        #[allow(clippy::cast_precision_loss)]
        let edges = (0..=bins)
            .map(|i| if i == bins { high } else { low + width * i as f64 })
            .collect::<Vec<_>>();

        let mut counts = vec![0; bins];
        for x in values {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let bin = (((x - low) / width).floor() as usize).min(bins - 1);
            counts[bin] += 1;
        }

        Self { edges, counts }
    }
}

#[cfg(test)]
mod tests {
    use ndarray_rand::rand::{Rng, SeedableRng};
    use rand_isaac::Isaac64Rng;

    use super::{finite, mean, median, nan_mean, round_to, standard_deviation, BoxStats, Histogram, Summary};

    #[test]
    fn infinite_values_are_dropped_with_missing_ones() {
        let values = [1.0, f64::NAN, f64::INFINITY, 3.0, f64::NEG_INFINITY];
        assert_eq!(finite(&values), [1.0, 3.0]);
        approx::assert_relative_eq!(nan_mean(&values), 2.0);
        assert_eq!(Summary::of(&values).n, 2);
    }

    #[test]
    fn sample_standard_deviation_uses_n_minus_one() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        approx::assert_relative_eq!(mean(&values), 5.0);
        approx::assert_relative_eq!(standard_deviation(&values, 0), 2.0);
        approx::assert_relative_eq!(standard_deviation(&values, 1), (32.0_f64 / 7.0).sqrt());
        assert!(standard_deviation(&[1.0_f64], 1).is_nan());
    }

    #[test]
    fn missing_values_are_ignored() {
        let values = [1.0, f64::NAN, 3.0];
        approx::assert_relative_eq!(nan_mean(&values), 2.0);
        let summary = Summary::of(&values);
        assert_eq!(summary.n, 2);
        approx::assert_relative_eq!(summary.standard_deviation, 2.0_f64.sqrt());
        approx::assert_relative_eq!(median(&values), 2.0);
    }

    #[test]
    fn rounding_keeps_requested_decimals() {
        approx::assert_relative_eq!(round_to(3.14159, 2), 3.14);
        approx::assert_relative_eq!(round_to(-2.71828, 3), -2.718);
    }

    #[test]
    fn box_stats_split_whiskers_and_outliers() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 100.0];
        let stats = BoxStats::of(&values, BoxStats::WHISKER).unwrap();
        approx::assert_relative_eq!(stats.lower_quartile, 3.0);
        approx::assert_relative_eq!(stats.median, 5.0);
        approx::assert_relative_eq!(stats.upper_quartile, 7.0);
        approx::assert_relative_eq!(stats.lower_whisker, 1.0);
        approx::assert_relative_eq!(stats.upper_whisker, 8.0);
        assert_eq!(stats.outliers, vec![100.0]);
        assert!(BoxStats::of(&[f64::NAN], BoxStats::WHISKER).is_none());
    }

    #[test]
    fn histogram_counts_every_finite_value() {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        let values = (0..257).map(|_| rng.gen_range(-3.0..3.0)).collect::<Vec<f64>>();

        let histogram = Histogram::of(&values, Histogram::DEFAULT_BINS);
        assert_eq!(histogram.edges.len(), Histogram::DEFAULT_BINS + 1);
        assert_eq!(histogram.counts.iter().sum::<usize>(), values.len());

        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        approx::assert_relative_eq!(*histogram.edges.last().unwrap(), max);
    }

    #[test]
    fn constant_samples_fall_in_a_single_bin() {
        let histogram = Histogram::of(&[2.0, 2.0, 2.0], 4);
        approx::assert_relative_eq!(histogram.edges[0], 1.5);
        approx::assert_relative_eq!(histogram.edges[4], 2.5);
        assert_eq!(histogram.counts.iter().sum::<usize>(), 3);
    }
}
