use std::f64::consts::{PI, SQRT_2};

use crate::special::{chi_log_normalisation, incomplete_beta, normal_cdf, normal_ppf, normal_sf};

/// Interface trait for the continuous distributions used by the hypothesis tests
pub trait Distribution {
    /// Cumulative distribution function $P(X \le x)$
    fn cdf(&self, x: f64) -> f64;

    /// Survival function $P(X > x)$
    ///
    /// Implementations override this where $1 - F(x)$ loses precision in the upper tail.
    fn sf(&self, x: f64) -> f64 {
        1.0 - self.cdf(x)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// A normal distribution
///
/// The normal distribution is characterised by mean $\mu$, standard deviation $\sigma$
///
/// $$
///     f \left(x\right) = \frac{1}{\sqrt{2 \pi} \sigma} \exp\left[- \frac{1}{2} \left(\frac{x -
///     \mu}{\sigma}\right)^2 \right]
/// $$
pub struct Normal {
    pub mean: f64,
    pub standard_deviation: f64,
}

impl Normal {
    pub const STANDARD: Self = Self {
        mean: 0.0,
        standard_deviation: 1.0,
    };

    /// Quantile function, the inverse of the cdf
    pub fn ppf(&self, p: f64) -> f64 {
        self.mean + self.standard_deviation * normal_ppf(p)
    }

    fn standardise(&self, x: f64) -> f64 {
        (x - self.mean) / self.standard_deviation
    }
}

impl Distribution for Normal {
    fn cdf(&self, x: f64) -> f64 {
        normal_cdf(self.standardise(x))
    }

    fn sf(&self, x: f64) -> f64 {
        normal_sf(self.standardise(x))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Student's t distribution with `df` degrees of freedom
///
/// The tails are expressed through the regularised incomplete beta function
///
/// $$
///     P(|T| > t) = I_{\nu / (\nu + t^2)}\left(\frac{\nu}{2}, \frac{1}{2}\right)
/// $$
pub struct StudentsT {
    pub df: f64,
}

impl StudentsT {
    /// Probability of a value at least as extreme as `t` in either tail
    pub fn two_sided_p(&self, t: f64) -> f64 {
        if t.is_nan() {
            return f64::NAN;
        }
        incomplete_beta(0.5 * self.df, 0.5, self.df / (self.df + t * t))
    }
}

impl Distribution for StudentsT {
    fn cdf(&self, t: f64) -> f64 {
        let tail = 0.5 * self.two_sided_p(t);
        if t > 0.0 {
            1.0 - tail
        } else {
            tail
        }
    }

    fn sf(&self, t: f64) -> f64 {
        self.cdf(-t)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Fisher–Snedecor F distribution with numerator and denominator degrees of freedom
pub struct FisherSnedecor {
    pub numerator_df: f64,
    pub denominator_df: f64,
}

impl Distribution for FisherSnedecor {
    fn cdf(&self, f: f64) -> f64 {
        if f <= 0.0 {
            return 0.0;
        }
        let (d1, d2) = (self.numerator_df, self.denominator_df);
        incomplete_beta(0.5 * d1, 0.5 * d2, d1 * f / (d1 * f + d2))
    }

    fn sf(&self, f: f64) -> f64 {
        if f <= 0.0 {
            return 1.0;
        }
        let (d1, d2) = (self.numerator_df, self.denominator_df);
        incomplete_beta(0.5 * d2, 0.5 * d1, d2 / (d2 + d1 * f))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Studentized range distribution of the range of `groups` normal means, scaled by an
/// independent standard deviation estimate with `df` degrees of freedom
///
/// The cdf is the double integral of Copenhaver & Holland (1988): an outer Gauss–Legendre
/// integral over the scaled chi distribution of the variance estimate and an inner one for the
/// range of `groups` standard normal values. With two groups the cdf is exact through Student's t,
/// which also covers a single degree of freedom.
pub struct StudentizedRange {
    pub groups: f64,
    pub df: f64,
}

impl StudentizedRange {
    /// Quantile function, found by bisection on the cdf
    pub fn ppf(&self, p: f64) -> f64 {
        const TOLERANCE: f64 = 1e-10;

        if !(0.0..1.0).contains(&p) {
            return if p == 1.0 { f64::INFINITY } else { f64::NAN };
        }

        let mut lower = 0.0;
        let mut upper = 1.0;
        while self.cdf(upper) < p {
            lower = upper;
            upper *= 2.0;
        }

        while upper - lower > TOLERANCE * upper.max(1.0) {
            let middle = 0.5 * (lower + upper);
            if self.cdf(middle) < p {
                lower = middle;
            } else {
                upper = middle;
            }
        }
        0.5 * (lower + upper)
    }

    /// The Copenhaver & Holland double integral, valid from two degrees of freedom
    fn integrated_cdf(&self, q: f64) -> f64 {
        const LEGENDRE_NODES: [f64; 8] = [
            0.989_400_934_991_649_932_596_154_173_450,
            0.944_575_023_073_232_576_077_988_415_535,
            0.865_631_202_387_831_743_880_467_897_712,
            0.755_404_408_355_003_033_895_101_194_847,
            0.617_876_244_402_643_748_446_671_764_049,
            0.458_016_777_657_227_386_342_419_442_984,
            0.281_603_550_779_258_913_230_460_501_460,
            0.950_125_098_376_374_401_853_193_354_250e-1,
        ];
        const LEGENDRE_WEIGHTS: [f64; 8] = [
            0.271_524_594_117_540_948_517_805_724_560e-1,
            0.622_535_239_386_478_928_628_438_369_944e-1,
            0.951_585_116_824_927_848_099_251_076_022e-1,
            0.124_628_971_255_533_872_052_476_282_192,
            0.149_595_988_816_576_732_081_501_730_547,
            0.169_156_519_395_002_538_189_312_079_030,
            0.182_603_415_044_923_588_866_763_667_969,
            0.189_450_610_455_068_496_285_396_723_208,
        ];
        // Below exp(-30) a node does not contribute
        const MIN_LOG_TERM: f64 = -30.0;
        const CONVERGED: f64 = 1.0e-14;
        const MAX_INTERVALS: usize = 50;
        // Past this many degrees of freedom the variance estimate is treated as exact
        const LARGE_DF: f64 = 25_000.0;

        let (groups, df) = (self.groups, self.df);
        if df < 2.0 {
            return f64::NAN;
        }
        if df > LARGE_DF {
            return range_probability(q, groups);
        }

        let half_df = 0.5 * df;
        let quarter_df = 0.25 * df;
        let interval: f64 = if df <= 100.0 {
            1.0
        } else if df <= 800.0 {
            0.5
        } else if df <= 5000.0 {
            0.25
        } else {
            0.125
        };
        let log_front = chi_log_normalisation(df) + interval.ln();
        let exponent = half_df - 1.0;

        let mut total = 0.0;
        for i in 1..=MAX_INTERVALS {
            #[allow(clippy::cast_precision_loss)]
            let centre = (2 * i - 1) as f64 * interval;
            let mut interval_sum = 0.0;

            for (node, weight) in LEGENDRE_NODES.iter().zip(LEGENDRE_WEIGHTS) {
                for offset in [-node * interval, node * interval] {
                    let u = centre + offset;
                    let log_term = log_front + exponent * u.ln() - u * quarter_df;
                    if log_term >= MIN_LOG_TERM {
                        let scaled = q * (0.5 * u).sqrt();
                        interval_sum += range_probability(scaled, groups) * weight * log_term.exp();
                    }
                }
            }

            // At least one unit of the chi density is covered before stopping
            #[allow(clippy::cast_precision_loss)]
            let covered = i as f64 * interval;
            if covered >= 1.0 && interval_sum <= CONVERGED {
                break;
            }
            total += interval_sum;
        }

        total.min(1.0)
    }
}

impl Distribution for StudentizedRange {
    fn cdf(&self, q: f64) -> f64 {
        let (groups, df) = (self.groups, self.df);
        if q.is_nan() || groups < 2.0 {
            return f64::NAN;
        }
        if q <= 0.0 {
            return 0.0;
        }
        if q.is_infinite() {
            return 1.0;
        }
        // The range of two means is |t| scaled by sqrt(2)
        if (groups - 2.0).abs() < f64::EPSILON && df > 0.0 {
            return 1.0 - StudentsT { df }.two_sided_p(q / SQRT_2);
        }
        self.integrated_cdf(q)
    }
}

/// Probability that the range of `groups` independent standard normal values is below `w`
///
/// $$
///     P(R < w) = k \int_{-\infty}^{\infty} \phi(x) \left[\Phi(x) - \Phi(x - w)\right]^{k-1} dx
/// $$
///
/// split as in Hartley's form into a closed term and a Gauss–Legendre integral over `[w/2, 8]`.
fn range_probability(w: f64, groups: f64) -> f64 {
    const LEGENDRE_NODES: [f64; 6] = [
        0.981_560_634_246_719_250_690_549_090_149,
        0.904_117_256_370_474_856_678_465_866_119,
        0.769_902_674_194_304_687_036_893_833_213,
        0.587_317_954_286_617_447_296_702_418_941,
        0.367_831_498_998_180_193_752_691_536_644,
        0.125_233_408_511_468_915_472_441_369_464,
    ];
    const LEGENDRE_WEIGHTS: [f64; 6] = [
        0.047_175_336_386_511_827_194_615_961_485,
        0.106_939_325_995_318_430_960_254_718_194,
        0.160_078_328_543_346_226_334_652_529_543,
        0.203_167_426_723_065_921_749_064_455_810,
        0.233_492_536_538_354_808_760_849_898_925,
        0.249_147_045_813_402_785_000_562_436_043,
    ];
    const NEGLIGIBLE: f64 = -30.0;
    const UNDERFLOW: f64 = -50.0;
    const MAX_EXPONENT: f64 = 60.0;
    const UPPER_LIMIT: f64 = 8.0;

    let half_w = 0.5 * w;
    if half_w >= UPPER_LIMIT {
        return 1.0;
    }

    // (2 Φ(w/2) - 1)^k, the first term of Hartley's form
    let mut probability = 2.0 * normal_cdf(half_w) - 1.0;
    probability = if probability >= (UNDERFLOW / groups).exp() {
        probability.powf(groups)
    } else {
        0.0
    };

    // Fewer sub-intervals are needed once the second term is small
    let intervals: u32 = if w > 3.0 { 2 } else { 3 };
    let step = (UPPER_LIMIT - half_w) / f64::from(intervals);
    let power = groups - 1.0;

    let mut lower = half_w;
    let mut integral = 0.0;
    for _ in 0..intervals {
        let upper = lower + step;
        let mid = 0.5 * (upper + lower);
        let half_width = 0.5 * (upper - lower);

        let mut sum = 0.0;
        for (node, weight) in LEGENDRE_NODES.iter().zip(LEGENDRE_WEIGHTS) {
            for x in [mid - half_width * node, mid + half_width * node] {
                let exponent = x * x;
                if exponent > MAX_EXPONENT {
                    continue;
                }
                let inner = normal_cdf(x) - normal_cdf(x - w);
                if inner >= (NEGLIGIBLE / power).exp() {
                    sum += weight * (-0.5 * exponent).exp() * inner.powf(power);
                }
            }
        }
        integral += sum * 2.0 * half_width * groups / (2.0 * PI).sqrt();
        lower = upper;
    }

    probability += integral;
    if probability <= NEGLIGIBLE.exp() {
        return 0.0;
    }
    probability.min(1.0)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{Distribution, FisherSnedecor, Normal, StudentizedRange, StudentsT};

    #[test]
    fn normal_distribution_is_shifted_and_scaled() {
        let distribution = Normal {
            mean: 10.0,
            standard_deviation: 2.0,
        };
        approx::assert_relative_eq!(distribution.cdf(10.0), 0.5);
        approx::assert_relative_eq!(distribution.ppf(0.975), 10.0 + 2.0 * 1.959_963_984_540_054, max_relative = 1e-12);
        approx::assert_relative_eq!(distribution.sf(12.0), Normal::STANDARD.sf(1.0), max_relative = 1e-12);
    }

    #[test]
    fn students_t_critical_values_match_tables() {
        let t = StudentsT { df: 4.0 };
        approx::assert_abs_diff_eq!(t.two_sided_p(2.776_445_105_2), 0.05, epsilon = 1e-8);
        approx::assert_abs_diff_eq!(t.cdf(0.0), 0.5, epsilon = 1e-12);

        let t = StudentsT { df: 10.0 };
        approx::assert_abs_diff_eq!(t.sf(1.812_461_122_8), 0.05, epsilon = 1e-8);
        approx::assert_abs_diff_eq!(t.cdf(-1.812_461_122_8), 0.05, epsilon = 1e-8);
    }

    #[test]
    fn f_distribution_matches_squared_t() {
        let f = FisherSnedecor {
            numerator_df: 1.0,
            denominator_df: 4.0,
        };
        let t = StudentsT { df: 4.0 };
        approx::assert_abs_diff_eq!(f.sf(13.5), t.two_sided_p(13.5_f64.sqrt()), epsilon = 1e-12);
        approx::assert_abs_diff_eq!(f.sf(7.708_647_422_4), 0.05, epsilon = 1e-8);
        approx::assert_abs_diff_eq!(f.cdf(7.708_647_422_4) + f.sf(7.708_647_422_4), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn studentized_range_matches_tabulated_critical_values() {
        let q = StudentizedRange {
            groups: 3.0,
            df: 10.0,
        };
        approx::assert_abs_diff_eq!(q.cdf(3.877), 0.95, epsilon = 5e-4);
        approx::assert_abs_diff_eq!(q.ppf(0.95), 3.877, epsilon = 2e-3);

        let q = StudentizedRange {
            groups: 4.0,
            df: 20.0,
        };
        approx::assert_abs_diff_eq!(q.cdf(3.958), 0.95, epsilon = 5e-4);
    }

    #[test]
    fn studentized_range_with_few_degrees_of_freedom() {
        // sqrt(2) t(0.975; 2)
        let q = StudentizedRange { groups: 2.0, df: 2.0 };
        approx::assert_abs_diff_eq!(q.ppf(0.95), 6.084_958, epsilon = 1e-4);

        let q = StudentizedRange { groups: 3.0, df: 2.0 };
        approx::assert_abs_diff_eq!(q.ppf(0.95), 8.331, epsilon = 2e-3);

        // One degree of freedom is only available for two groups
        let q = StudentizedRange { groups: 2.0, df: 1.0 };
        approx::assert_abs_diff_eq!(q.ppf(0.95), 2.0_f64.sqrt() * 12.706_204_736, epsilon = 1e-4);
        assert!(StudentizedRange { groups: 3.0, df: 1.0 }.cdf(5.0).is_nan());
    }

    #[test]
    fn studentized_range_with_large_df_uses_the_normal_range() {
        // For two groups the range of standard normals is |Z1 - Z2| ~ sqrt(2) |Z|
        let q = StudentizedRange {
            groups: 2.0,
            df: 1.0e6,
        };
        approx::assert_abs_diff_eq!(q.cdf(2.771_808), 0.95, epsilon = 1e-5);
    }

    proptest! {
        #[test]
        // With two groups the studentized range reduces to a scaled |t|
        fn two_group_studentized_range_is_a_scaled_t(q in 0.1..8.0, df in 5.0..60.0) {
            let range = StudentizedRange { groups: 2.0, df };
            approx::assert_abs_diff_eq!(range.integrated_cdf(q), range.cdf(q), epsilon = 1e-5);
        }
    }
}
