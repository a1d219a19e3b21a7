//! Hypothesis tests: Student's t, Shapiro-Wilk, one-way ANOVA and Tukey's HSD.
use std::f64::consts::{FRAC_1_SQRT_2, PI};

use itertools::Itertools;
use tracing::debug;

use crate::descriptive::{finite, mean, sorted_finite, variance};
use crate::distributions::{Distribution, FisherSnedecor, Normal, StudentizedRange, StudentsT};
use crate::error::Error;
use crate::special::horner;
use crate::Result;

/// A named sample, one treatment or experiment
#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub name: String,
    pub values: Vec<f64>,
}

impl Group {
    /// A group holding the finite values of `values`
    pub fn new(name: impl Into<String>, values: &[f64]) -> Self {
        Self {
            name: name.into(),
            values: finite(values),
        }
    }

    /// Split long-form observations into groups, ordered by group name
    pub fn from_long<S: AsRef<str>>(labels: &[S], values: &[f64]) -> Vec<Self> {
        labels
            .iter()
            .map(AsRef::as_ref)
            .zip(values.iter().copied())
            .filter(|(_, value)| !value.is_nan())
            .into_group_map()
            .into_iter()
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(name, values)| Self {
                name: name.to_owned(),
                values,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        mean(&self.values)
    }
}

/// Human readable verdict of a normality test at significance level `alpha`
pub fn normality_label(p_value: f64, alpha: f64) -> &'static str {
    if p_value < alpha {
        "No"
    } else {
        "Yes"
    }
}

/// Result of Student's two-sample t-test
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TTest {
    pub statistic: f64,
    pub p_value: f64,
    pub df: f64,
}

/// Two-sided t-test for the means of two independent samples with equal variances
///
/// $$
///     t = \frac{\bar{a} - \bar{b}}{s_p \sqrt{1/n_a + 1/n_b}}, \quad
///     s_p^2 = \frac{(n_a - 1) s_a^2 + (n_b - 1) s_b^2}{n_a + n_b - 2}
/// $$
pub fn t_test_independent(a: &[f64], b: &[f64]) -> Result<TTest> {
    let (a, b) = (finite(a), finite(b));
    let got = a.len() + b.len();
    if a.is_empty() || b.is_empty() || got < 3 {
        return Err(Error::InsufficientData {
            what: "t-test",
            needed: 3,
            got,
        });
    }

    #[allow(clippy::cast_precision_loss)]
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let df = na + nb - 2.0;
    // Sums of squares, so that a single observation contributes no spread
    let pooled = (variance(&a, 0) * na + variance(&b, 0) * nb) / df;
    let statistic = (mean(&a) - mean(&b)) / (pooled * (1.0 / na + 1.0 / nb)).sqrt();
    let p_value = StudentsT { df }.two_sided_p(statistic);

    Ok(TTest {
        statistic,
        p_value,
        df,
    })
}

/// Result of the Shapiro-Wilk test for normality
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapiroWilk {
    pub w: f64,
    pub p_value: f64,
}

impl ShapiroWilk {
    /// Royston's (1995) algorithm AS R94 for complete samples of 3 or more values
    ///
    /// The coefficients $a_i$ of the expected normal order statistics are approximated from
    /// Blom scores $m_i = \Phi^{-1}\left((i - 3/8) / (n + 1/4)\right)$, and
    ///
    /// $$
    ///     W = \frac{\left(\sum_i a_i x_{(i)}\right)^2}{\sum_i \left(x_i - \bar{x}\right)^2}.
    /// $$
    ///
    /// The p-value comes from Royston's normalising transformation of $\ln(1 - W)$; for
    /// $n = 3$ it is exact.
    pub fn test(values: &[f64]) -> Result<Self> {
        const SMALL: f64 = 1e-19;
        const C1: [f64; 6] = [0.0, 0.221_157, -0.147_981, -2.071_190, 4.434_685, -2.706_056];
        const C2: [f64; 6] = [0.0, 0.042_981, -0.293_762, -1.752_461, 5.682_633, -3.582_633];
        const C3: [f64; 4] = [0.544, -0.399_78, 0.025_054, -6.714e-4];
        const C4: [f64; 4] = [1.3822, -0.778_57, 0.062_767, -0.002_032_2];
        const C5: [f64; 4] = [-1.5861, -0.310_82, -0.083_751, 0.003_891_5];
        const C6: [f64; 3] = [-0.4803, -0.082_676, 0.003_030_2];
        const G: [f64; 2] = [-2.273, 0.459];

        let x = sorted_finite(values);
        let n = x.len();
        if n < 3 {
            return Err(Error::InsufficientData {
                what: "Shapiro-Wilk test",
                needed: 3,
                got: n,
            });
        }
        let range = x[n - 1] - x[0];
        if range < SMALL {
            return Err(Error::ZeroRange);
        }

        #[allow(clippy::cast_precision_loss)]
        let an = n as f64;
        let half = n / 2;
        let a = if n == 3 {
            vec![FRAC_1_SQRT_2]
        } else {
            let an25 = an + 0.25;
            #[allow(clippy::cast_precision_loss)]
            let m = (1..=half)
                .map(|i| Normal::STANDARD.ppf((i as f64 - 0.375) / an25))
                .collect::<Vec<_>>();
            let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
            let ssumm2 = summ2.sqrt();
            let rsn = 1.0 / an.sqrt();

            let mut a = vec![0.0; half];
            let a1 = horner(&C1, rsn) - m[0] / ssumm2;
            a[0] = a1;
            let (first, fac) = if n > 5 {
                let a2 = -m[1] / ssumm2 + horner(&C2, rsn);
                a[1] = a2;
                let fac = ((summ2 - 2.0 * m[0].powi(2) - 2.0 * m[1].powi(2))
                    / (1.0 - 2.0 * a1.powi(2) - 2.0 * a2.powi(2)))
                .sqrt();
                (2, fac)
            } else {
                let fac = ((summ2 - 2.0 * m[0].powi(2)) / (1.0 - 2.0 * a1.powi(2))).sqrt();
                (1, fac)
            };
            for i in first..half {
                a[i] = -m[i] / fac;
            }
            a
        };

        // Antisymmetric coefficients over the whole ordered sample, zero at an odd centre
        let coefficients = (0..n).map(|i| {
            let j = n - 1 - i;
            match i.cmp(&j) {
                std::cmp::Ordering::Less => -a[i],
                std::cmp::Ordering::Greater => a[j],
                std::cmp::Ordering::Equal => 0.0,
            }
        });
        let coefficients = coefficients.collect::<Vec<_>>();
        let scaled = x.iter().map(|xi| xi / range).collect::<Vec<_>>();

        let sa = mean(&coefficients);
        let sx = mean(&scaled);
        let (mut ssa, mut ssx, mut sax) = (0.0, 0.0, 0.0);
        for (c, xi) in coefficients.iter().zip(&scaled) {
            let asa = c - sa;
            let xsx = xi - sx;
            ssa += asa * asa;
            ssx += xsx * xsx;
            sax += asa * xsx;
        }

        // 1 - W, computed directly to keep precision for W close to one
        let ssassx = (ssa * ssx).sqrt();
        let w1 = ((ssassx - sax) * (ssassx + sax) / (ssa * ssx)).max(0.0);
        let w = 1.0 - w1;

        if n == 3 {
            let p_value = (6.0 / PI * (w.sqrt().asin() - PI / 3.0)).max(0.0);
            return Ok(Self { w, p_value });
        }

        let y = w1.ln();
        let (y, m, s) = if n <= 11 {
            let gamma = horner(&G, an);
            if y >= gamma {
                return Ok(Self { w, p_value: 1e-99 });
            }
            (
                -(gamma - y).ln(),
                horner(&C3, an),
                horner(&C4, an).exp(),
            )
        } else {
            let ln_n = an.ln();
            (y, horner(&C5, ln_n), horner(&C6, ln_n).exp())
        };

        let p_value = Normal {
            mean: m,
            standard_deviation: s,
        }
        .sf(y);

        debug!(n, w, p_value, "Shapiro-Wilk");
        Ok(Self { w, p_value })
    }

    pub fn is_normal(&self, alpha: f64) -> bool {
        self.p_value >= alpha
    }
}

/// One line of an ANOVA table
#[derive(Clone, Debug, PartialEq)]
pub struct AnovaRow {
    pub source: String,
    pub sum_sq: f64,
    pub df: f64,
    /// Only the treatment line carries a test statistic
    pub f: Option<f64>,
    pub p_value: Option<f64>,
}

/// One-way analysis of variance for a single categorical factor
#[derive(Clone, Debug, PartialEq)]
pub struct OneWayAnova {
    pub statistic: f64,
    pub p_value: f64,
    pub treatments: AnovaRow,
    pub residual: AnovaRow,
    /// Each observation minus its group mean, in group order
    pub residuals: Vec<f64>,
}

impl OneWayAnova {
    /// Mean squared error of the residuals
    pub fn mse(&self) -> f64 {
        self.residual.sum_sq / self.residual.df
    }

    pub fn table(&self) -> [&AnovaRow; 2] {
        [&self.treatments, &self.residual]
    }
}

/// Non-empty groups, failing when fewer than two remain or no residual degrees of freedom
fn usable_groups<'a>(groups: &'a [Group], what: &'static str) -> Result<Vec<&'a Group>> {
    let usable = groups.iter().filter(|g| !g.is_empty()).collect::<Vec<_>>();
    if usable.len() < groups.len() {
        debug!(dropped = groups.len() - usable.len(), "ignoring empty groups");
    }
    let total = usable.iter().map(|g| g.len()).sum::<usize>();
    if usable.len() < 2 {
        return Err(Error::InsufficientData {
            what,
            needed: 2,
            got: usable.len(),
        });
    }
    if total <= usable.len() {
        return Err(Error::InsufficientData {
            what,
            needed: usable.len() + 1,
            got: total,
        });
    }
    Ok(usable)
}

/// One-way ANOVA across `groups`
///
/// $$
///     F = \frac{\sum_g n_g (\bar{x}_g - \bar{x})^2 / (k - 1)}
///              {\sum_g \sum_i (x_{gi} - \bar{x}_g)^2 / (N - k)}
/// $$
pub fn one_way_anova(groups: &[Group], factor: &str) -> Result<OneWayAnova> {
    let groups = usable_groups(groups, "one-way ANOVA")?;

    let all = groups
        .iter()
        .flat_map(|g| g.values.iter().copied())
        .collect::<Vec<_>>();
    let grand_mean = mean(&all);

    let mut between = 0.0;
    let mut residuals = Vec::with_capacity(all.len());
    for group in &groups {
        let group_mean = group.mean();
        #[allow(clippy::cast_precision_loss)]
        let n = group.len() as f64;
        between += n * (group_mean - grand_mean).powi(2);
        residuals.extend(group.values.iter().map(|x| x - group_mean));
    }
    let within = residuals.iter().map(|r| r * r).sum::<f64>();

    #[allow(clippy::cast_precision_loss)]
    let (df_between, df_within) = (
        (groups.len() - 1) as f64,
        (all.len() - groups.len()) as f64,
    );
    let statistic = (between / df_between) / (within / df_within);
    let p_value = FisherSnedecor {
        numerator_df: df_between,
        denominator_df: df_within,
    }
    .sf(statistic);

    Ok(OneWayAnova {
        statistic,
        p_value,
        treatments: AnovaRow {
            source: format!("C({factor})"),
            sum_sq: between,
            df: df_between,
            f: Some(statistic),
            p_value: Some(p_value),
        },
        residual: AnovaRow {
            source: "Residual".to_owned(),
            sum_sq: within,
            df: df_within,
            f: None,
            p_value: None,
        },
        residuals,
    })
}

/// A single pairwise comparison of Tukey's honestly significant difference test
#[derive(Clone, Debug, PartialEq)]
pub struct PairwiseComparison {
    pub group1: String,
    pub group2: String,
    /// Mean of `group2` minus mean of `group1`
    pub mean_difference: f64,
    pub p_adjusted: f64,
    pub lower: f64,
    pub upper: f64,
    pub reject: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TukeyHsd {
    pub alpha: f64,
    pub comparisons: Vec<PairwiseComparison>,
}

/// Tukey's HSD over every pair of `groups`, in the order the groups are given
///
/// Each difference of means is scaled by $\sqrt{\frac{MSE}{2}\left(\frac{1}{n_i} +
/// \frac{1}{n_j}\right)}$ and referred to the studentized range distribution with $k$ groups and
/// $N - k$ degrees of freedom. Confidence intervals use the $1 - \alpha$ quantile of the same
/// distribution.
///
/// The studentized range needs at least two residual degrees of freedom, so a design with a
/// single spare observation is rejected with [`Error::InsufficientData`].
pub fn tukey_hsd(groups: &[Group], alpha: f64) -> Result<TukeyHsd> {
    const MIN_RESIDUAL_DF: usize = 2;

    let groups = usable_groups(groups, "Tukey HSD")?;

    let total = groups.iter().map(|g| g.len()).sum::<usize>();
    if total < groups.len() + MIN_RESIDUAL_DF {
        return Err(Error::InsufficientData {
            what: "Tukey HSD",
            needed: groups.len() + MIN_RESIDUAL_DF,
            got: total,
        });
    }
    let mse = groups
        .iter()
        .flat_map(|g| {
            let m = g.mean();
            g.values.iter().map(move |x| (x - m).powi(2))
        })
        .sum::<f64>();
    #[allow(clippy::cast_precision_loss)]
    let df = (total - groups.len()) as f64;
    let mse = mse / df;

    #[allow(clippy::cast_precision_loss)]
    let range = StudentizedRange {
        groups: groups.len() as f64,
        df,
    };
    let critical = range.ppf(1.0 - alpha);

    let comparisons = groups
        .iter()
        .tuple_combinations()
        .map(|(first, second)| {
            #[allow(clippy::cast_precision_loss)]
            let scale =
                (mse / 2.0 * (1.0 / first.len() as f64 + 1.0 / second.len() as f64)).sqrt();
            let mean_difference = second.mean() - first.mean();
            let q = mean_difference.abs() / scale;
            PairwiseComparison {
                group1: first.name.clone(),
                group2: second.name.clone(),
                mean_difference,
                p_adjusted: range.sf(q),
                lower: mean_difference - critical * scale,
                upper: mean_difference + critical * scale,
                reject: q > critical,
            }
        })
        .collect();

    Ok(TukeyHsd { alpha, comparisons })
}
