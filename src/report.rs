//! Text reports of the statistical tests, printed to standard output
use tabled::{Table, Tabled};

use crate::descriptive::{round_to, Summary};
use crate::hypothesis::{normality_label, OneWayAnova, ShapiroWilk, TukeyHsd};

/// One line of an ANOVA table
#[derive(Debug, Clone, Tabled)]
pub struct AnovaEntry {
    #[tabled(rename = "")]
    pub source: String,
    #[tabled(rename = "sum_sq")]
    pub sum_sq: String,
    #[tabled(rename = "df")]
    pub df: String,
    #[tabled(rename = "F")]
    pub f: String,
    #[tabled(rename = "PR(>F)")]
    pub p_value: String,
}

/// One pairwise comparison of a Tukey HSD test
#[derive(Debug, Clone, Tabled)]
pub struct TukeyEntry {
    #[tabled(rename = "group1")]
    pub group1: String,
    #[tabled(rename = "group2")]
    pub group2: String,
    #[tabled(rename = "meandiff")]
    pub mean_difference: String,
    #[tabled(rename = "p-adj")]
    pub p_adjusted: String,
    #[tabled(rename = "lower")]
    pub lower: String,
    #[tabled(rename = "upper")]
    pub upper: String,
    #[tabled(rename = "reject")]
    pub reject: bool,
}

/// Mean, spread and normality of one group of measurements
#[derive(Debug, Clone, Tabled)]
pub struct GroupEntry {
    #[tabled(rename = "Group")]
    pub group: String,
    #[tabled(rename = "Avg")]
    pub mean: f64,
    #[tabled(rename = "SD")]
    pub standard_deviation: f64,
    #[tabled(rename = "n")]
    pub n: usize,
    #[tabled(rename = "Normally distributed?")]
    pub normal: String,
}

impl GroupEntry {
    /// Summary rounded to two decimals, with the normality verdict when one could be reached
    pub fn new(group: &str, summary: Summary, normality: Option<&ShapiroWilk>, alpha: f64) -> Self {
        Self {
            group: group.to_owned(),
            mean: round_to(summary.mean, 2),
            standard_deviation: round_to(summary.standard_deviation, 2),
            n: summary.n,
            normal: normality.map_or_else(
                || "n/a".to_owned(),
                |test| normality_label(test.p_value, alpha).to_owned(),
            ),
        }
    }
}

fn number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else {
        format!("{value:.6}")
    }
}

pub fn anova_table(anova: &OneWayAnova) -> String {
    let rows = anova.table().map(|row| AnovaEntry {
        source: row.source.clone(),
        sum_sq: number(row.sum_sq),
        df: format!("{:.1}", row.df),
        f: row.f.map_or_else(|| "NaN".to_owned(), number),
        p_value: row.p_value.map_or_else(|| "NaN".to_owned(), |p| format!("{p:.6e}")),
    });
    Table::new(rows).to_string()
}

pub fn tukey_table(hsd: &TukeyHsd) -> String {
    let rows = hsd.comparisons.iter().map(|c| TukeyEntry {
        group1: c.group1.clone(),
        group2: c.group2.clone(),
        mean_difference: format!("{:.4}", c.mean_difference),
        p_adjusted: format!("{:.4}", c.p_adjusted),
        lower: format!("{:.4}", c.lower),
        upper: format!("{:.4}", c.upper),
        reject: c.reject,
    });
    let title = format!("Multiple Comparison of Means - Tukey HSD, FWER={:.2}", hsd.alpha);
    format!("{title}\n{}", Table::new(rows))
}

/// A titled table, underlined like a heading
pub fn titled<T: Tabled>(title: &str, rows: &[T]) -> String {
    format!("{}\n{}\n{}", title, "=".repeat(title.chars().count()), Table::new(rows))
}

/// Text lines placed on figures next to a normality test
pub fn normality_annotation(test: &ShapiroWilk, alpha: f64) -> Vec<String> {
    vec![
        "Shapiro-Wilk".to_owned(),
        format!(
            "Normally distributed? {}",
            normality_label(test.p_value, alpha)
        ),
        format!("p = {:.7}", test.p_value),
    ]
}

pub fn residual_verdict(test: &ShapiroWilk, alpha: f64) -> &'static str {
    if test.is_normal(alpha) {
        "Residuals are normally distributed"
    } else {
        "Residuals are not normally distributed"
    }
}

/// Print the one-way ANOVA, its table, Tukey's HSD and the residual normality check
pub fn print_anova_report(anova: &OneWayAnova, hsd: Option<&TukeyHsd>, residuals: &ShapiroWilk, alpha: f64) {
    println!("\nOne-way ANOVA");
    println!("F = {}, p = {}", anova.statistic, anova.p_value);
    println!("{}", anova_table(anova));
    println!("\nTukey HSD pairwise-comparison");
    match hsd {
        Some(hsd) => println!("{}", tukey_table(hsd)),
        None => println!("Too few observations for pairwise comparisons"),
    }
    println!("\nShapiro-Wilk test for normal distribution of residuals");
    println!("W = {}, p = {}", residuals.w, residuals.p_value);
    println!("{}", residual_verdict(residuals, alpha));
}

#[cfg(test)]
mod tests {
    use super::{anova_table, normality_annotation, residual_verdict, tukey_table, GroupEntry};
    use crate::descriptive::Summary;
    use crate::hypothesis::{one_way_anova, tukey_hsd, Group, ShapiroWilk};

    fn groups() -> Vec<Group> {
        vec![
            Group::new("Expt1", &[1.0, 2.0, 3.0]),
            Group::new("Expt2", &[4.0, 5.0, 6.0]),
        ]
    }

    #[test]
    fn anova_table_lists_treatments_then_residual() {
        let anova = one_way_anova(&groups(), "treatments").unwrap();
        let table = anova_table(&anova);
        let treatments = table.find("C(treatments)").unwrap();
        let residual = table.find("Residual").unwrap();
        assert!(treatments < residual);
        assert!(table.contains("PR(>F)"));
        assert!(table.contains("13.500000"));
    }

    #[test]
    fn tukey_table_names_each_pair() {
        let hsd = tukey_hsd(&groups(), 0.05).unwrap();
        let table = tukey_table(&hsd);
        assert!(table.starts_with("Multiple Comparison of Means - Tukey HSD, FWER=0.05"));
        assert!(table.contains("Expt1") && table.contains("Expt2"));
        assert!(table.contains("3.0000"));
    }

    #[test]
    fn annotations_report_seven_decimals() {
        let test = ShapiroWilk {
            w: 0.9,
            p_value: 0.012_345_678,
        };
        assert_eq!(
            normality_annotation(&test, 0.05),
            ["Shapiro-Wilk", "Normally distributed? No", "p = 0.0123457"]
        );
        assert_eq!(residual_verdict(&test, 0.05), "Residuals are not normally distributed");
        assert_eq!(residual_verdict(&test, 0.01), "Residuals are normally distributed");
    }

    #[test]
    fn group_entries_round_to_two_decimals() {
        let summary = Summary::of(&[1.0, 2.0, 4.0]);
        let entry = GroupEntry::new("algae", summary, None, 0.05);
        approx::assert_relative_eq!(entry.mean, 2.33);
        approx::assert_relative_eq!(entry.standard_deviation, 1.53);
        assert_eq!(entry.n, 3);
        assert_eq!(entry.normal, "n/a");
    }
}
