use crate::distributions::Normal;

/// Ranks from 1 to n, tied values sharing the average of the ranks they span
pub fn rank(values: &[f64]) -> Vec<f64> {
    let mut order = (0..values.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end hold ranks start + 1 ..= end
        #[allow(clippy::cast_precision_loss)]
        let shared = (start + end + 1) as f64 / 2.0;
        for &index in &order[start..end] {
            ranks[index] = shared;
        }
        start = end;
    }
    ranks
}

/// Map each value to a normal score through its rank
///
/// $$
///     z_i = \Phi^{-1}\left(\frac{r_i}{n + 1}\right)
/// $$
///
/// The transformed sample is symmetric about zero whatever the shape of the input, which is
/// what makes it usable for tests assuming normality.
pub fn rank_transformation(values: &[f64]) -> Vec<f64> {
    #[allow(clippy::cast_precision_loss)]
    let denominator = (values.len() + 1) as f64;
    rank(values)
        .into_iter()
        .map(|r| Normal::STANDARD.ppf(r / denominator))
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{rank, rank_transformation};

    #[test]
    fn ties_share_the_average_rank() {
        assert_eq!(rank(&[10.0, 20.0, 20.0, 30.0]), vec![1.0, 2.5, 2.5, 4.0]);
        assert_eq!(rank(&[3.0, 1.0, 2.0]), vec![3.0, 1.0, 2.0]);
        assert_eq!(rank(&[5.0, 5.0, 5.0]), vec![2.0, 2.0, 2.0]);
        assert!(rank(&[]).is_empty());
    }

    #[test]
    fn transformed_values_are_normal_scores() {
        let transformed = rank_transformation(&[12.0, 31.0, 20.0]);
        // ranks 1, 3, 2 over n + 1 = 4
        approx::assert_relative_eq!(transformed[0], -0.674_489_750_196_081_7, max_relative = 1e-10);
        approx::assert_relative_eq!(transformed[1], 0.674_489_750_196_081_7, max_relative = 1e-10);
        approx::assert_abs_diff_eq!(transformed[2], 0.0);
    }

    proptest! {
        #[test]
        // The scores of distinct values are symmetric, so they sum to zero
        fn transformed_values_sum_to_zero(values in proptest::collection::hash_set(-1000i32..1000, 1..60)) {
            let values = values.into_iter().map(f64::from).collect::<Vec<_>>();
            let sum: f64 = rank_transformation(&values).iter().sum();
            approx::assert_abs_diff_eq!(sum, 0.0, epsilon = 1e-9);
        }

        #[test]
        fn transformation_preserves_order(values in proptest::collection::vec(-1.0e3..1.0e3, 2..40)) {
            let transformed = rank_transformation(&values);
            for (i, j) in (0..values.len()).flat_map(|i| (0..values.len()).map(move |j| (i, j))) {
                if values[i] < values[j] {
                    prop_assert!(transformed[i] < transformed[j]);
                }
            }
        }
    }
}
