use std::error::Error;
use std::fmt;

/// InputValueError is used if some race option or parameter does not fulfill the posed
/// requirements, e.g., a driver tyre that is not part of the declared tyre types.
#[derive(Debug, Clone)]
pub struct InputValueError;

impl fmt::Display for InputValueError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Invalid input value")
    }
}

impl Error for InputValueError {}

#[derive(Debug, Clone, Copy)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// argsort returns the indices that would sort an array. The sort is stable, i.e. equal values
/// keep their original order.
pub fn argsort<T: std::cmp::PartialOrd>(x: &[T], order: SortOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..x.len()).collect();
    match order {
        SortOrder::Ascending => indices.sort_by(|&a, &b| x[a].partial_cmp(&x[b]).unwrap()),
        SortOrder::Descending => indices.sort_by(|&a, &b| x[b].partial_cmp(&x[a]).unwrap()),
    }
    indices
}

/// mean returns the arithmetic mean of x or None if x is empty.
pub fn mean(x: &[f64]) -> Option<f64> {
    if x.is_empty() {
        return None;
    }
    Some(x.iter().sum::<f64>() / x.len() as f64)
}

/// linear_regression fits y = gradient * x + intercept by ordinary least squares and returns
/// (gradient, intercept). None is returned for fewer than two points or if all x are equal.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    if x.len() != y.len() {
        panic!("Number of items in x and y must be equal!")
    }

    if x.len() < 2 {
        return None;
    }

    let x_mean = mean(x)?;
    let y_mean = mean(y)?;

    let mut s_xy = 0.0;
    let mut s_xx = 0.0;

    for (&x_i, &y_i) in x.iter().zip(y.iter()) {
        s_xy += (x_i - x_mean) * (y_i - y_mean);
        s_xx += (x_i - x_mean) * (x_i - x_mean);
    }

    if s_xx == 0.0 {
        return None;
    }

    let gradient = s_xy / s_xx;
    Some((gradient, y_mean - gradient * x_mean))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn argsort_keeps_ties_in_order() {
        let x = [3, 1, 3, 2];
        assert_eq!(argsort(&x, SortOrder::Descending), vec![0, 2, 3, 1]);
        assert_eq!(argsort(&x, SortOrder::Ascending), vec![1, 3, 0, 2]);
    }

    #[test]
    fn mean_of_empty_slice_is_none() {
        assert!(mean(&[]).is_none());
        assert_abs_diff_eq!(mean(&[1.0, 2.0, 6.0]).unwrap(), 3.0);
    }

    #[test]
    fn linear_regression_recovers_exact_line() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [80.0, 80.1, 80.2, 80.3];
        let (gradient, intercept) = linear_regression(&x, &y).unwrap();
        assert_abs_diff_eq!(gradient, 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(intercept, 80.0, epsilon = 1e-9);
    }

    #[test]
    fn linear_regression_needs_two_distinct_points() {
        assert!(linear_regression(&[1.0], &[90.0]).is_none());
        assert!(linear_regression(&[2.0, 2.0], &[90.0, 91.0]).is_none());
    }
}
