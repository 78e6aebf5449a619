use faer::{Mat, MatRef};

use crate::error::CpdError;

/// A set of points stored one point per row.
pub type PointMatrix = Mat<f64>;

/// Build a point matrix from fixed size rows.
///
/// Example:
///
/// ```
/// use kornia_cpd::utils::points_from_rows;
///
/// let points = points_from_rows(&[[0.0, 1.0], [2.0, 3.0], [4.0, 5.0]]);
/// assert_eq!(points.nrows(), 3);
/// assert_eq!(points.ncols(), 2);
/// ```
pub fn points_from_rows<const D: usize>(rows: &[[f64; D]]) -> PointMatrix {
    Mat::from_fn(rows.len(), D, |i, j| rows[i][j])
}

/// Copy a point matrix into a vector of rows.
pub fn points_to_rows(points: MatRef<'_, f64>) -> Vec<Vec<f64>> {
    (0..points.nrows())
        .map(|i| (0..points.ncols()).map(|j| points.read(i, j)).collect())
        .collect()
}

/// Check that the two point sets are non empty and share the same dimensionality.
pub fn check_point_sets(fixed: MatRef<'_, f64>, moving: MatRef<'_, f64>) -> Result<(), CpdError> {
    if fixed.nrows() == 0 || fixed.ncols() == 0 {
        return Err(CpdError::EmptyPointSet("fixed"));
    }
    if moving.nrows() == 0 || moving.ncols() == 0 {
        return Err(CpdError::EmptyPointSet("moving"));
    }
    if fixed.ncols() != moving.ncols() {
        return Err(CpdError::DimensionMismatch {
            fixed: fixed.ncols(),
            moving: moving.ncols(),
        });
    }
    Ok(())
}

/// Compute the mean point of a point set.
pub fn column_means(points: MatRef<'_, f64>) -> Vec<f64> {
    let n = points.nrows().max(1) as f64;
    (0..points.ncols())
        .map(|j| (0..points.nrows()).map(|i| points.read(i, j)).sum::<f64>() / n)
        .collect()
}

/// Sum of the squared entries of each row, weighted by `weights`.
pub(crate) fn weighted_squared_sum(points: MatRef<'_, f64>, weights: &[f64]) -> f64 {
    debug_assert_eq!(points.nrows(), weights.len());
    let mut sum = 0.0;
    for (i, w) in weights.iter().enumerate() {
        for j in 0..points.ncols() {
            let v = points.read(i, j);
            sum += v * v * w;
        }
    }
    sum
}

/// Compute the initial variance for a registration.
///
/// This is the mean squared distance between every fixed and every moving point, divided
/// by the number of dimensions.
///
/// PRECONDITION: both point sets are non empty and have the same number of columns.
pub fn default_sigma2(fixed: MatRef<'_, f64>, moving: MatRef<'_, f64>) -> f64 {
    let (n, m, d) = (fixed.nrows(), moving.nrows(), fixed.ncols());

    let fixed_ones = vec![1.0; n];
    let moving_ones = vec![1.0; m];
    let trace_fixed = weighted_squared_sum(fixed, &fixed_ones);
    let trace_moving = weighted_squared_sum(moving, &moving_ones);

    // sum(X) . sum(Y)
    let mut cross = 0.0;
    for j in 0..d {
        let fixed_sum = (0..n).map(|i| fixed.read(i, j)).sum::<f64>();
        let moving_sum = (0..m).map(|i| moving.read(i, j)).sum::<f64>();
        cross += fixed_sum * moving_sum;
    }

    (m as f64 * trace_fixed + n as f64 * trace_moving - 2.0 * cross) / (n * m * d) as f64
}

/// Compute the average displacement between two point sets with the same shape.
///
/// This is the column-wise mean of `points - moving`, a quick diagnostic for how far a
/// registration shifted the moving points.
pub fn average_translation(points: MatRef<'_, f64>, moving: MatRef<'_, f64>) -> Vec<f64> {
    assert_eq!(points.nrows(), moving.nrows());
    assert_eq!(points.ncols(), moving.ncols());
    let n = points.nrows().max(1) as f64;
    (0..points.ncols())
        .map(|j| {
            (0..points.nrows())
                .map(|i| points.read(i, j) - moving.read(i, j))
                .sum::<f64>()
                / n
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_points_from_rows() {
        let points = points_from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(points.nrows(), 2);
        assert_eq!(points.ncols(), 3);
        assert_eq!(points.read(1, 2), 6.0);
        assert_eq!(
            points_to_rows(points.as_ref()),
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]
        );
    }

    #[test]
    fn test_check_point_sets() {
        let a = points_from_rows(&[[0.0, 0.0], [1.0, 1.0]]);
        let b = points_from_rows(&[[0.0, 0.0, 0.0]]);
        let empty = PointMatrix::zeros(0, 2);

        assert!(check_point_sets(a.as_ref(), a.as_ref()).is_ok());
        assert!(matches!(
            check_point_sets(a.as_ref(), b.as_ref()),
            Err(CpdError::DimensionMismatch {
                fixed: 2,
                moving: 3
            })
        ));
        assert!(matches!(
            check_point_sets(empty.as_ref(), a.as_ref()),
            Err(CpdError::EmptyPointSet("fixed"))
        ));
        assert!(matches!(
            check_point_sets(a.as_ref(), empty.as_ref()),
            Err(CpdError::EmptyPointSet("moving"))
        ));
    }

    #[test]
    fn test_column_means() {
        let points = points_from_rows(&[[1.0, 2.0], [3.0, 6.0]]);
        assert_eq!(column_means(points.as_ref()), vec![2.0, 4.0]);
    }

    #[test]
    fn test_default_sigma2() {
        // a single pair of points at distance 2 in 2d: 4 / 2
        let fixed = points_from_rows(&[[0.0, 0.0]]);
        let moving = points_from_rows(&[[2.0, 0.0]]);
        assert_relative_eq!(
            default_sigma2(fixed.as_ref(), moving.as_ref()),
            2.0,
            epsilon = 1e-12
        );

        // brute force mean of squared distances over all pairs
        let fixed = points_from_rows(&[[0.0, 0.0], [1.0, 0.0], [0.0, 2.0]]);
        let moving = points_from_rows(&[[1.0, 1.0], [3.0, -1.0]]);
        let mut expected = 0.0;
        for i in 0..3 {
            for j in 0..2 {
                for k in 0..2 {
                    let d = fixed.read(i, k) - moving.read(j, k);
                    expected += d * d;
                }
            }
        }
        expected /= (3 * 2 * 2) as f64;
        assert_relative_eq!(
            default_sigma2(fixed.as_ref(), moving.as_ref()),
            expected,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_average_translation() {
        let moving = points_from_rows(&[[0.0, 0.0], [1.0, 1.0]]);
        let points = points_from_rows(&[[1.0, 0.5], [2.0, 1.5]]);
        let t = average_translation(points.as_ref(), moving.as_ref());
        assert_relative_eq!(t[0], 1.0);
        assert_relative_eq!(t[1], 0.5);
    }
}
