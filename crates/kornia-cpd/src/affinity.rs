use faer::{Mat, MatRef};

/// Compute the Gaussian affinity matrix between two point sets.
///
/// `G[i, j] = exp(-|x_i - y_j|^2 / (2 * beta^2))`
///
/// # Arguments
///
/// * `x` - The first point set with shape (N, D).
/// * `y` - The second point set with shape (M, D).
/// * `beta` - The kernel bandwidth.
///
/// # Returns
///
/// The affinity matrix with shape (N, M). It is symmetric when `x` and `y` are the same set.
pub fn affinity(x: MatRef<'_, f64>, y: MatRef<'_, f64>, beta: f64) -> Mat<f64> {
    assert_eq!(x.ncols(), y.ncols());
    let k = -2.0 * beta * beta;
    Mat::from_fn(x.nrows(), y.nrows(), |i, j| {
        let mut dist2 = 0.0;
        for d in 0..x.ncols() {
            let diff = x.read(i, d) - y.read(j, d);
            dist2 += diff * diff;
        }
        (dist2 / k).exp()
    })
}
