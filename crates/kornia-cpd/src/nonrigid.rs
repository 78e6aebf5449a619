use faer::{prelude::SpSolver, Mat, MatRef};

use crate::{
    affinity::affinity,
    error::CpdError,
    probabilities::Probabilities,
    runner::{Registration, Runner, RunnerConfig},
    transform::{Transform, TransformResult},
    utils::weighted_squared_sum,
};

/// Default width of the affinity kernel.
pub const DEFAULT_BETA: f64 = 3.0;
/// Default weight of the smoothness regularization.
pub const DEFAULT_LAMBDA: f64 = 3.0;

/// Non-rigid deformation model: a smooth displacement field `G * W` over the moving points.
///
/// The affinity matrix `G` is built once from the initial moving points and never
/// recomputed, only the weights `W` change between iterations.
#[derive(Debug, Clone)]
pub struct Nonrigid {
    beta: f64,
    lambda: f64,
    g: Mat<f64>,
    w: Mat<f64>,
}

impl Default for Nonrigid {
    fn default() -> Self {
        Self::new(DEFAULT_BETA, DEFAULT_LAMBDA)
    }
}

impl Nonrigid {
    /// Create a non-rigid transform.
    ///
    /// # Arguments
    ///
    /// * `beta` - The width of the gaussian affinity kernel between moving points.
    /// * `lambda` - The strength of the smoothness regularization.
    pub fn new(beta: f64, lambda: f64) -> Self {
        Self {
            beta,
            lambda,
            g: Mat::zeros(0, 0),
            w: Mat::zeros(0, 0),
        }
    }

    /// The affinity kernel width.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// The regularization strength.
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// The affinity matrix with shape (N2, N2).
    pub fn g(&self) -> MatRef<'_, f64> {
        self.g.as_ref()
    }

    /// The deformation weights with shape (N2, D).
    pub fn w(&self) -> MatRef<'_, f64> {
        self.w.as_ref()
    }
}

impl Transform for Nonrigid {
    fn init(&mut self, _fixed: MatRef<'_, f64>, moving: MatRef<'_, f64>) {
        self.g = affinity(moving, moving, self.beta);
        self.w = Mat::zeros(moving.nrows(), moving.ncols());
    }

    fn modify_probabilities(&self, probabilities: &mut Probabilities) {
        // trace(W^T * G * W)
        let gw = &self.g * &self.w;
        let wgw = self.w.transpose() * gw.as_ref();
        probabilities.l += self.lambda / 2.0 * trace(wgw.as_ref());
    }

    fn compute(
        &mut self,
        fixed: MatRef<'_, f64>,
        moving: MatRef<'_, f64>,
        probabilities: &Probabilities,
        sigma2: f64,
    ) -> TransformResult {
        let (m, d) = (moving.nrows(), moving.ncols());
        let p1 = &probabilities.p1;
        let px = &probabilities.px;

        // (dP * G + lambda * sigma2 * I) * W = PX - dP * Y
        let reg = self.lambda * sigma2;
        let lhs = Mat::from_fn(m, m, |i, j| {
            let v = p1[i] * self.g.read(i, j);
            if i == j {
                v + reg
            } else {
                v
            }
        });
        let rhs = Mat::from_fn(m, d, |i, j| px.read(i, j) - p1[i] * moving.read(i, j));
        self.w = lhs.col_piv_qr().solve(rhs);

        let gw = &self.g * &self.w;
        let points = Mat::from_fn(m, d, |i, j| moving.read(i, j) + gw.read(i, j));

        // trace(PX^T * T)
        let cross = trace((px.transpose() * points.as_ref()).as_ref());

        let np = probabilities.np().max(f64::MIN_POSITIVE);
        let sigma2 = ((weighted_squared_sum(fixed, &probabilities.pt1)
            + weighted_squared_sum(points.as_ref(), p1)
            - 2.0 * cross)
            / (np * d as f64))
            .abs();

        TransformResult { points, sigma2 }
    }
}

fn trace(a: MatRef<'_, f64>) -> f64 {
    (0..a.nrows().min(a.ncols())).map(|k| a.read(k, k)).sum()
}

/// Run a non-rigid registration with the default parameters.
///
/// # Arguments
///
/// * `fixed` - The fixed points with shape (N1, D).
/// * `moving` - The moving points with shape (N2, D).
pub fn nonrigid(
    fixed: MatRef<'_, f64>,
    moving: MatRef<'_, f64>,
) -> Result<Registration<Nonrigid>, CpdError> {
    Runner::new(Nonrigid::default(), RunnerConfig::default())?.run(fixed, moving)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{comparer::Comparer, comparer::DirectComparer, utils::points_from_rows};
    use approx::assert_relative_eq;

    fn grid() -> Mat<f64> {
        points_from_rows(&[
            [-1.0, -1.0],
            [0.0, -1.0],
            [1.0, -1.0],
            [-1.0, 0.0],
            [0.0, 0.0],
            [1.0, 0.0],
            [-1.0, 1.0],
            [0.0, 1.0],
            [1.0, 1.0],
        ])
    }

    #[test]
    fn test_nonrigid_init() {
        let points = grid();
        let mut nonrigid = Nonrigid::default();
        nonrigid.init(points.as_ref(), points.as_ref());

        assert_eq!(nonrigid.g().nrows(), 9);
        assert_eq!(nonrigid.g().ncols(), 9);
        assert_eq!(nonrigid.w().nrows(), 9);
        assert_eq!(nonrigid.w().ncols(), 2);
        assert_relative_eq!(nonrigid.g().read(0, 0), 1.0);
        assert_relative_eq!(nonrigid.g().read(0, 1), (-1.0f64 / 18.0).exp(), epsilon = 1e-12);
        for i in 0..9 {
            for j in 0..2 {
                assert_eq!(nonrigid.w().read(i, j), 0.0);
            }
        }
    }

    #[test]
    fn test_nonrigid_zero_weights_add_no_penalty() {
        let points = grid();
        let mut nonrigid = Nonrigid::default();
        nonrigid.init(points.as_ref(), points.as_ref());

        let mut probs = DirectComparer::new().compute(points.as_ref(), points.as_ref(), 0.5, 0.1);
        let l = probs.l;
        nonrigid.modify_probabilities(&mut probs);
        assert_relative_eq!(probs.l, l);
    }

    #[test]
    fn test_nonrigid_compute() {
        let fixed = grid();
        let moving = Mat::from_fn(9, 2, |i, j| fixed.read(i, j) * 0.9 + 0.05);
        let mut nonrigid = Nonrigid::default();
        nonrigid.init(fixed.as_ref(), moving.as_ref());

        let sigma2 = 0.5;
        let probs = DirectComparer::new().compute(fixed.as_ref(), moving.as_ref(), sigma2, 0.1);
        let result = nonrigid.compute(fixed.as_ref(), moving.as_ref(), &probs, sigma2);

        assert_eq!(result.points.nrows(), 9);
        assert_eq!(result.points.ncols(), 2);
        assert!(result.sigma2 >= 0.0 && result.sigma2.is_finite());

        // the weights solve the regularized linear system
        let gw = nonrigid.g() * nonrigid.w();
        for i in 0..9 {
            for j in 0..2 {
                let reg = nonrigid.lambda() * sigma2 * nonrigid.w().read(i, j);
                let lhs = probs.p1[i] * gw.read(i, j) + reg;
                let rhs = probs.px.read(i, j) - probs.p1[i] * moving.read(i, j);
                assert_relative_eq!(lhs, rhs, epsilon = 1e-9);
                assert_relative_eq!(
                    result.points.read(i, j),
                    moving.read(i, j) + gw.read(i, j),
                    epsilon = 1e-12
                );
            }
        }

        // a non zero field is now penalized
        let mut next = DirectComparer::new().compute(
            fixed.as_ref(),
            result.points.as_ref(),
            result.sigma2,
            0.1,
        );
        let l = next.l;
        nonrigid.modify_probabilities(&mut next);
        assert!(next.l > l);
    }
}
