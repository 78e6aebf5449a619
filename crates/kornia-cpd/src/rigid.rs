use faer::{Mat, MatRef};

use crate::{
    error::CpdError,
    normalize::Normalization,
    probabilities::Probabilities,
    runner::{Registration, Runner, RunnerConfig},
    transform::{Transform, TransformResult},
    utils::weighted_squared_sum,
};

/// Rigid deformation model: rotation, translation and an optional isotropic scale.
///
/// The transformation maps a moving point `y` to `scale * rotation * y + translation`.
#[derive(Debug, Clone)]
pub struct Rigid {
    reflections: bool,
    estimate_scale: bool,
    rotation: Mat<f64>,
    translation: Vec<f64>,
    scale: f64,
}

impl Default for Rigid {
    fn default() -> Self {
        Self::new()
    }
}

impl Rigid {
    /// Create a rigid transform that estimates scale and forbids reflections.
    pub fn new() -> Self {
        Self {
            reflections: false,
            estimate_scale: true,
            rotation: Mat::zeros(0, 0),
            translation: Vec::new(),
            scale: 1.0,
        }
    }

    /// Set whether the estimated rotation may be a reflection.
    pub fn with_reflections(mut self, reflections: bool) -> Self {
        self.reflections = reflections;
        self
    }

    /// Set whether an isotropic scale is estimated. When disabled the scale stays 1.
    pub fn with_scale(mut self, scale: bool) -> Self {
        self.estimate_scale = scale;
        self
    }

    /// The estimated rotation matrix with shape (D, D).
    pub fn rotation(&self) -> MatRef<'_, f64> {
        self.rotation.as_ref()
    }

    /// The estimated translation vector of length D.
    pub fn translation(&self) -> &[f64] {
        &self.translation
    }

    /// The estimated isotropic scale.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// The transformation as a homogeneous matrix with shape (D + 1, D + 1).
    pub fn matrix(&self) -> Mat<f64> {
        let d = self.translation.len();
        Mat::from_fn(d + 1, d + 1, |i, j| match (i < d, j < d) {
            (true, true) => self.scale * self.rotation.read(i, j),
            (true, false) => self.translation[i],
            (false, true) => 0.0,
            (false, false) => 1.0,
        })
    }

    fn apply(&self, points: MatRef<'_, f64>) -> Mat<f64> {
        // rows are points, so the rotation applies transposed on the right
        let rotated = points * self.rotation.transpose();
        Mat::from_fn(points.nrows(), points.ncols(), |i, j| {
            self.scale * rotated.read(i, j) + self.translation[j]
        })
    }
}

impl Transform for Rigid {
    fn init(&mut self, _fixed: MatRef<'_, f64>, moving: MatRef<'_, f64>) {
        let d = moving.ncols();
        self.rotation = Mat::identity(d, d);
        self.translation = vec![0.0; d];
        self.scale = 1.0;
    }

    fn modify_probabilities(&self, _probabilities: &mut Probabilities) {}

    fn compute(
        &mut self,
        fixed: MatRef<'_, f64>,
        moving: MatRef<'_, f64>,
        probabilities: &Probabilities,
        _sigma2: f64,
    ) -> TransformResult {
        let (n, m, d) = (fixed.nrows(), moving.nrows(), moving.ncols());
        let p1 = &probabilities.p1;
        let pt1 = &probabilities.pt1;
        let px = &probabilities.px;
        let np = probabilities.np().max(f64::MIN_POSITIVE);

        // weighted centroids
        let mu_x = (0..d)
            .map(|k| (0..n).map(|i| fixed.read(i, k) * pt1[i]).sum::<f64>() / np)
            .collect::<Vec<_>>();
        let mu_y = (0..d)
            .map(|k| (0..m).map(|j| moving.read(j, k) * p1[j]).sum::<f64>() / np)
            .collect::<Vec<_>>();

        // A = PX^T * Y - Np * mu_x * mu_y^T
        let pxt_y = px.transpose() * moving;
        let a = Mat::from_fn(d, d, |r, c| pxt_y.read(r, c) - np * mu_x[r] * mu_y[c]);

        let svd = a.svd();
        let (u, v, s) = (svd.u(), svd.v(), svd.s_diagonal());

        // force a proper rotation unless reflections are allowed
        let mut c = vec![1.0; d];
        if !self.reflections {
            let det = (u * v.transpose()).determinant();
            c[d - 1] = if det < 0.0 { -1.0 } else { 1.0 };
        }

        // R = U * C * V^T
        let uc = Mat::from_fn(d, d, |r, k| u.read(r, k) * c[k]);
        self.rotation = uc.as_ref() * v.transpose();
        let trace_sc = (0..d).map(|k| s.read(k) * c[k]).sum::<f64>();

        let mu_x2 = mu_x.iter().map(|x| x * x).sum::<f64>();
        let mu_y2 = mu_y.iter().map(|y| y * y).sum::<f64>();
        let fixed_spread = weighted_squared_sum(fixed, pt1) - np * mu_x2;
        let moving_spread = weighted_squared_sum(moving, p1) - np * mu_y2;

        // a moving set without spread carries no scale information
        self.scale = if self.estimate_scale && moving_spread > 0.0 {
            trace_sc / moving_spread
        } else {
            1.0
        };

        self.translation = (0..d)
            .map(|r| {
                let ry = (0..d)
                    .map(|k| self.rotation.read(r, k) * mu_y[k])
                    .sum::<f64>();
                mu_x[r] - self.scale * ry
            })
            .collect();

        let residual = if self.estimate_scale && moving_spread > 0.0 {
            fixed_spread - self.scale * trace_sc
        } else {
            fixed_spread - 2.0 * trace_sc + moving_spread
        };
        let sigma2 = (residual / (np * d as f64)).abs();

        TransformResult {
            points: self.apply(moving),
            sigma2,
        }
    }

    fn denormalize(&mut self, normalization: &Normalization, result: &mut TransformResult) {
        normalization.denormalize_points(result.points.as_mut());

        // t' = scale * t + fixed_mean - s * R * moving_mean
        let d = self.translation.len();
        self.translation = (0..d)
            .map(|r| {
                let rm = (0..d)
                    .map(|k| self.rotation.read(r, k) * normalization.moving_mean[k])
                    .sum::<f64>();
                normalization.scale * self.translation[r] + normalization.fixed_mean[r]
                    - self.scale * rm
            })
            .collect();
    }
}

/// Run a rigid registration with the default parameters.
///
/// # Arguments
///
/// * `fixed` - The fixed points with shape (N1, D).
/// * `moving` - The moving points with shape (N2, D).
pub fn rigid(
    fixed: MatRef<'_, f64>,
    moving: MatRef<'_, f64>,
) -> Result<Registration<Rigid>, CpdError> {
    Runner::new(Rigid::default(), RunnerConfig::default())?.run(fixed, moving)
}
