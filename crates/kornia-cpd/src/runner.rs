use std::time::{Duration, Instant};

use faer::{Mat, MatRef};

use crate::{
    comparer::{comparer_from_name, Comparer, DirectComparer, DEFAULT_COMPARER},
    error::CpdError,
    normalize::normalize,
    transform::{Transform, TransformResult},
    utils::{check_point_sets, default_sigma2},
};

/// The default number of iterations allowed.
pub const DEFAULT_MAX_ITERATIONS: usize = 150;
/// The default convergence tolerance on the relative change of the likelihood.
pub const DEFAULT_TOLERANCE: f64 = 1e-5;
/// The default initial variance, zero means it is computed from the data.
pub const DEFAULT_SIGMA2: f64 = 0.0;
/// The default outlier weight.
pub const DEFAULT_OUTLIERS: f64 = 0.1;
/// Whether points are normalized by default.
pub const DEFAULT_NORMALIZE: bool = true;
/// Whether the correspondence vector is computed by default.
pub const DEFAULT_CORRESPONDENCE: bool = false;

/// Configuration of a registration run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum number of iterations to perform.
    pub max_iterations: usize,
    /// Convergence tolerance on the relative change of the likelihood between iterations.
    pub tolerance: f64,
    /// Initial variance. When `0.0` it is computed from the point sets.
    pub sigma2: f64,
    /// Weight of the uniform outlier component, in `[0, 1)`.
    pub outliers: f64,
    /// Whether to normalize the point sets before iterating.
    pub normalize: bool,
    /// Whether to compute the hard correspondence of each moving point at the end.
    pub correspondence: bool,
    /// Registered name of the comparer used for the expectation step.
    pub comparer: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            sigma2: DEFAULT_SIGMA2,
            outliers: DEFAULT_OUTLIERS,
            normalize: DEFAULT_NORMALIZE,
            correspondence: DEFAULT_CORRESPONDENCE,
            comparer: DEFAULT_COMPARER.to_string(),
        }
    }
}

impl RunnerConfig {
    /// Check that every value is in range.
    pub fn validate(&self) -> Result<(), CpdError> {
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(CpdError::InvalidConfig(format!(
                "tolerance must be finite and non negative, got {}",
                self.tolerance
            )));
        }
        if !(self.sigma2.is_finite() && self.sigma2 >= 0.0) {
            return Err(CpdError::InvalidConfig(format!(
                "sigma2 must be finite and non negative, got {}",
                self.sigma2
            )));
        }
        if !(0.0..1.0).contains(&self.outliers) {
            return Err(CpdError::InvalidConfig(format!(
                "outliers must be in [0, 1), got {}",
                self.outliers
            )));
        }
        Ok(())
    }
}

/// Result of a registration run.
#[derive(Debug, Clone)]
pub struct Registration<T> {
    /// The transformed moving points with shape (N2, D), in the fixed set's frame.
    pub points: Mat<f64>,
    /// The final variance estimate.
    pub sigma2: f64,
    /// The number of iterations performed.
    pub iterations: usize,
    /// The wall clock time of the run.
    pub runtime: Duration,
    /// Index of the matching fixed point for each moving point, when requested.
    pub correspondence: Option<Vec<usize>>,
    /// The fitted deformation model.
    pub transform: T,
}

/// Drives one Coherent Point Drift registration.
///
/// The runner alternates the comparer (expectation step) and the transform (maximization
/// step) until the likelihood stops changing, the variance collapses or the iteration
/// budget is spent. Running out of iterations is not an error.
pub struct Runner<T: Transform> {
    config: RunnerConfig,
    comparer: Box<dyn Comparer>,
    transform: T,
}

impl<T: Transform> Runner<T> {
    /// Create a runner, resolving the comparer from `config.comparer`.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is out of range or the comparer name is unknown.
    pub fn new(transform: T, config: RunnerConfig) -> Result<Self, CpdError> {
        config.validate()?;
        let comparer = comparer_from_name(&config.comparer)?;
        Ok(Self {
            config,
            comparer,
            transform,
        })
    }

    /// Create a runner with a custom comparer. `config.comparer` is ignored.
    pub fn with_comparer(
        transform: T,
        config: RunnerConfig,
        comparer: Box<dyn Comparer>,
    ) -> Result<Self, CpdError> {
        config.validate()?;
        Ok(Self {
            config,
            comparer,
            transform,
        })
    }

    /// The configuration of this runner.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Register `moving` onto `fixed`.
    ///
    /// # Arguments
    ///
    /// * `fixed` - The fixed points with shape (N1, D).
    /// * `moving` - The moving points with shape (N2, D).
    ///
    /// # Returns
    ///
    /// The transformed moving points, the final variance, the number of iterations, the
    /// runtime, the optional correspondence and the fitted transform.
    pub fn run(
        mut self,
        fixed: MatRef<'_, f64>,
        moving: MatRef<'_, f64>,
    ) -> Result<Registration<T>, CpdError> {
        check_point_sets(fixed, moving)?;
        log::info!("Number of points in fixed matrix: {}", fixed.nrows());
        log::info!("Number of points in moving matrix: {}", moving.nrows());

        let tic = Instant::now();

        let normalization = if self.config.normalize {
            Some(normalize(fixed, moving)?)
        } else {
            None
        };
        let (fixed_n, moving_n) = match &normalization {
            Some(n) => (n.fixed.as_ref(), n.moving.as_ref()),
            None => (fixed, moving),
        };

        self.transform.init(fixed_n, moving_n);

        let sigma2 = if self.config.sigma2 == 0.0 {
            let sigma2 = default_sigma2(fixed_n, moving_n);
            log::info!("Initializing sigma2 to {}", sigma2);
            sigma2
        } else {
            log::info!("sigma2 previously set to {}", self.config.sigma2);
            self.config.sigma2
        };
        let mut result = TransformResult {
            points: moving_n.to_owned(),
            sigma2,
        };

        let mut iterations = 0;
        let mut ntol = self.config.tolerance + 10.0;
        let mut l = 0.0;

        while iterations < self.config.max_iterations
            && ntol > self.config.tolerance
            && result.sigma2 > 10.0 * f64::EPSILON
        {
            let now = Instant::now();

            let mut probabilities = self.comparer.compute(
                fixed_n,
                result.points.as_ref(),
                result.sigma2,
                self.config.outliers,
            );
            self.transform.modify_probabilities(&mut probabilities);

            ntol = ((probabilities.l - l) / probabilities.l).abs();
            log::debug!(
                "iter={}, dL={:.8}, sigma2={:.8}",
                iterations,
                ntol,
                result.sigma2
            );
            l = probabilities.l;

            result = self
                .transform
                .compute(fixed_n, moving_n, &probabilities, result.sigma2);
            iterations += 1;

            log::debug!("elapsed: {:?}", now.elapsed());
        }

        if let Some(normalization) = &normalization {
            self.transform.denormalize(normalization, &mut result);
        }

        // NOTE: the correspondence pass runs in the original frame with the configured
        // variance, not the converged one.
        let correspondence = if self.config.correspondence {
            let sigma2 = if self.config.sigma2 == 0.0 {
                default_sigma2(fixed, result.points.as_ref())
            } else {
                self.config.sigma2
            };
            DirectComparer::with_correspondence()
                .compute(fixed, result.points.as_ref(), sigma2, self.config.outliers)
                .correspondence
        } else {
            None
        };

        let runtime = tic.elapsed();
        log::info!(
            "Registration finished: iterations={}, sigma2={}, runtime={:?}",
            iterations,
            result.sigma2,
            runtime
        );

        Ok(Registration {
            points: result.points,
            sigma2: result.sigma2,
            iterations,
            runtime,
            correspondence,
            transform: self.transform,
        })
    }
}
