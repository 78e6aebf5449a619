use faer::{Mat, MatRef};

use crate::{error::CpdError, probabilities::Probabilities};

/// Name of the comparer used when none is configured.
pub const DEFAULT_COMPARER: &str = "direct";

/// Expectation step of the registration.
///
/// A comparer models each fixed point as a sample of a Gaussian mixture centered on the
/// current moving points, plus a uniform outlier component, and aggregates the resulting
/// responsibilities into [`Probabilities`].
pub trait Comparer: Send {
    /// Compute the responsibilities of `moving` for `fixed`.
    ///
    /// # Arguments
    ///
    /// * `fixed` - The fixed points with shape (N1, D).
    /// * `moving` - The current estimate of the moving points with shape (N2, D).
    /// * `sigma2` - The shared isotropic variance, strictly positive.
    /// * `outliers` - The weight of the uniform outlier component in `[0, 1)`.
    fn compute(
        &self,
        fixed: MatRef<'_, f64>,
        moving: MatRef<'_, f64>,
        sigma2: f64,
        outliers: f64,
    ) -> Probabilities;
}

type ComparerFactory = fn() -> Box<dyn Comparer>;

const COMPARERS: &[(&str, ComparerFactory)] = &[("direct", direct_comparer)];

fn direct_comparer() -> Box<dyn Comparer> {
    Box::new(DirectComparer::new())
}

/// Create a comparer from its registered name.
///
/// # Errors
///
/// Returns [`CpdError::UnknownComparer`] when no comparer is registered under `name`.
pub fn comparer_from_name(name: &str) -> Result<Box<dyn Comparer>, CpdError> {
    COMPARERS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, factory)| factory())
        .ok_or_else(|| CpdError::UnknownComparer(name.to_string()))
}

/// The names of all registered comparers.
pub fn comparer_names() -> Vec<&'static str> {
    COMPARERS.iter().map(|(name, _)| *name).collect()
}

/// Dense all-pairs comparer without any approximation.
#[derive(Debug, Clone, Default)]
pub struct DirectComparer {
    correspondence: bool,
}

impl DirectComparer {
    /// Create a comparer that only computes the soft statistics.
    pub fn new() -> Self {
        Self {
            correspondence: false,
        }
    }

    /// Create a comparer that also tracks the hard correspondence of each moving point.
    pub fn with_correspondence() -> Self {
        Self {
            correspondence: true,
        }
    }
}

impl Comparer for DirectComparer {
    fn compute(
        &self,
        fixed: MatRef<'_, f64>,
        moving: MatRef<'_, f64>,
        sigma2: f64,
        outliers: f64,
    ) -> Probabilities {
        assert_eq!(fixed.ncols(), moving.ncols());
        let (n, m, d) = (fixed.nrows(), moving.nrows(), fixed.ncols());
        let ksig = -2.0 * sigma2;

        // density of the uniform outlier component relative to the gaussians
        let gaussian_norm = (-ksig * std::f64::consts::PI).powf(0.5 * d as f64);
        let outlier_term = outliers * m as f64 * gaussian_norm / ((1.0 - outliers) * n as f64);

        let mut p = vec![0.0; m];
        let mut p1 = vec![0.0; m];
        let mut pt1 = vec![0.0; n];
        let mut px = Mat::<f64>::zeros(m, d);
        let mut l = 0.0;

        let mut p1_max = vec![0.0; m];
        let mut correspondence = vec![0usize; m];

        for i in 0..n {
            let mut sp = 0.0;
            for (j, pj) in p.iter_mut().enumerate() {
                let mut dist2 = 0.0;
                for k in 0..d {
                    let diff = fixed.read(i, k) - moving.read(j, k);
                    dist2 += diff * diff;
                }
                *pj = (dist2 / ksig).exp();
                sp += *pj;
            }
            let mass = sp;
            sp += outlier_term;
            // every gaussian underflowed and there is no outlier mass
            let sp = sp.max(f64::MIN_POSITIVE);

            // equals 1 - outlier_term / sp, and stays 0 when sp was clamped
            pt1[i] = mass / sp;

            for (j, pj) in p.iter().enumerate() {
                let r = pj / sp;
                if r == 0.0 {
                    continue;
                }
                p1[j] += r;
                for k in 0..d {
                    let v = px.read(j, k);
                    px.write(j, k, v + fixed.read(i, k) * r);
                }
                if self.correspondence && r > p1_max[j] {
                    p1_max[j] = r;
                    correspondence[j] = i;
                }
            }

            l -= sp.ln();
        }
        l += (n * d) as f64 * sigma2.ln() / 2.0;

        Probabilities {
            p1,
            pt1,
            px,
            l,
            correspondence: self.correspondence.then_some(correspondence),
        }
    }
}
