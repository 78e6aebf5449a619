use faer::{Mat, MatRef};

use crate::{normalize::Normalization, probabilities::Probabilities};

/// Output of one maximization step.
#[derive(Debug, Clone)]
pub struct TransformResult {
    /// The new estimate of the transformed moving points with shape (N2, D).
    pub points: Mat<f64>,
    /// The new variance estimate, never negative.
    pub sigma2: f64,
}

/// Maximization step of the registration: a deformation model of the moving points.
///
/// A transform owns its model state for the lifetime of exactly one run.
pub trait Transform {
    /// One-time setup from the (normalized) point sets, before the first iteration.
    fn init(&mut self, fixed: MatRef<'_, f64>, moving: MatRef<'_, f64>);

    /// Add the regularization penalty of the current model to `probabilities.l`.
    fn modify_probabilities(&self, probabilities: &mut Probabilities);

    /// Update the model from the expectation step and return the new points and variance.
    ///
    /// # Arguments
    ///
    /// * `fixed` - The fixed points with shape (N1, D).
    /// * `moving` - The initial moving points with shape (N2, D), not the current estimate.
    /// * `probabilities` - The statistics of the last expectation step.
    /// * `sigma2` - The variance used in the last expectation step.
    fn compute(
        &mut self,
        fixed: MatRef<'_, f64>,
        moving: MatRef<'_, f64>,
        probabilities: &Probabilities,
        sigma2: f64,
    ) -> TransformResult;

    /// Map `result` from the normalized frame into the fixed set's original frame.
    fn denormalize(&mut self, normalization: &Normalization, result: &mut TransformResult) {
        normalization.denormalize_points(result.points.as_mut());
    }
}
