use faer::Mat;

/// Sufficient statistics of one expectation step.
///
/// For a run with `N1` fixed points, `N2` moving points and `D` dimensions.
#[derive(Debug, Clone)]
pub struct Probabilities {
    /// Total responsibility mass of each moving point, length `N2`.
    pub p1: Vec<f64>,
    /// Total responsibility mass of each fixed point, length `N1`.
    pub pt1: Vec<f64>,
    /// Responsibility weighted sum of the fixed points per moving point, shape (N2, D).
    pub px: Mat<f64>,
    /// Negative log-likelihood proxy, only meaningful relative to other iterations.
    pub l: f64,
    /// Index of the most responsible fixed point for each moving point, when requested.
    pub correspondence: Option<Vec<usize>>,
}

impl Probabilities {
    /// Total responsibility mass over all moving points.
    pub fn np(&self) -> f64 {
        self.p1.iter().sum()
    }
}
