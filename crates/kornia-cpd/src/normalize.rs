use faer::{Mat, MatMut, MatRef};

use crate::{
    error::CpdError,
    utils::{check_point_sets, column_means, PointMatrix},
};

/// Centered and rescaled copies of a fixed/moving point set pair.
///
/// Both sets are divided by the same scale so the relative geometry between them is kept.
#[derive(Debug, Clone)]
pub struct Normalization {
    /// The mean point subtracted from the fixed set.
    pub fixed_mean: Vec<f64>,
    /// The mean point subtracted from the moving set.
    pub moving_mean: Vec<f64>,
    /// The shared isotropic scale divided out of both sets.
    pub scale: f64,
    /// The normalized fixed points.
    pub fixed: PointMatrix,
    /// The normalized moving points.
    pub moving: PointMatrix,
}

/// Center both point sets on their own mean and divide them by a shared scale.
///
/// The scale is the larger of the two root-mean-square radii of the centered sets.
///
/// # Errors
///
/// Fails on empty or mismatched inputs, and with [`CpdError::DegeneratePointSets`] when both
/// sets collapse to a single point each.
pub fn normalize(
    fixed: MatRef<'_, f64>,
    moving: MatRef<'_, f64>,
) -> Result<Normalization, CpdError> {
    check_point_sets(fixed, moving)?;

    let fixed_mean = column_means(fixed);
    let moving_mean = column_means(moving);

    let mut fixed_centered = center(fixed, &fixed_mean);
    let mut moving_centered = center(moving, &moving_mean);

    let scale = rms_radius(fixed_centered.as_ref()).max(rms_radius(moving_centered.as_ref()));
    if !(scale.is_finite() && scale > 0.0) {
        return Err(CpdError::DegeneratePointSets);
    }

    let inv_scale = 1.0 / scale;
    scale_inplace(fixed_centered.as_mut(), inv_scale);
    scale_inplace(moving_centered.as_mut(), inv_scale);

    log::debug!("Normalization scale: {}", scale);

    Ok(Normalization {
        fixed_mean,
        moving_mean,
        scale,
        fixed: fixed_centered,
        moving: moving_centered,
    })
}

impl Normalization {
    /// Map normalized points into the fixed set's original frame.
    ///
    /// `points := points * scale + fixed_mean`
    pub fn denormalize_points(&self, points: MatMut<'_, f64>) {
        restore(points, self.scale, &self.fixed_mean);
    }

    /// Map normalized points back into the moving set's original frame.
    ///
    /// `points := points * scale + moving_mean`, the exact inverse of the moving set's
    /// normalization.
    pub fn restore_moving(&self, points: MatMut<'_, f64>) {
        restore(points, self.scale, &self.moving_mean);
    }
}

fn center(points: MatRef<'_, f64>, mean: &[f64]) -> PointMatrix {
    Mat::from_fn(points.nrows(), points.ncols(), |i, j| {
        points.read(i, j) - mean[j]
    })
}

fn rms_radius(points: MatRef<'_, f64>) -> f64 {
    let mut sum = 0.0;
    for j in 0..points.ncols() {
        for i in 0..points.nrows() {
            let v = points.read(i, j);
            sum += v * v;
        }
    }
    (sum / points.nrows() as f64).sqrt()
}

fn scale_inplace(mut points: MatMut<'_, f64>, factor: f64) {
    for j in 0..points.ncols() {
        for i in 0..points.nrows() {
            let v = points.read(i, j);
            points.write(i, j, v * factor);
        }
    }
}

fn restore(mut points: MatMut<'_, f64>, scale: f64, mean: &[f64]) {
    assert_eq!(points.ncols(), mean.len());
    for j in 0..points.ncols() {
        for i in 0..points.nrows() {
            let v = points.read(i, j);
            points.write(i, j, v * scale + mean[j]);
        }
    }
}
