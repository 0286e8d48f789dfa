//! Line landmark observation model
//!
//! Landmarks are infinite lines in Hessian normal form `(rho, alpha)`:
//! the set of world points `p` with `p . (cos alpha, sin alpha) = rho`,
//! `rho >= 0`. A scan sees a line as `(r, phi)`: the perpendicular distance
//! from the sensor and the bearing of the foot of that perpendicular in the
//! robot frame.

use nalgebra::{DMatrix, Matrix2, Matrix2x3, Vector2, Vector3};
use std::f64::consts::PI;

use crate::common::{normalize_angle, ObservationModel, Point2D, SlamError, SlamResult};
use crate::slam::state::{SlamState, LM_SIZE, STATE_SIZE};

/// Line extracted from one scan, expressed in the robot frame as
/// `y = slope * x + intercept`, with the scan points that support it.
#[derive(Debug, Clone, PartialEq)]
pub struct LineFeature {
    slope: f64,
    intercept: f64,
    points: Vec<Point2D>,
    count: usize,
}

impl LineFeature {
    /// Build a feature; `count` must equal the number of points.
    pub fn new(slope: f64, intercept: f64, points: Vec<Point2D>, count: usize) -> SlamResult<Self> {
        if !slope.is_finite() || !intercept.is_finite() {
            return Err(SlamError::InvalidFeature(format!(
                "non-finite line parameters (slope {}, intercept {})",
                slope, intercept
            )));
        }
        if count != points.len() {
            return Err(SlamError::InvalidFeature(format!(
                "associated count {} does not match {} points",
                count,
                points.len()
            )));
        }
        Ok(Self {
            slope,
            intercept,
            points,
            count,
        })
    }

    /// Build a feature whose count is taken from the points
    pub fn from_points(slope: f64, intercept: f64, points: Vec<Point2D>) -> SlamResult<Self> {
        let count = points.len();
        Self::new(slope, intercept, points, count)
    }

    /// Build a feature from the polar form `(r, phi)` of a line.
    ///
    /// Fails when the line crosses the robot's heading at a right angle
    /// (normal along x), which has no slope/intercept form.
    pub fn from_polar(r: f64, phi: f64, points: Vec<Point2D>) -> SlamResult<Self> {
        let (s, c) = phi.sin_cos();
        if s.abs() < 1e-6 {
            return Err(SlamError::InvalidFeature(format!(
                "line with normal bearing {:.6} has no slope-intercept form",
                phi
            )));
        }
        // x cos(phi) + y sin(phi) = r
        Self::from_points(-c / s, r / s, points)
    }

    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Polar form `(r, phi)` of the line as seen from the sensor
    pub fn observation(&self) -> Vector2<f64> {
        let norm = (1.0 + self.slope * self.slope).sqrt();
        let r = self.intercept.abs() / norm;
        // The normal (-m, 1) points towards the line when the intercept is positive
        let phi = if self.intercept >= 0.0 {
            (1.0_f64).atan2(-self.slope)
        } else {
            (-1.0_f64).atan2(self.slope)
        };
        Vector2::new(r, phi)
    }
}

/// Range/bearing observation of line landmarks
#[derive(Debug, Clone, Copy, Default)]
pub struct LineObservationModel;

impl ObservationModel for LineObservationModel {
    fn predict(
        &self,
        pose: &Vector3<f64>,
        landmark: &Vector2<f64>,
    ) -> (Vector2<f64>, Matrix2x3<f64>, Matrix2<f64>) {
        let (x, y, yaw) = (pose[0], pose[1], pose[2]);
        let (rho, alpha) = (landmark[0], landmark[1]);
        let (s, c) = alpha.sin_cos();

        let r = rho - (x * c + y * s);
        let dr_dalpha = x * s - y * c;

        // Robot on the far side of the line: the normal seen from the sensor flips
        let (sign, phi) = if r >= 0.0 {
            (1.0, alpha - yaw)
        } else {
            (-1.0, alpha + PI - yaw)
        };

        let z = Vector2::new(sign * r, normalize_angle(phi));
        let h_robot = Matrix2x3::new(
            -sign * c, -sign * s, 0.0,
            0.0, 0.0, -1.0,
        );
        let h_lm = Matrix2::new(
            sign, sign * dr_dalpha,
            0.0, 1.0,
        );
        (z, h_robot, h_lm)
    }

    fn inverse(
        &self,
        pose: &Vector3<f64>,
        z: &Vector2<f64>,
    ) -> (Vector2<f64>, Matrix2x3<f64>, Matrix2<f64>) {
        let (x, y, yaw) = (pose[0], pose[1], pose[2]);
        let alpha = yaw + z[1];
        let (s, c) = alpha.sin_cos();

        let rho = z[0] + x * c + y * s;
        let drho_dalpha = -x * s + y * c;

        let (sign, alpha) = if rho >= 0.0 {
            (1.0, alpha)
        } else {
            (-1.0, alpha + PI)
        };

        let landmark = Vector2::new(sign * rho, normalize_angle(alpha));
        let g_robot = Matrix2x3::new(
            sign * c, sign * s, sign * drho_dalpha,
            0.0, 0.0, 1.0,
        );
        let g_z = Matrix2::new(
            sign, sign * drho_dalpha,
            0.0, 1.0,
        );
        (landmark, g_robot, g_z)
    }
}

/// Innovation of one observation against one landmark.
///
/// Produced by [`compute_innovation`], which is the only place the
/// observation Jacobian is evaluated; association and correction both
/// consume it.
#[derive(Debug, Clone)]
pub struct Innovation {
    /// Actual minus predicted observation, bearing normalized
    pub y: Vector2<f64>,
    /// Innovation covariance `H P H^T + R`
    pub s: Matrix2<f64>,
    /// Inverse of `s`, `None` when singular
    pub s_inv: Option<Matrix2<f64>>,
    /// Full-state observation Jacobian (2 x n)
    pub h: DMatrix<f64>,
}

impl Innovation {
    /// Squared Mahalanobis distance, `None` when `S` is singular
    pub fn mahalanobis_sq(&self) -> Option<f64> {
        self.s_inv.map(|s_inv| (self.y.transpose() * s_inv * self.y)[(0, 0)])
    }
}

/// Innovation of observation `z` against landmark `lm_idx`
pub fn compute_innovation<M: ObservationModel>(
    model: &M,
    state: &SlamState,
    lm_idx: usize,
    z: &Vector2<f64>,
    r: &Matrix2<f64>,
) -> SlamResult<Innovation> {
    let landmark = state.landmark(lm_idx).ok_or(SlamError::ShapeMismatch {
        what: "landmark index",
        expected: state.n_landmarks(),
        actual: lm_idx,
    })?;
    let lm_state_idx = STATE_SIZE + lm_idx * LM_SIZE;
    let (z_pred, h_robot, h_lm) = model.predict(&state.pose(), &landmark);

    let y = Vector2::new(z[0] - z_pred[0], normalize_angle(z[1] - z_pred[1]));

    let n = state.dim();
    let mut h = DMatrix::zeros(LM_SIZE, n);
    h.fixed_view_mut::<2, STATE_SIZE>(0, 0).copy_from(&h_robot);
    h.fixed_view_mut::<2, LM_SIZE>(0, lm_state_idx).copy_from(&h_lm);

    let s_dyn = &h * state.p() * h.transpose();
    let s = Matrix2::new(s_dyn[(0, 0)], s_dyn[(0, 1)], s_dyn[(1, 0)], s_dyn[(1, 1)]) + r;
    let s = (s + s.transpose()) * 0.5;
    let s_inv = if s.determinant().abs() > f64::EPSILON * s.norm_squared() {
        s.try_inverse()
    } else {
        None
    };

    Ok(Innovation { y, s, s_inv, h })
}
