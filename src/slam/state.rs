//! Estimator state: growing mean vector and covariance matrix
//!
//! State vector: `[x, y, yaw, lm1_rho, lm1_alpha, lm2_rho, lm2_alpha, ...]`.
//! The covariance grows in lock-step with the mean, one landmark block at a
//! time, and is never shrunk.

use nalgebra::{DMatrix, DVector, Matrix2, Matrix3, Vector2, Vector3};

use crate::common::{normalize_angle, Pose2D, SlamError, SlamResult};

/// Robot pose block size `[x, y, yaw]`
pub const STATE_SIZE: usize = 3;
/// Landmark block size `[rho, alpha]`
pub const LM_SIZE: usize = 2;

/// Mean and covariance of the joint robot/map estimate
#[derive(Debug, Clone, PartialEq)]
pub struct SlamState {
    x: DVector<f64>,
    p: DMatrix<f64>,
    n_lm: usize,
}

/// Owned copy of the estimate handed to readers outside the estimator
#[derive(Debug, Clone, PartialEq)]
pub struct SlamSnapshot {
    pub x: DVector<f64>,
    pub p: DMatrix<f64>,
    pub n_landmarks: usize,
}

impl SlamSnapshot {
    pub fn pose(&self) -> Pose2D {
        Pose2D::new(self.x[0], self.x[1], self.x[2])
    }

    /// Landmarks as `(rho, alpha)` pairs
    pub fn landmarks(&self) -> Vec<Vector2<f64>> {
        (0..self.n_landmarks)
            .map(|i| {
                let base = STATE_SIZE + i * LM_SIZE;
                Vector2::new(self.x[base], self.x[base + 1])
            })
            .collect()
    }
}

impl SlamState {
    /// Pose-only state at the origin with zero covariance
    pub fn new() -> Self {
        SlamState {
            x: DVector::zeros(STATE_SIZE),
            p: DMatrix::zeros(STATE_SIZE, STATE_SIZE),
            n_lm: 0,
        }
    }

    /// Pose-only state with a given pose and pose covariance
    pub fn with_pose(pose: &Vector3<f64>, covariance: &Matrix3<f64>) -> Self {
        let mut state = Self::new();
        state.x.fixed_rows_mut::<STATE_SIZE>(0).copy_from(pose);
        state.x[2] = normalize_angle(state.x[2]);
        state
            .p
            .fixed_view_mut::<STATE_SIZE, STATE_SIZE>(0, 0)
            .copy_from(covariance);
        state
    }

    /// Mean vector
    pub fn x(&self) -> &DVector<f64> {
        &self.x
    }

    /// Covariance matrix
    pub fn p(&self) -> &DMatrix<f64> {
        &self.p
    }

    /// Length of the state vector
    pub fn dim(&self) -> usize {
        self.x.len()
    }

    pub fn n_landmarks(&self) -> usize {
        self.n_lm
    }

    /// Get robot pose [x, y, yaw]
    pub fn pose(&self) -> Vector3<f64> {
        Vector3::new(self.x[0], self.x[1], self.x[2])
    }

    /// Get the 3x3 robot pose covariance
    pub fn pose_covariance(&self) -> Matrix3<f64> {
        self.p.fixed_view::<STATE_SIZE, STATE_SIZE>(0, 0).into_owned()
    }

    /// Offset of landmark `idx` inside the state vector
    pub fn landmark_offset(&self, idx: usize) -> Option<usize> {
        if idx < self.n_lm {
            Some(STATE_SIZE + idx * LM_SIZE)
        } else {
            None
        }
    }

    /// Get landmark `(rho, alpha)` by index
    pub fn landmark(&self, idx: usize) -> Option<Vector2<f64>> {
        self.landmark_offset(idx)
            .map(|base| Vector2::new(self.x[base], self.x[base + 1]))
    }

    /// Get the 2x2 covariance block of a landmark
    pub fn landmark_covariance(&self, idx: usize) -> Option<Matrix2<f64>> {
        self.landmark_offset(idx)
            .map(|base| self.p.fixed_view::<LM_SIZE, LM_SIZE>(base, base).into_owned())
    }

    /// Owned copy for visualization and logging
    pub fn snapshot(&self) -> SlamSnapshot {
        SlamSnapshot {
            x: self.x.clone(),
            p: self.p.clone(),
            n_landmarks: self.n_lm,
        }
    }

    /// Verify `P.rows == P.cols == X.len == 3 + 2 * n_landmarks`
    pub fn check_consistency(&self) -> SlamResult<()> {
        let n = self.x.len();
        let expected = STATE_SIZE + self.n_lm * LM_SIZE;
        if n != expected {
            return Err(SlamError::ShapeMismatch {
                what: "state vector",
                expected,
                actual: n,
            });
        }
        if self.p.nrows() != n {
            return Err(SlamError::ShapeMismatch {
                what: "covariance rows",
                expected: n,
                actual: self.p.nrows(),
            });
        }
        if self.p.ncols() != n {
            return Err(SlamError::ShapeMismatch {
                what: "covariance columns",
                expected: n,
                actual: self.p.ncols(),
            });
        }
        Ok(())
    }

    /// Largest absolute difference between `P` and its transpose
    pub fn max_asymmetry(&self) -> f64 {
        (&self.p - self.p.transpose()).amax()
    }

    pub fn is_symmetric(&self, tol: f64) -> bool {
        self.max_asymmetry() < tol
    }

    pub(crate) fn set_pose(&mut self, pose: &Vector3<f64>) {
        self.x[0] = pose[0];
        self.x[1] = pose[1];
        self.x[2] = normalize_angle(pose[2]);
    }

    pub(crate) fn covariance_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.p
    }

    /// Apply an EKF correction: `X += K y`, `P = (I - K H) P`
    pub(crate) fn apply_correction(
        &mut self,
        k: &DMatrix<f64>,
        h: &DMatrix<f64>,
        y: &Vector2<f64>,
    ) -> SlamResult<()> {
        let n = self.dim();
        if k.nrows() != n || k.ncols() != LM_SIZE {
            return Err(SlamError::ShapeMismatch {
                what: "kalman gain rows",
                expected: n,
                actual: k.nrows(),
            });
        }
        if h.ncols() != n || h.nrows() != LM_SIZE {
            return Err(SlamError::ShapeMismatch {
                what: "observation jacobian columns",
                expected: n,
                actual: h.ncols(),
            });
        }

        let y_dvec = DVector::from_vec(vec![y[0], y[1]]);
        self.x += k * y_dvec;

        let i_kh = DMatrix::identity(n, n) - k * h;
        self.p = &i_kh * &self.p;
        self.symmetrize();
        self.normalize_angles();
        Ok(())
    }

    /// Append a landmark block.
    ///
    /// `cross` is the `2 x dim()` covariance between the new landmark and the
    /// existing state; `p_lm` is the landmark's own 2x2 covariance.
    pub(crate) fn augment(
        &mut self,
        landmark: &Vector2<f64>,
        p_lm: &Matrix2<f64>,
        cross: &DMatrix<f64>,
    ) -> SlamResult<usize> {
        self.check_consistency()?;
        let old_n = self.dim();
        if cross.nrows() != LM_SIZE {
            return Err(SlamError::ShapeMismatch {
                what: "landmark cross-covariance rows",
                expected: LM_SIZE,
                actual: cross.nrows(),
            });
        }
        if cross.ncols() != old_n {
            return Err(SlamError::ShapeMismatch {
                what: "landmark cross-covariance columns",
                expected: old_n,
                actual: cross.ncols(),
            });
        }
        let new_n = old_n + LM_SIZE;

        let mut new_x = DVector::zeros(new_n);
        new_x.rows_mut(0, old_n).copy_from(&self.x);
        new_x[old_n] = landmark[0];
        new_x[old_n + 1] = normalize_angle(landmark[1]);

        let mut new_p = DMatrix::zeros(new_n, new_n);
        new_p.view_mut((0, 0), (old_n, old_n)).copy_from(&self.p);
        new_p.view_mut((old_n, 0), (LM_SIZE, old_n)).copy_from(cross);
        new_p
            .view_mut((0, old_n), (old_n, LM_SIZE))
            .copy_from(&cross.transpose());
        let p_lm_sym = (p_lm + p_lm.transpose()) * 0.5;
        new_p
            .fixed_view_mut::<LM_SIZE, LM_SIZE>(old_n, old_n)
            .copy_from(&p_lm_sym);

        self.x = new_x;
        self.p = new_p;
        self.n_lm += 1;
        Ok(self.n_lm - 1)
    }

    pub(crate) fn symmetrize(&mut self) {
        self.p = (&self.p + self.p.transpose()) * 0.5;
    }

    fn normalize_angles(&mut self) {
        self.x[2] = normalize_angle(self.x[2]);
        for i in 0..self.n_lm {
            let idx = STATE_SIZE + i * LM_SIZE + 1;
            self.x[idx] = normalize_angle(self.x[idx]);
        }
    }
}

impl Default for SlamState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_creation() {
        let state = SlamState::new();
        assert_eq!(state.dim(), STATE_SIZE);
        assert_eq!(state.n_landmarks(), 0);
        assert_eq!(state.p().nrows(), STATE_SIZE);
        assert_eq!(state.p().amax(), 0.0);
        assert!(state.check_consistency().is_ok());
    }

    #[test]
    fn test_with_pose() {
        let cov = Matrix3::from_diagonal(&Vector3::new(0.1, 0.2, 0.3));
        let state = SlamState::with_pose(&Vector3::new(1.0, 2.0, 0.5), &cov);
        assert_eq!(state.pose(), Vector3::new(1.0, 2.0, 0.5));
        assert_eq!(state.pose_covariance(), cov);
    }

    #[test]
    fn test_augment_grows_in_lockstep() {
        let mut state = SlamState::new();
        let cross = DMatrix::zeros(LM_SIZE, STATE_SIZE);
        let idx = state
            .augment(&Vector2::new(2.0, 0.5), &Matrix2::identity(), &cross)
            .unwrap();

        assert_eq!(idx, 0);
        assert_eq!(state.n_landmarks(), 1);
        assert_eq!(state.dim(), STATE_SIZE + LM_SIZE);
        assert_eq!(state.p().shape(), (5, 5));
        assert_eq!(state.landmark(0), Some(Vector2::new(2.0, 0.5)));
        assert_eq!(state.landmark_offset(0), Some(3));
        assert_eq!(state.landmark_covariance(0), Some(Matrix2::identity()));
        assert!(state.landmark(1).is_none());
        assert!(state.check_consistency().is_ok());
    }

    #[test]
    fn test_augment_writes_symmetric_cross_terms() {
        let mut state = SlamState::new();
        let cross = DMatrix::from_row_slice(2, 3, &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        state
            .augment(&Vector2::new(1.0, 0.0), &Matrix2::identity(), &cross)
            .unwrap();

        assert_eq!(state.p()[(3, 1)], 0.2);
        assert_eq!(state.p()[(1, 3)], 0.2);
        assert_eq!(state.p()[(4, 2)], 0.6);
        assert_eq!(state.p()[(2, 4)], 0.6);
        assert!(state.is_symmetric(1e-12));
    }

    #[test]
    fn test_augment_rejects_bad_cross_shape() {
        let mut state = SlamState::new();
        let cross = DMatrix::zeros(LM_SIZE, 5);
        let result = state.augment(&Vector2::new(1.0, 0.0), &Matrix2::identity(), &cross);
        assert!(matches!(result, Err(SlamError::ShapeMismatch { .. })));
        assert_eq!(state.dim(), STATE_SIZE);
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let mut state = SlamState::new();
        let snapshot = state.snapshot();
        state.set_pose(&Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(snapshot.pose().x, 0.0);
        assert_eq!(state.pose()[0], 1.0);
    }

    #[test]
    fn test_apply_correction_rejects_bad_gain() {
        let mut state = SlamState::new();
        let k = DMatrix::zeros(4, 2);
        let h = DMatrix::zeros(2, 3);
        let result = state.apply_correction(&k, &h, &Vector2::zeros());
        assert!(matches!(result, Err(SlamError::ShapeMismatch { .. })));
    }
}
