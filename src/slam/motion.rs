//! Motion prediction
//!
//! Control vector: `[v_x, v_y, omega]`, body-frame forward and lateral
//! velocity plus yaw rate. With `v_y = 0` this is the usual `(v, omega)`
//! unicycle model.

use nalgebra::{Matrix3, Vector3};

use crate::common::{normalize_angle, MotionModel, SlamError, SlamResult};
use crate::slam::config::SlamConfig;
use crate::slam::state::{SlamState, STATE_SIZE};

/// Velocity motion model
#[derive(Debug, Clone, Copy, Default)]
pub struct VelocityMotionModel;

impl MotionModel for VelocityMotionModel {
    /// x_t = f(x_{t-1}, u_t)
    fn propagate(&self, pose: &Vector3<f64>, u: &Vector3<f64>, dt: f64) -> Vector3<f64> {
        let (s, c) = pose[2].sin_cos();
        Vector3::new(
            pose[0] + dt * (u[0] * c - u[1] * s),
            pose[1] + dt * (u[0] * s + u[1] * c),
            normalize_angle(pose[2] + u[2] * dt),
        )
    }

    fn jacobian_state(&self, pose: &Vector3<f64>, u: &Vector3<f64>, dt: f64) -> Matrix3<f64> {
        let (s, c) = pose[2].sin_cos();
        Matrix3::new(
            1.0, 0.0, -dt * (u[0] * s + u[1] * c),
            0.0, 1.0, dt * (u[0] * c - u[1] * s),
            0.0, 0.0, 1.0,
        )
    }

    fn jacobian_control(&self, pose: &Vector3<f64>, _u: &Vector3<f64>, dt: f64) -> Matrix3<f64> {
        let (s, c) = pose[2].sin_cos();
        Matrix3::new(
            dt * c, -dt * s, 0.0,
            dt * s, dt * c, 0.0,
            0.0, 0.0, dt,
        )
    }
}

/// EKF prediction step over the joint state
#[derive(Debug, Clone)]
pub struct MotionPredictor<M = VelocityMotionModel> {
    model: M,
    /// Process noise in control space
    q: Matrix3<f64>,
}

impl MotionPredictor<VelocityMotionModel> {
    pub fn from_config(config: &SlamConfig) -> Self {
        Self::new(VelocityMotionModel, config.q_control())
    }
}

impl<M: MotionModel> MotionPredictor<M> {
    pub fn new(model: M, q: Matrix3<f64>) -> Self {
        Self { model, q }
    }

    /// Advance the pose and propagate the covariance.
    ///
    /// P_rr = F P_rr F^T + V Q V^T, P_rm = F P_rm, P_mm unchanged.
    pub fn predict(&self, state: &mut SlamState, u: &Vector3<f64>, dt: f64) -> SlamResult<()> {
        state.check_consistency()?;
        if !u.iter().all(|c| c.is_finite()) {
            return Err(SlamError::InvalidParameter(format!(
                "non-finite control [{}, {}, {}]",
                u[0], u[1], u[2]
            )));
        }
        if !dt.is_finite() || dt < 0.0 {
            return Err(SlamError::InvalidParameter(format!(
                "time step must be finite and non-negative, got {}",
                dt
            )));
        }

        let pose = state.pose();
        // Jacobians at the prior pose
        let f = self.model.jacobian_state(&pose, u, dt);
        let v = self.model.jacobian_control(&pose, u, dt);
        let q_pose = v * self.q * v.transpose();

        state.set_pose(&self.model.propagate(&pose, u, dt));

        let p = state.covariance_mut();
        let n = p.ncols();

        let p_rr = p.fixed_view::<STATE_SIZE, STATE_SIZE>(0, 0).into_owned();
        p.fixed_view_mut::<STATE_SIZE, STATE_SIZE>(0, 0)
            .copy_from(&(f * p_rr * f.transpose() + q_pose));

        let n_map = n - STATE_SIZE;
        if n_map > 0 {
            let p_rm = f * p.view((0, STATE_SIZE), (STATE_SIZE, n_map));
            p.view_mut((0, STATE_SIZE), (STATE_SIZE, n_map)).copy_from(&p_rm);
            p.view_mut((STATE_SIZE, 0), (n_map, STATE_SIZE))
                .copy_from(&p_rm.transpose());
        }

        state.symmetrize();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, Matrix2, Vector2};

    #[test]
    fn test_motion_model_forward() {
        let model = VelocityMotionModel;
        let next = model.propagate(&Vector3::zeros(), &Vector3::new(1.0, 0.0, 0.0), 0.1);
        assert_relative_eq!(next, Vector3::new(0.1, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_motion_model_lateral() {
        let model = VelocityMotionModel;
        let pose = Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let next = model.propagate(&pose, &Vector3::new(0.0, 1.0, 0.0), 1.0);
        // Moving left while facing +y goes towards -x
        assert_relative_eq!(next[0], -1.0, epsilon = 1e-12);
        assert_relative_eq!(next[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_jacobians_match_numeric() {
        let model = VelocityMotionModel;
        let pose = Vector3::new(1.0, -0.5, 0.7);
        let u = Vector3::new(0.8, 0.1, 0.3);
        let dt = 0.1;
        let eps = 1e-6;

        let f = model.jacobian_state(&pose, &u, dt);
        let v = model.jacobian_control(&pose, &u, dt);
        for j in 0..3 {
            let mut dp = Vector3::zeros();
            dp[j] = eps;
            let col = (model.propagate(&(pose + dp), &u, dt) - model.propagate(&(pose - dp), &u, dt))
                / (2.0 * eps);
            let col_u = (model.propagate(&pose, &(u + dp), dt) - model.propagate(&pose, &(u - dp), dt))
                / (2.0 * eps);
            for i in 0..3 {
                assert_relative_eq!(f[(i, j)], col[i], epsilon = 1e-6);
                assert_relative_eq!(v[(i, j)], col_u[i], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_predict_pose_only() {
        let config = SlamConfig::noiseless();
        let predictor = MotionPredictor::from_config(&config);
        let mut state = SlamState::new();

        predictor
            .predict(&mut state, &Vector3::new(1.0, 0.0, 0.0), config.dt)
            .unwrap();

        assert_relative_eq!(state.pose(), Vector3::new(0.1, 0.0, 0.0), epsilon = 1e-12);
        // P starts at zero, so P' = V Q V^T = dt^2 diag(sigma_v^2, sigma_v^2, sigma_g^2)
        let dt2 = config.dt * config.dt;
        let expected = Matrix3::from_diagonal(&Vector3::new(
            dt2 * config.sigma_v.powi(2),
            dt2 * config.sigma_v.powi(2),
            dt2 * config.sigma_g.powi(2),
        ));
        assert_relative_eq!(state.pose_covariance(), expected, epsilon = 1e-15);
    }

    #[test]
    fn test_predict_leaves_map_block_untouched() {
        let config = SlamConfig::noiseless();
        let predictor = MotionPredictor::from_config(&config);
        let mut state = SlamState::with_pose(&Vector3::zeros(), &(Matrix3::identity() * 0.01));
        let mut cross = DMatrix::zeros(2, 3);
        cross[(0, 0)] = 0.005;
        cross[(1, 2)] = 0.002;
        state
            .augment(&Vector2::new(3.0, 0.0), &(Matrix2::identity() * 0.2), &cross)
            .unwrap();
        let p_mm_before = state.landmark_covariance(0).unwrap();

        predictor
            .predict(&mut state, &Vector3::new(1.0, 0.0, 0.5), config.dt)
            .unwrap();

        assert_eq!(state.landmark_covariance(0).unwrap(), p_mm_before);
        assert!(state.is_symmetric(1e-12));
        assert_eq!(state.dim(), 5);
    }

    #[test]
    fn test_predict_cross_covariance_follows_f() {
        let config = SlamConfig::noiseless();
        let predictor = MotionPredictor::from_config(&config);
        let mut state = SlamState::with_pose(&Vector3::new(0.0, 0.0, 0.3), &(Matrix3::identity() * 0.01));
        let cross = DMatrix::from_row_slice(2, 3, &[0.001, 0.002, 0.003, 0.0, 0.001, 0.004]);
        state
            .augment(&Vector2::new(3.0, 0.0), &(Matrix2::identity() * 0.2), &cross)
            .unwrap();

        let u = Vector3::new(1.0, 0.0, 0.0);
        let f = VelocityMotionModel.jacobian_state(&state.pose(), &u, config.dt);
        let expected = f * cross.transpose();

        predictor.predict(&mut state, &u, config.dt).unwrap();

        for i in 0..3 {
            for j in 0..2 {
                assert_relative_eq!(state.p()[(i, 3 + j)], expected[(i, j)], epsilon = 1e-15);
            }
        }
    }

    #[test]
    fn test_predict_rejects_non_finite_input() {
        let config = SlamConfig::noiseless();
        let predictor = MotionPredictor::from_config(&config);
        let mut state = SlamState::with_pose(&Vector3::new(1.0, 2.0, 0.3), &(Matrix3::identity() * 0.01));
        let before = state.clone();

        for u in [
            Vector3::new(f64::NAN, 0.0, 0.0),
            Vector3::new(1.0, 0.0, f64::INFINITY),
            Vector3::new(1.0, f64::NEG_INFINITY, 0.0),
        ]
        .iter()
        {
            let result = predictor.predict(&mut state, u, config.dt);
            assert!(matches!(result, Err(SlamError::InvalidParameter(_))));
        }
        let result = predictor.predict(&mut state, &Vector3::new(1.0, 0.0, 0.0), f64::INFINITY);
        assert!(matches!(result, Err(SlamError::InvalidParameter(_))));
        assert_eq!(state, before);
    }

    #[test]
    fn test_predict_huge_yaw_rate_stays_normalized() {
        let config = SlamConfig::noiseless();
        let predictor = MotionPredictor::from_config(&config);
        let mut state = SlamState::new();
        predictor
            .predict(&mut state, &Vector3::new(0.0, 0.0, 1e13), config.dt)
            .unwrap();
        let yaw = state.pose()[2];
        assert!(yaw > -std::f64::consts::PI && yaw <= std::f64::consts::PI);
    }
}
