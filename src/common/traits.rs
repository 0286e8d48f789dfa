//! Common traits defining the seams of the estimator

use nalgebra::{DMatrix, Matrix2, Matrix2x3, Matrix3, Vector2, Vector3};

use crate::common::error::SlamResult;

/// Trait for state estimation algorithms
pub trait StateEstimator {
    /// State type used by this estimator
    type State;
    /// Measurement type used by this estimator
    type Measurement;
    /// Control input type
    type Control;
    /// Summary returned by the update step
    type Report;

    /// Prediction step
    fn predict(&mut self, control: &Self::Control, dt: f64) -> SlamResult<()>;

    /// Update step with measurement
    fn update(&mut self, measurement: &Self::Measurement) -> SlamResult<Self::Report>;

    /// Get current state estimate
    fn get_state(&self) -> &Self::State;

    /// Get current covariance estimate (if applicable)
    fn get_covariance(&self) -> Option<&DMatrix<f64>> {
        None
    }
}

/// Robot motion model acting on the pose block `[x, y, yaw]`
pub trait MotionModel {
    /// Propagate the pose forward in time
    fn propagate(&self, pose: &Vector3<f64>, control: &Vector3<f64>, dt: f64) -> Vector3<f64>;

    /// Jacobian with respect to the pose (F)
    fn jacobian_state(&self, pose: &Vector3<f64>, control: &Vector3<f64>, dt: f64)
        -> Matrix3<f64>;

    /// Jacobian with respect to the control (V)
    fn jacobian_control(&self, pose: &Vector3<f64>, control: &Vector3<f64>, dt: f64)
        -> Matrix3<f64>;
}

/// Observation model for two-parameter landmarks seen from a robot pose
pub trait ObservationModel {
    /// Predict the measurement of `landmark` from `pose`.
    ///
    /// Returns the predicted measurement together with the Jacobians with
    /// respect to the pose and to the landmark parameters.
    fn predict(
        &self,
        pose: &Vector3<f64>,
        landmark: &Vector2<f64>,
    ) -> (Vector2<f64>, Matrix2x3<f64>, Matrix2<f64>);

    /// Invert the model: landmark parameters implied by measurement `z` at `pose`.
    ///
    /// Returns the landmark together with the Jacobians with respect to the
    /// pose and to the measurement.
    fn inverse(
        &self,
        pose: &Vector3<f64>,
        z: &Vector2<f64>,
    ) -> (Vector2<f64>, Matrix2x3<f64>, Matrix2<f64>);
}

/// Trait for visualizable values
pub trait Visualizable {
    /// Draw current state to visualizer
    fn visualize(&self, vis: &mut crate::utils::Visualizer);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stationary;

    impl MotionModel for Stationary {
        fn propagate(&self, pose: &Vector3<f64>, _control: &Vector3<f64>, _dt: f64) -> Vector3<f64> {
            *pose
        }

        fn jacobian_state(&self, _: &Vector3<f64>, _: &Vector3<f64>, _: f64) -> Matrix3<f64> {
            Matrix3::identity()
        }

        fn jacobian_control(&self, _: &Vector3<f64>, _: &Vector3<f64>, _: f64) -> Matrix3<f64> {
            Matrix3::zeros()
        }
    }

    #[test]
    fn test_motion_model_trait() {
        let model = Stationary;
        let pose = Vector3::new(1.0, 2.0, 0.5);
        let next = model.propagate(&pose, &Vector3::new(1.0, 0.0, 0.0), 0.1);
        assert_eq!(next, pose);
    }
}
