//! line_ekf_slam - EKF SLAM with line landmarks
//!
//! A robot with a rotating range-bearing scanner estimates its pose and a
//! growing map of walls. Each scan cycle predicts with the control input,
//! gates the extracted lines against the map with two Mahalanobis
//! thresholds, corrects with the matches and appends the new lines to the
//! state.

// Core modules
pub mod common;
pub mod utils;

// Estimator
pub mod slam;

// Re-export common types for convenience
pub use common::{normalize_angle, Point2D, Pose2D};
pub use common::{MotionModel, ObservationModel, StateEstimator, Visualizable};
pub use common::{SlamError, SlamResult};
pub use slam::{EkfLineSlam, LineFeature, SlamConfig};
