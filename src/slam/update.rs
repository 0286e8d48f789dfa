//! EKF correction and state augmentation
//!
//! Matches are applied one at a time in feature order so that each update
//! sees the covariance tightened by the previous ones. New landmarks are
//! added afterwards, initialized from the corrected pose.

use log::{info, warn};
use nalgebra::{DMatrix, Matrix2, Vector2};

use crate::common::{ObservationModel, SlamError, SlamResult};
use crate::slam::association::{Association, Decision};
use crate::slam::config::SlamConfig;
use crate::slam::observation::{compute_innovation, LineFeature, LineObservationModel};
use crate::slam::state::{SlamState, STATE_SIZE};

/// What one update pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Matches applied as EKF corrections
    pub matched: usize,
    /// Landmarks appended to the state
    pub added: usize,
    /// Matches skipped because S was singular at update time
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct MeasurementUpdater {
    model: LineObservationModel,
    r: Matrix2<f64>,
}

impl MeasurementUpdater {
    pub fn new(r: Matrix2<f64>) -> Self {
        Self {
            model: LineObservationModel,
            r,
        }
    }

    pub fn from_config(config: &SlamConfig) -> Self {
        Self::new(config.r())
    }

    /// Apply matches, then augment with new landmarks
    pub fn update(
        &self,
        state: &mut SlamState,
        features: &[LineFeature],
        associations: &[Association],
    ) -> SlamResult<UpdateReport> {
        state.check_consistency()?;
        let mut report = UpdateReport::default();

        for association in associations {
            if let Decision::Match(lm_idx) = association.decision {
                let z = feature_observation(features, association)?;
                match self.correct(state, lm_idx, &z) {
                    Ok(()) => report.matched += 1,
                    Err(SlamError::SingularInnovation { landmark }) => {
                        warn!(
                            "singular innovation covariance for feature {} against landmark {}, skipping",
                            association.feature_index, landmark
                        );
                        report.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        for association in associations {
            if association.decision == Decision::New {
                let z = feature_observation(features, association)?;
                let idx = self.add_landmark(state, &z)?;
                info!(
                    "new landmark {} from feature {}: rho={:.3}, alpha={:.3}",
                    idx,
                    association.feature_index,
                    state.x()[state.dim() - 2],
                    state.x()[state.dim() - 1]
                );
                report.added += 1;
            }
        }

        state.check_consistency()?;
        Ok(report)
    }

    /// Single EKF correction against landmark `lm_idx`.
    ///
    /// Leaves the state untouched and returns `SingularInnovation` when S
    /// cannot be inverted.
    pub fn correct(&self, state: &mut SlamState, lm_idx: usize, z: &Vector2<f64>) -> SlamResult<()> {
        let innovation = compute_innovation(&self.model, state, lm_idx, z, &self.r)?;
        let s_inv = innovation
            .s_inv
            .ok_or(SlamError::SingularInnovation { landmark: lm_idx })?;

        // Kalman gain K = P H^T S^-1
        let s_inv_dyn = DMatrix::from_fn(2, 2, |i, j| s_inv[(i, j)]);
        let k = state.p() * innovation.h.transpose() * s_inv_dyn;

        state.apply_correction(&k, &innovation.h, &innovation.y)
    }

    /// Append the landmark implied by `z` at the current pose
    pub fn add_landmark(&self, state: &mut SlamState, z: &Vector2<f64>) -> SlamResult<usize> {
        let (landmark, g_robot, g_z) = self.model.inverse(&state.pose(), z);

        let p_rr = state.pose_covariance();
        let p_lm = g_robot * p_rr * g_robot.transpose() + g_z * self.r * g_z.transpose();

        // Covariance between the new landmark and everything already in the state
        let p_r_all = state.p().rows(0, STATE_SIZE);
        let cross = g_robot * p_r_all;
        let cross = DMatrix::from_fn(2, state.dim(), |i, j| cross[(i, j)]);

        state.augment(&landmark, &p_lm, &cross)
    }
}

fn feature_observation(features: &[LineFeature], association: &Association) -> SlamResult<Vector2<f64>> {
    features
        .get(association.feature_index)
        .map(LineFeature::observation)
        .ok_or(SlamError::ShapeMismatch {
            what: "feature index",
            expected: features.len(),
            actual: association.feature_index,
        })
}
