//! Gated nearest-neighbour data association
//!
//! Each extracted line is compared against every landmark in the map using
//! the squared Mahalanobis distance of its innovation. Two gates split the
//! distance axis into three regions:
//!
//! - `d2 <= inner_gate`: the nearest landmark is taken as a match
//! - `d2 > outer_gate`: the line is a new landmark
//! - in between: ambiguous, the line is dropped for this scan
//!
//! A wrong match cannot be undone later since landmarks are never removed,
//! so the ambiguous band errs on the side of throwing data away.

use log::{trace, warn};
use nalgebra::{Matrix2, Vector2};

use crate::common::SlamResult;
use crate::slam::config::SlamConfig;
use crate::slam::observation::{compute_innovation, LineFeature, LineObservationModel};
use crate::slam::state::SlamState;

/// Outcome for one extracted feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Matches the landmark with this index
    Match(usize),
    /// Candidate for state augmentation
    New,
    /// Ambiguous, discarded for this cycle
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Association {
    pub feature_index: usize,
    pub decision: Decision,
    /// Smallest squared Mahalanobis distance found, if any landmark was usable
    pub d2_min: Option<f64>,
}

/// Closest landmark to one observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestLandmark {
    pub index: usize,
    pub d2: f64,
}

#[derive(Debug, Clone)]
pub struct Associator {
    model: LineObservationModel,
    inner_gate: f64,
    outer_gate: f64,
}

impl Associator {
    pub fn new(inner_gate: f64, outer_gate: f64) -> Self {
        Self {
            model: LineObservationModel,
            inner_gate,
            outer_gate,
        }
    }

    pub fn from_config(config: &SlamConfig) -> Self {
        Self::new(config.inner_gate, config.outer_gate)
    }

    /// Classify a minimum distance against the gates
    pub fn classify(&self, nearest: Option<NearestLandmark>) -> Decision {
        match nearest {
            Some(n) if n.d2 <= self.inner_gate => Decision::Match(n.index),
            Some(n) if n.d2 > self.outer_gate => Decision::New,
            Some(_) => Decision::Reject,
            None => Decision::New,
        }
    }

    /// Nearest landmark to observation `z`.
    ///
    /// Landmarks whose innovation covariance is singular are skipped. Ties go
    /// to the lowest landmark index. The second value counts the skipped
    /// landmarks.
    pub fn nearest_landmark(
        &self,
        state: &SlamState,
        z: &Vector2<f64>,
        r: &Matrix2<f64>,
    ) -> SlamResult<(Option<NearestLandmark>, usize)> {
        let mut nearest: Option<NearestLandmark> = None;
        let mut singular = 0;

        for i in 0..state.n_landmarks() {
            let innovation = compute_innovation(&self.model, state, i, z, r)?;
            match innovation.mahalanobis_sq().filter(|d2| d2.is_finite()) {
                Some(d2) => {
                    trace!("landmark {}: d2 = {:.4}", i, d2);
                    if nearest.map_or(true, |n| d2 < n.d2) {
                        nearest = Some(NearestLandmark { index: i, d2 });
                    }
                }
                None => {
                    warn!("singular innovation covariance for landmark {}, skipping", i);
                    singular += 1;
                }
            }
        }
        Ok((nearest, singular))
    }

    /// Classify every feature of one scan; output follows input order.
    pub fn associate(
        &self,
        features: &[LineFeature],
        state: &SlamState,
        r: &Matrix2<f64>,
    ) -> SlamResult<Vec<Association>> {
        state.check_consistency()?;

        features
            .iter()
            .enumerate()
            .map(|(feature_index, feature)| {
                let z = feature.observation();
                let (nearest, singular) = self.nearest_landmark(state, &z, r)?;

                let decision = if nearest.is_none() && singular > 0 {
                    // Every landmark was unusable: neither matched nor provably new
                    Decision::Reject
                } else {
                    self.classify(nearest)
                };
                trace!("feature {} -> {:?}", feature_index, decision);

                Ok(Association {
                    feature_index,
                    decision,
                    d2_min: nearest.map(|n| n.d2),
                })
            })
            .collect()
    }
}
