//! EKF SLAM with line landmarks
//!
//! One cycle per scan: predict with the control, classify the extracted
//! lines against the map, correct with the matches and augment with the new
//! lines. The estimator owns its state; readers get snapshots.

use log::debug;
use nalgebra::{DMatrix, Matrix3, Vector3};
use rand::Rng;

use crate::common::{Pose2D, SlamResult, StateEstimator};
use crate::slam::association::{Association, Associator, Decision};
use crate::slam::config::SlamConfig;
use crate::slam::motion::MotionPredictor;
use crate::slam::noise::NoiseModel;
use crate::slam::observation::LineFeature;
use crate::slam::state::{SlamSnapshot, SlamState};
use crate::slam::update::{MeasurementUpdater, UpdateReport};

/// Outcome of one scan cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// One entry per feature, in feature order
    pub associations: Vec<Association>,
    pub update: UpdateReport,
}

impl CycleReport {
    fn count(&self, pred: impl Fn(&Decision) -> bool) -> usize {
        self.associations.iter().filter(|a| pred(&a.decision)).count()
    }

    pub fn n_matched(&self) -> usize {
        self.count(|d| matches!(d, Decision::Match(_)))
    }

    pub fn n_new(&self) -> usize {
        self.count(|d| *d == Decision::New)
    }

    pub fn n_rejected(&self) -> usize {
        self.count(|d| *d == Decision::Reject)
    }
}

/// Line-landmark EKF SLAM estimator
#[derive(Debug, Clone)]
pub struct EkfLineSlam {
    config: SlamConfig,
    state: SlamState,
    noise: NoiseModel,
    predictor: MotionPredictor,
    associator: Associator,
    updater: MeasurementUpdater,
}

impl EkfLineSlam {
    /// Estimator at the origin with zero pose covariance
    pub fn new(config: SlamConfig) -> SlamResult<Self> {
        Self::with_initial_pose(config, Pose2D::origin(), Matrix3::zeros())
    }

    pub fn with_initial_pose(config: SlamConfig, pose: Pose2D, covariance: Matrix3<f64>) -> SlamResult<Self> {
        config.validate()?;
        Ok(Self {
            state: SlamState::with_pose(&pose.to_vector(), &covariance),
            noise: NoiseModel::from_config(&config),
            predictor: MotionPredictor::from_config(&config),
            associator: Associator::from_config(&config),
            updater: MeasurementUpdater::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &SlamConfig {
        &self.config
    }

    pub fn state(&self) -> &SlamState {
        &self.state
    }

    pub fn noise(&self) -> &NoiseModel {
        &self.noise
    }

    pub fn snapshot(&self) -> SlamSnapshot {
        self.state.snapshot()
    }

    /// Associate the features of one scan and apply the update
    pub fn observe(&mut self, features: &[LineFeature]) -> SlamResult<CycleReport> {
        let r = self.config.r();
        let associations = self.associator.associate(features, &self.state, &r)?;
        let update = self.updater.update(&mut self.state, features, &associations)?;
        Ok(CycleReport { associations, update })
    }

    /// Full cycle with the controls taken as given
    pub fn step(&mut self, controls: &Vector3<f64>, features: &[LineFeature]) -> SlamResult<CycleReport> {
        self.predictor.predict(&mut self.state, controls, self.config.dt)?;
        let report = self.observe(features)?;
        debug!(
            "cycle: {} features, {} matched, {} new, {} rejected, {} landmarks",
            features.len(),
            report.update.matched,
            report.update.added,
            report.n_rejected(),
            self.state.n_landmarks()
        );
        Ok(report)
    }

    /// Full cycle with control noise injected first
    pub fn simulate_step<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        controls: &Vector3<f64>,
        features: &[LineFeature],
    ) -> SlamResult<CycleReport> {
        let noised = self.noise.add_control_noise(rng, controls);
        self.step(&noised, features)
    }
}

impl StateEstimator for EkfLineSlam {
    type State = SlamState;
    type Measurement = Vec<LineFeature>;
    type Control = Vector3<f64>;
    type Report = CycleReport;

    fn predict(&mut self, control: &Self::Control, dt: f64) -> SlamResult<()> {
        self.predictor.predict(&mut self.state, control, dt)
    }

    fn update(&mut self, measurement: &Self::Measurement) -> SlamResult<Self::Report> {
        self.observe(measurement)
    }

    fn get_state(&self) -> &Self::State {
        &self.state
    }

    fn get_covariance(&self) -> Option<&DMatrix<f64>> {
        Some(self.state.p())
    }
}
