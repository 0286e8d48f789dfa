// SLAM with line landmarks

pub mod association;
pub mod config;
pub mod ekf_line_slam;
pub mod motion;
pub mod noise;
pub mod observation;
pub mod state;
pub mod update;

pub use association::{Association, Associator, Decision};
pub use config::SlamConfig;
pub use ekf_line_slam::{CycleReport, EkfLineSlam};
pub use motion::{MotionPredictor, VelocityMotionModel};
pub use noise::NoiseModel;
pub use observation::{LineFeature, LineObservationModel};
pub use state::{SlamSnapshot, SlamState};
pub use update::{MeasurementUpdater, UpdateReport};
