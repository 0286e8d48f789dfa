//! Utility modules for line_ekf_slam

pub mod simulation;
pub mod visualization;

pub use simulation::{Room, SimulatedScan, Wall};
pub use visualization::{clip_line, colors, polar_to_world, PathStyle, PointStyle, Visualizer};
