//! Estimator configuration
//!
//! Constants fixed at process start: timestep, control and observation noise,
//! the two association gates and the noise-injection switch. Values can be
//! loaded from a TOML file; missing keys fall back to the defaults.

use nalgebra::{Matrix2, Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;

use crate::common::{SlamError, SlamResult};

/// Configuration for the line-landmark EKF SLAM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlamConfig {
    /// Time step [s]
    pub dt: f64,
    /// Linear velocity noise [m/s]
    pub sigma_v: f64,
    /// Angular rate noise [rad/s]
    pub sigma_g: f64,
    /// Range noise [m]
    pub sigma_r: f64,
    /// Bearing noise [rad]
    pub sigma_b: f64,
    /// Maximum squared Mahalanobis distance for an unambiguous match
    pub inner_gate: f64,
    /// Squared Mahalanobis distance beyond which a feature is a new landmark
    pub outer_gate: f64,
    /// Inject noise into controls and scans
    pub add_noise: bool,
}

impl Default for SlamConfig {
    fn default() -> Self {
        Self {
            dt: 0.1,
            sigma_v: 0.3,
            sigma_g: 3.0 * PI / 180.0,
            sigma_r: 0.1,
            sigma_b: 1.0 * PI / 180.0,
            inner_gate: 4.0,
            outer_gate: 25.0,
            add_noise: true,
        }
    }
}

impl SlamConfig {
    /// Default configuration with noise injection switched off
    pub fn noiseless() -> Self {
        Self {
            add_noise: false,
            ..Self::default()
        }
    }

    /// Standard deviations of the control components, `[sigma_v, sigma_v, sigma_g]`
    pub fn control_sigma(&self) -> Vector3<f64> {
        Vector3::new(self.sigma_v, self.sigma_v, self.sigma_g)
    }

    /// Process noise in control space, `diag(sigma_v², sigma_v², sigma_g²)`
    pub fn q_control(&self) -> Matrix3<f64> {
        let sigma = self.control_sigma();
        Matrix3::from_diagonal(&sigma.component_mul(&sigma))
    }

    /// Observation noise, `diag(sigma_r², sigma_b²)`
    pub fn r(&self) -> Matrix2<f64> {
        Matrix2::new(
            self.sigma_r.powi(2), 0.0,
            0.0, self.sigma_b.powi(2),
        )
    }

    /// Check ranges and gate ordering
    pub fn validate(&self) -> SlamResult<()> {
        let values = [
            ("dt", self.dt),
            ("sigma_v", self.sigma_v),
            ("sigma_g", self.sigma_g),
            ("sigma_r", self.sigma_r),
            ("sigma_b", self.sigma_b),
            ("inner_gate", self.inner_gate),
            ("outer_gate", self.outer_gate),
        ];
        for (name, value) in values.iter() {
            if !value.is_finite() || *value < 0.0 {
                return Err(SlamError::InvalidParameter(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        if self.dt <= 0.0 {
            return Err(SlamError::InvalidParameter(format!(
                "dt must be positive, got {}",
                self.dt
            )));
        }
        if self.inner_gate > self.outer_gate {
            return Err(SlamError::InvalidParameter(format!(
                "inner_gate ({}) exceeds outer_gate ({})",
                self.inner_gate, self.outer_gate
            )));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> SlamResult<Self> {
        let config: SlamConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> SlamResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SlamConfig::default();
        assert_eq!(config.dt, 0.1);
        assert_eq!(config.inner_gate, 4.0);
        assert_eq!(config.outer_gate, 25.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_noise_matrices() {
        let config = SlamConfig::default();
        let r = config.r();
        assert!((r[(0, 0)] - 0.01).abs() < 1e-12);
        assert!((r[(1, 1)] - (PI / 180.0).powi(2)).abs() < 1e-12);
        assert_eq!(r[(0, 1)], 0.0);

        let q = config.q_control();
        assert!((q[(0, 0)] - 0.09).abs() < 1e-12);
        assert!((q[(1, 1)] - 0.09).abs() < 1e-12);
        assert!((q[(2, 2)] - (3.0 * PI / 180.0).powi(2)).abs() < 1e-12);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = SlamConfig::from_toml_str("dt = 0.05\nadd_noise = false\n").unwrap();
        assert_eq!(config.dt, 0.05);
        assert!(!config.add_noise);
        assert_eq!(config.outer_gate, 25.0);
    }

    #[test]
    fn test_from_toml_rejects_inverted_gates() {
        let result = SlamConfig::from_toml_str("inner_gate = 30.0\nouter_gate = 25.0\n");
        assert!(matches!(result, Err(SlamError::InvalidParameter(_))));
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        let result = SlamConfig::from_toml_str("dt = \"fast\"");
        assert!(matches!(result, Err(SlamError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_dt() {
        let config = SlamConfig {
            dt: 0.0,
            ..SlamConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_missing_file() {
        let result = SlamConfig::from_file("/nonexistent/slam.toml");
        assert!(matches!(result, Err(SlamError::Io(_))));
    }
}
