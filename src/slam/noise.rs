//! Control and observation noise injection
//!
//! Both functions always return a fresh copy of their input. The random
//! generator is supplied by the caller so that runs are reproducible from a
//! seed.

use nalgebra::{Matrix2xX, Vector3};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::slam::config::SlamConfig;

/// Gaussian noise applied to controls and polar scans.
///
/// Control noise is drawn with the same standard deviations the predictor
/// puts into its process noise, so simulated runs stay consistent with the
/// filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseModel {
    enabled: bool,
    control_sigma: Vector3<f64>,
    sigma_r: f64,
    sigma_b: f64,
}

impl NoiseModel {
    pub fn new(enabled: bool, control_sigma: Vector3<f64>, sigma_r: f64, sigma_b: f64) -> Self {
        Self {
            enabled,
            control_sigma,
            sigma_r,
            sigma_b,
        }
    }

    pub fn from_config(config: &SlamConfig) -> Self {
        Self::new(
            config.add_noise,
            config.control_sigma(),
            config.sigma_r,
            config.sigma_b,
        )
    }

    /// Add an independent zero-mean Gaussian sample to each control component
    pub fn add_control_noise<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        controls: &Vector3<f64>,
    ) -> Vector3<f64> {
        let mut noised = *controls;
        if self.enabled {
            for i in 0..3 {
                let n: f64 = rng.sample(StandardNormal);
                noised[i] += n * self.control_sigma[i];
            }
        }
        noised
    }

    /// Perturb a polar scan: row 0 holds ranges, row 1 bearings.
    ///
    /// All range samples are drawn before the bearing samples.
    pub fn add_observe_noise<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        laser_polar: &Matrix2xX<f64>,
    ) -> Matrix2xX<f64> {
        let mut noised = laser_polar.clone();
        if self.enabled {
            let n_measurements = noised.ncols();
            for j in 0..n_measurements {
                let n: f64 = rng.sample(StandardNormal);
                noised[(0, j)] += n * self.sigma_r;
            }
            for j in 0..n_measurements {
                let n: f64 = rng.sample(StandardNormal);
                noised[(1, j)] += n * self.sigma_b;
            }
        }
        noised
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scan() -> Matrix2xX<f64> {
        Matrix2xX::from_row_slice(&[
            1.0, 2.0, 3.0, 4.0,
            -0.5, 0.0, 0.5, 1.0,
        ])
    }

    #[test]
    fn test_disabled_noise_is_identity() {
        let noise = NoiseModel::from_config(&SlamConfig::noiseless());
        let mut rng = StdRng::seed_from_u64(7);

        let c = Vector3::new(1.0, -0.2, 0.3);
        assert_eq!(noise.add_control_noise(&mut rng, &c), c);

        let z = scan();
        assert_eq!(noise.add_observe_noise(&mut rng, &z), z);
    }

    #[test]
    fn test_disabled_noise_consumes_no_randomness() {
        let noise = NoiseModel::from_config(&SlamConfig::noiseless());
        let mut a = StdRng::seed_from_u64(3);
        let mut b = StdRng::seed_from_u64(3);
        noise.add_observe_noise(&mut a, &scan());
        assert_eq!(a.gen::<u64>(), b.gen::<u64>());
    }

    #[test]
    fn test_observe_noise_keeps_shape() {
        let noise = NoiseModel::from_config(&SlamConfig::default());
        let mut rng = StdRng::seed_from_u64(11);
        let z = scan();
        let noised = noise.add_observe_noise(&mut rng, &z);
        assert_eq!(noised.shape(), z.shape());
        assert_ne!(noised, z);
    }

    #[test]
    fn test_empty_scan() {
        let noise = NoiseModel::from_config(&SlamConfig::default());
        let mut rng = StdRng::seed_from_u64(0);
        let z = Matrix2xX::<f64>::zeros(0);
        assert_eq!(noise.add_observe_noise(&mut rng, &z).ncols(), 0);
    }

    #[test]
    fn test_noise_is_seed_deterministic() {
        let noise = NoiseModel::from_config(&SlamConfig::default());
        let c = Vector3::new(1.0, 0.0, 0.1);

        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        assert_eq!(noise.add_control_noise(&mut a, &c), noise.add_control_noise(&mut b, &c));
        assert_eq!(noise.add_observe_noise(&mut a, &scan()), noise.add_observe_noise(&mut b, &scan()));
    }

    #[test]
    fn test_observe_noise_statistics() {
        let noise = NoiseModel::new(true, Vector3::new(0.3, 0.3, 0.05), 0.1, 0.02);
        let mut rng = StdRng::seed_from_u64(5);
        let n = 20000;
        let z = Matrix2xX::<f64>::zeros(n);
        let noised = noise.add_observe_noise(&mut rng, &z);

        let range_var = noised.row(0).iter().map(|v| v * v).sum::<f64>() / n as f64;
        let bearing_var = noised.row(1).iter().map(|v| v * v).sum::<f64>() / n as f64;

        assert!((range_var.sqrt() - 0.1).abs() < 0.005);
        assert!((bearing_var.sqrt() - 0.02).abs() < 0.001);
    }

    #[test]
    fn test_control_noise_matches_process_noise() {
        let config = SlamConfig::default();
        let noise = NoiseModel::from_config(&config);
        let q = config.q_control();
        let mut rng = StdRng::seed_from_u64(9);
        let n = 20000;
        let c = Vector3::new(0.5, 0.0, 0.25);

        let mut sum_sq = Vector3::zeros();
        for _ in 0..n {
            let d = noise.add_control_noise(&mut rng, &c) - c;
            sum_sq += d.component_mul(&d);
        }
        let var = sum_sq / n as f64;
        // Injected variance per component equals the diagonal of Q
        for i in 0..3 {
            assert!((var[i] / q[(i, i)] - 1.0).abs() < 0.05, "component {}: {} vs {}", i, var[i], q[(i, i)]);
        }
    }
}
