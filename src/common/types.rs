//! Common types used throughout line_ekf_slam

use nalgebra::{Vector2, Vector3};
use std::f64::consts::PI;

/// Normalize angle to (-pi, pi]. Non-finite input yields NaN.
pub fn normalize_angle(angle: f64) -> f64 {
    if angle > -PI && angle <= PI {
        return angle;
    }
    let a = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if a <= -PI {
        PI
    } else {
        a
    }
}

/// 2D point representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<Vector2<f64>> for Point2D {
    fn from(v: Vector2<f64>) -> Self {
        Self { x: v[0], y: v[1] }
    }
}

/// 2D pose (position + orientation)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0, yaw: 0.0 }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.yaw)
    }

    /// Map a point from this pose's body frame into the world frame
    pub fn transform_point(&self, p: &Point2D) -> Point2D {
        let (s, c) = self.yaw.sin_cos();
        Point2D::new(self.x + c * p.x - s * p.y, self.y + s * p.x + c * p.y)
    }

    /// Map a world-frame point into this pose's body frame
    pub fn inverse_transform_point(&self, p: &Point2D) -> Point2D {
        let (s, c) = self.yaw.sin_cos();
        let dx = p.x - self.x;
        let dy = p.y - self.y;
        Point2D::new(c * dx + s * dy, -s * dx + c * dy)
    }
}

impl From<Vector3<f64>> for Pose2D {
    fn from(v: Vector3<f64>) -> Self {
        Self { x: v[0], y: v[1], yaw: v[2] }
    }
}
