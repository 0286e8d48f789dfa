//! Simulated room and rotating range-bearing scanner
//!
//! Stands in for the scanner and line-extraction collaborators: walls are
//! ray-cast to produce a polar scan, and every wall hit by enough beams is
//! reported as a line feature whose polar parameters carry observation
//! noise.

use log::debug;
use nalgebra::{Matrix2xX, Vector2};
use rand::Rng;

use crate::common::{ObservationModel, Point2D, Pose2D};
use crate::slam::noise::NoiseModel;
use crate::slam::observation::{LineFeature, LineObservationModel};

/// Wall segment in the world frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub start: Point2D,
    pub end: Point2D,
}

fn cross(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    ax * by - ay * bx
}

impl Wall {
    pub fn new(start: Point2D, end: Point2D) -> Self {
        Self { start, end }
    }

    /// Supporting line as `(rho, alpha)`
    pub fn line(&self) -> Vector2<f64> {
        let ex = self.end.x - self.start.x;
        let ey = self.end.y - self.start.y;
        let len = (ex * ex + ey * ey).sqrt();
        let (mut nx, mut ny) = (-ey / len, ex / len);
        let mut rho = nx * self.start.x + ny * self.start.y;
        if rho < 0.0 {
            rho = -rho;
            nx = -nx;
            ny = -ny;
        }
        Vector2::new(rho, ny.atan2(nx))
    }

    /// Distance along the unit ray `origin + s * (dx, dy)` to the wall
    fn intersect(&self, origin: &Point2D, dx: f64, dy: f64) -> Option<f64> {
        let ex = self.end.x - self.start.x;
        let ey = self.end.y - self.start.y;
        let denom = cross(dx, dy, ex, ey);
        if denom.abs() < 1e-12 {
            return None;
        }
        let wx = self.start.x - origin.x;
        let wy = self.start.y - origin.y;
        let s = cross(wx, wy, ex, ey) / denom;
        let t = cross(wx, wy, dx, dy) / denom;
        if s > 1e-9 && (0.0..=1.0).contains(&t) {
            Some(s)
        } else {
            None
        }
    }
}

/// One simulated scan
#[derive(Debug, Clone)]
pub struct SimulatedScan {
    /// Polar returns, row 0 range and row 1 bearing
    pub polar: Matrix2xX<f64>,
    /// Line features for walls with enough support
    pub features: Vec<LineFeature>,
}

/// Collection of walls
#[derive(Debug, Clone, Default)]
pub struct Room {
    pub walls: Vec<Wall>,
}

impl Room {
    /// Axis-aligned room with its lower-left corner at `corner`
    pub fn rectangle(corner: Point2D, width: f64, height: f64) -> Self {
        let corners = [
            corner,
            Point2D::new(corner.x + width, corner.y),
            Point2D::new(corner.x + width, corner.y + height),
            Point2D::new(corner.x, corner.y + height),
        ];
        let walls = (0..4)
            .map(|i| Wall::new(corners[i], corners[(i + 1) % 4]))
            .collect();
        Self { walls }
    }

    pub fn with_wall(mut self, wall: Wall) -> Self {
        self.walls.push(wall);
        self
    }

    /// Ground-truth landmarks, one per wall
    pub fn landmarks(&self) -> Vec<Vector2<f64>> {
        self.walls.iter().map(Wall::line).collect()
    }

    /// Ray-cast `n_beams` evenly spaced beams over a full turn.
    ///
    /// Returns the polar returns of beams that hit a wall within
    /// `max_range` and the index of the wall each one hit.
    pub fn scan(&self, pose: &Pose2D, n_beams: usize, max_range: f64) -> (Matrix2xX<f64>, Vec<usize>) {
        let origin = pose.position();
        let mut returns = Vec::new();
        let mut hit_walls = Vec::new();

        for k in 0..n_beams {
            let bearing = -std::f64::consts::PI + 2.0 * std::f64::consts::PI * k as f64 / n_beams as f64;
            let (dy, dx) = (pose.yaw + bearing).sin_cos();
            let nearest = self
                .walls
                .iter()
                .enumerate()
                .filter_map(|(j, w)| w.intersect(&origin, dx, dy).map(|s| (j, s)))
                .fold(None, |best: Option<(usize, f64)>, (j, s)| match best {
                    Some((_, b)) if b <= s => best,
                    _ => Some((j, s)),
                });
            if let Some((j, s)) = nearest {
                if s <= max_range {
                    returns.push(Vector2::new(s, bearing));
                    hit_walls.push(j);
                }
            }
        }
        let polar = Matrix2xX::from_fn(returns.len(), |i, j| returns[j][i]);
        (polar, hit_walls)
    }

    /// Scan from `pose` and report one feature per wall with at least
    /// `min_points` returns. Noise is applied to the raw scan and to the
    /// features' polar parameters.
    pub fn observe<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        noise: &NoiseModel,
        pose: &Pose2D,
        n_beams: usize,
        max_range: f64,
        min_points: usize,
    ) -> SimulatedScan {
        let (scan, hit_walls) = self.scan(pose, n_beams, max_range);
        let polar = noise.add_observe_noise(rng, &scan);

        let mut visible: Vec<(usize, Vec<Point2D>)> = Vec::new();
        for j in 0..self.walls.len() {
            let points: Vec<Point2D> = hit_walls
                .iter()
                .enumerate()
                .filter(|(_, wall)| **wall == j)
                .map(|(k, _)| {
                    let (r, b) = (polar[(0, k)], polar[(1, k)]);
                    Point2D::new(r * b.cos(), r * b.sin())
                })
                .collect();
            if points.len() >= min_points {
                visible.push((j, points));
            }
        }

        let model = LineObservationModel;
        let pose_vec = pose.to_vector();
        let mut lines = Matrix2xX::zeros(visible.len());
        for (col, (j, _)) in visible.iter().enumerate() {
            let (z, _, _) = model.predict(&pose_vec, &self.walls[*j].line());
            lines.set_column(col, &z);
        }
        let lines = noise.add_observe_noise(rng, &lines);

        let features = visible
            .into_iter()
            .enumerate()
            .filter_map(|(col, (j, points))| {
                match LineFeature::from_polar(lines[(0, col)], lines[(1, col)], points) {
                    Ok(feature) => Some(feature),
                    Err(e) => {
                        debug!("wall {} dropped: {}", j, e);
                        None
                    }
                }
            })
            .collect();

        SimulatedScan { polar, features }
    }
}
