//! Visualization utilities for line_ekf_slam
//!
//! Draws estimator snapshots, scans and trajectories with gnuplot. Series are
//! collected first and rendered into a single set of axes on save, so a
//! visualizer never feeds anything back into the estimator.

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};
use nalgebra::{Matrix2xX, Vector2};

use crate::common::{Point2D, Pose2D, SlamError, SlamResult, Visualizable};
use crate::slam::state::SlamSnapshot;

/// Color palette for consistent styling
pub mod colors {
    pub const BLACK: &str = "#000000";
    pub const RED: &str = "#FF0000";
    pub const BLUE: &str = "#0000FF";
    pub const GRAY: &str = "#808080";

    // Semantic colors
    pub const ROBOT: &str = BLACK;
    pub const LANDMARK: &str = "#35C788";
    pub const GROUND_TRUTH: &str = BLUE;
    pub const ESTIMATED: &str = RED;
    pub const MEASUREMENT: &str = "#DD3355";
    pub const DEAD_RECKONING: &str = GRAY;
}

/// Robot outline in the body frame, closed
const ROBOT_OUTLINE: [(f64, f64); 4] = [(-0.05, -0.09), (-0.05, 0.09), (0.3, 0.0), (-0.05, -0.09)];

/// View box used when no axis range is set
const DEFAULT_VIEW: (f64, f64, f64, f64) = (-10.0, 10.0, -10.0, 10.0);

/// Style for path rendering
#[derive(Debug, Clone)]
pub struct PathStyle {
    pub color: String,
    pub line_width: f64,
    pub caption: String,
}

impl PathStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            line_width: 2.0,
            caption: caption.to_string(),
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line_width = width;
        self
    }
}

impl Default for PathStyle {
    fn default() -> Self {
        Self {
            color: colors::ESTIMATED.to_string(),
            line_width: 2.0,
            caption: "Path".to_string(),
        }
    }
}

/// Style for point rendering
#[derive(Debug, Clone)]
pub struct PointStyle {
    pub color: String,
    pub size: f64,
    pub symbol: char,
    pub caption: String,
}

impl PointStyle {
    pub fn new(color: &str, caption: &str) -> Self {
        Self {
            color: color.to_string(),
            size: 1.0,
            symbol: 'O',
            caption: caption.to_string(),
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_symbol(mut self, symbol: char) -> Self {
        self.symbol = symbol;
        self
    }
}

#[derive(Debug, Clone)]
enum Series {
    Lines { x: Vec<f64>, y: Vec<f64>, style: PathStyle },
    Points { x: Vec<f64>, y: Vec<f64>, style: PointStyle },
}

/// Convert a polar scan taken at `pose` into world-frame points
pub fn polar_to_world(pose: &Pose2D, scan: &Matrix2xX<f64>) -> Vec<Point2D> {
    scan.column_iter()
        .map(|col| {
            let (s, c) = col[1].sin_cos();
            pose.transform_point(&Point2D::new(col[0] * c, col[0] * s))
        })
        .collect()
}

/// Segment of the line `(rho, alpha)` inside the box `(x_min, x_max, y_min, y_max)`
pub fn clip_line(line: &Vector2<f64>, view: (f64, f64, f64, f64)) -> Option<(Point2D, Point2D)> {
    let (x_min, x_max, y_min, y_max) = view;
    let (s, c) = line[1].sin_cos();
    // Foot of the normal and direction along the line
    let origin = [line[0] * c, line[0] * s];
    let dir = [-s, c];
    let bounds = [(x_min, x_max), (y_min, y_max)];

    let mut t_lo = f64::NEG_INFINITY;
    let mut t_hi = f64::INFINITY;
    for axis in 0..2 {
        let (lo, hi) = bounds[axis];
        if dir[axis].abs() < 1e-12 {
            if origin[axis] < lo || origin[axis] > hi {
                return None;
            }
            continue;
        }
        let t1 = (lo - origin[axis]) / dir[axis];
        let t2 = (hi - origin[axis]) / dir[axis];
        t_lo = t_lo.max(t1.min(t2));
        t_hi = t_hi.min(t1.max(t2));
    }
    if t_lo > t_hi {
        return None;
    }
    let at = |t: f64| Point2D::new(origin[0] + t * dir[0], origin[1] + t * dir[1]);
    Some((at(t_lo), at(t_hi)))
}

/// Main visualizer struct
pub struct Visualizer {
    figure: Figure,
    series: Vec<Series>,
    title: String,
    x_label: String,
    y_label: String,
    x_range: Option<(f64, f64)>,
    y_range: Option<(f64, f64)>,
    aspect_ratio: Option<f64>,
}

impl Visualizer {
    /// Create a new visualizer
    pub fn new() -> Self {
        Self {
            figure: Figure::new(),
            series: Vec::new(),
            title: String::new(),
            x_label: "X [m]".to_string(),
            y_label: "Y [m]".to_string(),
            x_range: None,
            y_range: None,
            aspect_ratio: Some(1.0),
        }
    }

    /// Set the plot title
    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    /// Set X axis range
    pub fn set_x_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.x_range = Some((min, max));
        self
    }

    /// Set Y axis range
    pub fn set_y_range(&mut self, min: f64, max: f64) -> &mut Self {
        self.y_range = Some((min, max));
        self
    }

    /// Number of queued series
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Box that landmark lines are clipped to
    pub fn view(&self) -> (f64, f64, f64, f64) {
        let (x_min, x_max) = self.x_range.unwrap_or((DEFAULT_VIEW.0, DEFAULT_VIEW.1));
        let (y_min, y_max) = self.y_range.unwrap_or((DEFAULT_VIEW.2, DEFAULT_VIEW.3));
        (x_min, x_max, y_min, y_max)
    }

    /// Plot a path from x,y vectors
    pub fn plot_path_xy(&mut self, x: &[f64], y: &[f64], style: &PathStyle) -> &mut Self {
        self.series.push(Series::Lines {
            x: x.to_vec(),
            y: y.to_vec(),
            style: style.clone(),
        });
        self
    }

    /// Plot a trajectory of poses
    pub fn plot_trajectory(&mut self, poses: &[Pose2D], style: &PathStyle) -> &mut Self {
        let x: Vec<f64> = poses.iter().map(|p| p.x).collect();
        let y: Vec<f64> = poses.iter().map(|p| p.y).collect();
        self.plot_path_xy(&x, &y, style)
    }

    /// Plot multiple points
    pub fn plot_points(&mut self, points: &[Point2D], style: &PointStyle) -> &mut Self {
        self.series.push(Series::Points {
            x: points.iter().map(|p| p.x).collect(),
            y: points.iter().map(|p| p.y).collect(),
            style: style.clone(),
        });
        self
    }

    /// Plot a polar scan taken at `pose`
    pub fn plot_scan(&mut self, pose: &Pose2D, scan: &Matrix2xX<f64>) -> &mut Self {
        let points = polar_to_world(pose, scan);
        let style = PointStyle::new(colors::MEASUREMENT, "Scan")
            .with_size(0.3)
            .with_symbol('.');
        self.plot_points(&points, &style)
    }

    /// Plot the robot as a triangle pointing along its heading
    pub fn plot_robot(&mut self, pose: &Pose2D, color: &str, caption: &str) -> &mut Self {
        let outline: Vec<Point2D> = ROBOT_OUTLINE
            .iter()
            .map(|&(x, y)| pose.transform_point(&Point2D::new(x, y)))
            .collect();
        let x: Vec<f64> = outline.iter().map(|p| p.x).collect();
        let y: Vec<f64> = outline.iter().map(|p| p.y).collect();
        self.plot_path_xy(&x, &y, &PathStyle::new(color, caption).with_line_width(1.5))
    }

    /// Plot `(rho, alpha)` lines clipped to the current view
    pub fn plot_line_landmarks(&mut self, landmarks: &[Vector2<f64>], style: &PathStyle) -> &mut Self {
        let view = self.view();
        let mut first = true;
        for line in landmarks {
            if let Some((a, b)) = clip_line(line, view) {
                let mut segment_style = style.clone();
                // Only the first segment goes into the legend
                if !first {
                    segment_style.caption.clear();
                }
                first = false;
                self.plot_path_xy(&[a.x, b.x], &[a.y, b.y], &segment_style);
            }
        }
        self
    }

    /// Draw anything that knows how to draw itself
    pub fn draw<V: Visualizable>(&mut self, item: &V) -> &mut Self {
        item.visualize(self);
        self
    }

    /// Save plot to SVG file
    pub fn save_svg(&mut self, path: &str) -> SlamResult<()> {
        self.render();
        self.figure
            .save_to_svg(path, 800, 600)
            .map_err(|e| SlamError::Visualization(e.to_string()))
    }

    fn render(&mut self) {
        self.figure.clear_axes();
        let axes = self.figure.axes2d();

        for series in &self.series {
            match series {
                Series::Lines { x, y, style } => {
                    axes.lines(x, y, &[Caption(&style.caption), Color(&style.color), LineWidth(style.line_width)]);
                }
                Series::Points { x, y, style } => {
                    axes.points(
                        x,
                        y,
                        &[
                            Caption(&style.caption),
                            Color(&style.color),
                            PointSymbol(style.symbol),
                            PointSize(style.size),
                        ],
                    );
                }
            }
        }

        if !self.title.is_empty() {
            axes.set_title(&self.title, &[]);
        }
        axes.set_x_label(&self.x_label, &[]);
        axes.set_y_label(&self.y_label, &[]);

        if let Some((min, max)) = self.x_range {
            axes.set_x_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some((min, max)) = self.y_range {
            axes.set_y_range(AutoOption::Fix(min), AutoOption::Fix(max));
        }
        if let Some(ratio) = self.aspect_ratio {
            axes.set_aspect_ratio(AutoOption::Fix(ratio));
        }
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizable for SlamSnapshot {
    fn visualize(&self, vis: &mut Visualizer) {
        vis.plot_line_landmarks(&self.landmarks(), &PathStyle::new(colors::LANDMARK, "Landmarks").with_line_width(1.0));
        vis.plot_robot(&self.pose(), colors::ROBOT, "Estimate");
    }
}
