// Line-landmark EKF SLAM in a simulated room
//
// usage: line_slam_sim [config.toml]
// Set RUST_LOG=debug for per-cycle association counts.

use log::{error, info};
use nalgebra::{Matrix3, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use line_ekf_slam::common::{normalize_angle, MotionModel, Point2D, Pose2D, SlamResult};
use line_ekf_slam::slam::{EkfLineSlam, SlamConfig, VelocityMotionModel};
use line_ekf_slam::utils::{colors, PathStyle, Room, Visualizer, Wall};

const SIM_STEPS: usize = 500;
const SEED: u64 = 42;
const N_BEAMS: usize = 360;
const MAX_RANGE: f64 = 12.0;
const MIN_POINTS: usize = 5;
const OUTPUT: &str = "./img/slam/line_ekf_slam.svg";

fn load_config() -> SlamResult<SlamConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            info!("loading configuration from {}", path);
            SlamConfig::from_file(path)
        }
        None => Ok(SlamConfig::default()),
    }
}

fn run() -> SlamResult<()> {
    let config = load_config()?;
    info!("configuration: {:?}", config);

    let room = Room::rectangle(Point2D::new(-5.0, -4.0), 10.0, 8.0)
        .with_wall(Wall::new(Point2D::new(2.0, -3.0), Point2D::new(3.5, -1.5)));
    let start = Pose2D::new(0.0, -2.0, 0.0);
    let mut slam = EkfLineSlam::with_initial_pose(config, start, Matrix3::zeros())?;
    let noise = *slam.noise();
    let dt = slam.config().dt;
    let mut rng = StdRng::seed_from_u64(SEED);

    // Control input: [v_x, v_y, yaw_rate]
    let u = Vector3::new(0.5, 0.0, 0.25);
    let model = VelocityMotionModel;

    let mut x_true = start.to_vector();
    let mut x_dr = start.to_vector();
    let mut h_true = vec![start];
    let mut h_dr = vec![start];
    let mut h_est = vec![start];
    let mut last_scan = None;
    let (mut matched, mut rejected) = (0, 0);

    for _ in 0..SIM_STEPS {
        x_true = model.propagate(&x_true, &u, dt);
        let pose_true = Pose2D::from(x_true);
        let scan = room.observe(&mut rng, &noise, &pose_true, N_BEAMS, MAX_RANGE, MIN_POINTS);

        let u_noisy = noise.add_control_noise(&mut rng, &u);
        x_dr = model.propagate(&x_dr, &u_noisy, dt);

        let report = slam.step(&u_noisy, &scan.features)?;
        matched += report.update.matched;
        rejected += report.n_rejected();

        h_true.push(pose_true);
        h_dr.push(Pose2D::from(x_dr));
        h_est.push(slam.snapshot().pose());
        last_scan = Some((pose_true, scan.polar));
    }

    let snapshot = slam.snapshot();
    let pose = snapshot.pose();
    info!(
        "final pose: est=({:.3}, {:.3}, {:.3}), true=({:.3}, {:.3}, {:.3})",
        pose.x, pose.y, pose.yaw, x_true[0], x_true[1], x_true[2]
    );
    info!(
        "{} landmarks, {} matches, {} rejected features",
        snapshot.n_landmarks, matched, rejected
    );

    let walls = room.landmarks();
    for (i, lm) in snapshot.landmarks().iter().enumerate() {
        let nearest = walls.iter().min_by(|a, b| {
            let da = (a[0] - lm[0]).abs() + normalize_angle(a[1] - lm[1]).abs();
            let db = (b[0] - lm[0]).abs() + normalize_angle(b[1] - lm[1]).abs();
            da.total_cmp(&db)
        });
        if let Some(wall) = nearest {
            info!(
                "  LM{}: est=({:.3}, {:.3}), wall=({:.3}, {:.3})",
                i, lm[0], lm[1], wall[0], wall[1]
            );
        }
    }

    let mut vis = Visualizer::new();
    vis.set_title("Line EKF SLAM")
        .set_x_range(-6.0, 6.0)
        .set_y_range(-5.0, 5.0);
    if let Some((scan_pose, polar)) = &last_scan {
        vis.plot_scan(scan_pose, polar);
    }
    vis.plot_line_landmarks(&walls, &PathStyle::new(colors::BLACK, "Walls").with_line_width(1.0))
        .plot_trajectory(&h_true, &PathStyle::new(colors::GROUND_TRUTH, "True"))
        .plot_trajectory(&h_dr, &PathStyle::new(colors::DEAD_RECKONING, "Dead Reckoning"))
        .plot_trajectory(&h_est, &PathStyle::new(colors::ESTIMATED, "EKF SLAM"))
        .draw(&snapshot);

    std::fs::create_dir_all("./img/slam")?;
    vis.save_svg(OUTPUT)?;
    info!("plot saved to {}", OUTPUT);
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Line EKF SLAM start!");

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}
