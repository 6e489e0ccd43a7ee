// Closed-loop simulation of the sampling controller on a unicycle robot.
//
// The robot is simulated with the exact-arc kinematic model and follows a
// sine-shaped reference path. Pass a TOML parameter file as the first
// argument to override the defaults, and `--feedback` to drive with the
// analytic go-to-goal law instead.
//
// Run with: RUST_LOG=info cargo run --bin mppic_sim -- [params.toml] [--feedback]

use log::{info, warn};

use rosbot_mppic::common::{Goal, MppicResult, Point2D, ReferenceTrajectory, RobotState, State};
use rosbot_mppic::config::ControllerConfig;
use rosbot_mppic::mppic::{FirstOrderLag, MppicController};
use rosbot_mppic::rosbot::KinematicModel;

const SIM_TIME: f64 = 60.0; // [s]
const LOOKAHEAD: usize = 30; // reference waypoints handed to the controller

fn reference_path() -> MppicResult<ReferenceTrajectory> {
    let xs: Vec<f64> = (0..=120).map(|i| i as f64 * 0.05).collect();
    let ys: Vec<f64> = xs.iter().map(|x| 0.5 * (0.8 * x).sin()).collect();
    ReferenceTrajectory::from_xy(&xs, &ys)
}

fn run(config: ControllerConfig, feedback: bool) -> MppicResult<()> {
    let reference = reference_path()?;
    let end = reference.last();
    let goal = Goal::new(end.x, end.y);

    let mut robot = KinematicModel::new(config.rosbot.clone());
    let mut controller = MppicController::from_config(&config, FirstOrderLag::default())?;
    let freq = config.mppic.freq;

    let mut odom = RobotState::at_pose(0.0, 0.0, 0.0);
    robot.set_odom_state(odom);
    robot.reset_model_state();

    let mut time = 0.0;
    while time <= SIM_TIME {
        if robot.goal_reached(&goal) {
            info!("Goal!! t = {:.2} s", time);
            return Ok(());
        }

        let command = if feedback {
            robot.compute_control(&odom, &goal)
        } else {
            let nearest = reference.nearest_index(&Point2D::new(odom.x, odom.y));
            let local = reference.window(nearest, LOOKAHEAD);
            controller.tick(State::from(odom), &local)?
        };

        let pose = robot.integrate(command.v, command.w, freq)?;
        // the integrator only moves the pose, odometry reports the applied velocity
        odom = RobotState::new(pose.x, pose.y, pose.yaw, command.v, 0.0, command.w);
        robot.set_odom_state(odom);

        info!(
            "t = {:5.2} x = {:6.3} y = {:6.3} yaw = {:6.3} v = {:5.3} w = {:6.3}",
            time, odom.x, odom.y, odom.yaw, command.v, command.w
        );
        time += 1.0 / freq;
    }

    warn!(
        "goal not reached after {:.0} s, remaining squared distance {:.3}",
        SIM_TIME,
        robot.squared_distance_to_goal(&goal)
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let feedback = args.iter().any(|a| a == "--feedback");
    let config = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => ControllerConfig::load(path),
        None => Ok(ControllerConfig::default()),
    };

    let result = config.and_then(|config| run(config, feedback));
    if let Err(e) = result {
        eprintln!("mppic_sim: {}", e);
        std::process::exit(1);
    }
}
