//! Unicycle kinematic model of the robot
//!
//! Tracks two independent states: the odometry state reported by the
//! runtime, and a model state advanced by exact unicycle integration.
//! Also provides the analytic go-to-goal feedback law.

use std::f64::consts::PI;

use crate::common::{Control, Goal, MppicError, MppicResult, RobotState};
use crate::config::RosbotParams;

/// Yaw rates below this are integrated as straight-line motion
const EPS_W: f64 = 1e-4;

/// Unicycle kinematic model with analytic feedback control
#[derive(Debug, Clone)]
pub struct KinematicModel {
    odom_state: RobotState,
    model_state: RobotState,
    params: RosbotParams,
}

impl KinematicModel {
    pub fn new(params: RosbotParams) -> Self {
        Self {
            odom_state: RobotState::default(),
            model_state: RobotState::default(),
            params,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RosbotParams::default())
    }

    pub fn params(&self) -> &RosbotParams {
        &self.params
    }

    pub fn odom_state(&self) -> &RobotState {
        &self.odom_state
    }

    pub fn model_state(&self) -> &RobotState {
        &self.model_state
    }

    /// Replace the observed state wholesale
    pub fn set_odom_state(&mut self, state: RobotState) {
        self.odom_state = state;
    }

    pub fn set_model_state(&mut self, state: RobotState) {
        self.model_state = state;
    }

    /// Restart integration from the last observed state
    pub fn reset_model_state(&mut self) {
        self.model_state = self.odom_state;
    }

    /// Squared distance from the observed position to the goal
    pub fn squared_distance_to_goal(&self, goal: &Goal) -> f64 {
        squared_distance(&self.odom_state, goal)
    }

    /// Goal tolerance is defined in squared-distance space
    pub fn goal_reached(&self, goal: &Goal) -> bool {
        self.squared_distance_to_goal(goal) <= self.params.xy_margin_squared
    }

    /// Feedback control law steering `state` towards `goal`
    ///
    /// The heading error `alpha` is taken from `state`, while `rho` is the
    /// *squared* distance from the odometry state to the goal. It saturates
    /// the linear speed through `tanh` and scales the heading correction
    /// term. At the goal the ratio `tanh(rho) / rho` is replaced by its limit
    /// of 1.
    pub fn compute_control(&self, state: &RobotState, goal: &Goal) -> Control {
        let rho = self.squared_distance_to_goal(goal);

        let azim_goal = (goal.y - state.y).atan2(goal.x - state.x);
        let alpha = wrap_angle(azim_goal - state.yaw);

        let tanh_rho = rho.tanh();
        let gain_ratio = if rho < f64::EPSILON { 1.0 } else { tanh_rho / rho };

        let v = self.params.v_max * tanh_rho * alpha.cos();
        let w = self.params.w_max * alpha + gain_ratio * alpha.sin() * alpha.cos();

        Control::new(v, w)
    }

    /// Advance the model pose by one control period using the exact unicycle arc
    ///
    /// Only the pose is updated; `vx`, `vy` and `w` of the model state keep
    /// whatever value they were seeded with.
    pub fn integrate(&mut self, v: f64, w: f64, freq: f64) -> MppicResult<RobotState> {
        if !(freq.is_finite() && freq > 0.0) {
            return Err(MppicError::InvalidParameter(format!(
                "integration frequency must be positive, got {}",
                freq
            )));
        }
        let dt = 1.0 / freq;
        let state = &mut self.model_state;

        if w.abs() > EPS_W {
            let rho = v / w;

            // displacement in the robot frame
            let x_r = rho * (w * dt).sin();
            let y_r = rho * (1.0 - (w * dt).cos());

            let (sin_yaw, cos_yaw) = state.yaw.sin_cos();
            state.x += x_r * cos_yaw - y_r * sin_yaw;
            state.y += x_r * sin_yaw + y_r * cos_yaw;
            state.yaw += w * dt;
        } else {
            state.x += v * dt * state.yaw.cos();
            state.y += v * dt * state.yaw.sin();
        }

        Ok(*state)
    }
}

impl Default for KinematicModel {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn squared_distance(state: &RobotState, goal: &Goal) -> f64 {
    (goal.x - state.x).powi(2) + (goal.y - state.y).powi(2)
}

/// Wrap an angle into (-PI, PI]
pub fn wrap_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a <= -PI {
        a += 2.0 * PI;
    }
    a
}
