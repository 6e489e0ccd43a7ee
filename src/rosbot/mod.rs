//! Rosbot kinematics
//!
//! Unicycle model of the robot: goal distance checks, the analytic
//! feedback law and exact forward integration of the pose.

pub mod kinematics;

pub use kinematics::{wrap_angle, KinematicModel};
