//! rosbot_mppic - trajectory optimization core of a sampling-based
//! predictive controller for a unicycle wheeled robot
//!
//! This crate provides the unicycle kinematic model and feedback law, the
//! stochastic trajectory sampler, and the cost functions that score
//! sampled trajectories against a reference path.

// Core modules
pub mod common;
pub mod config;

// Algorithm modules
pub mod rosbot;
pub mod mppic;

// Re-export common types for convenience
pub use common::{Control, Goal, Point2D, Pose2D, ReferenceTrajectory, RobotState, State};
pub use common::{ControlUpdate, DynamicsModel, TrajectoryCost};
pub use common::{MppicError, MppicResult};
pub use config::ControllerConfig;
