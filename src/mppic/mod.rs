//! Sampling-based predictive controller (MPPI)
//!
//! Each control tick samples a batch of noisy control sequences around the
//! nominal plan, rolls them out through a velocity model, scores them
//! against a reference path and folds the scores back into the plan.
//!
//! # Components
//!
//! - `batch`: sample and trajectory buffers
//! - `dynamics`: stock velocity models
//! - `generator`: noise sampling and rollout
//! - `costs`: nearest-waypoint and segment-distance cost functions
//! - `optimizer`: softmax importance weighting
//! - `controller`: the per-tick loop
//!
//! # Example
//!
//! ```no_run
//! use rosbot_mppic::common::{ReferenceTrajectory, State};
//! use rosbot_mppic::config::ControllerConfig;
//! use rosbot_mppic::mppic::{FirstOrderLag, MppicController};
//!
//! let config = ControllerConfig::default();
//! let mut controller = MppicController::from_config(&config, FirstOrderLag::default()).unwrap();
//!
//! let reference = ReferenceTrajectory::from_xy(&[0.0, 1.0, 2.0], &[0.0, 0.0, 0.5]).unwrap();
//! let command = controller.tick(State::default(), &reference).unwrap();
//! println!("v = {:.2}, w = {:.2}", command.v, command.w);
//! ```

pub mod batch;
pub mod dynamics;
pub mod generator;
pub mod costs;
pub mod optimizer;
pub mod controller;

// Re-exports
pub use batch::{ColumnView, SampleBatch, SampleRow, TrajectoryBatch, TrajectoryPoint};
pub use dynamics::{FirstOrderLag, IdealTracking, PerSampleDynamics};
pub use generator::TrajectorySampler;
pub use costs::{
    distance_to_segment, linear_velocity_cost, nearest_cost, nearest_points_cost,
    segment_distance_cost, triangle_cost, CostKind,
};
pub use optimizer::SoftmaxWeighting;
pub use controller::MppicController;
