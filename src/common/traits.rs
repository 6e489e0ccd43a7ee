//! Common traits defining the seams of the sampling controller

use nalgebra::DVector;

use crate::common::error::MppicResult;
use crate::common::types::*;
use crate::mppic::batch::{SampleBatch, SampleRow, TrajectoryBatch};

/// Motion model mapping a state+control row to the next-step velocity
///
/// Called once per time step with every sample of the batch at that step.
/// Implementations must be deterministic for reproducible rollouts and
/// must write exactly one velocity per input row.
pub trait DynamicsModel: Send + Sync {
    /// Predict `next[i]` from `rows[i]`
    fn predict(&self, rows: &[SampleRow], next: &mut [Control]);
}

impl<M: DynamicsModel + ?Sized> DynamicsModel for Box<M> {
    fn predict(&self, rows: &[SampleRow], next: &mut [Control]) {
        (**self).predict(rows, next)
    }
}

/// Scores every trajectory of a batch against a reference path
pub trait TrajectoryCost {
    /// One cost per sample, lower is better
    fn evaluate(
        &self,
        trajectories: &TrajectoryBatch,
        reference: &ReferenceTrajectory,
        desired_v: f64,
    ) -> MppicResult<DVector<f64>>;
}

/// Turns per-sample costs into a new nominal control sequence
pub trait ControlUpdate {
    fn update(&self, samples: &SampleBatch, costs: &DVector<f64>) -> MppicResult<Vec<Control>>;
}
