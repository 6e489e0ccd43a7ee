//! One-tick driver of the sampling controller
//!
//! Wires the sampler, a cost evaluator and an optimizer into the receding
//! horizon loop: sample and roll out, score, update the nominal sequence,
//! take the command at the control offset and shift the plan forward.

use log::{debug, trace};

use crate::common::{
    Control, ControlUpdate, DynamicsModel, MppicResult, ReferenceTrajectory, State, TrajectoryCost,
};
use crate::config::ControllerConfig;
use crate::mppic::batch::TrajectoryBatch;
use crate::mppic::costs::CostKind;
use crate::mppic::generator::TrajectorySampler;
use crate::mppic::optimizer::SoftmaxWeighting;

/// Receding horizon controller over a `TrajectorySampler`
pub struct MppicController<M, C = CostKind, U = SoftmaxWeighting> {
    sampler: TrajectorySampler<M>,
    cost: C,
    optimizer: U,
    desired_v: f64,
    control_offset: usize,
    last_trajectories: Option<TrajectoryBatch>,
}

impl<M: DynamicsModel> MppicController<M> {
    /// Controller built entirely from a parameter file
    pub fn from_config(config: &ControllerConfig, model: M) -> MppicResult<Self> {
        config.validate()?;
        let sampler = TrajectorySampler::new(config.mppic.clone(), model)?;
        let optimizer = SoftmaxWeighting::new(config.optimizer.temperature)?;
        Ok(Self::new(
            sampler,
            config.cost.kind,
            optimizer,
            config.cost.desired_v,
            config.optimizer.control_offset,
        ))
    }
}

impl<M, C, U> MppicController<M, C, U>
where
    M: DynamicsModel,
    C: TrajectoryCost,
    U: ControlUpdate,
{
    pub fn new(
        sampler: TrajectorySampler<M>,
        cost: C,
        optimizer: U,
        desired_v: f64,
        control_offset: usize,
    ) -> Self {
        Self {
            sampler,
            cost,
            optimizer,
            desired_v,
            control_offset,
            last_trajectories: None,
        }
    }

    pub fn sampler(&self) -> &TrajectorySampler<M> {
        &self.sampler
    }

    pub fn sampler_mut(&mut self) -> &mut TrajectorySampler<M> {
        &mut self.sampler
    }

    pub fn desired_v(&self) -> f64 {
        self.desired_v
    }

    pub fn set_desired_v(&mut self, desired_v: f64) {
        self.desired_v = desired_v;
    }

    /// Trajectories sampled on the most recent tick
    pub fn last_trajectories(&self) -> Option<&TrajectoryBatch> {
        self.last_trajectories.as_ref()
    }

    /// Run one control cycle and return the command to execute
    ///
    /// On error the nominal sequence is left as it was before the tick.
    pub fn tick(&mut self, state: State, reference: &ReferenceTrajectory) -> MppicResult<Control> {
        self.sampler.set_state(state);
        let trajectories = self.sampler.generate_trajectories();

        let costs = self.cost.evaluate(&trajectories, reference, self.desired_v)?;
        trace!("trajectory costs: min {:.4}, max {:.4}", costs.min(), costs.max());

        let sequence = self.optimizer.update(self.sampler.samples(), &costs)?;
        self.sampler.set_control_seq(sequence)?;

        let control = self.sampler.get_control(self.control_offset);
        self.sampler.displace_controls(self.control_offset);
        debug!("tick command: v = {:.3}, w = {:.3}", control.v, control.w);

        self.last_trajectories = Some(trajectories);
        Ok(control)
    }
}
