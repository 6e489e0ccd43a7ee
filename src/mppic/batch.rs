//! Sample and trajectory buffers
//!
//! `SampleBatch` is the reusable `[batch_size, time_steps]` buffer of
//! sampled controls and rolled-out velocities. It is stored time-major so
//! that every sample at one step is a contiguous slice, which is what the
//! dynamics model consumes. `TrajectoryBatch` is the per-tick output and is
//! stored sample-major so that each rollout is a contiguous slice for the
//! cost evaluators.

use rayon::prelude::*;

use crate::common::{Control, MppicError, MppicResult};

/// One `(sample, step)` entry of the sample buffer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SampleRow {
    /// Rolled-out linear velocity
    pub v: f64,
    /// Rolled-out angular velocity
    pub w: f64,
    /// Sampled linear velocity command
    pub v_cmd: f64,
    /// Sampled angular velocity command
    pub w_cmd: f64,
    /// Step duration
    pub dt: f64,
}

impl SampleRow {
    pub fn new(velocity: Control, command: Control, dt: f64) -> Self {
        Self {
            v: velocity.v,
            w: velocity.w,
            v_cmd: command.v,
            w_cmd: command.w,
            dt,
        }
    }

    pub fn velocity(&self) -> Control {
        Control::new(self.v, self.w)
    }

    pub fn command(&self) -> Control {
        Control::new(self.v_cmd, self.w_cmd)
    }

    pub fn set_velocity(&mut self, velocity: Control) {
        self.v = velocity.v;
        self.w = velocity.w;
    }
}

/// Reusable buffer of sampled control sequences
#[derive(Debug, Clone)]
pub struct SampleBatch {
    rows: Vec<SampleRow>,
    batch_size: usize,
    time_steps: usize,
    dt: f64,
}

impl SampleBatch {
    pub fn new(batch_size: usize, time_steps: usize, dt: f64) -> Self {
        let row = SampleRow { dt, ..SampleRow::default() };
        Self {
            rows: vec![row; batch_size * time_steps],
            batch_size,
            time_steps,
            dt,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn time_steps(&self) -> usize {
        self.time_steps
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// All samples at time step `t`
    pub fn step(&self, t: usize) -> &[SampleRow] {
        &self.rows[t * self.batch_size..(t + 1) * self.batch_size]
    }

    pub fn step_mut(&mut self, t: usize) -> &mut [SampleRow] {
        let b = self.batch_size;
        &mut self.rows[t * b..(t + 1) * b]
    }

    /// Step `t` for reading and step `t + 1` for writing
    pub fn step_pair_mut(&mut self, t: usize) -> (&[SampleRow], &mut [SampleRow]) {
        let b = self.batch_size;
        let (head, tail) = self.rows.split_at_mut((t + 1) * b);
        (&head[t * b..], &mut tail[..b])
    }

    pub fn row(&self, sample: usize, t: usize) -> &SampleRow {
        &self.rows[t * self.batch_size + sample]
    }

    pub fn rows_mut(&mut self) -> &mut [SampleRow] {
        &mut self.rows
    }

    /// Rolled-out velocity columns
    pub fn velocities(&self) -> ColumnView<'_> {
        ColumnView { batch: self, column: Column::Velocity }
    }

    /// Sampled control columns
    pub fn controls(&self) -> ColumnView<'_> {
        ColumnView { batch: self, column: Column::Control }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Velocity,
    Control,
}

/// Read-only view of the velocity or control columns of a `SampleBatch`
#[derive(Debug, Clone, Copy)]
pub struct ColumnView<'a> {
    batch: &'a SampleBatch,
    column: Column,
}

impl<'a> ColumnView<'a> {
    /// `(batch_size, time_steps)`
    pub fn shape(&self) -> (usize, usize) {
        (self.batch.batch_size, self.batch.time_steps)
    }

    pub fn get(&self, sample: usize, t: usize) -> Control {
        pick(self.column, self.batch.row(sample, t))
    }

    /// Values of every sample at step `t`
    pub fn at_step(&self, t: usize) -> impl Iterator<Item = Control> + 'a {
        let batch = self.batch;
        let column = self.column;
        batch.step(t).iter().map(move |r| pick(column, r))
    }

    /// Values of one sample over the horizon
    pub fn sample(&self, sample: usize) -> impl Iterator<Item = Control> + 'a {
        let batch = self.batch;
        let column = self.column;
        (0..batch.time_steps).map(move |t| pick(column, batch.row(sample, t)))
    }
}

fn pick(column: Column, row: &SampleRow) -> Control {
    match column {
        Column::Velocity => row.velocity(),
        Column::Control => row.command(),
    }
}

/// One propagated point of a sampled trajectory
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrajectoryPoint {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    pub v: f64,
    pub w: f64,
    pub v_cmd: f64,
    pub w_cmd: f64,
}

/// Batch of propagated trajectories, `[batch_size, time_steps]`
#[derive(Debug, Clone)]
pub struct TrajectoryBatch {
    points: Vec<TrajectoryPoint>,
    batch_size: usize,
    time_steps: usize,
}

impl TrajectoryBatch {
    pub fn new(batch_size: usize, time_steps: usize) -> Self {
        Self {
            points: vec![TrajectoryPoint::default(); batch_size * time_steps],
            batch_size,
            time_steps,
        }
    }

    /// Build a batch from explicit per-sample trajectories of equal length
    pub fn from_samples(samples: Vec<Vec<TrajectoryPoint>>) -> MppicResult<Self> {
        let batch_size = samples.len();
        let time_steps = samples.first().map_or(0, |s| s.len());
        if time_steps == 0 {
            return Err(MppicError::InvalidParameter(
                "trajectory batch needs at least one sample with one point".to_string(),
            ));
        }
        if let Some((b, s)) = samples.iter().enumerate().find(|(_, s)| s.len() != time_steps) {
            return Err(MppicError::InvalidParameter(format!(
                "trajectory {} has {} points, expected {}",
                b,
                s.len(),
                time_steps
            )));
        }
        Ok(Self {
            points: samples.into_iter().flatten().collect(),
            batch_size,
            time_steps,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn time_steps(&self) -> usize {
        self.time_steps
    }

    pub fn sample(&self, b: usize) -> &[TrajectoryPoint] {
        &self.points[b * self.time_steps..(b + 1) * self.time_steps]
    }

    pub fn samples(&self) -> impl Iterator<Item = &[TrajectoryPoint]> {
        // chunks_exact panics on zero, an empty horizon has no samples to yield
        self.points.chunks(self.time_steps.max(1))
    }

    pub fn par_samples(&self) -> impl IndexedParallelIterator<Item = &[TrajectoryPoint]> {
        self.points.par_chunks(self.time_steps.max(1))
    }

    pub fn par_samples_mut(
        &mut self,
    ) -> impl IndexedParallelIterator<Item = &mut [TrajectoryPoint]> {
        self.points.par_chunks_mut(self.time_steps.max(1))
    }
}
