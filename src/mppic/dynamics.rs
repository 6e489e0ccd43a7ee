//! Stock velocity models for the trajectory sampler
//!
//! The sampler treats the motion model as an opaque `DynamicsModel`. A
//! learned model plugs in through the same trait; these are the analytic
//! stand-ins used in simulation and tests.

use rayon::prelude::*;

use crate::common::{Control, DynamicsModel};
use crate::mppic::batch::SampleRow;

/// The robot reaches the commanded velocity within one step
#[derive(Debug, Clone, Copy, Default)]
pub struct IdealTracking;

impl DynamicsModel for IdealTracking {
    fn predict(&self, rows: &[SampleRow], next: &mut [Control]) {
        next.par_iter_mut()
            .zip(rows.par_iter())
            .for_each(|(out, row)| *out = row.command());
    }
}

/// First-order lag towards the commanded velocity
///
/// `v' = v + k_v * (v_cmd - v) * dt`, and likewise for `w`. Gains are
/// inverse time constants [1/s].
#[derive(Debug, Clone, Copy)]
pub struct FirstOrderLag {
    pub k_v: f64,
    pub k_w: f64,
}

impl FirstOrderLag {
    pub fn new(k_v: f64, k_w: f64) -> Self {
        Self { k_v, k_w }
    }
}

impl Default for FirstOrderLag {
    fn default() -> Self {
        Self { k_v: 5.0, k_w: 8.0 }
    }
}

impl DynamicsModel for FirstOrderLag {
    fn predict(&self, rows: &[SampleRow], next: &mut [Control]) {
        let (k_v, k_w) = (self.k_v, self.k_w);
        next.par_iter_mut().zip(rows.par_iter()).for_each(|(out, r)| {
            // clamp the blend so large gains do not overshoot the command
            let a_v = (k_v * r.dt).min(1.0);
            let a_w = (k_w * r.dt).min(1.0);
            *out = Control::new(r.v + a_v * (r.v_cmd - r.v), r.w + a_w * (r.w_cmd - r.w));
        });
    }
}

/// Adapts a per-row function into a batch model, evaluated in parallel
pub struct PerSampleDynamics<F> {
    f: F,
}

impl<F> PerSampleDynamics<F>
where
    F: Fn(&SampleRow) -> Control + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> DynamicsModel for PerSampleDynamics<F>
where
    F: Fn(&SampleRow) -> Control + Send + Sync,
{
    fn predict(&self, rows: &[SampleRow], next: &mut [Control]) {
        let f = &self.f;
        next.par_iter_mut()
            .zip(rows.par_iter())
            .for_each(|(out, row)| *out = f(row));
    }
}
