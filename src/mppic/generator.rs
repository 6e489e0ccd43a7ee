//! Trajectory sampler of the MPPI controller
//!
//! Keeps the nominal control sequence, perturbs it with Gaussian noise into
//! a batch of candidate sequences and rolls them forward. Velocities are
//! propagated through the injected dynamics model one time step at a time
//! (each step covers the whole batch), then poses are integrated per
//! sample with forward Euler.

use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

use crate::common::{Control, DynamicsModel, MppicError, MppicResult, State};
use crate::config::MppicConfig;
use crate::mppic::batch::{ColumnView, SampleBatch, TrajectoryBatch, TrajectoryPoint};

/// Samples and propagates candidate control sequences
pub struct TrajectorySampler<M> {
    config: MppicConfig,
    dt: f64,
    state: State,
    control_seq: Vec<Control>,
    samples: SampleBatch,
    /// Scratch output of the dynamics model, one entry per sample
    predicted: Vec<Control>,
    model: M,
    rng: StdRng,
    v_noise: Normal<f64>,
    w_noise: Normal<f64>,
}

impl<M: DynamicsModel> TrajectorySampler<M> {
    /// Create a sampler seeded from system entropy
    pub fn new(config: MppicConfig, model: M) -> MppicResult<Self> {
        Self::with_rng(config, model, StdRng::from_entropy())
    }

    /// Create a sampler with a reproducible noise sequence
    pub fn with_seed(config: MppicConfig, model: M, seed: u64) -> MppicResult<Self> {
        Self::with_rng(config, model, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: MppicConfig, model: M, rng: StdRng) -> MppicResult<Self> {
        config.validate()?;
        let v_noise = Normal::new(0.0, config.v_std)
            .map_err(|e| MppicError::InvalidParameter(format!("v_std: {}", e)))?;
        let w_noise = Normal::new(0.0, config.w_std)
            .map_err(|e| MppicError::InvalidParameter(format!("w_std: {}", e)))?;

        let dt = config.dt();
        info!(
            "trajectory sampler: {} samples x {} steps, dt = {:.4} s",
            config.batch_size, config.time_steps, dt
        );

        Ok(Self {
            dt,
            state: State::default(),
            control_seq: vec![Control::zero(); config.time_steps],
            samples: SampleBatch::new(config.batch_size, config.time_steps, dt),
            predicted: vec![Control::zero(); config.batch_size],
            model,
            rng,
            v_noise,
            w_noise,
            config,
        })
    }

    pub fn config(&self) -> &MppicConfig {
        &self.config
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    pub fn time_steps(&self) -> usize {
        self.config.time_steps
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Set the measured pose and velocity every rollout starts from
    pub fn set_state(&mut self, state: State) {
        self.state = state;
    }

    pub fn control_seq(&self) -> &[Control] {
        &self.control_seq
    }

    /// Replace the nominal control sequence
    pub fn set_control_seq(&mut self, control_seq: Vec<Control>) -> MppicResult<()> {
        if control_seq.len() != self.config.time_steps {
            return Err(MppicError::InvalidParameter(format!(
                "control sequence must have {} entries, got {}",
                self.config.time_steps,
                control_seq.len()
            )));
        }
        self.control_seq = control_seq;
        Ok(())
    }

    pub fn samples(&self) -> &SampleBatch {
        &self.samples
    }

    pub fn get_velocities_batch(&self) -> ColumnView<'_> {
        self.samples.velocities()
    }

    pub fn get_controls_batch(&self) -> ColumnView<'_> {
        self.samples.controls()
    }

    /// Nominal command at horizon index `offset`, clamped to the last step
    pub fn get_control(&self, offset: usize) -> Control {
        let offset = offset.min(self.config.time_steps - 1);
        self.control_seq[offset]
    }

    /// Shift the nominal sequence forward by `offset` steps
    ///
    /// The tail is padded with the last command so the length is preserved.
    pub fn displace_controls(&mut self, offset: usize) {
        if offset == 0 {
            return;
        }
        let n = self.control_seq.len();
        let last = self.control_seq[n - 1];
        let shift = offset.min(n);
        self.control_seq.rotate_left(shift);
        for c in &mut self.control_seq[n - shift..] {
            *c = last;
        }
    }

    /// Sample, propagate and return a fresh batch of trajectories
    pub fn generate_trajectories(&mut self) -> TrajectoryBatch {
        self.update_samples();
        self.propagate_velocities();
        let trajectories = self.propagate_poses();
        debug!(
            "generated {} trajectories from ({:.3}, {:.3}, {:.3})",
            trajectories.batch_size(),
            self.state.x,
            self.state.y,
            self.state.yaw
        );
        trajectories
    }

    /// Perturb the nominal sequence, clip to limits and anchor step 0
    fn update_samples(&mut self) {
        let batch_size = self.config.batch_size;
        let (limit_v, limit_w) = (self.config.limit_v, self.config.limit_w);
        let anchor = self.state.velocity();

        // noise is drawn sequentially so a seeded sampler is reproducible
        let rng = &mut self.rng;
        let (v_noise, w_noise) = (&self.v_noise, &self.w_noise);
        for (i, row) in self.samples.rows_mut().iter_mut().enumerate() {
            let nominal = self.control_seq[i / batch_size];
            row.v_cmd = (nominal.v + v_noise.sample(rng)).clamp(-limit_v, limit_v);
            row.w_cmd = (nominal.w + w_noise.sample(rng)).clamp(-limit_w, limit_w);
        }

        self.samples
            .step_mut(0)
            .par_iter_mut()
            .for_each(|row| row.set_velocity(anchor));
    }

    /// Roll velocities forward through the dynamics model
    ///
    /// Sequential over time; the model sees all samples of a step at once.
    fn propagate_velocities(&mut self) {
        for t in 0..self.config.time_steps.saturating_sub(1) {
            let (current, next) = self.samples.step_pair_mut(t);
            self.model.predict(current, &mut self.predicted);
            next.par_iter_mut()
                .zip(self.predicted.par_iter())
                .for_each(|(row, v)| row.set_velocity(*v));
        }
        trace!("propagated velocities over {} steps", self.config.time_steps);
    }

    /// Integrate poses from the rolled-out velocities
    ///
    /// Forward Euler anchored on the current pose: step 0 is the current
    /// pose and step `t` applies the velocity of step `t` after updating yaw.
    fn propagate_poses(&self) -> TrajectoryBatch {
        let dt = self.dt;
        let start = self.state;
        let samples = &self.samples;
        let mut trajectories = TrajectoryBatch::new(self.config.batch_size, self.config.time_steps);

        trajectories
            .par_samples_mut()
            .enumerate()
            .for_each(|(b, points)| {
                let (mut x, mut y, mut yaw) = (start.x, start.y, start.yaw);
                for (t, point) in points.iter_mut().enumerate() {
                    let row = samples.row(b, t);
                    if t > 0 {
                        yaw += row.w * dt;
                        x += row.v * yaw.cos() * dt;
                        y += row.v * yaw.sin() * dt;
                    }
                    *point = TrajectoryPoint {
                        x,
                        y,
                        yaw,
                        v: row.v,
                        w: row.w,
                        v_cmd: row.v_cmd,
                        w_cmd: row.w_cmd,
                    };
                }
            });

        trajectories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mppic::dynamics::{IdealTracking, PerSampleDynamics};
    use crate::mppic::batch::SampleRow;
    use approx::assert_abs_diff_eq;

    fn config(batch_size: usize, time_steps: usize) -> MppicConfig {
        MppicConfig {
            batch_size,
            time_steps,
            freq: 10.0,
            ..MppicConfig::default()
        }
    }

    fn ramp(n: usize) -> Vec<Control> {
        (0..n).map(|i| Control::new(i as f64, -(i as f64))).collect()
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(TrajectorySampler::new(config(0, 10), IdealTracking).is_err());
        assert!(TrajectorySampler::new(config(10, 0), IdealTracking).is_err());
    }

    #[test]
    fn test_set_control_seq_checks_length() {
        let mut sampler = TrajectorySampler::with_seed(config(4, 5), IdealTracking, 1).unwrap();
        assert!(sampler.set_control_seq(ramp(4)).is_err());
        assert!(sampler.set_control_seq(ramp(5)).is_ok());
        assert_eq!(sampler.control_seq(), ramp(5).as_slice());
    }

    #[test]
    fn test_get_control_clamps_offset() {
        let mut sampler = TrajectorySampler::with_seed(config(4, 5), IdealTracking, 1).unwrap();
        sampler.set_control_seq(ramp(5)).unwrap();
        assert_eq!(sampler.get_control(0), Control::new(0.0, 0.0));
        assert_eq!(sampler.get_control(3), Control::new(3.0, -3.0));
        assert_eq!(sampler.get_control(100), Control::new(4.0, -4.0));
    }

    #[test]
    fn test_displace_controls_zero_is_noop() {
        let mut sampler = TrajectorySampler::with_seed(config(4, 5), IdealTracking, 1).unwrap();
        sampler.set_control_seq(ramp(5)).unwrap();
        sampler.displace_controls(0);
        assert_eq!(sampler.control_seq(), ramp(5).as_slice());
    }

    #[test]
    fn test_displace_controls_shifts_and_pads() {
        let mut sampler = TrajectorySampler::with_seed(config(4, 5), IdealTracking, 1).unwrap();
        sampler.set_control_seq(ramp(5)).unwrap();
        sampler.displace_controls(2);
        let v: Vec<f64> = sampler.control_seq().iter().map(|c| c.v).collect();
        assert_eq!(v, vec![2.0, 3.0, 4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_displace_controls_past_horizon() {
        for offset in [5, 6, 50] {
            let mut sampler = TrajectorySampler::with_seed(config(4, 5), IdealTracking, 1).unwrap();
            sampler.set_control_seq(ramp(5)).unwrap();
            sampler.displace_controls(offset);
            assert!(sampler.control_seq().iter().all(|c| *c == Control::new(4.0, -4.0)));
        }
    }

    #[test]
    fn test_sampled_controls_respect_limits() {
        let cfg = MppicConfig {
            v_std: 2.0,
            w_std: 2.0,
            ..config(64, 20)
        };
        let mut sampler = TrajectorySampler::with_seed(cfg.clone(), IdealTracking, 7).unwrap();
        sampler
            .set_control_seq(vec![Control::new(0.45, -0.6); 20])
            .unwrap();
        sampler.generate_trajectories();

        let controls = sampler.get_controls_batch();
        for b in 0..64 {
            for c in controls.sample(b) {
                assert!(c.v.abs() <= cfg.limit_v);
                assert!(c.w.abs() <= cfg.limit_w);
            }
        }

        // noise this wide must saturate every bound somewhere in the batch
        let all: Vec<Control> = (0..64).flat_map(|b| controls.sample(b)).collect();
        assert!(all.iter().any(|c| c.v == cfg.limit_v));
        assert!(all.iter().any(|c| c.v == -cfg.limit_v));
        assert!(all.iter().any(|c| c.w == cfg.limit_w));
        assert!(all.iter().any(|c| c.w == -cfg.limit_w));
    }

    #[test]
    fn test_zero_noise_reproduces_nominal() {
        let cfg = MppicConfig {
            v_std: 0.0,
            w_std: 0.0,
            ..config(16, 8)
        };
        let mut sampler = TrajectorySampler::with_seed(cfg, IdealTracking, 5).unwrap();
        let nominal: Vec<Control> = (0..8).map(|t| Control::new(0.05 * t as f64, -0.1)).collect();
        sampler.set_control_seq(nominal.clone()).unwrap();
        sampler.generate_trajectories();

        let controls = sampler.get_controls_batch();
        for b in 0..16 {
            let sampled: Vec<Control> = controls.sample(b).collect();
            assert_eq!(sampled, nominal);
        }
    }

    #[test]
    fn test_noise_matches_configured_spread() {
        let (v_std, w_std) = (0.05, 0.08);
        let cfg = MppicConfig {
            v_std,
            w_std,
            ..config(200, 50)
        };
        let mut sampler = TrajectorySampler::with_seed(cfg, IdealTracking, 23).unwrap();
        sampler.generate_trajectories();

        let controls = sampler.get_controls_batch();
        let all: Vec<Control> = (0..200).flat_map(|b| controls.sample(b)).collect();
        let n = all.len() as f64;
        let mean_v = all.iter().map(|c| c.v).sum::<f64>() / n;
        let mean_w = all.iter().map(|c| c.w).sum::<f64>() / n;
        let std_v = (all.iter().map(|c| (c.v - mean_v).powi(2)).sum::<f64>() / n).sqrt();
        let std_w = (all.iter().map(|c| (c.w - mean_w).powi(2)).sum::<f64>() / n).sqrt();
        let cov = all.iter().map(|c| (c.v - mean_v) * (c.w - mean_w)).sum::<f64>() / n;

        assert_abs_diff_eq!(mean_v, 0.0, epsilon = 0.005);
        assert_abs_diff_eq!(mean_w, 0.0, epsilon = 0.008);
        assert_abs_diff_eq!(std_v, v_std, epsilon = 0.05 * v_std);
        assert_abs_diff_eq!(std_w, w_std, epsilon = 0.05 * w_std);
        // axes are perturbed independently
        assert!((cov / (std_v * std_w)).abs() < 0.05);

        // samples differ from each other at every step
        for t in 0..50 {
            let step: Vec<Control> = controls.at_step(t).collect();
            assert!(step.iter().any(|c| c.v != step[0].v));
            assert!(step.iter().any(|c| c.w != step[0].w));
        }
    }

    #[test]
    fn test_anchor_row_is_measured_velocity() {
        let mut sampler = TrajectorySampler::with_seed(config(8, 6), IdealTracking, 3).unwrap();
        sampler.set_state(State::new(0.0, 0.0, 0.0, 0.25, -0.1));
        let trajectories = sampler.generate_trajectories();
        for b in 0..8 {
            assert_eq!(sampler.get_velocities_batch().get(b, 0), Control::new(0.25, -0.1));
            assert_eq!(trajectories.sample(b)[0].v, 0.25);
        }
    }

    #[test]
    fn test_velocity_recurrence_uses_previous_step() {
        // each step adds the command to the previous velocity
        let model = PerSampleDynamics::new(|r: &SampleRow| Control::new(r.v + r.v_cmd, r.w + r.w_cmd));
        let cfg = MppicConfig {
            v_std: 0.0,
            w_std: 0.0,
            ..config(3, 4)
        };
        let mut sampler = TrajectorySampler::with_seed(cfg, model, 0).unwrap();
        sampler.set_control_seq(vec![Control::new(0.1, 0.05); 4]).unwrap();
        sampler.generate_trajectories();

        let velocities = sampler.get_velocities_batch();
        for b in 0..3 {
            for t in 0..4 {
                assert_abs_diff_eq!(velocities.get(b, t).v, 0.1 * t as f64, epsilon = 1e-12);
                assert_abs_diff_eq!(velocities.get(b, t).w, 0.05 * t as f64, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_pose_propagation_straight() {
        let cfg = MppicConfig {
            v_std: 0.0,
            w_std: 0.0,
            ..config(2, 5)
        };
        let mut sampler = TrajectorySampler::with_seed(cfg, IdealTracking, 0).unwrap();
        sampler.set_state(State::new(1.0, 2.0, std::f64::consts::FRAC_PI_2, 0.4, 0.0));
        sampler.set_control_seq(vec![Control::new(0.4, 0.0); 5]).unwrap();
        let trajectories = sampler.generate_trajectories();

        for sample in trajectories.samples() {
            for (t, p) in sample.iter().enumerate() {
                assert_abs_diff_eq!(p.x, 1.0, epsilon = 1e-12);
                assert_abs_diff_eq!(p.y, 2.0 + 0.04 * t as f64, epsilon = 1e-12);
                assert_abs_diff_eq!(p.yaw, std::f64::consts::FRAC_PI_2, epsilon = 1e-12);
                assert_eq!(p.v_cmd, 0.4);
            }
        }
    }

    #[test]
    fn test_pose_propagation_turning() {
        let cfg = MppicConfig {
            v_std: 0.0,
            w_std: 0.0,
            ..config(1, 3)
        };
        let mut sampler = TrajectorySampler::with_seed(cfg, IdealTracking, 0).unwrap();
        sampler.set_state(State::new(0.0, 0.0, 0.0, 0.5, 0.5));
        sampler.set_control_seq(vec![Control::new(0.5, 0.5); 3]).unwrap();
        let traj = sampler.generate_trajectories();
        let points = traj.sample(0);

        assert_eq!((points[0].x, points[0].y, points[0].yaw), (0.0, 0.0, 0.0));
        let yaw1 = 0.05;
        assert_abs_diff_eq!(points[1].yaw, yaw1, epsilon = 1e-12);
        assert_abs_diff_eq!(points[1].x, 0.05 * yaw1.cos(), epsilon = 1e-12);
        assert_abs_diff_eq!(points[1].y, 0.05 * yaw1.sin(), epsilon = 1e-12);
        let yaw2 = 0.1;
        assert_abs_diff_eq!(points[2].yaw, yaw2, epsilon = 1e-12);
        assert_abs_diff_eq!(points[2].x, 0.05 * (yaw1.cos() + yaw2.cos()), epsilon = 1e-12);
    }

    #[test]
    fn test_generate_does_not_touch_nominal_sequence() {
        let mut sampler = TrajectorySampler::with_seed(config(16, 5), IdealTracking, 11).unwrap();
        sampler.set_control_seq(vec![Control::new(0.2, 0.1); 5]).unwrap();
        sampler.generate_trajectories();
        assert!(sampler.control_seq().iter().all(|c| *c == Control::new(0.2, 0.1)));
    }

    #[test]
    fn test_seeded_sampler_is_reproducible() {
        let mut a = TrajectorySampler::with_seed(config(8, 6), IdealTracking, 42).unwrap();
        let mut b = TrajectorySampler::with_seed(config(8, 6), IdealTracking, 42).unwrap();
        let ta = a.generate_trajectories();
        let tb = b.generate_trajectories();
        for (sa, sb) in ta.samples().zip(tb.samples()) {
            assert_eq!(sa, sb);
        }
    }
}
