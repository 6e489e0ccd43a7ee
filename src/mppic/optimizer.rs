//! Importance-weighted update of the nominal control sequence
//!
//! Each sample gets the weight `exp(-(c - c_min) / lambda)`, normalized over
//! the batch, and the new nominal command at every step is the weighted
//! mean of the sampled commands at that step.

use log::warn;
use nalgebra::DVector;
use rayon::prelude::*;

use crate::common::{Control, ControlUpdate, MppicError, MppicResult};
use crate::config::OptimizerConfig;
use crate::mppic::batch::SampleBatch;

/// Softmax weighting over negative costs
#[derive(Debug, Clone)]
pub struct SoftmaxWeighting {
    temperature: f64,
}

impl SoftmaxWeighting {
    pub fn new(temperature: f64) -> MppicResult<Self> {
        OptimizerConfig {
            temperature,
            ..OptimizerConfig::default()
        }
        .validate()?;
        Ok(Self { temperature })
    }

    pub fn with_defaults() -> Self {
        Self {
            temperature: OptimizerConfig::default().temperature,
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Normalized importance weights, one per sample
    pub fn weights(&self, costs: &DVector<f64>) -> MppicResult<DVector<f64>> {
        if costs.is_empty() {
            return Err(MppicError::NumericalError("no costs to weight".to_string()));
        }
        if costs.iter().any(|c| c.is_nan()) {
            return Err(MppicError::NumericalError("NaN trajectory cost".to_string()));
        }
        let min_cost = costs.min();
        if !min_cost.is_finite() {
            return Err(MppicError::NumericalError(format!(
                "lowest trajectory cost is {}",
                min_cost
            )));
        }

        let lambda = self.temperature;
        let mut weights = costs.map(|c| (-(c - min_cost) / lambda).exp());
        let sum = weights.sum();
        // the cheapest sample always contributes exp(0) = 1
        if !(sum.is_finite() && sum >= 1.0) {
            warn!("degenerate importance weights, sum = {}", sum);
            return Err(MppicError::NumericalError(format!(
                "weight normalizer is {}",
                sum
            )));
        }
        weights /= sum;
        Ok(weights)
    }
}

impl Default for SoftmaxWeighting {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ControlUpdate for SoftmaxWeighting {
    fn update(&self, samples: &SampleBatch, costs: &DVector<f64>) -> MppicResult<Vec<Control>> {
        if costs.len() != samples.batch_size() {
            return Err(MppicError::InvalidParameter(format!(
                "expected {} costs, got {}",
                samples.batch_size(),
                costs.len()
            )));
        }
        let weights = self.weights(costs)?;
        let controls = samples.controls();

        let sequence = (0..samples.time_steps())
            .into_par_iter()
            .map(|t| {
                controls
                    .at_step(t)
                    .zip(weights.iter())
                    .fold(Control::zero(), |acc, (c, w)| {
                        Control::new(acc.v + w * c.v, acc.w + w * c.w)
                    })
            })
            .collect();
        Ok(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mppic::batch::SampleRow;
    use approx::assert_abs_diff_eq;

    fn batch_with_commands(commands: &[Control], time_steps: usize) -> SampleBatch {
        let mut batch = SampleBatch::new(commands.len(), time_steps, 0.1);
        for t in 0..time_steps {
            for (row, c) in batch.step_mut(t).iter_mut().zip(commands) {
                *row = SampleRow::new(Control::zero(), *c, 0.1);
            }
        }
        batch
    }

    #[test]
    fn test_rejects_bad_temperature() {
        assert!(SoftmaxWeighting::new(0.0).is_err());
        assert!(SoftmaxWeighting::new(-1.0).is_err());
        assert!(SoftmaxWeighting::new(0.5).is_ok());
    }

    #[test]
    fn test_weights_normalized_and_ordered() {
        let opt = SoftmaxWeighting::new(1.0).unwrap();
        let weights = opt.weights(&DVector::from_vec(vec![3.0, 1.0, 2.0])).unwrap();
        assert_abs_diff_eq!(weights.sum(), 1.0, epsilon = 1e-12);
        assert!(weights[1] > weights[2] && weights[2] > weights[0]);
        assert_abs_diff_eq!(weights[1] / weights[2], std::f64::consts::E, epsilon = 1e-9);
    }

    #[test]
    fn test_weights_survive_large_costs() {
        let opt = SoftmaxWeighting::new(0.1).unwrap();
        let weights = opt.weights(&DVector::from_vec(vec![1e6, 1e6 + 1.0])).unwrap();
        assert!(weights.iter().all(|w| w.is_finite()));
        assert!(weights[0] > 0.99);
    }

    #[test]
    fn test_weights_reject_nan() {
        let opt = SoftmaxWeighting::default();
        assert!(opt.weights(&DVector::from_vec(vec![1.0, f64::NAN])).is_err());
    }

    #[test]
    fn test_update_is_weighted_mean() {
        let commands = [Control::new(0.2, 0.0), Control::new(0.4, 0.2)];
        let batch = batch_with_commands(&commands, 3);
        // equal costs: plain average
        let seq = SoftmaxWeighting::default()
            .update(&batch, &DVector::from_vec(vec![5.0, 5.0]))
            .unwrap();
        assert_eq!(seq.len(), 3);
        for c in &seq {
            assert_abs_diff_eq!(c.v, 0.3, epsilon = 1e-12);
            assert_abs_diff_eq!(c.w, 0.1, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_update_follows_cheapest_sample() {
        let commands = [Control::new(0.5, 0.1), Control::new(-0.5, -0.1)];
        let batch = batch_with_commands(&commands, 2);
        let seq = SoftmaxWeighting::new(0.01)
            .unwrap()
            .update(&batch, &DVector::from_vec(vec![0.0, 10.0]))
            .unwrap();
        assert_abs_diff_eq!(seq[0].v, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(seq[1].w, 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_update_checks_cost_length() {
        let batch = batch_with_commands(&[Control::zero(); 3], 2);
        let result = SoftmaxWeighting::default().update(&batch, &DVector::from_vec(vec![1.0]));
        assert!(matches!(result, Err(MppicError::InvalidParameter(_))));
    }
}
