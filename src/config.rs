//! Controller configuration
//!
//! Every section deserializes from TOML with per-field defaults, so a
//! parameter file only needs the values it overrides:
//!
//! ```toml
//! [mppic]
//! batch_size = 200
//! limit_v = 0.8
//!
//! [cost]
//! kind = "nearest"
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::common::{MppicError, MppicResult};
use crate::mppic::costs::CostKind;

/// Feedback law limits of the robot
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RosbotParams {
    /// Linear velocity gain [m/s]
    pub v_max: f64,
    /// Angular velocity gain [rad/s]
    pub w_max: f64,
    /// Goal tolerance, compared against the *squared* distance [m^2]
    pub xy_margin_squared: f64,
}

impl Default for RosbotParams {
    fn default() -> Self {
        Self {
            v_max: 5.0,
            w_max: 1.5,
            xy_margin_squared: 0.05,
        }
    }
}

impl RosbotParams {
    pub fn validate(&self) -> MppicResult<()> {
        ensure_non_negative("v_max", self.v_max)?;
        ensure_non_negative("w_max", self.w_max)?;
        ensure_non_negative("xy_margin_squared", self.xy_margin_squared)
    }
}

/// Sampling parameters of the trajectory generator
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MppicConfig {
    /// Control frequency [Hz]; the rollout step is `1 / freq`
    pub freq: f64,
    /// Horizon length in steps
    pub time_steps: usize,
    /// Number of sampled control sequences
    pub batch_size: usize,
    /// Exploration noise std-dev on linear velocity
    pub v_std: f64,
    /// Exploration noise std-dev on angular velocity
    pub w_std: f64,
    /// Linear velocity command limit (symmetric)
    pub limit_v: f64,
    /// Angular velocity command limit (symmetric)
    pub limit_w: f64,
}

impl Default for MppicConfig {
    fn default() -> Self {
        Self {
            freq: 30.0,
            time_steps: 50,
            batch_size: 100,
            v_std: 0.1,
            w_std: 0.1,
            limit_v: 0.5,
            limit_w: 0.7,
        }
    }
}

impl MppicConfig {
    pub fn dt(&self) -> f64 {
        1.0 / self.freq
    }

    pub fn validate(&self) -> MppicResult<()> {
        if !(self.freq.is_finite() && self.freq > 0.0) {
            return Err(MppicError::InvalidParameter(format!(
                "freq must be positive, got {}",
                self.freq
            )));
        }
        if self.time_steps == 0 {
            return Err(MppicError::InvalidParameter(
                "time_steps must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(MppicError::InvalidParameter(
                "batch_size must be at least 1".to_string(),
            ));
        }
        ensure_non_negative("v_std", self.v_std)?;
        ensure_non_negative("w_std", self.w_std)?;
        ensure_non_negative("limit_v", self.limit_v)?;
        ensure_non_negative("limit_w", self.limit_w)
    }
}

/// Trajectory scoring parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub kind: CostKind,
    /// Cruising speed the velocity term pulls towards [m/s]
    pub desired_v: f64,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            kind: CostKind::Triangle,
            desired_v: 0.5,
        }
    }
}

/// Importance weighting parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Softmax temperature (lambda)
    pub temperature: f64,
    /// Horizon index of the executed command; also the warm start shift
    pub control_offset: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            control_offset: 1,
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> MppicResult<()> {
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(MppicError::InvalidParameter(format!(
                "temperature must be positive, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// Full parameter file of the controller
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub rosbot: RosbotParams,
    pub mppic: MppicConfig,
    pub cost: CostConfig,
    pub optimizer: OptimizerConfig,
}

impl ControllerConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> MppicResult<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML parameter file
    pub fn load<P: AsRef<Path>>(path: P) -> MppicResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> MppicResult<()> {
        self.rosbot.validate()?;
        self.mppic.validate()?;
        self.optimizer.validate()?;
        if !self.cost.desired_v.is_finite() {
            return Err(MppicError::InvalidParameter(
                "desired_v must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

fn ensure_non_negative(name: &str, value: f64) -> MppicResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(MppicError::InvalidParameter(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )))
    }
}
