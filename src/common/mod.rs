//! Common types, traits, and error definitions for rosbot_mppic
//!
//! This module provides the foundational building blocks shared by the
//! kinematic model, the trajectory sampler and the cost evaluators.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
