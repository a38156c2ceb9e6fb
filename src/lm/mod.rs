//! Levenberg-Marquardt algorithm implementation.
//!
//! This module provides a bounded Levenberg-Marquardt solver for the nonlinear
//! least-squares problems that come up while fitting a spectrum: background
//! trends and sums of Gaussians. Box constraints are handled by projection.

pub mod algorithm;
pub mod config;
pub mod convergence;
pub mod step;
pub mod trust_region;

// Re-export key types
pub use algorithm::{LevenbergMarquardt, LmResult};
pub use config::LmConfig;
pub use convergence::{ConvergenceCriteria, ConvergenceStatus};
pub use step::{LmStep, StepResult};
pub use trust_region::TrustRegion;
