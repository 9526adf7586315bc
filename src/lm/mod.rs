//! Levenberg-Marquardt algorithm implementation.
//!
//! This module provides the damped Gauss-Newton solver that drives the peak
//! fits. It works on any [`crate::problem::Problem`].

pub mod algorithm;
pub mod config;
pub mod convergence;

// Re-export key types
pub use algorithm::{LevenbergMarquardt, LmResult};
pub use config::{DecompositionMethod, DiffMethod, LmConfig};
pub use convergence::{ConvergenceCriteria, ConvergenceStatus};
