//! Built-in peak models.
//!
//! Chromatography traces are deconvolved into sums of Gaussian-like peaks.
//! This module holds the single-peak functions; [`crate::model`] sums them.

mod peak;

pub use peak::{PeakModel, PeakParams, PeakShape, SkewExponent};
