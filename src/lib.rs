//! # gcdeconv-rs
//!
//! `gcdeconv-rs` splits a chromatography trace into overlapping Gaussian
//! peaks and reports the area of each one.
//!
//! The library provides:
//! - Symmetric and skew Gaussian peak models
//! - A Levenberg-Marquardt least-squares solver that fits all peaks at once
//! - Adaptive Gauss-Kronrod quadrature for per-peak areas
//! - Parameter standard errors from the Jacobian at the solution
//!
//! ## Basic Usage
//!
//! ```
//! use gcdeconv_rs::{deconvolve, DeconvolutionConfig, InitialGuess, PeakShape, SampleSet};
//!
//! let x: Vec<f64> = (0..50).map(|i| i as f64 * 20.0 / 49.0).collect();
//! let y: Vec<f64> = x.iter().map(|t| 5.0 * (-((t - 10.0) / 2.0).powi(2)).exp()).collect();
//! let samples = SampleSet::from_columns(&x, &y).unwrap();
//!
//! let result = deconvolve(
//!     &samples,
//!     &[InitialGuess::from([5.0, 10.0])],
//!     PeakShape::Symmetric,
//!     &DeconvolutionConfig::default(),
//! )
//! .unwrap();
//!
//! assert!((result.areas[0] - 17.72).abs() < 0.1);
//! ```

pub mod error;

pub mod utils;

pub mod problem;

pub mod lm;

pub mod uncertainty;

pub mod models;

pub mod model;

pub mod fit;

pub mod integrate;

pub mod data;

pub mod deconvolve;

// Re-exports for convenience
pub use error::{DeconvError, Result};

pub use lm::{ConvergenceStatus, LevenbergMarquardt, LmConfig, LmResult};

pub use problem::Problem;

pub use models::{PeakModel, PeakParams, PeakShape, SkewExponent};

pub use model::{pack_parameters, sum_evaluate, unpack_parameters, SignalModel, SignalProblem};

pub use fit::{fit, FitReport, FitResult};

pub use integrate::{integrate, peak_areas, quad, QuadratureConfig, QuadratureResult};

pub use data::SampleSet;

pub use deconvolve::{
    deconvolve, deconvolve_many, DeconvolutionConfig, DeconvolutionRequest, DeconvolutionResult,
    InitialGuess, PeakSummary,
};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
