//! Gaussian peak shapes.
//!
//! Two peak families are supported:
//!
//! - **Symmetric**: `f(x) = a * exp(-(x - b)² / c²)`
//! - **Skew**: `f(x) = a / (c√(2π)) * exp(E(x)) * (1 + erf(d (x - b) / (c√2)))`
//!
//! where the skew exponent `E(x)` is chosen by [`SkewExponent`]. `Literal`
//! evaluates `((-(x - b)²) / 2) * c²`, the arithmetic used to produce
//! historical results, and `Corrected` evaluates the skew-normal exponent
//! `-(x - b)² / (2c²)`.

use std::f64::consts::{PI, SQRT_2};
use std::fmt;
use std::str::FromStr;

use libm::erf;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{DeconvError, Result};

/// Prefix the variant selector may carry, e.g. "Function Type: Symmetric Gaussian".
const SELECTOR_PREFIX: &str = "Function Type:";

/// The peak family a fit is performed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeakShape {
    /// `(amplitude, center, width)`
    Symmetric,
    /// `(amplitude, center, width, skew)`
    Skew,
}

impl PeakShape {
    /// Number of parameters per peak in a packed parameter vector.
    pub const fn stride(&self) -> usize {
        match self {
            PeakShape::Symmetric => 3,
            PeakShape::Skew => 4,
        }
    }

    /// The selector name for this variant.
    pub const fn name(&self) -> &'static str {
        match self {
            PeakShape::Symmetric => "Symmetric Gaussian",
            PeakShape::Skew => "Asymmetric Gaussian",
        }
    }
}

impl fmt::Display for PeakShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PeakShape {
    type Err = DeconvError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let name = trimmed
            .strip_prefix(SELECTOR_PREFIX)
            .unwrap_or(trimmed)
            .trim();
        match name {
            "Symmetric Gaussian" => Ok(PeakShape::Symmetric),
            "Asymmetric Gaussian" => Ok(PeakShape::Skew),
            _ => Err(DeconvError::UnknownVariant(s.to_string())),
        }
    }
}

/// How the exponent of the skew peak is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SkewExponent {
    /// `((-(x - b)²) / 2) * c²`
    #[default]
    Literal,
    /// `-(x - b)² / (2c²)`
    Corrected,
}

/// Parameters of a single peak.
///
/// `skew` is ignored by the symmetric shape and is zero for peaks built with
/// [`PeakParams::symmetric`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PeakParams {
    pub amplitude: f64,
    pub center: f64,
    pub width: f64,
    pub skew: f64,
}

impl PeakParams {
    pub fn symmetric(amplitude: f64, center: f64, width: f64) -> Self {
        Self {
            amplitude,
            center,
            width,
            skew: 0.0,
        }
    }

    pub fn skewed(amplitude: f64, center: f64, width: f64, skew: f64) -> Self {
        Self {
            amplitude,
            center,
            width,
            skew,
        }
    }

    /// Read one peak from a slice holding exactly `shape.stride()` values.
    pub fn from_slice(shape: PeakShape, values: &[f64]) -> Result<Self> {
        match (shape, values) {
            (PeakShape::Symmetric, &[a, b, c]) => Ok(Self::symmetric(a, b, c)),
            (PeakShape::Skew, &[a, b, c, d]) => Ok(Self::skewed(a, b, c, d)),
            _ => Err(DeconvError::DimensionMismatch(format!(
                "A {} peak takes {} parameters, got {}",
                shape,
                shape.stride(),
                values.len()
            ))),
        }
    }

    /// Append this peak's values to `out` in packing order.
    pub fn extend_into(&self, shape: PeakShape, out: &mut Vec<f64>) {
        out.extend_from_slice(&[self.amplitude, self.center, self.width]);
        if shape == PeakShape::Skew {
            out.push(self.skew);
        }
    }

    /// The symmetric peak that a zero-skew peak of these parameters reduces to.
    ///
    /// With `d = 0` the erf factor is 1 and the skew peak is a plain Gaussian of
    /// height `a / (c√(2π))`. Its symmetric width is `√2 / c` under
    /// [`SkewExponent::Literal`] and `√2·c` under [`SkewExponent::Corrected`].
    pub fn symmetric_equivalent(&self, exponent: SkewExponent) -> Self {
        let amplitude = self.amplitude / (self.width * (2.0 * PI).sqrt());
        let width = match exponent {
            SkewExponent::Literal => SQRT_2 / self.width,
            SkewExponent::Corrected => SQRT_2 * self.width,
        };
        Self::symmetric(amplitude, self.center, width)
    }
}

/// A single-peak function: a shape plus the exponent convention for skew peaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeakModel {
    pub shape: PeakShape,
    pub exponent: SkewExponent,
}

impl PeakModel {
    pub fn new(shape: PeakShape, exponent: SkewExponent) -> Self {
        Self { shape, exponent }
    }

    pub fn symmetric() -> Self {
        Self::new(PeakShape::Symmetric, SkewExponent::default())
    }

    pub fn skew(exponent: SkewExponent) -> Self {
        Self::new(PeakShape::Skew, exponent)
    }

    /// Evaluate the peak at a single coordinate.
    ///
    /// A zero width is not guarded against and yields NaN or infinity.
    #[inline]
    pub fn evaluate_at(&self, x: f64, params: &PeakParams) -> f64 {
        let PeakParams {
            amplitude: a,
            center: b,
            width: c,
            skew: d,
        } = *params;
        let offset = x - b;

        match self.shape {
            PeakShape::Symmetric => a * ((-offset.powi(2)) / c.powi(2)).exp(),
            PeakShape::Skew => {
                let amp = a / (c * (2.0 * PI).sqrt());
                let spread = match self.exponent {
                    SkewExponent::Literal => (((-offset.powi(2)) / 2.0) * c.powi(2)).exp(),
                    SkewExponent::Corrected => ((-offset.powi(2)) / (2.0 * c.powi(2))).exp(),
                };
                let skew = 1.0 + erf((d * offset) / (c * SQRT_2));
                amp * spread * skew
            }
        }
    }

    /// Evaluate the peak elementwise over `x`.
    pub fn evaluate(&self, x: &Array1<f64>, params: &PeakParams) -> Array1<f64> {
        x.mapv(|xi| self.evaluate_at(xi, params))
    }

    /// Closed-form integral of the peak over the whole real line.
    ///
    /// The erf factor is odd about the center and integrates to zero, so the
    /// skew value does not enter.
    pub fn total_area(&self, params: &PeakParams) -> f64 {
        let PeakParams {
            amplitude: a,
            width: c,
            ..
        } = *params;
        match (self.shape, self.exponent) {
            (PeakShape::Symmetric, _) => a * c.abs() * PI.sqrt(),
            (PeakShape::Skew, SkewExponent::Literal) => a / (c * c.abs()),
            (PeakShape::Skew, SkewExponent::Corrected) => a * c.signum(),
        }
    }
}
