//! # Uncertainty Calculation
//!
//! Standard errors of fitted peak parameters from the Jacobian at the
//! solution, following the usual `s²(JᵀJ)⁻¹` estimate with
//! `s² = chisqr / (ndata - nparams)`.

mod covariance;

pub use covariance::{calculate_correlation, calculate_covariance, standard_errors_from_covariance};

use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::error::{DeconvError, Result};

/// Structure to hold uncertainty calculation results.
#[derive(Debug, Clone, Serialize)]
pub struct UncertaintyResult {
    /// Covariance matrix for the parameters
    pub covariance: Array2<f64>,
    /// Correlation matrix derived from covariance
    pub correlation: Array2<f64>,
    /// Standard error for each parameter, in packed order
    pub standard_errors: Array1<f64>,
    /// Chi-square value at minimum
    pub chisqr: f64,
    /// Reduced chi-square (chi^2 / nfree)
    pub redchi: f64,
    /// Degrees of freedom (n_points - n_parameters)
    pub nfree: usize,
}

impl UncertaintyResult {
    /// Estimate parameter uncertainties from the Jacobian at the solution.
    ///
    /// Needs more residuals than parameters; a square or wide Jacobian leaves
    /// no degrees of freedom and is reported as a dimension mismatch.
    pub fn from_jacobian(jacobian: &Array2<f64>, chisqr: f64) -> Result<Self> {
        let (ndata, nparams) = jacobian.dim();
        if ndata <= nparams {
            return Err(DeconvError::DimensionMismatch(format!(
                "{ndata} residuals leave no degrees of freedom for {nparams} parameters"
            )));
        }

        let nfree = ndata - nparams;
        let redchi = chisqr / nfree as f64;
        let covariance = calculate_covariance(jacobian, redchi)?;
        let correlation = calculate_correlation(&covariance);
        let standard_errors = standard_errors_from_covariance(&covariance);

        Ok(Self {
            covariance,
            correlation,
            standard_errors,
            chisqr,
            redchi,
            nfree,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr2, Array2};

    #[test]
    fn test_straight_line_standard_errors() {
        // y = a*x + b over x = 0..4, Jacobian columns are x and 1
        let jacobian = Array2::from_shape_fn((5, 2), |(i, j)| if j == 0 { i as f64 } else { 1.0 });
        let result = UncertaintyResult::from_jacobian(&jacobian, 3.0).unwrap();

        assert_eq!(result.nfree, 3);
        assert_relative_eq!(result.redchi, 1.0);
        // Var(a) = s²/Sxx with Sxx = 10
        assert_relative_eq!(result.standard_errors[0], (1.0f64 / 10.0).sqrt(), epsilon = 1e-10);
        // Var(b) = s²(1/n + mean²/Sxx) = 1/5 + 4/10
        assert_relative_eq!(result.standard_errors[1], 0.6f64.sqrt(), epsilon = 1e-10);
    }

    #[test]
    fn test_no_degrees_of_freedom() {
        let jacobian = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        assert!(UncertaintyResult::from_jacobian(&jacobian, 1.0).is_err());
    }
}
