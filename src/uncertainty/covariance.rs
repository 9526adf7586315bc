//! # Covariance Matrix Calculations
//!
//! Parameter covariance for a least-squares fit is estimated as
//! `covar = redchi * inv(JᵀJ)`, where `J` is the Jacobian of the residuals at
//! the solution and `redchi` the reduced chi-square.

use ndarray::{Array1, Array2};

use crate::error::{DeconvError, Result};
use crate::utils::matrix_convert::{nalgebra_to_ndarray, ndarray_to_nalgebra};

/// Calculate the covariance matrix from a Jacobian matrix.
///
/// Fails with [`DeconvError::LinearAlgebraError`] when `JᵀJ` is singular,
/// which happens when a parameter has no influence on the residuals.
pub fn calculate_covariance(jacobian: &Array2<f64>, redchi: f64) -> Result<Array2<f64>> {
    let jtj = jacobian.t().dot(jacobian);
    let inverse = ndarray_to_nalgebra(&jtj).try_inverse().ok_or_else(|| {
        DeconvError::LinearAlgebraError("JᵀJ is singular, covariance is undefined".to_string())
    })?;

    let covar = nalgebra_to_ndarray(&inverse) * redchi;
    if covar.iter().any(|v| !v.is_finite()) {
        return Err(DeconvError::LinearAlgebraError(
            "covariance matrix has non-finite entries".to_string(),
        ));
    }
    Ok(covar)
}

/// Calculate correlation matrix from covariance matrix.
///
/// `correl[i,j] = covar[i,j] / sqrt(covar[i,i] * covar[j,j])`
pub fn calculate_correlation(covar: &Array2<f64>) -> Array2<f64> {
    let n = covar.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            return 1.0;
        }
        let denom = (covar[[i, i]] * covar[[j, j]]).sqrt();
        if denom > 0.0 {
            covar[[i, j]] / denom
        } else {
            0.0
        }
    })
}

/// Standard errors are the square roots of the covariance diagonal.
pub fn standard_errors_from_covariance(covar: &Array2<f64>) -> Array1<f64> {
    covar
        .diag()
        .mapv(|v| if v > 0.0 { v.sqrt() } else { 0.0 })
}
