//! Finite difference methods for numerical differentiation.
//!
//! The peak models are cheap to evaluate, so the Levenberg-Marquardt driver
//! approximates the residual Jacobian column by column with forward differences.

use crate::error::{DeconvError, Result};
use crate::problem::Problem;
use ndarray::{Array1, Array2};

/// Default relative step size for finite differences, `sqrt(f64::EPSILON)`.
pub const DEFAULT_EPSILON: f64 = 1.490_116_119_384_765_6e-8;

/// Compute the Jacobian matrix using forward finite differences.
///
/// `J[i, j] = (r_i(p + h_j e_j) - r_i(p)) / h_j` where `h_j` is `epsilon`
/// scaled by `|p_j|` (or `epsilon` itself when `p_j` is near zero).
///
/// # Arguments
///
/// * `problem` - The problem to evaluate
/// * `params` - The parameter values at which to evaluate the Jacobian
/// * `epsilon` - The relative step size (optional)
pub fn jacobian(
    problem: &dyn Problem,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let residuals = problem.eval(params)?;
    jacobian_with_residuals(problem, params, &residuals, epsilon)
}

/// Same as [`jacobian`], reusing residuals already evaluated at `params`.
pub fn jacobian_with_residuals(
    problem: &dyn Problem,
    params: &Array1<f64>,
    residuals: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();
    let n_residuals = problem.residual_count();

    if residuals.len() != n_residuals {
        return Err(DeconvError::DimensionMismatch(format!(
            "Expected {} residuals, got {}",
            n_residuals,
            residuals.len()
        )));
    }

    let mut jac = Array2::zeros((n_residuals, n_params));
    let mut params_perturbed = params.clone();

    for j in 0..n_params {
        let param_j = params[j];
        let eps_j = if param_j.abs() > eps {
            param_j.abs() * eps
        } else {
            eps
        };

        params_perturbed[j] = param_j + eps_j;
        let residuals_perturbed = problem.eval(&params_perturbed)?;
        params_perturbed[j] = param_j;

        for i in 0..n_residuals {
            jac[[i, j]] = (residuals_perturbed[i] - residuals[i]) / eps_j;
        }
    }

    Ok(jac)
}
