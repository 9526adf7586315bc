//! Configuration options for the Levenberg-Marquardt algorithm.
//!
//! The tolerances and the evaluation budget mirror MINPACK `lmdif` as a
//! library-default nonlinear least-squares call sets them up. `lmdif` has no
//! iteration count; `max_iterations` is an extra cap on accepted steps.

use serde::{Deserialize, Serialize};

use crate::utils::finite_difference::DEFAULT_EPSILON;

/// Method for calculating the Jacobian matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiffMethod {
    /// Use forward finite differences to approximate the Jacobian
    #[default]
    FiniteDifference,

    /// Use the analytical Jacobian provided by the problem implementation,
    /// falling back to finite differences when the problem has none
    Analytical,
}

/// Method for solving the damped normal equations in each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecompositionMethod {
    /// Cholesky decomposition (requires a positive definite system)
    Cholesky,

    /// LU decomposition with partial pivoting
    LU,

    /// Try Cholesky first, fall back to LU
    #[default]
    Auto,
}

/// Configuration options for the Levenberg-Marquardt algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    /// Maximum number of accepted steps. Default: 400
    pub max_iterations: usize,

    /// Maximum number of residual evaluations, finite-difference probes
    /// included. `None` uses `200 * (n + 1)` for `n` parameters. Default: None
    pub max_evaluations: Option<usize>,

    /// Relative tolerance on the actual and predicted cost reduction. Default: 1.49012e-8
    pub ftol: f64,

    /// Relative tolerance on the step length. Default: 1.49012e-8
    pub xtol: f64,

    /// Tolerance on the infinity norm of the gradient. Default: 0.0
    pub gtol: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda after a rejected step. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda after an accepted step. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-12
    pub min_lambda: f64,

    /// Maximum value for lambda; exceeding it stops the solver. Default: 1e16
    pub max_lambda: f64,

    /// Relative step for finite differences. Default: sqrt(f64::EPSILON)
    pub fd_epsilon: f64,

    /// Method to use for calculating the Jacobian. Default: FiniteDifference
    pub diff_method: DiffMethod,

    /// Method to use for solving the linear system. Default: Auto
    pub decomposition_method: DecompositionMethod,

    /// Whether to calculate and return the Jacobian at the solution. Default: false
    pub calc_jacobian: bool,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 400,
            max_evaluations: None,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 0.0,
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-12,
            max_lambda: 1e16,
            fd_epsilon: DEFAULT_EPSILON,
            diff_method: DiffMethod::default(),
            decomposition_method: DecompositionMethod::default(),
            calc_jacobian: false,
        }
    }
}

impl LmConfig {
    /// Evaluation budget for a problem with `parameter_count` parameters.
    pub fn evaluation_limit(&self, parameter_count: usize) -> usize {
        self.max_evaluations
            .unwrap_or_else(|| 200 * (parameter_count + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LmConfig::default();
        assert_eq!(config.max_iterations, 400);
        assert_eq!(config.max_evaluations, None);
        assert_eq!(config.evaluation_limit(3), 800);
        assert_eq!(config.gtol, 0.0);
        assert_eq!(config.diff_method, DiffMethod::FiniteDifference);
        assert_eq!(config.decomposition_method, DecompositionMethod::Auto);
        assert!(!config.calc_jacobian);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LmConfig =
            serde_json::from_str(r#"{"max_iterations": 25, "decomposition_method": "LU"}"#)
                .unwrap();
        assert_eq!(config.max_iterations, 25);
        assert_eq!(config.decomposition_method, DecompositionMethod::LU);
        assert_eq!(config.ftol, LmConfig::default().ftol);
    }
}
