//! Convergence criteria for the Levenberg-Marquardt driver.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::config::LmConfig;

/// Possible convergence states for the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// The algorithm is still running.
    Running,

    /// The algorithm has converged due to a small parameter change.
    ParameterConvergence,

    /// The algorithm has converged due to a small cost reduction.
    FunctionValueConvergence,

    /// The algorithm has converged due to a small gradient.
    GradientConvergence,

    /// The algorithm has terminated due to reaching the maximum number of iterations.
    MaxIterationsReached,

    /// The residual evaluation budget was used up.
    MaxEvaluationsReached,

    /// No step could reduce the cost before the damping parameter hit its ceiling.
    DampingLimitReached,

    /// The cost at the starting point was not finite.
    NumericalError,
}

impl ConvergenceStatus {
    /// Returns true if the optimization has terminated (either converged or failed).
    pub fn is_terminated(&self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }

    /// Returns true if the optimization has converged.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            ConvergenceStatus::ParameterConvergence
                | ConvergenceStatus::FunctionValueConvergence
                | ConvergenceStatus::GradientConvergence
        )
    }

    /// Returns a description of the convergence status.
    pub fn description(&self) -> String {
        match self {
            ConvergenceStatus::Running => "Optimization is still running".to_string(),
            ConvergenceStatus::ParameterConvergence => {
                "Converged: small parameter change".to_string()
            }
            ConvergenceStatus::FunctionValueConvergence => {
                "Converged: small cost reduction".to_string()
            }
            ConvergenceStatus::GradientConvergence => "Converged: small gradient".to_string(),
            ConvergenceStatus::MaxIterationsReached => {
                "Terminated: maximum iterations reached".to_string()
            }
            ConvergenceStatus::MaxEvaluationsReached => {
                "Terminated: maximum function evaluations reached".to_string()
            }
            ConvergenceStatus::DampingLimitReached => {
                "Terminated: no cost reduction before damping reached its maximum".to_string()
            }
            ConvergenceStatus::NumericalError => "Terminated: non-finite cost".to_string(),
        }
    }
}

/// Criteria for determining when the optimizer has converged.
#[derive(Debug, Clone)]
pub struct ConvergenceCriteria {
    /// Relative tolerance on the step length.
    pub xtol: f64,

    /// Relative tolerance on the cost reduction.
    pub ftol: f64,

    /// Tolerance for the infinity norm of the gradient.
    pub gtol: f64,

    /// Maximum number of accepted steps.
    pub max_iterations: usize,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self::from(&LmConfig::default())
    }
}

impl From<&LmConfig> for ConvergenceCriteria {
    fn from(config: &LmConfig) -> Self {
        Self {
            xtol: config.xtol,
            ftol: config.ftol,
            gtol: config.gtol,
            max_iterations: config.max_iterations,
        }
    }
}

impl ConvergenceCriteria {
    /// Creates a new set of convergence criteria with the given tolerances.
    pub fn new(xtol: f64, ftol: f64, gtol: f64, max_iterations: usize) -> Self {
        Self {
            xtol,
            ftol,
            gtol,
            max_iterations,
        }
    }

    /// Gradient test, applied before a step is attempted.
    pub fn check_gradient(&self, gradient: &Array1<f64>) -> ConvergenceStatus {
        let gradient_norm = gradient.iter().fold(0.0_f64, |acc, g| acc.max(g.abs()));
        if gradient_norm <= self.gtol {
            ConvergenceStatus::GradientConvergence
        } else {
            ConvergenceStatus::Running
        }
    }

    /// Checks an accepted step.
    ///
    /// # Arguments
    ///
    /// * `new_params` - The parameter values after the step
    /// * `step` - The accepted step
    /// * `cost` - The cost before the step
    /// * `new_cost` - The cost after the step
    /// * `predicted_reduction` - The cost reduction predicted by the linearized model
    /// * `iterations` - The number of accepted steps so far, including this one
    pub fn check(
        &self,
        new_params: &Array1<f64>,
        step: &Array1<f64>,
        cost: f64,
        new_cost: f64,
        predicted_reduction: f64,
        iterations: usize,
    ) -> ConvergenceStatus {
        if new_cost == 0.0 {
            return ConvergenceStatus::FunctionValueConvergence;
        }

        let actual_reduction = cost - new_cost;
        if actual_reduction <= self.ftol * cost
            && predicted_reduction <= self.ftol * cost
            && actual_reduction <= 2.0 * predicted_reduction
        {
            return ConvergenceStatus::FunctionValueConvergence;
        }

        let step_norm = step.dot(step).sqrt();
        let param_norm = new_params.dot(new_params).sqrt();
        if step_norm <= self.xtol * (param_norm + self.xtol) {
            return ConvergenceStatus::ParameterConvergence;
        }

        if iterations >= self.max_iterations {
            return ConvergenceStatus::MaxIterationsReached;
        }

        ConvergenceStatus::Running
    }

    /// Checks a step that failed to lower the cost.
    ///
    /// At a minimum no trial step can improve the cost in floating point, so
    /// a rejected step that is already negligibly short, or whose predicted
    /// reduction is negligible, still ends the search.
    pub fn check_rejected(
        &self,
        params: &Array1<f64>,
        step: &Array1<f64>,
        cost: f64,
        predicted_reduction: f64,
    ) -> ConvergenceStatus {
        let step_norm = step.dot(step).sqrt();
        let param_norm = params.dot(params).sqrt();
        if step_norm <= self.xtol * (param_norm + self.xtol) {
            ConvergenceStatus::ParameterConvergence
        } else if predicted_reduction <= self.ftol * cost {
            ConvergenceStatus::FunctionValueConvergence
        } else {
            ConvergenceStatus::Running
        }
    }
}
