//! Implementation of the Levenberg-Marquardt algorithm.
//!
//! Each iteration solves the damped normal equations
//! `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr` for the step `δ`, accepts the step when it
//! lowers the sum of squared residuals and shrinks `λ`, or rejects it and
//! grows `λ` otherwise.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};
use std::fmt;

use crate::error::{DeconvError, Result};
use crate::problem::Problem;
use crate::utils::finite_difference;
use crate::utils::matrix_convert::{
    nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra,
};

use super::config::{DecompositionMethod, DiffMethod, LmConfig};
use super::convergence::{ConvergenceCriteria, ConvergenceStatus};

/// Lower bound on the diagonal scaling so a flat parameter still gets damped.
const MIN_DIAGONAL_SCALE: f64 = 1e-12;

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Sum of squared residuals
    pub cost: f64,

    /// Number of accepted steps
    pub iterations: usize,

    /// Number of residual evaluations, including finite-difference probes
    pub func_evals: usize,

    /// Whether a convergence criterion was met
    pub success: bool,

    /// Why the optimizer stopped
    pub status: ConvergenceStatus,

    /// A message describing the result
    pub message: String,

    /// The Jacobian matrix at the solution (if requested)
    pub jacobian: Option<Array2<f64>>,
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {}", self.params)?;
        Ok(())
    }
}

/// The Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    /// Configuration options
    config: LmConfig,
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt optimizer with default configuration.
    pub fn new() -> Self {
        Self {
            config: LmConfig::default(),
        }
    }

    /// Create a new Levenberg-Marquardt optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn with_max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.config.max_evaluations = Some(max_evaluations);
        self
    }

    /// Set the tolerance for the relative cost reduction.
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.config.ftol = ftol;
        self
    }

    /// Set the tolerance for the relative step length.
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.config.xtol = xtol;
        self
    }

    /// Set the tolerance for the gradient norm.
    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.config.gtol = gtol;
        self
    }

    /// Set the initial value for the damping parameter.
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.config.initial_lambda = lambda;
        self
    }

    /// Set the method used for calculating the Jacobian.
    pub fn with_differentiation_method(mut self, method: DiffMethod) -> Self {
        self.config.diff_method = method;
        self
    }

    /// Set the method used for solving the linear system.
    pub fn with_decomposition_method(mut self, method: DecompositionMethod) -> Self {
        self.config.decomposition_method = method;
        self
    }

    /// Set whether to calculate and return the Jacobian at the solution.
    pub fn with_calc_jacobian(mut self, calc_jacobian: bool) -> Self {
        self.config.calc_jacobian = calc_jacobian;
        self
    }

    /// Minimize the sum of squared residuals for the given problem.
    ///
    /// The parameters reached when the solver stops are always returned, also
    /// when no convergence criterion was met; check [`LmResult::success`] and
    /// [`LmResult::status`] to tell the cases apart. Errors are raised only for
    /// dimension mismatches and failures of the problem's own evaluation.
    pub fn minimize<P: Problem>(&self, problem: &P, initial_params: Array1<f64>) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params {
            return Err(DeconvError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                n_params,
                initial_params.len()
            )));
        }

        let criteria = ConvergenceCriteria::from(&self.config);
        let max_evaluations = self.config.evaluation_limit(n_params);
        let mut params = initial_params;
        let mut lambda = self.config.initial_lambda;

        let mut residuals = problem.eval(&params)?;
        let mut cost = sum_of_squares(&residuals);
        let mut func_evals = 1;
        let mut iterations = 0;

        let mut status = if cost.is_finite() {
            ConvergenceStatus::Running
        } else {
            ConvergenceStatus::NumericalError
        };

        if n_params == 0 && status == ConvergenceStatus::Running {
            status = ConvergenceStatus::GradientConvergence;
        }

        while status == ConvergenceStatus::Running {
            let jac = self.jacobian(problem, &params, &residuals, &mut func_evals)?;
            let jtj = jac.t().dot(&jac);
            let gradient = jac.t().dot(&residuals);

            status = if cost == 0.0 {
                ConvergenceStatus::FunctionValueConvergence
            } else {
                criteria.check_gradient(&gradient)
            };
            if status.is_terminated() {
                break;
            }

            // Retry with growing damping until a step lowers the cost
            loop {
                let step = match self.calculate_step(&jtj, &gradient, lambda) {
                    Some(step) => step,
                    None => {
                        log::trace!("step solve failed at lambda = {lambda:.3e}");
                        lambda *= self.config.lambda_up_factor;
                        if lambda > self.config.max_lambda {
                            status = ConvergenceStatus::DampingLimitReached;
                            break;
                        }
                        continue;
                    }
                };

                let new_params = &params + &step;
                let new_residuals = problem.eval(&new_params)?;
                func_evals += 1;
                let new_cost = sum_of_squares(&new_residuals);

                let j_step = jac.dot(&step);
                let predicted_reduction = -2.0 * gradient.dot(&step) - j_step.dot(&j_step);

                if new_cost.is_finite() && new_cost < cost {
                    iterations += 1;

                    log::trace!(
                        "iteration {iterations}: cost {cost:.6e} -> {new_cost:.6e}, lambda = {lambda:.3e}"
                    );

                    status = criteria.check(
                        &new_params,
                        &step,
                        cost,
                        new_cost,
                        predicted_reduction,
                        iterations,
                    );

                    if status == ConvergenceStatus::Running && func_evals >= max_evaluations {
                        status = ConvergenceStatus::MaxEvaluationsReached;
                    }

                    params = new_params;
                    residuals = new_residuals;
                    cost = new_cost;
                    lambda = (lambda * self.config.lambda_down_factor).max(self.config.min_lambda);
                    break;
                }

                log::trace!(
                    "rejected step: cost {cost:.6e} -> {new_cost:.6e}, lambda = {lambda:.3e}"
                );
                status = criteria.check_rejected(&params, &step, cost, predicted_reduction);
                if status.is_terminated() {
                    break;
                }
                if func_evals >= max_evaluations {
                    status = ConvergenceStatus::MaxEvaluationsReached;
                    break;
                }
                lambda *= self.config.lambda_up_factor;
                if lambda > self.config.max_lambda {
                    status = ConvergenceStatus::DampingLimitReached;
                    break;
                }
            }
        }

        let jacobian = if self.config.calc_jacobian {
            Some(self.jacobian(problem, &params, &residuals, &mut func_evals)?)
        } else {
            None
        };

        let success = status.is_converged();
        let message = status.description();
        log::debug!(
            "Levenberg-Marquardt finished after {iterations} iterations ({func_evals} evaluations): {message}, cost = {cost:.6e}"
        );

        Ok(LmResult {
            params,
            residuals,
            cost,
            iterations,
            func_evals,
            success,
            status,
            message,
            jacobian,
        })
    }

    fn jacobian<P: Problem>(
        &self,
        problem: &P,
        params: &Array1<f64>,
        residuals: &Array1<f64>,
        func_evals: &mut usize,
    ) -> Result<Array2<f64>> {
        let jac = match self.config.diff_method {
            DiffMethod::Analytical if problem.has_custom_jacobian() => problem.jacobian(params)?,
            _ => {
                *func_evals += params.len();
                finite_difference::jacobian_with_residuals(
                    problem,
                    params,
                    residuals,
                    Some(self.config.fd_epsilon),
                )?
            }
        };

        let expected = [problem.residual_count(), params.len()];
        if jac.shape() != expected {
            return Err(DeconvError::DimensionMismatch(format!(
                "Expected Jacobian of shape {:?}, got {:?}",
                expected,
                jac.shape()
            )));
        }
        Ok(jac)
    }

    /// Calculate the Levenberg-Marquardt step.
    ///
    /// Solves `(JᵀJ + λD) δ = -g` with `D = diag(JᵀJ)` and `g = Jᵀr`.
    /// Returns `None` when the system cannot be solved or yields a
    /// non-finite step.
    fn calculate_step(&self, jtj: &Array2<f64>, gradient: &Array1<f64>, lambda: f64) -> Option<Array1<f64>> {
        let n = jtj.nrows();
        let mut a = ndarray_to_nalgebra(jtj);
        for i in 0..n {
            a[(i, i)] += lambda * jtj[[i, i]].max(MIN_DIAGONAL_SCALE);
        }
        let rhs = -ndarray_vec_to_nalgebra(gradient);

        let step = match self.config.decomposition_method {
            DecompositionMethod::Cholesky => solve_cholesky(a, &rhs),
            DecompositionMethod::LU => a.lu().solve(&rhs),
            DecompositionMethod::Auto => {
                solve_cholesky(a.clone(), &rhs).or_else(|| a.lu().solve(&rhs))
            }
        }?;

        if step.iter().all(|v| v.is_finite()) {
            Some(nalgebra_vec_to_ndarray(&step))
        } else {
            None
        }
    }
}

fn solve_cholesky(a: DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
    a.cholesky().map(|chol| chol.solve(rhs))
}

fn sum_of_squares(residuals: &Array1<f64>) -> f64 {
    residuals.iter().map(|r| r.powi(2)).sum()
}
