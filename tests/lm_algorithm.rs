//! The solver on its own, driven through hand-written `Problem` impls.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use gcdeconv_rs::lm::{ConvergenceStatus, DecompositionMethod, DiffMethod, LevenbergMarquardt, LmConfig};
use gcdeconv_rs::{DeconvError, Problem, Result};
use ndarray::{array, Array1, Array2};

/// One symmetric peak `a·exp(-(x-b)²/c²)` with its exact Jacobian.
struct GaussianPeak {
    x: Array1<f64>,
    y: Array1<f64>,
}

impl GaussianPeak {
    fn sampled(a: f64, b: f64, c: f64) -> Self {
        let x = Array1::linspace(0.0, 20.0, 81);
        let y = x.mapv(|v| a * (-((v - b) / c).powi(2)).exp());
        Self { x, y }
    }
}

impl Problem for GaussianPeak {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        if params.len() != 3 {
            return Err(DeconvError::DimensionMismatch(format!(
                "a peak takes 3 parameters, got {}",
                params.len()
            )));
        }
        let (a, b, c) = (params[0], params[1], params[2]);
        Ok(&self.y - &self.x.mapv(|v| a * (-((v - b) / c).powi(2)).exp()))
    }

    fn parameter_count(&self) -> usize {
        3
    }

    fn residual_count(&self) -> usize {
        self.x.len()
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        let (a, b, c) = (params[0], params[1], params[2]);
        let mut jac = Array2::zeros((self.x.len(), 3));
        for (i, &v) in self.x.iter().enumerate() {
            let u = (v - b) / c;
            let e = (-u * u).exp();
            // Residuals are y - model
            jac[[i, 0]] = -e;
            jac[[i, 1]] = -a * e * 2.0 * u / c;
            jac[[i, 2]] = -a * e * 2.0 * u * u / c;
        }
        Ok(jac)
    }

    fn has_custom_jacobian(&self) -> bool {
        true
    }
}

/// Curved valley with its minimum at (1, 1).
struct Rosenbrock;

impl Problem for Rosenbrock {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(array![1.0 - params[0], 10.0 * (params[1] - params[0].powi(2))])
    }

    fn parameter_count(&self) -> usize {
        2
    }

    fn residual_count(&self) -> usize {
        2
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        Ok(array![[-1.0, 0.0], [-20.0 * params[0], 10.0]])
    }

    fn has_custom_jacobian(&self) -> bool {
        true
    }
}

#[test]
fn analytic_jacobian_matches_finite_differences() {
    let problem = GaussianPeak::sampled(5.0, 10.0, 2.0);
    let at = array![4.0, 9.5, 1.5];

    let analytic = problem.jacobian(&at).unwrap();
    let numeric = gcdeconv_rs::utils::jacobian(&problem, &at, None).unwrap();

    for (a, n) in analytic.iter().zip(numeric.iter()) {
        assert_abs_diff_eq!(*a, *n, epsilon = 1e-5);
    }
}

#[test]
fn peak_recovered_with_both_jacobians() {
    let problem = GaussianPeak::sampled(5.0, 10.0, 2.0);

    for method in [DiffMethod::Analytical, DiffMethod::FiniteDifference] {
        let result = LevenbergMarquardt::new()
            .with_differentiation_method(method)
            .minimize(&problem, array![4.0, 9.0, 1.0])
            .unwrap();

        assert!(result.success, "{:?}: {}", method, result.message);
        assert_relative_eq!(result.params[0], 5.0, epsilon = 1e-6);
        assert_relative_eq!(result.params[1], 10.0, epsilon = 1e-6);
        assert_relative_eq!(result.params[2].abs(), 2.0, epsilon = 1e-6);
        assert!(result.cost < 1e-12);
    }
}

#[test]
fn distant_start_still_converges() {
    let problem = GaussianPeak::sampled(3.0, 12.0, 1.5);

    let result = LevenbergMarquardt::new()
        .minimize(&problem, array![1.0, 11.0, 3.0])
        .unwrap();

    assert!(result.success, "{}", result.message);
    assert_relative_eq!(result.params[1], 12.0, epsilon = 1e-6);
    assert_relative_eq!(result.params[0], 3.0, epsilon = 1e-6);
}

#[test]
fn lu_solves_and_loose_tolerances() {
    let problem = GaussianPeak::sampled(5.0, 10.0, 2.0);
    let lm = LevenbergMarquardt::new()
        .with_ftol(1e-4)
        .with_xtol(1e-4)
        .with_lambda(1e-2)
        .with_decomposition_method(DecompositionMethod::LU);

    let result = lm.minimize(&problem, array![4.5, 9.8, 1.8]).unwrap();

    assert!(result.success, "{}", result.message);
    assert_relative_eq!(result.params[1], 10.0, epsilon = 1e-2);
}

#[test]
fn rosenbrock_valley() {
    let config = LmConfig {
        ftol: 1e-12,
        xtol: 1e-12,
        diff_method: DiffMethod::Analytical,
        ..LmConfig::default()
    };

    let result = LevenbergMarquardt::with_config(config)
        .minimize(&Rosenbrock, array![-1.2, 1.0])
        .unwrap();

    assert!(result.success, "{}", result.message);
    assert_relative_eq!(result.params[0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(result.params[1], 1.0, epsilon = 1e-4);
}

#[test]
fn caps_are_reported() {
    let result = LevenbergMarquardt::new()
        .with_max_iterations(2)
        .minimize(&Rosenbrock, array![-1.2, 1.0])
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.status, ConvergenceStatus::MaxIterationsReached);
    assert_eq!(result.iterations, 2);
    assert!(result.to_string().contains("Success: false"));

    let problem = GaussianPeak::sampled(5.0, 10.0, 2.0);
    let result = LevenbergMarquardt::new()
        .with_max_evaluations(6)
        .minimize(&problem, array![4.0, 9.0, 1.0])
        .unwrap();
    assert_eq!(result.status, ConvergenceStatus::MaxEvaluationsReached);
    assert!(result.func_evals >= 6);
}

#[test]
fn default_budget_follows_parameter_count() {
    let config = LmConfig::default();
    assert_eq!(config.evaluation_limit(2), 600);
    assert_eq!(config.evaluation_limit(8), 1800);
    assert_eq!(LmConfig { max_evaluations: Some(50), ..config }.evaluation_limit(8), 50);
}
