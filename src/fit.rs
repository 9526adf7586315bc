//! Multi-peak least-squares fitting.
//!
//! [`fit`] refines all peaks of a composite signal at once by handing the
//! signed residuals `y - model` to the Levenberg-Marquardt solver. The
//! parameters the solver ends on are returned whether or not a convergence
//! criterion was met; the attached [`FitReport`] tells the two apart.

use ndarray::Array1;
use serde::Serialize;

use crate::error::Result;
use crate::lm::{ConvergenceStatus, LevenbergMarquardt, LmConfig, LmResult};
use crate::model::{SignalModel, SignalProblem};
use crate::models::{PeakModel, PeakParams};
use crate::uncertainty::UncertaintyResult;

/// How the solver finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitReport {
    pub status: ConvergenceStatus,
    pub message: String,
    /// Accepted solver steps.
    pub iterations: usize,
    /// Residual evaluations, finite-difference probes included.
    pub evaluations: usize,
    /// Sum of squared residuals at the returned parameters.
    pub cost: f64,
    pub success: bool,
}

impl From<&LmResult> for FitReport {
    fn from(result: &LmResult) -> Self {
        Self {
            status: result.status,
            message: result.message.clone(),
            iterations: result.iterations,
            evaluations: result.func_evals,
            cost: result.cost,
            success: result.success,
        }
    }
}

/// Converged parameters of a multi-peak fit.
#[derive(Debug, Clone, Serialize)]
pub struct FitResult {
    /// Packed parameter vector, peak tuples in fit order.
    pub params: Array1<f64>,
    pub peak_count: usize,
    pub model: PeakModel,
    pub report: FitReport,
    /// One standard error per packed parameter, when they could be estimated.
    pub standard_errors: Option<Array1<f64>>,
}

impl FitResult {
    pub fn signal_model(&self) -> SignalModel {
        SignalModel::new(self.model, self.peak_count)
    }

    /// Fitted parameters split into per-peak tuples.
    pub fn peaks(&self) -> Result<Vec<PeakParams>> {
        self.signal_model().unpack(&self.params)
    }

    /// Standard errors split into per-peak tuples.
    pub fn peak_errors(&self) -> Option<Result<Vec<PeakParams>>> {
        self.standard_errors
            .as_ref()
            .map(|errors| self.signal_model().unpack(errors))
    }
}

/// Fit `peak_count` peaks of the given model to the observed samples.
///
/// `initial` is the packed starting vector and must hold
/// `peak_count * stride` values. Standard errors are estimated when
/// `config.calc_jacobian` is set.
pub fn fit(
    x: &Array1<f64>,
    y: &Array1<f64>,
    initial: &Array1<f64>,
    peak_count: usize,
    model: PeakModel,
    config: &LmConfig,
) -> Result<FitResult> {
    let signal = SignalModel::new(model, peak_count);
    let problem = SignalProblem::new(signal, x, y)?;

    log::debug!(
        "fitting {} {} peaks to {} samples",
        peak_count,
        model.shape,
        problem.ndata()
    );

    let optimizer = LevenbergMarquardt::with_config(config.clone());
    let result = optimizer.minimize(&problem, initial.clone())?;

    if !result.success {
        log::warn!(
            "fit stopped without converging after {} iterations: {}",
            result.iterations,
            result.message
        );
    }

    let standard_errors = result.jacobian.as_ref().and_then(|jacobian| {
        match UncertaintyResult::from_jacobian(jacobian, result.cost) {
            Ok(uncertainty) => Some(uncertainty.standard_errors),
            Err(e) => {
                log::debug!("no standard errors for this fit: {e}");
                None
            }
        }
    });

    let report = FitReport::from(&result);
    Ok(FitResult {
        params: result.params,
        peak_count,
        model,
        report,
        standard_errors,
    })
}
