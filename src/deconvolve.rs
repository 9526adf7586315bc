//! Deconvolution of a trace into individually integrated peaks.
//!
//! [`deconvolve`] is the entry point: it turns initial guesses into a starting
//! parameter vector, fits all peaks at once, evaluates the fitted peaks on a
//! dense grid for plotting, and integrates each peak over the observed range.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::data::SampleSet;
use crate::error::{DeconvError, Result};
use crate::fit::{fit, FitResult};
use crate::integrate::{peak_areas, QuadratureConfig};
use crate::lm::LmConfig;
use crate::model::SignalModel;
use crate::models::{PeakModel, PeakParams, PeakShape, SkewExponent};

/// Width given to a guess that does not set one.
pub const DEFAULT_WIDTH: f64 = 1.0;

/// Skew given to a skew-peak guess that does not set one.
pub const DEFAULT_SKEW: f64 = 0.0;

/// Starting point for one peak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InitialGuess {
    /// A point picked on the plotted trace: its height is the amplitude and
    /// its x the position.
    Picked { amplitude: f64, position: f64 },
    /// `[amplitude, position]`, `[amplitude, position, width]` or, for skew
    /// peaks, `[amplitude, position, width, skew]`.
    Literal(Vec<f64>),
}

impl InitialGuess {
    pub fn picked(amplitude: f64, position: f64) -> Self {
        Self::Picked {
            amplitude,
            position,
        }
    }

    /// Guess from a clicked plot coordinate.
    pub fn from_click(x: f64, y: f64) -> Self {
        Self::picked(y, x)
    }

    /// Complete the guess into a full peak tuple, filling in the default
    /// width and skew.
    pub fn to_params(&self, shape: PeakShape) -> Result<PeakParams> {
        match self {
            Self::Picked {
                amplitude,
                position,
            } => Ok(PeakParams::skewed(*amplitude, *position, DEFAULT_WIDTH, DEFAULT_SKEW)),
            Self::Literal(values) => match (shape, values.as_slice()) {
                (_, &[a, b]) => Ok(PeakParams::skewed(a, b, DEFAULT_WIDTH, DEFAULT_SKEW)),
                (_, &[a, b, c]) => Ok(PeakParams::skewed(a, b, c, DEFAULT_SKEW)),
                (PeakShape::Skew, &[a, b, c, d]) => Ok(PeakParams::skewed(a, b, c, d)),
                _ => Err(DeconvError::InvalidGuess(format!(
                    "a {} guess takes 2 to {} values, got {}",
                    shape,
                    shape.stride(),
                    values.len()
                ))),
            },
        }
    }
}

impl From<(f64, f64)> for InitialGuess {
    fn from((amplitude, position): (f64, f64)) -> Self {
        Self::picked(amplitude, position)
    }
}

impl<const N: usize> From<[f64; N]> for InitialGuess {
    fn from(values: [f64; N]) -> Self {
        Self::Literal(values.to_vec())
    }
}

impl From<Vec<f64>> for InitialGuess {
    fn from(values: Vec<f64>) -> Self {
        Self::Literal(values)
    }
}

/// Settings for a deconvolution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeconvolutionConfig {
    /// Spacing of the dense plotting grid, in x units
    pub grid_step: f64,
    /// Exponent convention for skew peaks
    pub skew_exponent: SkewExponent,
    /// Solver settings. Its `calc_jacobian` flag is also switched on by
    /// `compute_uncertainties`; either one set gives standard errors.
    pub lm: LmConfig,
    /// Area integration settings
    pub quadrature: QuadratureConfig,
    /// Estimate standard errors of the fitted parameters
    pub compute_uncertainties: bool,
}

impl Default for DeconvolutionConfig {
    fn default() -> Self {
        Self {
            grid_step: 0.025,
            skew_exponent: SkewExponent::default(),
            lm: LmConfig::default(),
            quadrature: QuadratureConfig::default(),
            compute_uncertainties: true,
        }
    }
}

impl DeconvolutionConfig {
    pub fn with_grid_step(mut self, grid_step: f64) -> Self {
        self.grid_step = grid_step;
        self
    }

    pub fn with_skew_exponent(mut self, skew_exponent: SkewExponent) -> Self {
        self.skew_exponent = skew_exponent;
        self
    }

    pub fn with_lm(mut self, lm: LmConfig) -> Self {
        self.lm = lm;
        self
    }

    pub fn with_quadrature(mut self, quadrature: QuadratureConfig) -> Self {
        self.quadrature = quadrature;
        self
    }

    pub fn with_uncertainties(mut self, compute_uncertainties: bool) -> Self {
        self.compute_uncertainties = compute_uncertainties;
        self
    }

    /// Load settings from JSON; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Largest number of points a plotting grid may hold.
pub const MAX_GRID_POINTS: usize = 10_000_000;

/// Evenly spaced points from `first` that never pass `last`.
///
/// A step so small that the grid would exceed [`MAX_GRID_POINTS`] is
/// rejected as malformed.
pub fn dense_grid(first: f64, last: f64, step: f64) -> Result<Array1<f64>> {
    if !(step > 0.0 && step.is_finite()) {
        return Err(DeconvError::MalformedInput(format!(
            "grid step must be a positive number, got {step}"
        )));
    }
    let intervals = ((last - first) / step + 1e-9).floor().max(0.0);
    if !intervals.is_finite() || intervals >= MAX_GRID_POINTS as f64 {
        return Err(DeconvError::MalformedInput(format!(
            "grid step {step} over [{first}, {last}] gives more than {MAX_GRID_POINTS} points"
        )));
    }
    let count = intervals as usize + 1;
    Ok(Array1::from_shape_fn(count, |i| first + i as f64 * step))
}

/// Legend text for one fitted peak.
pub fn peak_label(shape: PeakShape, params: &PeakParams, area: f64) -> String {
    match shape {
        PeakShape::Symmetric => format!(
            "{:.2}e^{{-(x-{:.2})^2 / {:.2}^2}} \n Area = {:.3}",
            params.amplitude, params.center, params.width, area
        ),
        PeakShape::Skew => format!("Area = {:.3}", area),
    }
}

/// A fitted peak with its area and legend text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakSummary {
    pub index: usize,
    pub params: PeakParams,
    pub area: f64,
    pub label: String,
}

/// Everything a deconvolution run produces.
///
/// Curve columns are ordered grid x, composite, then one column per peak,
/// matching `labels` one to one.
#[derive(Debug, Clone, Serialize)]
pub struct DeconvolutionResult {
    pub shape: PeakShape,
    pub grid: Array1<f64>,
    pub composite: Array1<f64>,
    pub peak_curves: Vec<Array1<f64>>,
    /// Area of each peak over the observed x range, in fit order.
    pub areas: Vec<f64>,
    pub params: Vec<PeakParams>,
    pub labels: Vec<String>,
    pub fit: FitResult,
}

impl DeconvolutionResult {
    pub fn peak_count(&self) -> usize {
        self.params.len()
    }

    /// Labels as spreadsheet column headers, where the first column is "x".
    pub fn export_labels(&self) -> Vec<String> {
        let mut labels = self.labels.clone();
        if let Some(first) = labels.first_mut() {
            *first = "x".to_string();
        }
        labels
    }

    /// The curves as a `grid_len × (peak_count + 2)` table.
    pub fn to_table(&self) -> Array2<f64> {
        let mut table = Array2::zeros((self.grid.len(), self.peak_count() + 2));
        table.column_mut(0).assign(&self.grid);
        table.column_mut(1).assign(&self.composite);
        for (i, curve) in self.peak_curves.iter().enumerate() {
            table.column_mut(i + 2).assign(curve);
        }
        table
    }

    /// Label and data of every column, in table order.
    pub fn columns(&self) -> Vec<(&str, ArrayView1<'_, f64>)> {
        let data = std::iter::once(self.grid.view())
            .chain(std::iter::once(self.composite.view()))
            .chain(self.peak_curves.iter().map(|curve| curve.view()));
        self.labels.iter().map(String::as_str).zip(data).collect()
    }

    pub fn peaks(&self) -> Vec<PeakSummary> {
        self.params
            .iter()
            .zip(self.areas.iter())
            .zip(self.labels.iter().skip(2))
            .enumerate()
            .map(|(index, ((params, area), label))| PeakSummary {
                index,
                params: *params,
                area: *area,
                label: label.clone(),
            })
            .collect()
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Fit `guesses.len()` peaks to `samples` and integrate each of them.
///
/// An empty guess list is rejected with [`DeconvError::EmptyGuesses`]. The
/// fitted parameters are used whether or not the solver converged; see
/// [`FitResult::report`].
pub fn deconvolve(
    samples: &SampleSet,
    guesses: &[InitialGuess],
    shape: PeakShape,
    config: &DeconvolutionConfig,
) -> Result<DeconvolutionResult> {
    if guesses.is_empty() {
        return Err(DeconvError::EmptyGuesses);
    }

    let model = PeakModel::new(shape, config.skew_exponent);
    let start = guesses
        .iter()
        .map(|guess| guess.to_params(shape))
        .collect::<Result<Vec<_>>>()?;
    let signal = SignalModel::new(model, start.len());
    let initial = signal.pack(&start);

    let lm = LmConfig {
        calc_jacobian: config.compute_uncertainties || config.lm.calc_jacobian,
        ..config.lm.clone()
    };
    let fit_result = fit(samples.x(), samples.y(), &initial, start.len(), model, &lm)?;
    let params = fit_result.peaks()?;

    let (first, last) = samples.bounds();
    let grid = dense_grid(first, last, config.grid_step)?;
    let composite = signal.sum_evaluate(&grid, &fit_result.params)?;
    let peak_curves = signal.evaluate_peaks(&grid, &fit_result.params)?;

    let areas = peak_areas(&params, model, first, last, &config.quadrature);

    let mut labels = vec!["Data".to_string(), "Resultant".to_string()];
    labels.extend(
        params
            .iter()
            .zip(areas.iter())
            .map(|(peak, area)| peak_label(shape, peak, *area)),
    );

    Ok(DeconvolutionResult {
        shape,
        grid,
        composite,
        peak_curves,
        areas,
        params,
        labels,
        fit: fit_result,
    })
}

/// One independent deconvolution job.
#[derive(Debug, Clone)]
pub struct DeconvolutionRequest {
    pub samples: SampleSet,
    pub guesses: Vec<InitialGuess>,
    pub shape: PeakShape,
    pub config: DeconvolutionConfig,
}

impl DeconvolutionRequest {
    pub fn new(samples: SampleSet, guesses: Vec<InitialGuess>, shape: PeakShape) -> Self {
        Self {
            samples,
            guesses,
            shape,
            config: DeconvolutionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DeconvolutionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn run(&self) -> Result<DeconvolutionResult> {
        deconvolve(&self.samples, &self.guesses, self.shape, &self.config)
    }
}

/// Run independent requests, in parallel when the `parallel` feature is on.
///
/// Results are returned in request order.
pub fn deconvolve_many(requests: &[DeconvolutionRequest]) -> Vec<Result<DeconvolutionResult>> {
    #[cfg(feature = "parallel")]
    {
        requests.par_iter().map(DeconvolutionRequest::run).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        requests.iter().map(DeconvolutionRequest::run).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use std::f64::consts::PI;

    fn gaussian_trace(n: usize) -> SampleSet {
        let x = Array1::linspace(0.0, 20.0, n);
        let y = PeakModel::symmetric().evaluate(&x, &PeakParams::symmetric(5.0, 10.0, 2.0));
        SampleSet::new(x, y).unwrap()
    }

    #[test]
    fn test_guess_completion() {
        let picked = InitialGuess::from((5.0, 10.0)).to_params(PeakShape::Symmetric).unwrap();
        assert_eq!(picked, PeakParams::symmetric(5.0, 10.0, 1.0));

        let literal = InitialGuess::from([6.5, 13.0, 0.8]).to_params(PeakShape::Skew).unwrap();
        assert_eq!(literal, PeakParams::skewed(6.5, 13.0, 0.8, 0.0));

        let full = InitialGuess::from([6.5, 13.0, 1.0, -0.5]).to_params(PeakShape::Skew).unwrap();
        assert_eq!(full.skew, -0.5);

        assert_eq!(InitialGuess::from_click(10.0, 5.0), InitialGuess::picked(5.0, 10.0));
    }

    #[test]
    fn test_guess_arity_errors() {
        let four = InitialGuess::from([6.5, 13.0, 1.0, 0.0]);
        assert!(matches!(
            four.to_params(PeakShape::Symmetric),
            Err(DeconvError::InvalidGuess(_))
        ));
        assert!(InitialGuess::from(vec![1.0]).to_params(PeakShape::Skew).is_err());
        assert!(InitialGuess::from(vec![1.0; 5]).to_params(PeakShape::Skew).is_err());
    }

    #[test]
    fn test_dense_grid_stays_in_range() {
        let grid = dense_grid(0.0, 1.0, 0.025).unwrap();
        assert_eq!(grid.len(), 41);
        assert_relative_eq!(grid[40], 1.0, epsilon = 1e-12);

        let grid = dense_grid(0.0, 1.01, 0.025).unwrap();
        assert_eq!(grid.len(), 41);
        assert!(grid[grid.len() - 1] <= 1.01);

        assert_eq!(dense_grid(3.0, 3.0, 0.025).unwrap().len(), 1);
        assert!(dense_grid(0.0, 1.0, 0.0).is_err());
        assert!(dense_grid(0.0, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_dense_grid_rejects_tiny_steps() {
        for step in [1e-300, 1e-12, f64::MIN_POSITIVE] {
            let err = dense_grid(0.0, 20.0, step).unwrap_err();
            assert!(matches!(err, DeconvError::MalformedInput(ref m) if m.contains("points")));
        }
        assert!(dense_grid(0.0, f64::MAX, 1.0).is_err());

        let grid = dense_grid(0.0, 1.0, 1e-6).unwrap();
        assert!(grid.len() >= 1_000_000 && grid.len() < MAX_GRID_POINTS);
    }

    #[test]
    fn test_tiny_grid_step_from_json_is_an_error() {
        let config = DeconvolutionConfig::from_json_str(r#"{"grid_step": 1e-300}"#).unwrap();
        let guesses = vec![InitialGuess::from([5.0, 10.0])];
        let err = deconvolve(&gaussian_trace(50), &guesses, PeakShape::Symmetric, &config).unwrap_err();
        assert!(matches!(err, DeconvError::MalformedInput(_)));
    }

    #[test]
    fn test_solver_jacobian_flag_keeps_uncertainties() {
        let samples = gaussian_trace(50);
        let guesses = vec![InitialGuess::from([4.5, 10.2])];

        let lm = LmConfig {
            calc_jacobian: true,
            ..LmConfig::default()
        };
        let config = DeconvolutionConfig::default().with_uncertainties(false).with_lm(lm);
        let result = deconvolve(&samples, &guesses, PeakShape::Symmetric, &config).unwrap();
        assert!(result.fit.standard_errors.is_some());

        let config = DeconvolutionConfig::default().with_uncertainties(false);
        let result = deconvolve(&samples, &guesses, PeakShape::Symmetric, &config).unwrap();
        assert!(result.fit.standard_errors.is_none());
    }

    #[test]
    fn test_single_peak_end_to_end() {
        let samples = gaussian_trace(50);
        let guesses = vec![InitialGuess::from([5.0, 10.0])];

        let result = deconvolve(&samples, &guesses, PeakShape::Symmetric, &DeconvolutionConfig::default()).unwrap();

        assert!(result.fit.report.success);
        let peak = result.params[0];
        assert_abs_diff_eq!(peak.amplitude, 5.0, epsilon = 1e-4);
        assert_abs_diff_eq!(peak.center, 10.0, epsilon = 1e-4);
        assert_abs_diff_eq!(peak.width.abs(), 2.0, epsilon = 1e-4);

        let expected = 5.0 * PI.sqrt() * 2.0;
        assert!((result.areas[0] - expected).abs() / expected < 0.01);
        assert!(result.fit.standard_errors.is_some());
    }

    #[test]
    fn test_zero_guesses_is_an_error() {
        let samples = gaussian_trace(50);
        let err = deconvolve(&samples, &[], PeakShape::Symmetric, &DeconvolutionConfig::default()).unwrap_err();
        assert!(matches!(err, DeconvError::EmptyGuesses));
    }

    #[test]
    fn test_labels_match_columns() {
        let x = Array1::linspace(0.0, 20.0, 80);
        let signal = SignalModel::new(PeakModel::symmetric(), 2);
        let y = signal
            .sum_evaluate(&x, &ndarray::array![4.0, 8.0, 1.5, 3.0, 12.5, 1.5])
            .unwrap();
        let samples = SampleSet::new(x, y).unwrap();
        let guesses = vec![InitialGuess::from([4.0, 8.0]), InitialGuess::from([3.0, 12.5])];
        let result = deconvolve(&samples, &guesses, PeakShape::Symmetric, &DeconvolutionConfig::default()).unwrap();

        let table = result.to_table();
        assert_eq!(table.ncols(), 4);
        assert_eq!(table.nrows(), result.grid.len());
        assert_eq!(result.labels.len(), table.ncols());
        assert_eq!(result.labels[0], "Data");
        assert_eq!(result.labels[1], "Resultant");
        assert!(result.labels[2].contains("Area = "));
        assert_eq!(result.export_labels()[0], "x");

        let columns = result.columns();
        assert_eq!(columns.len(), 4);
        assert_eq!(columns[1].0, "Resultant");
        assert_eq!(columns[3].1.len(), result.grid.len());

        let summed = &result.peak_curves[0] + &result.peak_curves[1];
        for (a, b) in summed.iter().zip(result.composite.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }

        let peaks = result.peaks();
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[1].index, 1);
        assert_eq!(peaks[1].label, result.labels[3]);
    }

    #[test]
    fn test_skew_labels_show_area_only() {
        let params = PeakParams::skewed(10.0, 15.0, 1.5, 1.0);
        assert_eq!(peak_label(PeakShape::Skew, &params, 12.34567), "Area = 12.346");

        let label = peak_label(PeakShape::Symmetric, &PeakParams::symmetric(5.0, 10.0, 2.0), 17.72454);
        assert_eq!(label, "5.00e^{-(x-10.00)^2 / 2.00^2} \n Area = 17.725");
    }

    #[test]
    fn test_config_json() {
        let config = DeconvolutionConfig::from_json_str(r#"{"grid_step": 0.1, "skew_exponent": "Corrected"}"#).unwrap();
        assert_eq!(config.grid_step, 0.1);
        assert_eq!(config.skew_exponent, SkewExponent::Corrected);
        assert_eq!(config.lm, LmConfig::default());
        assert!(config.compute_uncertainties);

        let json = config.to_json_string().unwrap();
        assert_eq!(DeconvolutionConfig::from_json_str(&json).unwrap(), config);

        assert!(matches!(
            DeconvolutionConfig::from_json_str("{"),
            Err(DeconvError::JsonError(_))
        ));
    }

    #[test]
    fn test_deconvolve_many_keeps_order() {
        let samples = gaussian_trace(50);
        let requests = vec![
            DeconvolutionRequest::new(samples.clone(), vec![InitialGuess::from([5.0, 10.0])], PeakShape::Symmetric),
            DeconvolutionRequest::new(samples.clone(), vec![], PeakShape::Symmetric),
            DeconvolutionRequest::new(samples, vec![InitialGuess::from([5.0, 10.0])], PeakShape::Skew),
        ];

        let results = deconvolve_many(&requests);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().shape, PeakShape::Symmetric);
        assert!(matches!(results[1], Err(DeconvError::EmptyGuesses)));
        assert_eq!(results[2].as_ref().unwrap().shape, PeakShape::Skew);
    }

    #[test]
    fn test_result_json() {
        let samples = gaussian_trace(50);
        let result = deconvolve(
            &samples,
            &[InitialGuess::from([5.0, 10.0])],
            PeakShape::Symmetric,
            &DeconvolutionConfig::default().with_grid_step(0.5),
        )
        .unwrap();

        let json: serde_json::Value = serde_json::from_str(&result.to_json_string().unwrap()).unwrap();
        assert_eq!(json["labels"].as_array().unwrap().len(), 3);
        assert_eq!(json["shape"], "Symmetric");
        assert!(json["fit"]["report"]["success"].as_bool().unwrap());
    }
}
