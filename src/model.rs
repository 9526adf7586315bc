//! Multi-peak signal model and its least-squares residual.
//!
//! A composite signal is the elementwise sum of `peak_count` peaks sharing one
//! [`PeakModel`]. The optimizer sees all peaks as a single flat parameter
//! vector: peak tuples are concatenated in peak order, `stride` values each
//! (3 for symmetric peaks, 4 for skew peaks).

use ndarray::Array1;

use crate::error::{DeconvError, Result};
use crate::models::{PeakModel, PeakParams, PeakShape};
use crate::problem::Problem;

/// Flatten peak tuples into a parameter vector, preserving peak order.
pub fn pack_parameters(shape: PeakShape, peaks: &[PeakParams]) -> Array1<f64> {
    let mut values = Vec::with_capacity(peaks.len() * shape.stride());
    for peak in peaks {
        peak.extend_into(shape, &mut values);
    }
    Array1::from_vec(values)
}

/// Split a parameter vector into `peak_count` peak tuples.
///
/// Fails with [`DeconvError::DimensionMismatch`] unless the vector holds
/// exactly `peak_count * shape.stride()` values.
pub fn unpack_parameters(shape: PeakShape, params: &[f64], peak_count: usize) -> Result<Vec<PeakParams>> {
    let stride = shape.stride();
    if params.len() != peak_count * stride {
        return Err(DeconvError::DimensionMismatch(format!(
            "Expected {} parameters for {} {} peaks, got {}",
            peak_count * stride,
            peak_count,
            shape,
            params.len()
        )));
    }
    params
        .chunks_exact(stride)
        .map(|chunk| PeakParams::from_slice(shape, chunk))
        .collect()
}

/// Evaluate the sum of `peak_count` peaks over `x`.
pub fn sum_evaluate(
    x: &Array1<f64>,
    params: &Array1<f64>,
    peak_count: usize,
    peak: PeakModel,
) -> Result<Array1<f64>> {
    SignalModel::new(peak, peak_count).sum_evaluate(x, params)
}

/// The composite signal: a peak function and how many peaks are summed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalModel {
    peak: PeakModel,
    peak_count: usize,
}

impl SignalModel {
    pub fn new(peak: PeakModel, peak_count: usize) -> Self {
        Self { peak, peak_count }
    }

    pub fn peak(&self) -> PeakModel {
        self.peak
    }

    pub fn shape(&self) -> PeakShape {
        self.peak.shape
    }

    pub fn peak_count(&self) -> usize {
        self.peak_count
    }

    /// Length of the packed parameter vector.
    pub fn parameter_count(&self) -> usize {
        self.peak_count * self.peak.shape.stride()
    }

    pub fn pack(&self, peaks: &[PeakParams]) -> Array1<f64> {
        pack_parameters(self.peak.shape, peaks)
    }

    pub fn unpack(&self, params: &Array1<f64>) -> Result<Vec<PeakParams>> {
        let values = params.to_vec();
        unpack_parameters(self.peak.shape, &values, self.peak_count)
    }

    /// Composite prediction at each `x`.
    pub fn sum_evaluate(&self, x: &Array1<f64>, params: &Array1<f64>) -> Result<Array1<f64>> {
        let peaks = self.unpack(params)?;
        let mut total = Array1::zeros(x.len());
        for peak in &peaks {
            total.zip_mut_with(x, |acc, &xi| *acc += self.peak.evaluate_at(xi, peak));
        }
        Ok(total)
    }

    /// Each peak's own prediction at each `x`, in peak order.
    pub fn evaluate_peaks(&self, x: &Array1<f64>, params: &Array1<f64>) -> Result<Vec<Array1<f64>>> {
        Ok(self
            .unpack(params)?
            .iter()
            .map(|peak| self.peak.evaluate(x, peak))
            .collect())
    }
}

/// Least-squares problem: residuals `y_i - model(x_i)` for every observed sample.
#[derive(Debug, Clone)]
pub struct SignalProblem<'a> {
    model: SignalModel,
    x_data: &'a Array1<f64>,
    y_data: &'a Array1<f64>,
}

impl<'a> SignalProblem<'a> {
    pub fn new(model: SignalModel, x_data: &'a Array1<f64>, y_data: &'a Array1<f64>) -> Result<Self> {
        if x_data.len() != y_data.len() {
            return Err(DeconvError::DimensionMismatch(format!(
                "x has {} samples but y has {}",
                x_data.len(),
                y_data.len()
            )));
        }
        Ok(Self {
            model,
            x_data,
            y_data,
        })
    }

    pub fn model(&self) -> &SignalModel {
        &self.model
    }

    /// Get the number of data points
    pub fn ndata(&self) -> usize {
        self.x_data.len()
    }
}

impl Problem for SignalProblem<'_> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        let predicted = self.model.sum_evaluate(self.x_data, params)?;
        Ok(self.y_data - &predicted)
    }

    fn parameter_count(&self) -> usize {
        self.model.parameter_count()
    }

    fn residual_count(&self) -> usize {
        self.x_data.len()
    }
}
