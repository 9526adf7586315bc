//! Observed samples of a trace.
//!
//! A [`SampleSet`] is the cleaned two-column table every fit starts from:
//! at least one sample, finite values, and strictly increasing x.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{DeconvError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSamples", into = "RawSamples")]
pub struct SampleSet {
    x: Array1<f64>,
    y: Array1<f64>,
}

#[derive(Serialize, Deserialize)]
struct RawSamples {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl From<SampleSet> for RawSamples {
    fn from(samples: SampleSet) -> Self {
        Self {
            x: samples.x.to_vec(),
            y: samples.y.to_vec(),
        }
    }
}

impl TryFrom<RawSamples> for SampleSet {
    type Error = DeconvError;

    fn try_from(raw: RawSamples) -> Result<Self> {
        Self::new(Array1::from_vec(raw.x), Array1::from_vec(raw.y))
    }
}

impl SampleSet {
    pub fn new(x: Array1<f64>, y: Array1<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(DeconvError::DimensionMismatch(format!(
                "x has {} samples but y has {}",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(DeconvError::MalformedInput("no samples".to_string()));
        }
        if let Some(i) = x
            .iter()
            .zip(y.iter())
            .position(|(xi, yi)| !xi.is_finite() || !yi.is_finite())
        {
            return Err(DeconvError::MalformedInput(format!(
                "sample {i} is not finite: ({}, {})",
                x[i], y[i]
            )));
        }
        if let Some(i) = (1..x.len()).find(|&i| x[i] <= x[i - 1]) {
            return Err(DeconvError::MalformedInput(format!(
                "x must be strictly increasing, but x[{}] = {} follows x[{}] = {}",
                i,
                x[i],
                i - 1,
                x[i - 1]
            )));
        }
        Ok(Self { x, y })
    }

    pub fn from_columns(x: &[f64], y: &[f64]) -> Result<Self> {
        Self::new(Array1::from(x.to_vec()), Array1::from(y.to_vec()))
    }

    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self> {
        let (x, y): (Vec<f64>, Vec<f64>) = pairs.iter().copied().unzip();
        Self::new(Array1::from(x), Array1::from(y))
    }

    /// Build from numeric table rows, each holding exactly an x and a y value.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let mut pairs = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            match row.as_ref() {
                &[x, y] => pairs.push((x, y)),
                other => {
                    return Err(DeconvError::MalformedInput(format!(
                        "row {i} has {} columns, expected 2",
                        other.len()
                    )))
                }
            }
        }
        Self::from_pairs(&pairs)
    }

    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Always false, a sample set holds at least one sample.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// First and last x, the integration bounds for peak areas.
    pub fn bounds(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.iter().copied().zip(self.y.iter().copied())
    }
}
