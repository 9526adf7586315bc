//! Peak areas by adaptive quadrature.
//!
//! Each peak is integrated on its own, over the first and last observed x,
//! with a globally adaptive 7-point Gauss / 15-point Kronrod rule: the
//! subinterval with the largest error estimate is bisected until the summed
//! estimate meets `max(epsabs, epsrel * |value|)` or the subdivision limit is
//! reached.

use serde::{Deserialize, Serialize};

use crate::models::{PeakModel, PeakParams};

/// Kronrod abscissae on [-1, 1], positive half. Odd indices are the Gauss nodes.
const XGK: [f64; 8] = [
    0.991455371120812639206854697526329,
    0.949107912342758524526189684047851,
    0.864864423359769072789712788640926,
    0.741531185599394439863864773280788,
    0.586087235467691130294144845693013,
    0.405845151377397166906606412076961,
    0.207784955007898467600689403773245,
    0.000000000000000000000000000000000,
];

/// Kronrod weights matching [`XGK`].
const WGK: [f64; 8] = [
    0.022935322010529224963732008058970,
    0.063092092629978553290700663189204,
    0.104790010322250183839876322541518,
    0.140653259715525918745189590510238,
    0.169004726639267902826583426598550,
    0.190350578064785409913256402421014,
    0.204432940075298892414161999234649,
    0.209482141084727828012999174891714,
];

/// 7-point Gauss weights at `XGK[1]`, `XGK[3]`, `XGK[5]`, `XGK[7]`.
const WG: [f64; 4] = [
    0.129484966168869693270611432679082,
    0.279705391489276667901467771423780,
    0.381830050505118944950369775488975,
    0.417959183673469387755102040816327,
];

/// Tolerances for the adaptive quadrature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadratureConfig {
    /// Absolute error target
    pub epsabs: f64,
    /// Relative error target
    pub epsrel: f64,
    /// Maximum number of subintervals
    pub limit: usize,
}

impl Default for QuadratureConfig {
    fn default() -> Self {
        Self {
            epsabs: 1.49e-8,
            epsrel: 1.49e-8,
            limit: 50,
        }
    }
}

impl QuadratureConfig {
    pub fn with_epsabs(mut self, epsabs: f64) -> Self {
        self.epsabs = epsabs;
        self
    }

    pub fn with_epsrel(mut self, epsrel: f64) -> Self {
        self.epsrel = epsrel;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }
}

/// Value of an integral with its error estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuadratureResult {
    pub value: f64,
    /// Estimated absolute error of `value`
    pub abserr: f64,
    /// Integrand evaluations
    pub evaluations: usize,
    pub subintervals: usize,
    /// Whether the error target was met
    pub converged: bool,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    lower: f64,
    upper: f64,
    value: f64,
    error: f64,
}

/// Apply the 15-point Kronrod rule on `[lower, upper]`, returning the
/// estimate and its QUADPACK-style error bound.
fn gauss_kronrod_15<F: Fn(f64) -> f64>(f: &F, lower: f64, upper: f64) -> (f64, f64) {
    let center = 0.5 * (lower + upper);
    let half_length = 0.5 * (upper - lower);
    let abs_half_length = half_length.abs();

    let fc = f(center);
    let mut res_gauss = fc * WG[3];
    let mut res_kronrod = fc * WGK[7];
    let mut res_abs = res_kronrod.abs();

    let mut fv1 = [0.0; 7];
    let mut fv2 = [0.0; 7];
    for (j, &abscissa) in XGK.iter().take(7).enumerate() {
        let offset = half_length * abscissa;
        let f1 = f(center - offset);
        let f2 = f(center + offset);
        fv1[j] = f1;
        fv2[j] = f2;
        res_kronrod += WGK[j] * (f1 + f2);
        res_abs += WGK[j] * (f1.abs() + f2.abs());
        if j % 2 == 1 {
            res_gauss += WG[j / 2] * (f1 + f2);
        }
    }

    let mean = 0.5 * res_kronrod;
    let mut res_asc = WGK[7] * (fc - mean).abs();
    for j in 0..7 {
        res_asc += WGK[j] * ((fv1[j] - mean).abs() + (fv2[j] - mean).abs());
    }

    let value = res_kronrod * half_length;
    res_abs *= abs_half_length;
    res_asc *= abs_half_length;

    let mut error = ((res_kronrod - res_gauss) * half_length).abs();
    if res_asc != 0.0 && error != 0.0 {
        error = res_asc * (200.0 * error / res_asc).powf(1.5).min(1.0);
    }
    if res_abs > f64::MIN_POSITIVE / (50.0 * f64::EPSILON) {
        error = error.max(50.0 * f64::EPSILON * res_abs);
    }
    (value, error)
}

/// Integrate `f` over `[lower, upper]`.
///
/// Reversed bounds give the negated integral, equal bounds give zero.
/// Non-finite integrand values propagate into the result.
pub fn quad<F: Fn(f64) -> f64>(f: F, lower: f64, upper: f64, config: &QuadratureConfig) -> QuadratureResult {
    if lower == upper {
        return QuadratureResult {
            value: 0.0,
            abserr: 0.0,
            evaluations: 0,
            subintervals: 0,
            converged: true,
        };
    }

    let tolerance = |value: f64| config.epsabs.max(config.epsrel * value.abs());

    let (value, error) = gauss_kronrod_15(&f, lower, upper);
    let mut segments = vec![Segment {
        lower,
        upper,
        value,
        error,
    }];
    let mut evaluations = 15;
    let mut total = value;
    let mut total_error = error;

    while total_error > tolerance(total) && segments.len() < config.limit.max(1) {
        // Bisect the segment with the largest error estimate
        let worst = segments
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.error.total_cmp(&b.error))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let segment = segments.swap_remove(worst);
        let midpoint = 0.5 * (segment.lower + segment.upper);
        if midpoint == segment.lower || midpoint == segment.upper {
            segments.push(segment);
            break;
        }

        let (left_value, left_error) = gauss_kronrod_15(&f, segment.lower, midpoint);
        let (right_value, right_error) = gauss_kronrod_15(&f, midpoint, segment.upper);
        evaluations += 30;

        log::trace!(
            "bisected [{:.6}, {:.6}]: error {:.3e} -> {:.3e}",
            segment.lower,
            segment.upper,
            segment.error,
            left_error + right_error
        );

        segments.push(Segment {
            lower: segment.lower,
            upper: midpoint,
            value: left_value,
            error: left_error,
        });
        segments.push(Segment {
            lower: midpoint,
            upper: segment.upper,
            value: right_value,
            error: right_error,
        });

        total = segments.iter().map(|s| s.value).sum();
        total_error = segments.iter().map(|s| s.error).sum();
        if !total_error.is_finite() {
            break;
        }
    }

    let converged = total_error <= tolerance(total);
    if !converged {
        log::warn!(
            "quadrature over [{lower}, {upper}] stopped at {} subintervals with estimated error {total_error:.3e}",
            segments.len()
        );
    }

    QuadratureResult {
        value: total,
        abserr: total_error,
        evaluations,
        subintervals: segments.len(),
        converged,
    }
}

/// Integrate a single peak over `[lower, upper]`, with its error estimate.
pub fn integrate_with_estimate(
    params: &PeakParams,
    model: PeakModel,
    lower: f64,
    upper: f64,
    config: &QuadratureConfig,
) -> QuadratureResult {
    quad(|x| model.evaluate_at(x, params), lower, upper, config)
}

/// Area of a single peak over `[lower, upper]`.
pub fn integrate(params: &PeakParams, model: PeakModel, lower: f64, upper: f64, config: &QuadratureConfig) -> f64 {
    integrate_with_estimate(params, model, lower, upper, config).value
}

/// Area of every peak over the same bounds, in peak order.
///
/// Peaks are integrated in isolation, not against the composite curve.
pub fn peak_areas(
    peaks: &[PeakParams],
    model: PeakModel,
    lower: f64,
    upper: f64,
    config: &QuadratureConfig,
) -> Vec<f64> {
    peaks
        .iter()
        .enumerate()
        .map(|(i, peak)| {
            let area = integrate(peak, model, lower, upper, config);
            log::debug!("peak {i} area over [{lower}, {upper}] = {area:.6}");
            area
        })
        .collect()
}
