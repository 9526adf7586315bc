//! Properties of the peak and signal models.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use gcdeconv_rs::{
    pack_parameters, sum_evaluate, unpack_parameters, DeconvError, PeakModel, PeakParams, PeakShape,
    SkewExponent,
};
use ndarray::{array, Array1};

#[test]
fn symmetric_peak_equals_amplitude_at_center() {
    let model = PeakModel::symmetric();
    for &(a, b, c) in &[(5.0, 10.0, 2.0), (0.3, -4.0, 0.1), (120.0, 13.25, 7.5), (-2.0, 0.0, -1.0)] {
        let y = model.evaluate(&array![b], &PeakParams::symmetric(a, b, c));
        assert_eq!(y[0], a);
    }
}

#[test]
fn zero_skew_reduces_to_symmetric_peak() {
    let x = Array1::linspace(0.0, 30.0, 301);
    let skew_params = array![6.5, 13.0, 1.2, 0.0, 4.5, 19.0, 0.8, 0.0];

    for exponent in [SkewExponent::Literal, SkewExponent::Corrected] {
        let skew = sum_evaluate(&x, &skew_params, 2, PeakModel::skew(exponent)).unwrap();

        let peaks = unpack_parameters(PeakShape::Skew, skew_params.as_slice().unwrap(), 2).unwrap();
        let equivalent: Vec<PeakParams> = peaks.iter().map(|p| p.symmetric_equivalent(exponent)).collect();
        let symmetric_params = pack_parameters(PeakShape::Symmetric, &equivalent);
        let symmetric = sum_evaluate(&x, &symmetric_params, 2, PeakModel::symmetric()).unwrap();

        for (s, g) in skew.iter().zip(symmetric.iter()) {
            assert_relative_eq!(*s, *g, epsilon = 1e-12, max_relative = 1e-12);
        }
    }
}

#[test]
fn literal_and_corrected_exponents_agree_at_unit_width() {
    let x = Array1::linspace(5.0, 15.0, 41);
    let params = PeakParams::skewed(3.0, 10.0, 1.0, 1.5);
    let literal = PeakModel::skew(SkewExponent::Literal).evaluate(&x, &params);
    let corrected = PeakModel::skew(SkewExponent::Corrected).evaluate(&x, &params);
    for (l, c) in literal.iter().zip(corrected.iter()) {
        assert_relative_eq!(*l, *c, epsilon = 1e-15);
    }
}

#[test]
fn positive_skew_moves_mass_right() {
    let params = PeakParams::skewed(1.0, 0.0, 1.0, 4.0);
    let model = PeakModel::skew(SkewExponent::Corrected);
    assert!(model.evaluate_at(1.0, &params) > model.evaluate_at(-1.0, &params));
    assert_abs_diff_eq!(model.evaluate_at(-6.0, &params), 0.0, epsilon = 1e-12);
}

#[test]
fn zero_width_is_not_guarded() {
    let model = PeakModel::symmetric();
    let y = model.evaluate(&array![0.0, 1.0], &PeakParams::symmetric(1.0, 1.0, 0.0));
    assert!(y.iter().any(|v| !v.is_finite()));
}

#[test]
fn packing_layout_is_stride_major() {
    let peaks = [PeakParams::symmetric(1.0, 2.0, 3.0), PeakParams::symmetric(4.0, 5.0, 6.0)];
    let packed = pack_parameters(PeakShape::Symmetric, &peaks);
    assert_eq!(packed, array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    assert_eq!(
        unpack_parameters(PeakShape::Symmetric, packed.as_slice().unwrap(), 2).unwrap(),
        peaks.to_vec()
    );

    let err = sum_evaluate(&array![0.0], &packed, 3, PeakModel::symmetric()).unwrap_err();
    assert!(matches!(err, DeconvError::DimensionMismatch(_)));
}

#[test]
fn selector_strings() {
    assert_eq!("Symmetric Gaussian".parse::<PeakShape>().unwrap(), PeakShape::Symmetric);
    assert_eq!(
        "Function Type: Asymmetric Gaussian".parse::<PeakShape>().unwrap(),
        PeakShape::Skew
    );
    assert_eq!(PeakShape::Skew.to_string(), "Asymmetric Gaussian");
    assert!(matches!(
        "Lorentzian".parse::<PeakShape>(),
        Err(DeconvError::UnknownVariant(_))
    ));
}
