use approx::assert_abs_diff_eq;
use ndarray::Array1;
use spline_feec::linalg::sparse::{solve, sparse_matvec};
use spline_feec::{
    Contribution, Integral, IntegralKind, Interpolation, ProjectionOptions, collocation_matrix,
    compute_greville, evaluate_spline, histopolation_matrix, make_open_knots, mass_matrix,
    reduce_knots, scaling_matrix_1d,
};

fn cell_error(
    integrate: &Integral,
    f: impl Fn(f64) -> f64,
    knots: &Array1<f64>,
    coeffs: &Array1<f64>,
    degree: usize,
) -> f64 {
    let diff = |x: f64| {
        let e = f(x) - evaluate_spline(knots.view(), coeffs.view(), degree, x).unwrap_or(f64::NAN);
        e * e
    };
    integrate.apply(diff).sum().sqrt()
}

#[test]
fn projectors_1d_pipeline_from_public_building_blocks() {
    let n_elements = 4;
    let p = 3;
    let n = n_elements + p - 1;
    let options = ProjectionOptions::default();

    let t = make_open_knots(p, n).expect("open knots");
    let grid = compute_greville(p, n, t.view()).expect("greville points");

    let m = collocation_matrix(p, n, t.view(), grid.view(), &options).expect("collocation");
    let h = histopolation_matrix(p, n, t.view(), grid.view(), &options).expect("histopolation");
    let mass = mass_matrix(p, n, t.view(), &options).expect("mass");

    let histopolation =
        Integral::new(p, n, t.view(), IntegralKind::Greville).expect("greville integral");
    let interpolation = Interpolation::new(p, n, t.view()).expect("interpolation");
    let contribution = Contribution::new(p, n, t.view()).expect("contribution");

    let f = |u: f64| u * (1.0 - u);

    let f_0 = solve(&m, &interpolation.apply(f)).expect("collocation solve");
    let f_1 = solve(&h, &histopolation.apply(f)).expect("histopolation solve");
    let f_l2 = solve(&mass, &contribution.apply(f)).expect("mass solve");

    let integrate = Integral::new(p, n, t.view(), IntegralKind::Cells).expect("cell integral");

    let err_0 = cell_error(&integrate, f, &t, &f_0, p);

    let tt = reduce_knots(t.view()).expect("reduced knots");
    let s = scaling_matrix_1d(p - 1, n - 1, tt.view()).expect("scaling");
    let f_1 = sparse_matvec(&s, &f_1).expect("scaled coefficients");
    let err_1 = cell_error(&integrate, f, &tt, &f_1, p - 1);

    let err_l2 = cell_error(&integrate, f, &t, &f_l2, p);

    for (label, err) in [("interpolation", err_0), ("histopolation", err_1), ("l2", err_l2)] {
        assert!(err.is_finite(), "{label} error is not finite");
        assert!(err < 1e-12, "{label} error too large: {err:.3e}");
    }

    let value = evaluate_spline(t.view(), f_0.view(), p, 0.5).expect("evaluation");
    assert_abs_diff_eq!(value, 0.25, epsilon = 1e-2);
}

#[test]
fn refinement_reduces_interpolation_error() {
    let f = |u: f64| (5.0 * u).sin() + u.powi(5);
    let mut errors = Vec::new();
    for n_elements in [4usize, 8, 16] {
        let p = 3;
        let n = n_elements + p;
        let t = make_open_knots(p, n).expect("open knots");
        let projector =
            spline_feec::Projector1D::new(p, n, t.view(), &ProjectionOptions::default())
                .expect("projector");
        let coeffs = projector.interpolate(f).expect("interpolation");
        errors.push(spline_feec::l2_error(f, coeffs.view(), p, t.view()).expect("error"));
    }
    // at least second order
    assert!(errors[1] < errors[0] / 4.0, "errors: {errors:?}");
    assert!(errors[2] < errors[1] / 4.0, "errors: {errors:?}");
}
