use ndarray::{Array1, Array2, ArrayView1};
use thiserror::Error;

#[cfg(test)]
use approx::assert_abs_diff_eq;

/// Error type for knot construction and B-spline evaluation.
#[derive(Error, Debug)]
pub enum BasisError {
    #[error(
        "Insufficient knots for degree {degree} spline: need at least {required} knots but only {provided} were provided."
    )]
    InsufficientKnotsForDegree {
        degree: usize,
        required: usize,
        provided: usize,
    },

    #[error(
        "An open knot vector of degree {degree} needs more than {degree} basis functions, got {dimension}."
    )]
    TooFewBasisFunctions { degree: usize, dimension: usize },

    #[error(
        "The provided knot vector is invalid: {0}. It must be non-decreasing and contain only finite values."
    )]
    InvalidKnotVector(String),

    #[error(
        "Knot vector is degenerate: all Greville abscissae are equal."
    )]
    DegenerateKnots,

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub fn validate_knots_for_degree(
    knot_vector: ArrayView1<f64>,
    degree: usize,
) -> Result<(), BasisError> {
    let required_knots = degree + 2;
    if knot_vector.len() < required_knots {
        return Err(BasisError::InsufficientKnotsForDegree {
            degree,
            required: required_knots,
            provided: knot_vector.len(),
        });
    }

    if knot_vector.iter().any(|&k| !k.is_finite()) {
        return Err(BasisError::InvalidKnotVector(
            "knot vector contains non-finite (NaN or Infinity) values".to_string(),
        ));
    }

    for i in 0..(knot_vector.len() - 1) {
        if knot_vector[i] > knot_vector[i + 1] {
            return Err(BasisError::InvalidKnotVector(
                "knot vector is not non-decreasing".to_string(),
            ));
        }
    }

    let n = knot_vector.len() - degree - 1;
    if knot_vector[degree] >= knot_vector[n] {
        return Err(BasisError::InvalidKnotVector(
            "knot vector spans an empty domain".to_string(),
        ));
    }

    Ok(())
}

/// Open (clamped) uniform knots on `[0, 1]` for `dimension` basis functions.
///
/// Both ends are repeated `degree + 1` times and the `dimension - degree - 1`
/// interior knots are uniformly spaced, so the result has
/// `dimension + degree + 1` entries.
pub fn make_open_knots(degree: usize, dimension: usize) -> Result<Array1<f64>, BasisError> {
    if dimension <= degree {
        return Err(BasisError::TooFewBasisFunctions { degree, dimension });
    }
    let n_cells = dimension - degree;
    let h = 1.0 / n_cells as f64;
    let mut knots = Vec::with_capacity(dimension + degree + 1);
    knots.extend(std::iter::repeat_n(0.0, degree + 1));
    for i in 1..n_cells {
        knots.push(i as f64 * h);
    }
    knots.extend(std::iter::repeat_n(1.0, degree + 1));
    Ok(Array1::from_vec(knots))
}

/// Drops the first and last knot, giving the knots of the space one degree
/// lower with one fewer basis function (`T[1:-1]`).
pub fn reduce_knots(knots: ArrayView1<f64>) -> Result<Array1<f64>, BasisError> {
    if knots.len() < 3 {
        return Err(BasisError::InvalidKnotVector(format!(
            "cannot reduce a knot vector of length {}",
            knots.len()
        )));
    }
    Ok(knots.slice(ndarray::s![1..knots.len() - 1]).to_owned())
}

/// Index `mu` of the knot span `[t_mu, t_mu+1)` containing `x`.
///
/// The last non-empty span is closed on the right, and points outside the
/// domain are assigned to the boundary span (polynomial extrapolation).
#[inline]
pub fn find_span(knots: ArrayView1<f64>, degree: usize, x: f64) -> usize {
    let num_basis = knots.len() - degree - 1;
    if x >= knots[num_basis] {
        let mut span = num_basis - 1;
        while span > degree && knots[span] == knots[span + 1] {
            span -= 1;
        }
        span
    } else if x < knots[degree] {
        degree
    } else {
        let mut span = degree;
        while span < num_basis && x >= knots[span + 1] {
            span += 1;
        }
        span
    }
}

/// Reusable buffers for Cox–de Boor evaluation.
#[derive(Clone, Debug)]
pub struct BsplineScratch {
    left: Vec<f64>,
    right: Vec<f64>,
    n: Vec<f64>,
}

impl BsplineScratch {
    #[inline]
    pub fn new(degree: usize) -> Self {
        let len = degree + 1;
        Self {
            left: vec![0.0; len],
            right: vec![0.0; len],
            n: vec![0.0; len],
        }
    }

    #[inline]
    fn ensure_degree(&mut self, degree: usize) {
        let len = degree + 1;
        if self.left.len() != len {
            self.left.resize(len, 0.0);
            self.right.resize(len, 0.0);
            self.n.resize(len, 0.0);
        }
    }
}

/// Evaluates the `degree + 1` non-zero B-splines at `x` into `values`.
///
/// Cox–de Boor recursion in the stable form of Algorithm A2.2 of
/// "The NURBS Book" (Piegl and Tiller). Returns the index of the first
/// supported basis function.
#[inline]
pub fn basis_funs(
    x: f64,
    degree: usize,
    knots: ArrayView1<f64>,
    values: &mut [f64],
    scratch: &mut BsplineScratch,
) -> usize {
    debug_assert_eq!(values.len(), degree + 1);

    scratch.ensure_degree(degree);
    scratch.n.fill(0.0);
    scratch.left.fill(0.0);
    scratch.right.fill(0.0);

    let mu = find_span(knots, degree, x);

    let left = &mut scratch.left;
    let right = &mut scratch.right;
    let n = &mut scratch.n;

    n[0] = 1.0;

    for d in 1..=degree {
        left[d] = x - knots[mu + 1 - d];
        right[d] = knots[mu + d] - x;

        let mut saved = 0.0;

        for r in 0..d {
            let den = right[r + 1] + left[d - r];
            let temp = if den.abs() > 1e-12 { n[r] / den } else { 0.0 };

            n[r] = saved + right[r + 1] * temp;
            saved = left[d - r] * temp;
        }
        n[d] = saved;
    }

    values.copy_from_slice(&n[..=degree]);

    mu - degree
}

/// Non-zero basis functions and their derivatives up to order `nders` at `x`.
///
/// Algorithm A2.3 of "The NURBS Book". Row `k` of the returned
/// `(nders + 1) x (degree + 1)` array holds the `k`-th derivatives; orders
/// above `degree` are identically zero. The second value is the index of the
/// first supported basis function.
pub fn basis_funs_ders(
    x: f64,
    degree: usize,
    knots: ArrayView1<f64>,
    nders: usize,
) -> (Array2<f64>, usize) {
    let p = degree;
    let span = find_span(knots, p, x);
    let mut ders = Array2::<f64>::zeros((nders + 1, p + 1));

    let mut ndu = Array2::<f64>::zeros((p + 1, p + 1));
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[[0, 0]] = 1.0;
    for j in 1..=p {
        left[j] = x - knots[span + 1 - j];
        right[j] = knots[span + j] - x;
        let mut saved = 0.0;
        for r in 0..j {
            // lower triangle holds knot differences
            ndu[[j, r]] = right[r + 1] + left[j - r];
            let temp = ndu[[r, j - 1]] / ndu[[j, r]];
            ndu[[r, j]] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[[j, j]] = saved;
    }
    for j in 0..=p {
        ders[[0, j]] = ndu[[j, p]];
    }

    let max_order = nders.min(p);
    let mut a = Array2::<f64>::zeros((2, p + 1));
    for r in 0..=p {
        let (mut s1, mut s2) = (0usize, 1usize);
        a[[0, 0]] = 1.0;
        for k in 1..=max_order {
            let mut d = 0.0;
            let rk = r as isize - k as isize;
            let pk = p - k;
            if rk >= 0 {
                a[[s2, 0]] = a[[s1, 0]] / ndu[[pk + 1, rk as usize]];
                d = a[[s2, 0]] * ndu[[rk as usize, pk]];
            }
            let j1 = if rk >= -1 { 1 } else { (-rk) as usize };
            let j2 = if r as isize - 1 <= pk as isize {
                k - 1
            } else {
                p - r
            };
            for j in j1..=j2 {
                let idx = (rk + j as isize) as usize;
                a[[s2, j]] = (a[[s1, j]] - a[[s1, j - 1]]) / ndu[[pk + 1, idx]];
                d += a[[s2, j]] * ndu[[idx, pk]];
            }
            if r <= pk {
                a[[s2, k]] = -a[[s1, k - 1]] / ndu[[pk + 1, r]];
                d += a[[s2, k]] * ndu[[r, pk]];
            }
            ders[[k, r]] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    let mut factor = p as f64;
    for k in 1..=max_order {
        for j in 0..=p {
            ders[[k, j]] *= factor;
        }
        factor *= (p - k) as f64;
    }

    (ders, span - p)
}

/// All `dimension` basis values at `x` (a dense collocation row).
pub fn collocation_values(
    x: f64,
    degree: usize,
    knots: ArrayView1<f64>,
    scratch: &mut BsplineScratch,
) -> Array1<f64> {
    let num_basis = knots.len() - degree - 1;
    let mut row = Array1::<f64>::zeros(num_basis);
    let mut local = vec![0.0; degree + 1];
    let start = basis_funs(x, degree, knots, &mut local, scratch);
    for (offset, &v) in local.iter().enumerate() {
        row[start + offset] = v;
    }
    row
}

/// Greville abscissae `g_i = (t_{i+1} + ... + t_{i+p}) / p`.
///
/// For degree 0 the knot midpoints are returned.
pub fn compute_greville(
    degree: usize,
    dimension: usize,
    knots: ArrayView1<f64>,
) -> Result<Array1<f64>, BasisError> {
    let n_knots = knots.len();
    if n_knots != dimension + degree + 1 {
        return Err(BasisError::DimensionMismatch(format!(
            "{n_knots} knots cannot carry {dimension} basis functions of degree {degree}"
        )));
    }
    if dimension == 0 {
        return Err(BasisError::TooFewBasisFunctions { degree, dimension });
    }

    let mut g = Array1::<f64>::zeros(dimension);
    if degree == 0 {
        for j in 0..dimension {
            g[j] = 0.5 * (knots[j] + knots[j + 1]);
        }
        return Ok(g);
    }

    let d_inv = 1.0 / (degree as f64);
    for j in 0..dimension {
        let mut sum = 0.0;
        for k in 1..=degree {
            sum += knots[j + k];
        }
        g[j] = sum * d_inv;
    }

    if dimension > 1 {
        let g_min = g.iter().cloned().fold(f64::INFINITY, f64::min);
        let g_max = g.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if (g_max - g_min) < 1e-10 {
            return Err(BasisError::DegenerateKnots);
        }
    }

    Ok(g)
}

fn check_coefficients(
    knots: ArrayView1<f64>,
    coeffs: ArrayView1<f64>,
    degree: usize,
) -> Result<(), BasisError> {
    let required = degree + 2;
    if knots.len() < required {
        return Err(BasisError::InsufficientKnotsForDegree {
            degree,
            required,
            provided: knots.len(),
        });
    }
    let num_basis = knots.len() - degree - 1;
    if coeffs.len() != num_basis {
        return Err(BasisError::DimensionMismatch(format!(
            "{} coefficients for {num_basis} basis functions",
            coeffs.len()
        )));
    }
    Ok(())
}

/// Point evaluation of `Σ c_i B_i(x)`.
pub fn evaluate_spline(
    knots: ArrayView1<f64>,
    coeffs: ArrayView1<f64>,
    degree: usize,
    x: f64,
) -> Result<f64, BasisError> {
    check_coefficients(knots, coeffs, degree)?;
    let mut local = vec![0.0; degree + 1];
    let mut scratch = BsplineScratch::new(degree);
    let start = basis_funs(x, degree, knots, &mut local, &mut scratch);
    Ok(local
        .iter()
        .enumerate()
        .map(|(offset, &b)| b * coeffs[start + offset])
        .sum())
}

/// Point evaluation of the `order`-th derivative of `Σ c_i B_i`.
pub fn evaluate_spline_derivative(
    knots: ArrayView1<f64>,
    coeffs: ArrayView1<f64>,
    degree: usize,
    order: usize,
    x: f64,
) -> Result<f64, BasisError> {
    check_coefficients(knots, coeffs, degree)?;
    let (ders, start) = basis_funs_ders(x, degree, knots, order);
    Ok((0..=degree)
        .map(|offset| ders[[order, offset]] * coeffs[start + offset])
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Independent recursive Cox–de Boor evaluation, following the canonical
    /// definition in de Boor's "A Practical Guide to Splines".
    fn evaluate_bspline(x: f64, knots: &Array1<f64>, i: usize, degree: usize) -> f64 {
        let last_knot = *knots.last().expect("knot vector should be non-empty");
        let last_basis_index = knots.len() - degree - 2;

        if (x - last_knot).abs() < 1e-12 {
            return if i == last_basis_index { 1.0 } else { 0.0 };
        }

        if degree == 0 {
            if x >= knots[i] && x < knots[i + 1] {
                return 1.0;
            }
            return 0.0;
        }

        let mut result = 0.0;
        let den1 = knots[i + degree] - knots[i];
        if den1.abs() > 1e-12 {
            result += (x - knots[i]) / den1 * evaluate_bspline(x, knots, i, degree - 1);
        }
        let den2 = knots[i + degree + 1] - knots[i + 1];
        if den2.abs() > 1e-12 {
            result += (knots[i + degree + 1] - x) / den2
                * evaluate_bspline(x, knots, i + 1, degree - 1);
        }
        result
    }

    #[test]
    fn open_knots_are_clamped_and_uniform() {
        let knots = make_open_knots(3, 6).unwrap();
        let expected = array![0.0, 0.0, 0.0, 0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0, 1.0, 1.0, 1.0];
        assert_abs_diff_eq!(
            knots.as_slice().unwrap(),
            expected.as_slice().unwrap(),
            epsilon = 1e-14
        );
        assert!(matches!(
            make_open_knots(3, 3),
            Err(BasisError::TooFewBasisFunctions { .. })
        ));
    }

    #[test]
    fn reduced_knots_drop_one_knot_per_end() {
        let knots = make_open_knots(2, 5).unwrap();
        let reduced = reduce_knots(knots.view()).unwrap();
        assert_eq!(reduced.len(), knots.len() - 2);
        assert_eq!(reduced[0], 0.0);
        assert_eq!(reduced[1], 0.0);
        assert_ne!(reduced[2], 0.0);
    }

    #[test]
    fn basis_funs_match_recursive_definition() {
        let knots = array![0.0, 0.0, 0.0, 0.0, 0.2, 0.5, 0.5, 0.9, 1.0, 1.0, 1.0, 1.0];
        let degree = 3;
        let mut scratch = BsplineScratch::new(degree);
        for &x in &[0.0, 0.1, 0.2, 0.35, 0.5, 0.77, 0.999, 1.0] {
            let row = collocation_values(x, degree, knots.view(), &mut scratch);
            for i in 0..row.len() {
                assert_abs_diff_eq!(row[i], evaluate_bspline(x, &knots, i, degree), epsilon = 1e-12);
            }
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn degree_zero_basis_is_an_indicator() {
        let knots = array![0.0, 0.5, 1.0];
        let mut scratch = BsplineScratch::new(0);
        let row = collocation_values(0.25, 0, knots.view(), &mut scratch);
        assert_eq!(row, array![1.0, 0.0]);
        let row = collocation_values(1.0, 0, knots.view(), &mut scratch);
        assert_eq!(row, array![0.0, 1.0]);
    }

    #[test]
    fn derivatives_match_finite_differences() {
        let knots = make_open_knots(3, 7).unwrap();
        let degree = 3;
        let h = 1e-6;
        let mut scratch = BsplineScratch::new(degree);
        for &x in &[0.13, 0.41, 0.66, 0.93] {
            let (ders, start) = basis_funs_ders(x, degree, knots.view(), 2);
            let plus = collocation_values(x + h, degree, knots.view(), &mut scratch);
            let minus = collocation_values(x - h, degree, knots.view(), &mut scratch);
            let center = collocation_values(x, degree, knots.view(), &mut scratch);
            for offset in 0..=degree {
                let i = start + offset;
                assert_abs_diff_eq!(ders[[0, offset]], center[i], epsilon = 1e-12);
                let fd1 = (plus[i] - minus[i]) / (2.0 * h);
                assert_abs_diff_eq!(ders[[1, offset]], fd1, epsilon = 1e-5);
                let fd2 = (plus[i] - 2.0 * center[i] + minus[i]) / (h * h);
                assert_abs_diff_eq!(ders[[2, offset]], fd2, epsilon = 1e-2);
            }
        }
    }

    #[test]
    fn derivative_orders_above_degree_vanish() {
        let knots = make_open_knots(1, 4).unwrap();
        let (ders, _) = basis_funs_ders(0.3, 1, knots.view(), 3);
        for k in 2..=3 {
            for j in 0..=1 {
                assert_eq!(ders[[k, j]], 0.0);
            }
        }
    }

    #[test]
    fn greville_points_of_open_cubic_knots() {
        let knots = make_open_knots(3, 6).unwrap();
        let g = compute_greville(3, 6, knots.view()).unwrap();
        let expected = array![0.0, 1.0 / 9.0, 1.0 / 3.0, 2.0 / 3.0, 8.0 / 9.0, 1.0];
        assert_abs_diff_eq!(
            g.as_slice().unwrap(),
            expected.as_slice().unwrap(),
            epsilon = 1e-14
        );
        assert!(matches!(
            compute_greville(3, 5, knots.view()),
            Err(BasisError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn spline_reproduces_linear_function_from_greville_coefficients() {
        // Coefficients equal to the Greville abscissae represent x exactly.
        let knots = make_open_knots(2, 6).unwrap();
        let g = compute_greville(2, 6, knots.view()).unwrap();
        for &x in &[0.0, 0.3, 0.71, 1.0] {
            let value = evaluate_spline(knots.view(), g.view(), 2, x).unwrap();
            assert_abs_diff_eq!(value, x, epsilon = 1e-12);
            let slope = evaluate_spline_derivative(knots.view(), g.view(), 2, 1, x).unwrap();
            assert_abs_diff_eq!(slope, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn invalid_knots_are_rejected() {
        let decreasing = array![0.0, 0.0, 1.0, 0.5, 1.0];
        assert!(matches!(
            validate_knots_for_degree(decreasing.view(), 1),
            Err(BasisError::InvalidKnotVector(_))
        ));
        let short = array![0.0, 1.0];
        assert!(matches!(
            validate_knots_for_degree(short.view(), 1),
            Err(BasisError::InsufficientKnotsForDegree { .. })
        ));
        let coeffs = array![1.0, 2.0];
        assert!(matches!(
            evaluate_spline(make_open_knots(1, 3).unwrap().view(), coeffs.view(), 1, 0.5),
            Err(BasisError::DimensionMismatch(_))
        ));
    }
}
