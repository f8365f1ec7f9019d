//! Gauss–Legendre quadrature on knot grids.
//!
//! Nodes and weights come from the Golub–Welsch algorithm: the nodes are the
//! eigenvalues of the symmetric tridiagonal Jacobi matrix of the Legendre
//! recurrence and the weights are `2 * v0^2`, with `v0` the first component of
//! each normalized eigenvector. A `k`-point rule integrates polynomials of
//! degree `2k - 1` exactly, so `p + 1` points per cell are enough for every
//! product of two degree-`p` splines.

use crate::basis::{BasisError, basis_funs_ders, validate_knots_for_degree};
use crate::linalg::utils::KahanSum;
use ndarray::{Array1, Array2, Array4, ArrayView1};

/// Gauss–Legendre rule on the reference interval `[-1, 1]`.
#[derive(Clone, Debug)]
pub struct GaussLegendreRule {
    pub nodes: Vec<f64>,
    pub weights: Vec<f64>,
}

impl GaussLegendreRule {
    pub fn new(num_points: usize) -> Result<Self, BasisError> {
        if num_points == 0 {
            return Err(BasisError::InvalidInput(
                "a quadrature rule needs at least one point".to_string(),
            ));
        }

        // Legendre recurrence: diagonal is zero, off-diagonal is i / sqrt(4i^2 - 1).
        let mut diag = vec![0.0f64; num_points];
        let mut off_diag: Vec<f64> = (1..num_points)
            .map(|i| {
                let i = i as f64;
                i / (4.0 * i * i - 1.0).sqrt()
            })
            .collect();

        let (eigenvalues, eigenvectors) = symmetric_tridiagonal_eigen(&mut diag, &mut off_diag);

        let mu0 = 2.0;
        let mut pairs: Vec<(f64, f64)> = eigenvalues
            .iter()
            .zip(eigenvectors.iter())
            .map(|(&node, v)| (node, mu0 * v[0] * v[0]))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(Self {
            nodes: pairs.iter().map(|p| p.0).collect(),
            weights: pairs.iter().map(|p| p.1).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Integral of `f` over `[a, b]` with the rule mapped affinely.
    pub fn integrate<F: Fn(f64) -> f64>(&self, a: f64, b: f64, f: F) -> f64 {
        let half = 0.5 * (b - a);
        let mid = 0.5 * (b + a);
        let acc: KahanSum = self
            .nodes
            .iter()
            .zip(self.weights.iter())
            .map(|(&s, &w)| w * f(mid + half * s))
            .collect();
        half * acc.sum()
    }
}

/// Symmetric tridiagonal eigenvalue decomposition using implicit QR with Wilkinson shifts.
///
/// Returns (eigenvalues, eigenvectors) where eigenvectors[i] is the i-th eigenvector.
fn symmetric_tridiagonal_eigen(
    diag: &mut [f64],
    off_diag: &mut [f64],
) -> (Vec<f64>, Vec<Vec<f64>>) {
    let size = diag.len();
    let mut z = vec![vec![0.0; size]; size];
    for (i, row) in z.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    let eps = 1e-15;
    let max_iter = 100;

    let mut n = size;
    while n > 1 {
        let mut converged = false;
        for _ in 0..max_iter {
            // Find the largest unreduced block
            let mut m = n - 1;
            while m > 0 {
                if off_diag[m - 1].abs() <= eps * (diag[m - 1].abs() + diag[m].abs()) {
                    off_diag[m - 1] = 0.0;
                    break;
                }
                m -= 1;
            }

            if m == n - 1 {
                n -= 1;
                converged = true;
                break;
            }

            let shift = wilkinson_shift(diag[n - 2], diag[n - 1], off_diag[n - 2]);

            let mut x = diag[m] - shift;
            let mut y = off_diag[m];

            for k in m..(n - 1) {
                let (c, s) = if y.abs() > eps {
                    let r = x.hypot(y);
                    if r > 0.0 && r.is_finite() {
                        (x / r, -y / r)
                    } else {
                        (1.0, 0.0)
                    }
                } else {
                    (1.0, 0.0)
                };

                if k > m {
                    off_diag[k - 1] = x.hypot(y);
                }

                let d1 = diag[k];
                let d2 = diag[k + 1];
                let e_k = off_diag[k];

                diag[k] = c * c * d1 + s * s * d2 - 2.0 * c * s * e_k;
                diag[k + 1] = s * s * d1 + c * c * d2 + 2.0 * c * s * e_k;
                off_diag[k] = c * s * (d1 - d2) + (c * c - s * s) * e_k;

                if k < n - 2 {
                    x = off_diag[k];
                    y = -s * off_diag[k + 1];
                    off_diag[k + 1] *= c;
                }

                for i in 0..size {
                    let t = z[k][i];
                    z[k][i] = c * t - s * z[k + 1][i];
                    z[k + 1][i] = s * t + c * z[k + 1][i];
                }
            }
        }
        if !converged {
            // Force trailing deflation so the sweep always terminates.
            off_diag[n - 2] = 0.0;
            n -= 1;
        }
    }

    (diag.to_vec(), z)
}

#[inline]
fn wilkinson_shift(a: f64, c: f64, b: f64) -> f64 {
    let d = (a - c) * 0.5;
    let t = d.hypot(b);
    let sgn = if d >= 0.0 { 1.0 } else { -1.0 }; // sign(0)=+1
    let denom = d + sgn * t;

    if denom.abs() > f64::EPSILON * t.max(1.0) {
        c - (b * b) / denom
    } else {
        c - t
    }
}

/// Distinct knot values of an open knot vector.
pub fn breaks(knots: ArrayView1<f64>) -> Array1<f64> {
    let mut out: Vec<f64> = Vec::with_capacity(knots.len());
    for &k in knots.iter() {
        if out.last().is_none_or(|&last| k > last) {
            out.push(k);
        }
    }
    Array1::from_vec(out)
}

/// Quadrature points and weights on every cell of a breakpoint grid.
#[derive(Clone, Debug)]
pub struct QuadratureGrid {
    pub breaks: Array1<f64>,
    /// Shape `(ncells, k)`.
    pub points: Array2<f64>,
    /// Shape `(ncells, k)`.
    pub weights: Array2<f64>,
    rule: GaussLegendreRule,
}

impl QuadratureGrid {
    pub fn from_breaks(breaks: Array1<f64>, rule: GaussLegendreRule) -> Result<Self, BasisError> {
        if breaks.len() < 2 {
            return Err(BasisError::InvalidInput(
                "a quadrature grid needs at least two breakpoints".to_string(),
            ));
        }
        let ncells = breaks.len() - 1;
        let k = rule.len();
        let mut points = Array2::<f64>::zeros((ncells, k));
        let mut weights = Array2::<f64>::zeros((ncells, k));
        for ie in 0..ncells {
            let (a, b) = (breaks[ie], breaks[ie + 1]);
            let half = 0.5 * (b - a);
            let mid = 0.5 * (b + a);
            for iq in 0..k {
                points[[ie, iq]] = mid + half * rule.nodes[iq];
                weights[[ie, iq]] = half * rule.weights[iq];
            }
        }
        Ok(Self {
            breaks,
            points,
            weights,
            rule,
        })
    }

    /// Grid on the cells of `knots` with `num_points` Gauss points per cell.
    pub fn from_knots(knots: ArrayView1<f64>, num_points: usize) -> Result<Self, BasisError> {
        Self::from_breaks(breaks(knots), GaussLegendreRule::new(num_points)?)
    }

    pub fn ncells(&self) -> usize {
        self.points.nrows()
    }

    pub fn num_points(&self) -> usize {
        self.points.ncols()
    }

    /// Integral of `f` over each cell.
    pub fn integrate_cells<F: Fn(f64) -> f64>(&self, f: F) -> Array1<f64> {
        Array1::from_shape_fn(self.ncells(), |ie| {
            let acc: KahanSum = (0..self.num_points())
                .map(|iq| self.weights[[ie, iq]] * f(self.points[[ie, iq]]))
                .collect();
            acc.sum()
        })
    }

    /// Integral of `f` over `[a, b]`, split at every breakpoint inside the
    /// interval so piecewise-polynomial integrands are integrated exactly.
    pub fn integrate_interval<F: Fn(f64) -> f64>(&self, a: f64, b: f64, f: F) -> f64 {
        if b <= a {
            return 0.0;
        }
        let mut acc = KahanSum::default();
        let mut lo = a;
        for &brk in self.breaks.iter() {
            if brk > lo && brk < b {
                acc.add(self.rule.integrate(lo, brk, &f));
                lo = brk;
            }
        }
        acc.add(self.rule.integrate(lo, b, &f));
        acc.sum()
    }
}

/// Non-zero basis values and derivatives at every quadrature point.
#[derive(Clone, Debug)]
pub struct BasisOnGrid {
    /// First supported basis index per cell.
    pub spans: Vec<usize>,
    /// Shape `(ncells, degree + 1, nders + 1, k)`.
    pub values: Array4<f64>,
}

/// Evaluates the B-splines of `knots` and their derivatives up to `nders` on
/// every point of `grid`.
pub fn eval_on_grid_splines_ders(
    degree: usize,
    knots: ArrayView1<f64>,
    grid: &QuadratureGrid,
    nders: usize,
) -> Result<BasisOnGrid, BasisError> {
    validate_knots_for_degree(knots, degree)?;
    let ncells = grid.ncells();
    let k = grid.num_points();
    let mut values = Array4::<f64>::zeros((ncells, degree + 1, nders + 1, k));
    let mut spans = Vec::with_capacity(ncells);
    for ie in 0..ncells {
        // the cell midpoint fixes the span even when a point sits on a break
        let mid = 0.5 * (grid.breaks[ie] + grid.breaks[ie + 1]);
        let (_, start) = basis_funs_ders(mid, degree, knots, 0);
        spans.push(start);
        for iq in 0..k {
            let (ders, point_start) = basis_funs_ders(grid.points[[ie, iq]], degree, knots, nders);
            if point_start != start {
                return Err(BasisError::InvalidInput(format!(
                    "quadrature point {} is outside cell {ie}",
                    grid.points[[ie, iq]]
                )));
            }
            for il in 0..=degree {
                for id in 0..=nders {
                    values[[ie, il, id, iq]] = ders[[id, il]];
                }
            }
        }
    }
    Ok(BasisOnGrid { spans, values })
}
