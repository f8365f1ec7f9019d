//! Functional operators: continuous fields to right-hand-side vectors.
//!
//! Each operator is paired with one system matrix of [`crate::matrices`]:
//! [`Interpolation`] with the collocation matrix, [`Integral`] in
//! [`IntegralKind::Greville`] mode with the histopolation matrix, and
//! [`Contribution`] with the mass matrix. The 2D operators sample tensor
//! grids in parallel, so the fields they take must be `Sync`.

use crate::basis::compute_greville;
use crate::error::SplineError;
use crate::linalg::utils::KahanSum;
use crate::matrices::check_space;
use crate::quadrature::{BasisOnGrid, QuadratureGrid, eval_on_grid_splines_ders};
use crate::types::{IntegralKind, ProjectionOptions};
use ndarray::{Array1, Array2, ArrayView1, Zip};

/// Samples a field at the Greville points.
#[derive(Clone, Debug)]
pub struct Interpolation {
    greville: Array1<f64>,
}

impl Interpolation {
    pub fn new(degree: usize, dimension: usize, knots: ArrayView1<f64>) -> Result<Self, SplineError> {
        check_space(degree, dimension, knots)?;
        Ok(Self {
            greville: compute_greville(degree, dimension, knots)?,
        })
    }

    pub fn points(&self) -> ArrayView1<'_, f64> {
        self.greville.view()
    }

    pub fn apply<F: Fn(f64) -> f64>(&self, f: F) -> Array1<f64> {
        self.greville.mapv(f)
    }
}

/// Integrals of a field over Greville intervals or knot cells.
#[derive(Clone, Debug)]
pub struct Integral {
    kind: IntegralKind,
    greville: Array1<f64>,
    grid: QuadratureGrid,
}

impl Integral {
    pub fn new(
        degree: usize,
        dimension: usize,
        knots: ArrayView1<f64>,
        kind: IntegralKind,
    ) -> Result<Self, SplineError> {
        Self::with_options(degree, dimension, knots, kind, &ProjectionOptions::default())
    }

    pub fn with_options(
        degree: usize,
        dimension: usize,
        knots: ArrayView1<f64>,
        kind: IntegralKind,
        options: &ProjectionOptions,
    ) -> Result<Self, SplineError> {
        check_space(degree, dimension, knots)?;
        Ok(Self {
            kind,
            greville: compute_greville(degree, dimension, knots)?,
            grid: QuadratureGrid::from_knots(knots, options.quadrature_points_for(degree))?,
        })
    }

    pub fn kind(&self) -> IntegralKind {
        self.kind
    }

    /// `dimension - 1` values in Greville mode, one per cell otherwise.
    pub fn apply<F: Fn(f64) -> f64>(&self, f: F) -> Array1<f64> {
        match self.kind {
            IntegralKind::Cells => self.grid.integrate_cells(f),
            IntegralKind::Greville => {
                Array1::from_shape_fn(self.greville.len() - 1, |i| {
                    self.grid
                        .integrate_interval(self.greville[i], self.greville[i + 1], &f)
                })
            }
        }
    }
}

/// Galerkin moments `∫ f B_i`.
#[derive(Clone, Debug)]
pub struct Contribution {
    degree: usize,
    dimension: usize,
    grid: QuadratureGrid,
    on_grid: BasisOnGrid,
}

impl Contribution {
    pub fn new(degree: usize, dimension: usize, knots: ArrayView1<f64>) -> Result<Self, SplineError> {
        Self::with_options(degree, dimension, knots, &ProjectionOptions::default())
    }

    pub fn with_options(
        degree: usize,
        dimension: usize,
        knots: ArrayView1<f64>,
        options: &ProjectionOptions,
    ) -> Result<Self, SplineError> {
        check_space(degree, dimension, knots)?;
        let grid = QuadratureGrid::from_knots(knots, options.quadrature_points_for(degree))?;
        let on_grid = eval_on_grid_splines_ders(degree, knots, &grid, 0)?;
        Ok(Self {
            degree,
            dimension,
            grid,
            on_grid,
        })
    }

    pub fn apply<F: Fn(f64) -> f64>(&self, f: F) -> Array1<f64> {
        let mut rhs = Array1::<f64>::zeros(self.dimension);
        for ie in 0..self.grid.ncells() {
            let start = self.on_grid.spans[ie];
            for iq in 0..self.grid.num_points() {
                let wf = self.grid.weights[[ie, iq]] * f(self.grid.points[[ie, iq]]);
                for il in 0..=self.degree {
                    rhs[start + il] += wf * self.on_grid.values[[ie, il, 0, iq]];
                }
            }
        }
        rhs
    }
}

/// Per-direction data shared by the 2D operators.
#[derive(Clone, Debug)]
struct Axis1D {
    greville: Array1<f64>,
    grid: QuadratureGrid,
}

impl Axis1D {
    fn new(
        degree: usize,
        dimension: usize,
        knots: ArrayView1<f64>,
        options: &ProjectionOptions,
    ) -> Result<Self, SplineError> {
        check_space(degree, dimension, knots)?;
        Ok(Self {
            greville: compute_greville(degree, dimension, knots)?,
            grid: QuadratureGrid::from_knots(knots, options.quadrature_points_for(degree))?,
        })
    }

    fn segment(&self, i: usize) -> (f64, f64) {
        (self.greville[i], self.greville[i + 1])
    }
}

/// Degrees of freedom of the H1, H(curl) and L2 spaces on a 2D Greville grid.
///
/// * H1: point values `f(x_i, y_j)`, shape `(n0, n1)`.
/// * H(curl): edge integrals, `∫ g_0(x, y_j) dx` over `[x_i, x_{i+1}]`
///   with shape `(n0 - 1, n1)`, and `∫ g_1(x_i, y) dy` with shape `(n0, n1 - 1)`.
/// * L2: cell integrals over `[x_i, x_{i+1}] x [y_j, y_{j+1}]`, shape `(n0 - 1, n1 - 1)`.
#[derive(Clone, Debug)]
pub struct Interpolation2D {
    axes: [Axis1D; 2],
}

impl Interpolation2D {
    pub fn new(
        degrees: [usize; 2],
        dimensions: [usize; 2],
        knots: [ArrayView1<f64>; 2],
    ) -> Result<Self, SplineError> {
        Self::with_options(degrees, dimensions, knots, &ProjectionOptions::default())
    }

    pub fn with_options(
        degrees: [usize; 2],
        dimensions: [usize; 2],
        knots: [ArrayView1<f64>; 2],
        options: &ProjectionOptions,
    ) -> Result<Self, SplineError> {
        Ok(Self {
            axes: [
                Axis1D::new(degrees[0], dimensions[0], knots[0], options)?,
                Axis1D::new(degrees[1], dimensions[1], knots[1], options)?,
            ],
        })
    }

    fn dims(&self) -> (usize, usize) {
        (self.axes[0].greville.len(), self.axes[1].greville.len())
    }

    pub fn interpolate_h1<F>(&self, f: F) -> Array2<f64>
    where
        F: Fn(f64, f64) -> f64 + Sync,
    {
        let (n0, n1) = self.dims();
        let (gx, gy) = (&self.axes[0].greville, &self.axes[1].greville);
        let mut out = Array2::<f64>::zeros((n0, n1));
        Zip::indexed(&mut out).par_for_each(|(i, j), v| *v = f(gx[i], gy[j]));
        out
    }

    pub fn interpolate_hcurl<G>(&self, g: G) -> (Array2<f64>, Array2<f64>)
    where
        G: Fn(f64, f64) -> [f64; 2] + Sync,
    {
        let (n0, n1) = self.dims();
        let (ax, ay) = (&self.axes[0], &self.axes[1]);

        let mut first = Array2::<f64>::zeros((n0 - 1, n1));
        Zip::indexed(&mut first).par_for_each(|(i, j), v| {
            let (a, b) = ax.segment(i);
            let y = ay.greville[j];
            *v = ax.grid.integrate_interval(a, b, |x| g(x, y)[0]);
        });

        let mut second = Array2::<f64>::zeros((n0, n1 - 1));
        Zip::indexed(&mut second).par_for_each(|(i, j), v| {
            let (a, b) = ay.segment(j);
            let x = ax.greville[i];
            *v = ay.grid.integrate_interval(a, b, |y| g(x, y)[1]);
        });

        (first, second)
    }

    pub fn interpolate_l2<H>(&self, h: H) -> Array2<f64>
    where
        H: Fn(f64, f64) -> f64 + Sync,
    {
        let (n0, n1) = self.dims();
        let (ax, ay) = (&self.axes[0], &self.axes[1]);
        let mut out = Array2::<f64>::zeros((n0 - 1, n1 - 1));
        Zip::indexed(&mut out).par_for_each(|(i, j), v| {
            let (xa, xb) = ax.segment(i);
            let (ya, yb) = ay.segment(j);
            *v = ax.grid.integrate_interval(xa, xb, |x| {
                ay.grid.integrate_interval(ya, yb, |y| h(x, y))
            });
        });
        out
    }
}

/// Per-cell integrals on the 2D knot grid.
#[derive(Clone, Debug)]
pub struct Integral2D {
    grids: [QuadratureGrid; 2],
}

impl Integral2D {
    pub fn new(
        degrees: [usize; 2],
        dimensions: [usize; 2],
        knots: [ArrayView1<f64>; 2],
    ) -> Result<Self, SplineError> {
        Self::with_options(degrees, dimensions, knots, &ProjectionOptions::default())
    }

    pub fn with_options(
        degrees: [usize; 2],
        dimensions: [usize; 2],
        knots: [ArrayView1<f64>; 2],
        options: &ProjectionOptions,
    ) -> Result<Self, SplineError> {
        let grid = |d: usize| -> Result<QuadratureGrid, SplineError> {
            check_space(degrees[d], dimensions[d], knots[d])?;
            Ok(QuadratureGrid::from_knots(
                knots[d],
                options.quadrature_points_for(degrees[d]),
            )?)
        };
        Ok(Self {
            grids: [grid(0)?, grid(1)?],
        })
    }

    /// Shape `(ncells0, ncells1)`.
    pub fn apply<F>(&self, f: F) -> Array2<f64>
    where
        F: Fn(f64, f64) -> f64 + Sync,
    {
        let (gx, gy) = (&self.grids[0], &self.grids[1]);
        let mut out = Array2::<f64>::zeros((gx.ncells(), gy.ncells()));
        Zip::indexed(&mut out).par_for_each(|(ie, je), v| {
            let acc: KahanSum = (0..gx.num_points())
                .flat_map(|iq| (0..gy.num_points()).map(move |jq| (iq, jq)))
                .map(|(iq, jq)| {
                    gx.weights[[ie, iq]]
                        * gy.weights[[je, jq]]
                        * f(gx.points[[ie, iq]], gy.points[[je, jq]])
                })
                .collect();
            *v = acc.sum();
        });
        out
    }
}

/// Row-major flattening, index `i0 * n1 + i1`, matching `kron(A_x, A_y)`.
pub fn to_array_h1(values: &Array2<f64>) -> Array1<f64> {
    values.iter().copied().collect()
}

/// Both components flattened row-major and stacked.
pub fn to_array_hcurl(values: &(Array2<f64>, Array2<f64>)) -> Array1<f64> {
    values.0.iter().chain(values.1.iter()).copied().collect()
}

pub fn to_array_l2(values: &Array2<f64>) -> Array1<f64> {
    to_array_h1(values)
}
