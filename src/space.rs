//! One-dimensional spline spaces, their tensor products, and fields on them.

use crate::basis::{evaluate_spline, evaluate_spline_derivative, validate_knots_for_degree};
use crate::error::SplineError;
use crate::quadrature::breaks;
use ndarray::{Array1, ArrayView1, s};
use std::fmt;
use std::sync::OnceLock;

/// Index ranges and ghost padding of a (possibly multi-dimensional) coefficient array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub starts: Vec<usize>,
    pub ends: Vec<usize>,
    pub pads: Vec<usize>,
}

impl StorageLayout {
    /// Allocated length per axis, ghost regions included.
    pub fn padded_shape(&self) -> Vec<usize> {
        self.starts
            .iter()
            .zip(&self.ends)
            .zip(&self.pads)
            .map(|((&start, &end), &pad)| end - start + 2 * pad)
            .collect()
    }

    pub fn padded_len(&self) -> usize {
        self.padded_shape().iter().product()
    }
}

/// Breakpoints of a knot vector: distinct values for open knots, and the
/// knots with `degree` entries trimmed from each end for periodic ones.
pub fn breaks_of(knots: ArrayView1<f64>, degree: usize, periodic: bool) -> Array1<f64> {
    if periodic {
        knots.slice(s![degree..knots.len() - degree]).to_owned()
    } else {
        breaks(knots)
    }
}

/// A 1D spline finite-element space.
#[derive(Debug, Clone)]
pub struct SplineSpace {
    knots: Array1<f64>,
    degree: usize,
    periodic: bool,
    dirichlet: (bool, bool),
    dimension: usize,
    layout: StorageLayout,
    ncells: OnceLock<usize>,
}

impl SplineSpace {
    pub fn new(
        knots: Array1<f64>,
        degree: usize,
        periodic: bool,
        dirichlet: (bool, bool),
    ) -> Result<Self, SplineError> {
        if periodic {
            return Err(SplineError::Unimplemented("periodic spline spaces"));
        }
        validate_knots_for_degree(knots.view(), degree)?;

        let defect = usize::from(dirichlet.0) + usize::from(dirichlet.1);
        let nbasis = knots.len() - degree - 1;
        if nbasis <= defect {
            return Err(SplineError::InvalidInput(format!(
                "{nbasis} basis functions leave no degrees of freedom after {defect} Dirichlet conditions"
            )));
        }
        let dimension = nbasis - defect;

        let layout = StorageLayout {
            starts: vec![0],
            ends: vec![dimension],
            pads: vec![degree],
        };
        Ok(Self {
            knots,
            degree,
            periodic,
            dirichlet,
            dimension,
            layout,
            ncells: OnceLock::new(),
        })
    }

    /// Open space without boundary conditions.
    pub fn open(knots: Array1<f64>, degree: usize) -> Result<Self, SplineError> {
        Self::new(knots, degree, false, (false, false))
    }

    pub fn knots(&self) -> ArrayView1<'_, f64> {
        self.knots.view()
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn periodic(&self) -> bool {
        self.periodic
    }

    pub fn dirichlet(&self) -> (bool, bool) {
        self.dirichlet
    }

    /// Number of degrees of freedom.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of basis functions before Dirichlet elimination.
    pub fn nbasis(&self) -> usize {
        self.knots.len() - self.degree - 1
    }

    pub fn vector_space(&self) -> &StorageLayout {
        &self.layout
    }

    /// Number of non-empty cells, computed on first use.
    pub fn ncells(&self) -> usize {
        *self.ncells.get_or_init(|| self.breaks().len() - 1)
    }

    pub fn breaks(&self) -> Array1<f64> {
        breaks_of(self.knots.view(), self.degree, self.periodic)
    }

    pub fn domain(&self) -> (f64, f64) {
        let breaks = self.breaks();
        (breaks[0], breaks[breaks.len() - 1])
    }

    /// Greville points of the space.
    ///
    /// Not available on the space itself; use
    /// [`compute_greville`](crate::basis::compute_greville) on its knots.
    pub fn greville(&self) -> Result<Array1<f64>, SplineError> {
        Err(SplineError::Unimplemented("Greville points of a SplineSpace"))
    }

    /// Expands degree-of-freedom coefficients to all basis functions,
    /// inserting zeros at Dirichlet boundaries.
    fn full_coefficients(&self, dofs: ArrayView1<f64>) -> Array1<f64> {
        let mut full = Array1::<f64>::zeros(self.nbasis());
        let offset = usize::from(self.dirichlet.0);
        full.slice_mut(s![offset..offset + self.dimension])
            .assign(&dofs);
        full
    }
}

impl fmt::Display for SplineSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "> Dimension :: {}", self.dimension)?;
        write!(f, "> Degree    :: {}", self.degree)
    }
}

/// Tensor product of two 1D spaces.
#[derive(Debug, Clone)]
pub struct TensorSpace {
    spaces: [SplineSpace; 2],
    layout: StorageLayout,
}

impl TensorSpace {
    pub fn new(first: SplineSpace, second: SplineSpace) -> Self {
        let layout = StorageLayout {
            starts: vec![0, 0],
            ends: vec![first.dimension(), second.dimension()],
            pads: vec![first.degree(), second.degree()],
        };
        Self {
            spaces: [first, second],
            layout,
        }
    }

    pub fn spaces(&self) -> &[SplineSpace; 2] {
        &self.spaces
    }

    pub fn dimension(&self) -> usize {
        self.spaces.iter().map(SplineSpace::dimension).product()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.spaces[0].dimension(), self.spaces[1].dimension())
    }

    pub fn degrees(&self) -> [usize; 2] {
        [self.spaces[0].degree(), self.spaces[1].degree()]
    }

    pub fn vector_space(&self) -> &StorageLayout {
        &self.layout
    }
}

impl fmt::Display for TensorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(
            f,
            "> Dimension :: {} ({} x {})",
            self.dimension(),
            self.spaces[0].dimension(),
            self.spaces[1].dimension()
        )?;
        write!(
            f,
            "> Degrees   :: ({}, {})",
            self.spaces[0].degree(),
            self.spaces[1].degree()
        )
    }
}

/// A field of a [`SplineSpace`]: one coefficient vector with ghost padding.
#[derive(Debug, Clone)]
pub struct Spline<'a> {
    space: &'a SplineSpace,
    vector: Array1<f64>,
}

impl<'a> Spline<'a> {
    /// Zero field.
    pub fn new(space: &'a SplineSpace) -> Self {
        Self {
            space,
            vector: Array1::zeros(space.vector_space().padded_len()),
        }
    }

    pub fn from_coefficients(
        space: &'a SplineSpace,
        coeffs: ArrayView1<f64>,
    ) -> Result<Self, SplineError> {
        let mut field = Self::new(space);
        field.set_coefficients(coeffs)?;
        Ok(field)
    }

    pub fn space(&self) -> &'a SplineSpace {
        self.space
    }

    /// Full storage, ghost regions included.
    pub fn vector(&self) -> ArrayView1<'_, f64> {
        self.vector.view()
    }

    /// Degree-of-freedom coefficients (storage without ghost regions).
    pub fn coefficients(&self) -> ArrayView1<'_, f64> {
        let pad = self.space.degree();
        self.vector.slice(s![pad..pad + self.space.dimension()])
    }

    pub fn set_coefficients(&mut self, coeffs: ArrayView1<f64>) -> Result<(), SplineError> {
        SplineError::check_len("spline coefficients", self.space.dimension(), coeffs.len())?;
        let pad = self.space.degree();
        self.vector
            .slice_mut(s![pad..pad + self.space.dimension()])
            .assign(&coeffs);
        Ok(())
    }

    pub fn eval(&self, x: f64) -> Result<f64, SplineError> {
        let full = self.space.full_coefficients(self.coefficients());
        Ok(evaluate_spline(
            self.space.knots(),
            full.view(),
            self.space.degree(),
            x,
        )?)
    }

    pub fn eval_derivative(&self, x: f64, order: usize) -> Result<f64, SplineError> {
        let full = self.space.full_coefficients(self.coefficients());
        Ok(evaluate_spline_derivative(
            self.space.knots(),
            full.view(),
            self.space.degree(),
            order,
            x,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::make_open_knots;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn dimension_counts_dirichlet_flags() {
        for degree in 1..4 {
            for n in (degree + 2)..(degree + 6) {
                let knots = make_open_knots(degree, n).unwrap();
                for dirichlet in [(false, false), (true, false), (false, true), (true, true)] {
                    let space = SplineSpace::new(knots.clone(), degree, false, dirichlet).unwrap();
                    let defect = usize::from(dirichlet.0) + usize::from(dirichlet.1);
                    assert_eq!(space.dimension(), knots.len() - degree - 1 - defect);
                    assert_eq!(space.vector_space().ends, vec![space.dimension()]);
                    assert_eq!(space.vector_space().pads, vec![degree]);
                }
            }
        }
    }

    #[test]
    fn periodic_spaces_fail_fast() {
        let knots = make_open_knots(2, 5).unwrap();
        assert!(matches!(
            SplineSpace::new(knots, 2, true, (false, false)),
            Err(SplineError::Unimplemented(_))
        ));
    }

    #[test]
    fn greville_on_space_is_unimplemented() {
        let space = SplineSpace::open(make_open_knots(2, 5).unwrap(), 2).unwrap();
        assert!(matches!(space.greville(), Err(SplineError::Unimplemented(_))));
    }

    #[test]
    fn breaks_and_domain_of_open_space() {
        let knots = array![-1.0, -1.0, -1.0, 0.0, 0.5, 0.5, 2.0, 2.0, 2.0];
        let space = SplineSpace::open(knots, 2).unwrap();
        assert_eq!(space.breaks(), array![-1.0, 0.0, 0.5, 2.0]);
        assert_eq!(space.domain(), (-1.0, 2.0));
        assert_eq!(space.ncells(), 3);
    }

    #[test]
    fn periodic_breaks_trim_degree_knots_per_end() {
        let knots = array![-0.5, -0.25, 0.0, 0.25, 0.5, 0.75, 1.0, 1.25, 1.5];
        let b = breaks_of(knots.view(), 2, true);
        assert_eq!(b, array![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn display_reports_dimension_and_degree() {
        let space = SplineSpace::open(array![0., 0., 0., 1., 1., 1.], 2).unwrap();
        assert_eq!(format!("{space}"), "\n> Dimension :: 3\n> Degree    :: 2");
    }

    #[test]
    fn spline_storage_has_ghost_regions() {
        let space = SplineSpace::open(make_open_knots(2, 5).unwrap(), 2).unwrap();
        let mut field = Spline::new(&space);
        assert_eq!(field.vector().len(), 5 + 2 * 2);
        field
            .set_coefficients(array![1.0, 2.0, 3.0, 4.0, 5.0].view())
            .unwrap();
        assert_eq!(field.vector()[0], 0.0);
        assert_eq!(field.vector()[2], 1.0);
        assert_eq!(field.coefficients()[4], 5.0);
        assert!(matches!(
            field.set_coefficients(array![1.0].view()),
            Err(SplineError::DimensionMismatch { expected: 5, found: 1, .. })
        ));
    }

    #[test]
    fn dirichlet_field_vanishes_on_boundary() {
        let knots = make_open_knots(2, 5).unwrap();
        let space = SplineSpace::new(knots, 2, false, (true, true)).unwrap();
        let field = Spline::from_coefficients(&space, array![1.0, 1.0, 1.0].view()).unwrap();
        assert_abs_diff_eq!(field.eval(0.0).unwrap(), 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!(field.eval(1.0).unwrap(), 0.0, epsilon = 1e-14);
        assert!(field.eval(0.5).unwrap() > 0.0);
    }

    #[test]
    fn tensor_space_combines_layouts() {
        let v1 = SplineSpace::open(array![0., 0., 0., 1., 1., 1.], 2).unwrap();
        let v2 = SplineSpace::open(array![0., 0., 0., 0.5, 1., 1., 1.], 2).unwrap();
        let v = TensorSpace::new(v1, v2);
        assert_eq!(v.dimension(), 12);
        assert_eq!(v.shape(), (3, 4));
        assert_eq!(v.degrees(), [2, 2]);
        assert_eq!(v.vector_space().padded_shape(), vec![7, 8]);
    }
}
