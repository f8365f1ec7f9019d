#![deny(dead_code)]
#![deny(unused_imports)]
#![allow(non_snake_case)]

pub mod basis;
pub mod derham;
pub mod error;
pub mod functionals;
pub mod linalg;
pub mod matrices;
pub mod projector;
pub mod quadrature;
pub mod scaling;
pub mod space;
pub mod types;

pub use basis::{
    BasisError, compute_greville, evaluate_spline, evaluate_spline_derivative, make_open_knots,
    reduce_knots,
};
pub use derham::{
    DeRhamMatrices, DeRhamProjector2D, TensorSplineRepr, build_matrices_2d_h1, tck_h1, tck_hcurl,
    tck_l2,
};
pub use error::SplineError;
pub use functionals::{
    Contribution, Integral, Integral2D, Interpolation, Interpolation2D, to_array_h1,
    to_array_hcurl, to_array_l2,
};
pub use linalg::sparse::{LinalgError, SparseLuFactor};
pub use matrices::{collocation_matrix, histopolation_matrix, mass_matrix};
pub use projector::{Projector1D, l2_error};
pub use quadrature::{GaussLegendreRule, QuadratureGrid, eval_on_grid_splines_ders};
pub use scaling::{scaling_matrix, scaling_matrix_1d};
pub use space::{Spline, SplineSpace, TensorSpace};
pub use types::{DeRhamSpace, IntegralKind, ProjectionOptions, ScalingKind};
