use crate::error::SplineError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Target space of a tensor-product scaling matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingKind {
    /// Plain tensor product of the 1D scalings, no direction reduced.
    Tensor,
    /// One direction reduced per vector component.
    Hcurl,
    /// Every direction reduced.
    L2,
}

impl FromStr for ScalingKind {
    type Err = SplineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tensor" | "H1" => Ok(ScalingKind::Tensor),
            "Hcurl" => Ok(ScalingKind::Hcurl),
            "L2" => Ok(ScalingKind::L2),
            _ => Err(SplineError::Unimplemented("scaling matrix for this space kind")),
        }
    }
}

/// Intervals used by the 1D integral functional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IntegralKind {
    /// Integrals over the cells of the knot grid.
    #[default]
    Cells,
    /// Integrals between consecutive Greville points (histopolation).
    Greville,
}

/// Space of the 2D de Rham sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeRhamSpace {
    H1,
    Hcurl,
    L2,
}

/// Options shared by the matrix builders and projectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionOptions {
    /// Gauss points per cell; `None` uses `degree + 1`.
    pub quadrature_points: Option<usize>,
    /// Assembled entries with magnitude at or below this are not stored.
    pub drop_tolerance: f64,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            quadrature_points: None,
            drop_tolerance: crate::linalg::sparse::DROP_TOL,
        }
    }
}

impl ProjectionOptions {
    pub fn quadrature_points_for(&self, degree: usize) -> usize {
        self.quadrature_points.unwrap_or(degree + 1).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_kind_parses_known_names() {
        assert_eq!("Hcurl".parse::<ScalingKind>().unwrap(), ScalingKind::Hcurl);
        assert_eq!("L2".parse::<ScalingKind>().unwrap(), ScalingKind::L2);
        assert_eq!("H1".parse::<ScalingKind>().unwrap(), ScalingKind::Tensor);
    }

    #[test]
    fn unknown_scaling_kind_is_unimplemented() {
        assert!(matches!(
            "Hdiv".parse::<ScalingKind>(),
            Err(SplineError::Unimplemented(_))
        ));
    }

    #[test]
    fn default_quadrature_uses_degree_plus_one_points() {
        let options = ProjectionOptions::default();
        assert_eq!(options.quadrature_points_for(3), 4);
        let options = ProjectionOptions {
            quadrature_points: Some(6),
            ..ProjectionOptions::default()
        };
        assert_eq!(options.quadrature_points_for(3), 6);
    }
}
