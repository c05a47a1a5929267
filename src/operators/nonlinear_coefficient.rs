use super::{upwind_values, UpwindChoice};
use crate::StrError;

/// Holds the nonlinear coefficient of the diffusion operator at cells and faces
///
/// The local matrices are scaled by the cell value and, row by row, by the face values.
/// The face derivatives feed the optional Newton term.
#[derive(Clone, Debug)]
pub struct NonlinearCoefficient {
    /// Values at (used) cells
    pub cell_values: Vec<f64>,

    /// Values at (used) faces
    pub face_values: Vec<f64>,

    /// Derivatives of the face values with respect to the upwind unknown
    pub face_derivatives: Vec<f64>,
}

impl NonlinearCoefficient {
    /// Returns a coefficient equal to one everywhere
    pub fn unit(ncell: usize, nface: usize) -> Self {
        NonlinearCoefficient {
            cell_values: vec![1.0; ncell],
            face_values: vec![1.0; nface],
            face_derivatives: vec![0.0; nface],
        }
    }

    /// Returns a coefficient given at cells only (faces equal to one)
    pub fn cell_centered(cell_values: &[f64], nface: usize) -> Self {
        NonlinearCoefficient {
            cell_values: cell_values.to_vec(),
            face_values: vec![1.0; nface],
            face_derivatives: vec![0.0; nface],
        }
    }

    /// Returns a coefficient upwinded onto the faces (cells equal to one)
    ///
    /// `boundary(cell, pressure)` evaluates the value and derivative at a prescribed pressure.
    pub fn upwinded<F>(
        choices: &[UpwindChoice],
        cell_values: &[f64],
        cell_derivatives: &[f64],
        boundary: F,
    ) -> Result<Self, StrError>
    where
        F: FnMut(usize, f64) -> Result<(f64, f64), StrError>,
    {
        if cell_values.len() != cell_derivatives.len() {
            return Err("cell values and derivatives must have the same length");
        }
        let (face_values, face_derivatives) = upwind_values(choices, cell_values, cell_derivatives, boundary)?;
        Ok(NonlinearCoefficient {
            cell_values: vec![1.0; cell_values.len()],
            face_values,
            face_derivatives,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
