use crate::base::EntityKind;
use russell_lab::Matrix;

/// Holds the local (dense) matrices of an operator, one per base entity
///
/// A shadow copy of a matrix is taken right before its first modification by the boundary
/// conditions so that the fluxes can be reconstructed with the unmodified operator.
#[derive(Clone, Debug)]
pub struct LocalOp {
    /// Kind of the entities owning the local matrices
    pub base: EntityKind,

    /// Local matrices
    pub matrices: Vec<Matrix>,

    /// Copies of the matrices taken before the boundary conditions were applied
    pub shadows: Vec<Option<Matrix>>,
}

impl LocalOp {
    /// Allocates a new instance with empty matrices
    pub fn new(base: EntityKind, n: usize) -> Self {
        LocalOp {
            base,
            matrices: vec![Matrix::new(0, 0); n],
            shadows: vec![None; n],
        }
    }

    /// Returns the number of local matrices
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    /// Replaces a matrix and discards its shadow
    pub fn set(&mut self, i: usize, matrix: Matrix) {
        self.matrices[i] = matrix;
        self.shadows[i] = None;
    }

    /// Saves the shadow copy of a matrix unless it already exists
    pub fn save_shadow(&mut self, i: usize) {
        if self.shadows[i].is_none() {
            self.shadows[i] = Some(self.matrices[i].clone());
        }
    }

    /// Returns the shadow copy, if any, or the current matrix
    pub fn original(&self, i: usize) -> &Matrix {
        match &self.shadows[i] {
            Some(shadow) => shadow,
            None => &self.matrices[i],
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
