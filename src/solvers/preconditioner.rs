use crate::base::ParamPreconditioner;
use crate::linalg::coo_diagonal;
use crate::StrError;
use russell_lab::{vec_copy, Vector};
use russell_sparse::{CooMatrix, Genie, LinSolver, SparseMatrix};

/// Defines an approximate inverse `M⁻¹` of a sparse matrix
///
/// The matrix is given by [Preconditioner::update] whenever its values change;
/// [Preconditioner::apply_inverse] then computes `x = M⁻¹ rhs`.
pub trait Preconditioner {
    /// Updates the preconditioner with a new matrix
    fn update(&mut self, matrix: &CooMatrix) -> Result<(), StrError>;

    /// Computes `x = M⁻¹ rhs`
    fn apply_inverse(&mut self, rhs: &Vector, x: &mut Vector) -> Result<(), StrError>;

    /// Returns the name of the preconditioner
    fn name(&self) -> &'static str;
}

/// Allocates a preconditioner given its parameters
pub fn allocate_preconditioner(param: ParamPreconditioner) -> Result<Box<dyn Preconditioner>, StrError> {
    let precon: Box<dyn Preconditioner> = match param {
        ParamPreconditioner::Direct => Box::new(DirectPreconditioner::new()?),
        ParamPreconditioner::Diagonal => Box::new(DiagonalPreconditioner::new()),
        ParamPreconditioner::Identity => Box::new(IdentityPreconditioner::new()),
    };
    Ok(precon)
}

/// Implements the exact inverse using a sparse direct solver (UMFPACK)
pub struct DirectPreconditioner {
    /// Sparse solver
    solver: LinSolver<'static>,

    /// Factorized matrix
    matrix: Option<SparseMatrix>,
}

impl DirectPreconditioner {
    /// Allocates a new instance
    pub fn new() -> Result<Self, StrError> {
        Ok(DirectPreconditioner {
            solver: LinSolver::new(Genie::Umfpack)?,
            matrix: None,
        })
    }
}

impl Preconditioner for DirectPreconditioner {
    fn update(&mut self, matrix: &CooMatrix) -> Result<(), StrError> {
        let mut sparse = SparseMatrix::from_coo(matrix.clone());
        self.solver = LinSolver::new(Genie::Umfpack)?;
        self.solver.actual.factorize(&mut sparse, None)?;
        self.matrix = Some(sparse);
        Ok(())
    }

    fn apply_inverse(&mut self, rhs: &Vector, x: &mut Vector) -> Result<(), StrError> {
        let matrix = self.matrix.as_ref().ok_or("preconditioner must be updated first")?;
        let n = matrix.get_info().0;
        if rhs.dim() != n || x.dim() != n {
            return Err("vectors are incompatible with the preconditioner");
        }
        self.solver.actual.solve(x, matrix, rhs, false)
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

/// Implements the Jacobi (diagonal) preconditioner
#[derive(Clone, Debug)]
pub struct DiagonalPreconditioner {
    /// Inverse of the diagonal (one where the diagonal vanishes)
    inv_diag: Vector,
}

impl DiagonalPreconditioner {
    /// Allocates a new instance
    pub fn new() -> Self {
        DiagonalPreconditioner { inv_diag: Vector::new(0) }
    }
}

impl Preconditioner for DiagonalPreconditioner {
    fn update(&mut self, matrix: &CooMatrix) -> Result<(), StrError> {
        self.inv_diag = coo_diagonal(matrix);
        self.inv_diag.map(|d| if f64::abs(d) > f64::MIN_POSITIVE { 1.0 / d } else { 1.0 });
        Ok(())
    }

    fn apply_inverse(&mut self, rhs: &Vector, x: &mut Vector) -> Result<(), StrError> {
        let n = self.inv_diag.dim();
        if rhs.dim() != n || x.dim() != n {
            return Err("vectors are incompatible with the preconditioner");
        }
        for i in 0..n {
            x[i] = self.inv_diag[i] * rhs[i];
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "diagonal"
    }
}

/// Implements the identity (no preconditioning)
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityPreconditioner;

impl IdentityPreconditioner {
    /// Allocates a new instance
    pub fn new() -> Self {
        IdentityPreconditioner
    }
}

impl Preconditioner for IdentityPreconditioner {
    fn update(&mut self, _matrix: &CooMatrix) -> Result<(), StrError> {
        Ok(())
    }

    fn apply_inverse(&mut self, rhs: &Vector, x: &mut Vector) -> Result<(), StrError> {
        vec_copy(x, rhs).map_err(|_| "vectors are incompatible with the preconditioner")
    }

    fn name(&self) -> &'static str {
        "identity"
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
