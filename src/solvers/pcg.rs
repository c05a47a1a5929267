use crate::linalg::{Communicator, CompositeVector};
use crate::StrError;

/// Defines an operator together with an approximate inverse
pub trait LinearOperator {
    /// Computes `y = A x`
    fn apply(&self, x: &CompositeVector, y: &mut CompositeVector) -> Result<(), StrError>;

    /// Computes `y = M⁻¹ x`
    fn apply_inverse(&mut self, x: &CompositeVector, y: &mut CompositeVector) -> Result<(), StrError>;
}

/// Holds statistics of a linear solution
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PcgStats {
    /// Number of iterations
    pub iterations: usize,

    /// Norm of the initial residual
    pub initial_residual: f64,

    /// Norm of the final residual
    pub residual: f64,
}

/// Implements the preconditioned conjugate gradient method
#[derive(Clone, Copy, Debug)]
pub struct LinearSolverPcg {
    /// Max number of iterations
    pub max_iterations: usize,

    /// Relative tolerance on the residual norm
    pub tolerance: f64,
}

impl LinearSolverPcg {
    /// Allocates a new instance
    pub fn new(max_iterations: usize, tolerance: f64) -> Result<Self, StrError> {
        if max_iterations < 1 {
            return Err("max_iterations must be ≥ 1");
        }
        if tolerance <= 0.0 {
            return Err("linear solver tolerance must be > 0.0");
        }
        Ok(LinearSolverPcg {
            max_iterations,
            tolerance,
        })
    }

    /// Solves `A x = b` starting from the given `x`
    ///
    /// Convergence means `‖r‖ ≤ tolerance · ‖b‖` (or `‖r‖ ≤ tolerance` if `b = 0`).
    /// Returns an error if the method does not converge.
    pub fn solve(
        &self,
        op: &mut dyn LinearOperator,
        b: &CompositeVector,
        x: &mut CompositeVector,
        comm: &dyn Communicator,
    ) -> Result<PcgStats, StrError> {
        if !b.same_layout(x) {
            return Err("vectors are incompatible with the linear solver");
        }
        let mut r = b.clone();
        let mut z = b.clone();
        let mut p = b.clone();
        let mut ap = b.clone();

        // r = b - A x
        op.apply(x, &mut ap)?;
        r.update(-1.0, &ap, 1.0)?;
        let initial = f64::sqrt(r.dot(&r, comm));
        let b_norm = f64::sqrt(b.dot(b, comm));
        let tol = if b_norm > 0.0 {
            self.tolerance * b_norm
        } else {
            self.tolerance
        };
        if initial <= tol {
            return Ok(PcgStats {
                iterations: 0,
                initial_residual: initial,
                residual: initial,
            });
        }

        // z = M⁻¹ r; p = z
        op.apply_inverse(&r, &mut z)?;
        p.copy_from(&z)?;
        let mut rz = r.dot(&z, comm);

        for iter in 0..self.max_iterations {
            op.apply(&p, &mut ap)?;
            let pap = p.dot(&ap, comm);
            if pap == 0.0 || !pap.is_finite() {
                log::error!("PCG breakdown at iteration {}: pᵀAp = {:?}", iter + 1, pap);
                return Err("PCG failed due to a breakdown");
            }
            let alpha = rz / pap;
            x.update(alpha, &p, 1.0)?;
            r.update(-alpha, &ap, 1.0)?;
            let residual = f64::sqrt(r.dot(&r, comm));
            log::trace!("PCG iter {}: residual = {:.6e}", iter + 1, residual);
            if residual <= tol {
                return Ok(PcgStats {
                    iterations: iter + 1,
                    initial_residual: initial,
                    residual,
                });
            }
            op.apply_inverse(&r, &mut z)?;
            let rz_new = r.dot(&z, comm);
            let beta = rz_new / rz;
            rz = rz_new;
            p.update(1.0, &z, beta)?;
        }
        let residual = f64::sqrt(r.dot(&r, comm));
        log::error!(
            "PCG did not converge after {} iterations: residual = {:.6e}",
            self.max_iterations,
            residual
        );
        Err("PCG did not converge")
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{LinearOperator, LinearSolverPcg};
    use crate::base::EntityKind;
    use crate::linalg::{CompositeVector, SerialComm};
    use crate::StrError;
    use russell_lab::vec_approx_eq;

    /// Tridiagonal [-1 2 -1] operator with Jacobi preconditioner
    struct Laplacian {
        jacobi: bool,
    }

    impl LinearOperator for Laplacian {
        fn apply(&self, x: &CompositeVector, y: &mut CompositeVector) -> Result<(), StrError> {
            let xs = x.cell();
            let n = xs.len();
            let ys = y.cell_mut();
            for i in 0..n {
                let mut v = 2.0 * xs[i];
                if i > 0 {
                    v -= xs[i - 1];
                }
                if i + 1 < n {
                    v -= xs[i + 1];
                }
                ys[i] = v;
            }
            Ok(())
        }

        fn apply_inverse(&mut self, x: &CompositeVector, y: &mut CompositeVector) -> Result<(), StrError> {
            let scale = if self.jacobi { 0.5 } else { 1.0 };
            for (yi, xi) in y.cell_mut().iter_mut().zip(x.cell()) {
                *yi = scale * xi;
            }
            Ok(())
        }
    }

    #[test]
    fn new_captures_errors() {
        assert_eq!(LinearSolverPcg::new(0, 1e-10).err(), Some("max_iterations must be ≥ 1"));
        assert_eq!(
            LinearSolverPcg::new(10, 0.0).err(),
            Some("linear solver tolerance must be > 0.0")
        );
    }

    #[test]
    fn pcg_works() {
        let comm = SerialComm::new();
        let mut b = CompositeVector::from_sizes(&[(EntityKind::Cell, 5, 5)]);
        b.cell_mut().copy_from_slice(&[1.0, 0.0, 0.0, 0.0, 1.0]);
        let mut x = b.clone();
        x.put_scalar(0.0);
        let solver = LinearSolverPcg::new(10, 1e-12).unwrap();
        let mut op = Laplacian { jacobi: true };
        let stats = solver.solve(&mut op, &b, &mut x, &comm).unwrap();
        // the solution is one everywhere; CG converges in at most n iterations
        vec_approx_eq(&x.cell().to_vec(), &[1.0, 1.0, 1.0, 1.0, 1.0], 1e-12);
        assert!(stats.iterations <= 5);

        // starting from the solution
        let stats = solver.solve(&mut op, &b, &mut x, &comm).unwrap();
        assert_eq!(stats.iterations, 0);

        // too few iterations
        x.put_scalar(0.0);
        let solver = LinearSolverPcg::new(1, 1e-12).unwrap();
        let mut op = Laplacian { jacobi: false };
        assert_eq!(solver.solve(&mut op, &b, &mut x, &comm).err(), Some("PCG did not converge"));
    }
}
