use crate::linalg::{inverse, Communicator, CompositeVector};
use crate::StrError;
use russell_lab::Matrix;
use std::collections::VecDeque;

/// Implements the nonlinear Krylov accelerator (NKA)
///
/// Given the (preconditioned) residual `f` of a fixed-point iteration `u ← u - f`, NKA
/// returns an accelerated correction using the previous corrections `v` and the
/// corresponding residual differences `w`:
///
/// ```text
/// c = argmin ‖f - Σ c_k w_k‖
/// correction = f - Σ c_k w_k + Σ c_k v_k
/// ```
///
/// The pairs are normalized by `‖w‖`; a new pair nearly dependent on the stored ones
/// (relative distance below `vtol`) is discarded, and the oldest pair is dropped once
/// `max_vectors` pairs are stored.
pub struct Nka {
    /// Max number of stored pairs
    max_vectors: usize,

    /// Tolerance to discard nearly dependent pairs
    vtol: f64,

    /// Corrections (most recent first)
    v: VecDeque<CompositeVector>,

    /// Residual differences (most recent first)
    w: VecDeque<CompositeVector>,

    /// Correction and residual of the previous call
    pending: Option<(CompositeVector, CompositeVector)>,
}

impl Nka {
    /// Allocates a new instance
    pub fn new(max_vectors: usize, vtol: f64) -> Result<Self, StrError> {
        if max_vectors < 1 {
            return Err("NKA requires at least one vector");
        }
        if vtol <= 0.0 || vtol >= 1.0 {
            return Err("NKA vector tolerance must satisfy 0.0 < vtol < 1.0");
        }
        Ok(Nka {
            max_vectors,
            vtol,
            v: VecDeque::new(),
            w: VecDeque::new(),
            pending: None,
        })
    }

    /// Returns the number of stored pairs
    pub fn num_vectors(&self) -> usize {
        self.w.len()
    }

    /// Discards all stored pairs
    pub fn restart(&mut self) {
        self.v.clear();
        self.w.clear();
        self.pending = None;
    }

    /// Forgets the previous call (e.g., when the last correction was modified)
    pub fn relax(&mut self) {
        self.pending = None;
    }

    /// Computes the accelerated correction given the current residual
    pub fn correction(&mut self, f: &CompositeVector, comm: &dyn Communicator) -> Result<CompositeVector, StrError> {
        if let Some((mut v, mut w)) = self.pending.take() {
            // w = f_prev - f
            w.update(-1.0, f, 1.0)?;
            let s = f64::sqrt(w.dot(&w, comm));
            if s > 0.0 {
                v.update(0.0, f, 1.0 / s)?;
                w.update(0.0, f, 1.0 / s)?;
                if self.is_independent(&w, comm) {
                    self.v.push_front(v);
                    self.w.push_front(w);
                    if self.w.len() > self.max_vectors {
                        self.v.pop_back();
                        self.w.pop_back();
                    }
                } else {
                    log::trace!("NKA: discarding a nearly dependent vector");
                }
            }
        }

        let mut dir = f.clone();
        let m = self.w.len();
        if m > 0 {
            let mut h = Matrix::new(m, m);
            let mut b = vec![0.0; m];
            for i in 0..m {
                for j in 0..m {
                    h.set(i, j, self.w[i].dot(&self.w[j], comm));
                }
                b[i] = self.w[i].dot(f, comm);
            }
            match inverse(&h) {
                Ok(hi) => {
                    for k in 0..m {
                        let ck = (0..m).fold(0.0, |acc, j| acc + hi.get(k, j) * b[j]);
                        dir.update(-ck, &self.w[k], 1.0)?;
                        dir.update(ck, &self.v[k], 1.0)?;
                    }
                }
                Err(_) => {
                    log::debug!("NKA: singular Gram matrix; restarting");
                    self.restart();
                }
            }
        }
        self.pending = Some((dir.clone(), f.clone()));
        Ok(dir)
    }

    /// Tells whether the normalized vector is sufficiently far from the span of the stored ones
    fn is_independent(&self, w: &CompositeVector, comm: &dyn Communicator) -> bool {
        let m = self.w.len();
        if m == 0 {
            return true;
        }
        let mut h = Matrix::new(m, m);
        let mut b = vec![0.0; m];
        for i in 0..m {
            for j in 0..m {
                h.set(i, j, self.w[i].dot(&self.w[j], comm));
            }
            b[i] = self.w[i].dot(w, comm);
        }
        let hi = match inverse(&h) {
            Ok(hi) => hi,
            Err(_) => return false,
        };
        let mut projection = 0.0;
        for i in 0..m {
            for j in 0..m {
                projection += b[i] * hi.get(i, j) * b[j];
            }
        }
        1.0 - projection > self.vtol * self.vtol
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::Nka;
    use crate::base::EntityKind;
    use crate::linalg::{CompositeVector, SerialComm};

    fn residual(u: &CompositeVector) -> CompositeVector {
        // f = A u - b with A = [[2, 1], [1, 3]] and b = [1, 2]
        let x = u.cell();
        let mut f = u.clone();
        f.cell_mut()[0] = 2.0 * x[0] + x[1] - 1.0;
        f.cell_mut()[1] = x[0] + 3.0 * x[1] - 2.0;
        f
    }

    #[test]
    fn new_captures_errors() {
        assert_eq!(Nka::new(0, 0.01).err(), Some("NKA requires at least one vector"));
        assert_eq!(
            Nka::new(5, 1.0).err(),
            Some("NKA vector tolerance must satisfy 0.0 < vtol < 1.0")
        );
    }

    #[test]
    fn nka_solves_linear_problems_in_few_iterations() {
        let comm = SerialComm::new();
        let mut nka = Nka::new(5, 0.01).unwrap();
        let mut u = CompositeVector::from_sizes(&[(EntityKind::Cell, 2, 2)]);
        for _ in 0..3 {
            let f = residual(&u);
            let dir = nka.correction(&f, &comm).unwrap();
            u.update(-1.0, &dir, 1.0).unwrap();
        }
        assert_eq!(nka.num_vectors(), 2);
        let f = residual(&u);
        assert!(f.norm_inf(&comm) < 1e-12);
        // solution of A u = b
        assert!((u.cell()[0] - 0.2).abs() < 1e-12);
        assert!((u.cell()[1] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn restart_and_max_vectors_work() {
        let comm = SerialComm::new();
        let mut nka = Nka::new(1, 0.01).unwrap();
        let mut u = CompositeVector::from_sizes(&[(EntityKind::Cell, 2, 2)]);
        for _ in 0..4 {
            let f = residual(&u);
            let dir = nka.correction(&f, &comm).unwrap();
            u.update(-1.0, &dir, 1.0).unwrap();
        }
        assert!(nka.num_vectors() <= 1);
        nka.restart();
        assert_eq!(nka.num_vectors(), 0);

        // the first correction is the residual itself
        let f = residual(&u);
        let dir = nka.correction(&f, &comm).unwrap();
        assert_eq!(dir.cell(), f.cell());
    }
}
