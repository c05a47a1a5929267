use crate::StrError;
use russell_lab::{mat_inverse, mat_mat_mul, mat_t_mat_mul, mat_update, Matrix};
use russell_tensor::Tensor2;

/// Copies the first `dim × dim` components of a second-order tensor into a matrix
pub fn tensor_to_matrix(kk: &Tensor2, dim: usize) -> Matrix {
    let mut mat = Matrix::new(dim, dim);
    for i in 0..dim {
        for j in 0..dim {
            mat.set(i, j, kk.get(i, j));
        }
    }
    mat
}

/// Computes the inverse of a small dense matrix
///
/// Returns an error if the matrix is singular or the inverse has non-finite entries.
pub fn inverse(a: &Matrix) -> Result<Matrix, StrError> {
    let (m, n) = a.dims();
    if m != n {
        return Err("matrix must be square to be inverted");
    }
    let mut ai = Matrix::new(n, n);
    mat_inverse(&mut ai, a).map_err(|_| "matrix is singular")?;
    for i in 0..n {
        for j in 0..n {
            if !ai.get(i, j).is_finite() {
                return Err("matrix is singular");
            }
        }
    }
    Ok(ai)
}

/// Returns the transpose of a matrix
pub fn transpose(a: &Matrix) -> Matrix {
    let (m, n) = a.dims();
    let mut at = Matrix::new(n, m);
    for i in 0..m {
        for j in 0..n {
            at.set(j, i, a.get(i, j));
        }
    }
    at
}

/// Computes `c := scale · a · k · bᵀ`
///
/// `a` is (m × d), `k` is (d × d), and `b` is (n × d).
pub fn mat_k_mat_t(scale: f64, a: &Matrix, k: &Matrix, b: &Matrix) -> Result<Matrix, StrError> {
    let (m, d) = a.dims();
    let n = b.dims().0;
    let mut kbt = Matrix::new(d, n);
    mat_mat_mul(&mut kbt, 1.0, k, &transpose(b), 0.0)?;
    let mut c = Matrix::new(m, n);
    mat_mat_mul(&mut c, scale, a, &kbt, 0.0)?;
    Ok(c)
}

/// Computes the projector onto the orthogonal complement of the columns of `n`
///
/// ```text
/// P = I - N (Nᵀ N)⁻¹ Nᵀ
/// ```
pub fn complement_projector(n: &Matrix) -> Result<Matrix, StrError> {
    let (nrow, ncol) = n.dims();
    let mut ntn = Matrix::new(ncol, ncol);
    mat_t_mat_mul(&mut ntn, 1.0, n, n, 0.0)?;
    let ntn_inv = inverse(&ntn)?;
    let mut pp = mat_k_mat_t(-1.0, n, &ntn_inv, n)?;
    mat_update(&mut pp, 1.0, &Matrix::identity(nrow))?;
    Ok(pp)
}

/// Returns the trace of a square matrix
pub fn trace(a: &Matrix) -> f64 {
    let n = usize::min(a.dims().0, a.dims().1);
    (0..n).fold(0.0, |acc, i| acc + a.get(i, i))
}

/// Computes `a += alpha · b`
pub fn add_scaled(a: &mut Matrix, alpha: f64, b: &Matrix) -> Result<(), StrError> {
    mat_update(a, alpha, b)
}

/// Returns the sum of the positive off-diagonal entries
pub fn positive_offdiagonal_sum(a: &Matrix) -> f64 {
    let (m, n) = a.dims();
    let mut sum = 0.0;
    for i in 0..m {
        for j in 0..n {
            if i != j && a.get(i, j) > 0.0 {
                sum += a.get(i, j);
            }
        }
    }
    sum
}

/// Tells whether the matrix has a positive diagonal and non-positive off-diagonal entries
///
/// Off-diagonal entries up to `tol · max|aᵢⱼ|` are accepted.
pub fn is_m_matrix_pattern(a: &Matrix, tol: f64) -> bool {
    let (m, n) = a.dims();
    let mut amax = 0.0;
    for i in 0..m {
        for j in 0..n {
            amax = f64::max(amax, f64::abs(a.get(i, j)));
        }
    }
    for i in 0..m {
        if a.get(i, i) <= 0.0 {
            return false;
        }
        for j in 0..n {
            if i != j && a.get(i, j) > tol * amax {
                return false;
            }
        }
    }
    true
}

/// Eliminates the last row and column of `a` (Schur complement)
///
/// ```text
/// S(n,m) = A(n,m) - A(n,last) A(last,m) / (A(last,last) + extra)
/// ```
pub fn schur_eliminate_last(a: &Matrix, extra: f64) -> Result<Matrix, StrError> {
    let nrow = a.dims().0;
    if nrow < 2 {
        return Err("matrix is too small for the elimination");
    }
    let last = nrow - 1;
    let pivot = a.get(last, last) + extra;
    if pivot == 0.0 {
        return Err("zero pivot in the elimination of the cell unknown");
    }
    let mut s = Matrix::new(last, last);
    for n in 0..last {
        for m in 0..last {
            s.set(n, m, a.get(n, m) - a.get(n, last) * a.get(last, m) / pivot);
        }
    }
    Ok(s)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
