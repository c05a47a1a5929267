use crate::StrError;
use russell_lab::{Matrix, Vector};
use russell_sparse::CooMatrix;

/// Adds a dense local matrix into the global matrix
///
/// Zero entries are skipped. Duplicates are summed by the sparse solvers.
pub fn assemble_local_matrix(
    kk: &mut CooMatrix,
    kk_local: &Matrix,
    local_to_global: &[usize],
) -> Result<(), StrError> {
    let n = kk_local.dims().0;
    if local_to_global.len() != n {
        return Err("local-to-global map is incompatible with the local matrix");
    }
    for l in 0..n {
        let g = local_to_global[l];
        for ll in 0..n {
            let value = kk_local.get(l, ll);
            if value != 0.0 {
                kk.put(g, local_to_global[ll], value)?;
            }
        }
    }
    Ok(())
}

/// Returns the diagonal of a coordinate matrix (duplicates are summed)
pub fn coo_diagonal(kk: &CooMatrix) -> Vector {
    let (nrow, _, nnz, _) = kk.get_info();
    let rows = kk.get_row_indices();
    let cols = kk.get_col_indices();
    let values = kk.get_values();
    let mut diag = Vector::new(nrow);
    for k in 0..nnz {
        if rows[k] == cols[k] {
            diag[rows[k] as usize] += values[k];
        }
    }
    diag
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{assemble_local_matrix, coo_diagonal};
    use russell_lab::{mat_approx_eq, vec_approx_eq, Matrix, Vector};
    use russell_sparse::{CooMatrix, Sym};

    #[test]
    fn assemble_local_matrix_captures_errors() {
        let mut kk = CooMatrix::new(3, 3, 2, Sym::No).unwrap();
        let local = Matrix::from(&[[1.0, -1.0], [-1.0, 1.0]]);
        assert_eq!(
            assemble_local_matrix(&mut kk, &local, &[0]).err(),
            Some("local-to-global map is incompatible with the local matrix")
        );
        assert_eq!(
            assemble_local_matrix(&mut kk, &local, &[0, 1]).err(),
            Some("COO matrix: max number of items has been reached")
        );
    }

    #[test]
    fn assembly_works() {
        let mut kk = CooMatrix::new(3, 3, 8, Sym::No).unwrap();
        let local = Matrix::from(&[[1.0, -1.0], [-1.0, 1.0]]);
        assemble_local_matrix(&mut kk, &local, &[0, 1]).unwrap();
        assemble_local_matrix(&mut kk, &local, &[1, 2]).unwrap();
        assert_eq!(kk.get_info().2, 8);
        vec_approx_eq(coo_diagonal(&kk).as_data(), &[1.0, 2.0, 1.0], 1e-15);
        let u = Vector::from(&[1.0, 2.0, 4.0]);
        let mut v = Vector::new(3);
        kk.mat_vec_mul(&mut v, 1.0, &u).unwrap();
        vec_approx_eq(v.as_data(), &[-1.0, -1.0, 2.0], 1e-15);
        mat_approx_eq(
            &kk.as_dense(),
            &[[1.0, -1.0, 0.0], [-1.0, 2.0, -1.0], [0.0, -1.0, 1.0]],
            1e-15,
        );
        kk.reset();
        assert_eq!(kk.get_info().2, 0);
    }
}
