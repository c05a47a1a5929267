use super::{CellGeometry, NodalGeometry};
use crate::base::{MfdMethod, MFD_STABILITY_FACTOR};
use crate::linalg::{add_scaled, complement_projector, inverse, is_m_matrix_pattern, mat_k_mat_t};
use crate::linalg::{positive_offdiagonal_sum, tensor_to_matrix, trace};
use crate::StrError;
use russell_lab::Matrix;
use russell_tensor::Tensor2;

/// Tolerance on the positive off-diagonal entries accepted by the monotone methods
const MONOTONE_TOLERANCE: f64 = 1e-12;

/// Number of trial stability factors on each side of the scaled one (ratio 2^(1/4))
const N_STABILITY_TRIALS: i32 = 16;

/// Indicates whether a local matrix could be computed
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ElementalStatus {
    Ok,
    Failed,
}

/// Computes the local matrices of the mimetic finite difference method for diffusion
///
/// The inverse mass matrix `W` maps face pressures to face fluxes and satisfies the
/// consistency condition
///
/// ```text
/// W · N = R
///
/// N(i,:) = x_fi - x_c           (offset to the face centroid)
/// R(i,:) = |f_i| (K n_i)ᵀ       (area-weighted conormal)
/// ```
///
/// plus a stability term that is symmetric positive definite on the complement of `range(N)`.
pub struct MfdDiffusion {
    /// Scaling factor of the stability term
    stability_factor: f64,
}

impl MfdDiffusion {
    /// Allocates a new instance
    pub fn new() -> Self {
        MfdDiffusion {
            stability_factor: MFD_STABILITY_FACTOR,
        }
    }

    /// Modifies the scaling factor of the stability term
    pub fn modify_stability_scaling_factor(&mut self, factor: f64) -> Result<(), StrError> {
        if factor <= 0.0 {
            return Err("stability scaling factor must be > 0.0");
        }
        self.stability_factor = factor;
        Ok(())
    }

    /// Computes the inverse mass matrix with the primary method and falls back to the secondary one
    ///
    /// Returns an error if both methods fail.
    pub fn mass_matrix_inverse_with_fallback(
        &self,
        primary: MfdMethod,
        secondary: MfdMethod,
        cell: usize,
        geo: &CellGeometry,
        kk: &Tensor2,
    ) -> Result<Matrix, StrError> {
        let (status, wff) = self.mass_matrix_inverse(primary, geo, kk);
        if status == ElementalStatus::Ok {
            return Ok(wff);
        }
        log::debug!("method \"{}\" failed for cell {}", primary.name(), cell);
        let (status, wff) = self.mass_matrix_inverse(secondary, geo, kk);
        if status == ElementalStatus::Ok {
            return Ok(wff);
        }
        log::error!(
            "methods \"{}\" and \"{}\" failed for cell {}",
            primary.name(),
            secondary.name(),
            cell
        );
        Err("both the primary and secondary discretization methods failed")
    }

    /// Computes the inverse mass matrix with the given method
    ///
    /// Surface cells (manifold dimension less than the space dimension) are handled by
    /// [MfdDiffusion::mass_matrix_inverse_surface] regardless of the method.
    pub fn mass_matrix_inverse(&self, method: MfdMethod, geo: &CellGeometry, kk: &Tensor2) -> (ElementalStatus, Matrix) {
        if geo.manifold_dim < geo.dim {
            return self.mass_matrix_inverse_surface(geo, kk);
        }
        let k = tensor_to_matrix(kk, geo.dim);
        let result = match method {
            MfdMethod::MonotoneHex => self.monotone_hex(geo, &k),
            MfdMethod::MonotonePolyhedron => self.monotone_polyhedron(geo, &k),
            MfdMethod::OptimizedScaled => self.optimized_scaled(geo, &k),
            MfdMethod::Tpfa => tpfa(geo, &k),
            MfdMethod::SupportOperator => self.support_operator(geo, &k),
            MfdMethod::Scaled => self.scaled(geo, &k),
        };
        match result {
            Ok(Some(wff)) => (ElementalStatus::Ok, wff),
            _ => (ElementalStatus::Failed, Matrix::new(0, 0)),
        }
    }

    /// Computes the inverse mass matrix of a surface cell using a local tangent frame
    pub fn mass_matrix_inverse_surface(&self, geo: &CellGeometry, kk: &Tensor2) -> (ElementalStatus, Matrix) {
        match self.surface(geo, kk) {
            Ok(wff) => (ElementalStatus::Ok, wff),
            Err(_) => (ElementalStatus::Failed, Matrix::new(0, 0)),
        }
    }

    /// Computes the nodal stiffness matrix
    ///
    /// ```text
    /// A = (1/|c|) R K Rᵀ + γ P
    /// ```
    ///
    /// where R holds the nodal conormals and P projects onto the complement of
    /// the linear functions `[N | 1]`.
    pub fn stiffness_matrix(&self, geo: &NodalGeometry, kk: &Tensor2) -> Result<Matrix, StrError> {
        let nnode = geo.nodes.len();
        let k = tensor_to_matrix(kk, geo.dim);
        let mut aa = mat_k_mat_t(1.0 / geo.volume, &geo.conormals, &k, &geo.conormals)?;
        let mut linear = Matrix::new(nnode, geo.dim + 1);
        for i in 0..nnode {
            for a in 0..geo.dim {
                linear.set(i, a, geo.offsets.get(i, a));
            }
            linear.set(i, geo.dim, 1.0);
        }
        let pp = complement_projector(&linear)?;
        let gamma = self.stability_factor * trace(&aa) / (nnode as f64);
        add_scaled(&mut aa, gamma, &pp)?;
        Ok(aa)
    }

    /// Returns the stability factor of the scaled method for the consistency term
    fn scaled_gamma(&self, w0: &Matrix) -> f64 {
        self.stability_factor * trace(w0) / (w0.dims().0 as f64)
    }

    /// Computes W = W0 + γ P with the scaled γ
    fn scaled(&self, geo: &CellGeometry, k: &Matrix) -> Result<Option<Matrix>, StrError> {
        let (mut w0, pp) = consistency_and_projector(geo, k)?;
        let gamma = self.scaled_gamma(&w0);
        add_scaled(&mut w0, gamma, &pp)?;
        Ok(Some(w0))
    }

    /// Selects γ minimizing the positive off-diagonal entries
    fn optimized_scaled(&self, geo: &CellGeometry, k: &Matrix) -> Result<Option<Matrix>, StrError> {
        let (w0, pp) = consistency_and_projector(geo, k)?;
        let gamma_s = self.scaled_gamma(&w0);
        let mut best: Option<(f64, Matrix)> = None;
        for trial in trial_factors() {
            let mut w = w0.clone();
            add_scaled(&mut w, gamma_s * trial, &pp)?;
            let penalty = positive_offdiagonal_sum(&w);
            let better = match &best {
                Some((p, _)) => penalty < *p - MONOTONE_TOLERANCE * f64::abs(*p),
                None => true,
            };
            if better {
                best = Some((penalty, w));
            }
        }
        Ok(best.map(|(_, w)| w))
    }

    /// Searches γ (closest to the scaled one) such that W has the M-matrix sign pattern
    fn monotone_polyhedron(&self, geo: &CellGeometry, k: &Matrix) -> Result<Option<Matrix>, StrError> {
        let (w0, pp) = consistency_and_projector(geo, k)?;
        let gamma_s = self.scaled_gamma(&w0);
        for trial in trial_factors() {
            let mut w = w0.clone();
            add_scaled(&mut w, gamma_s * trial, &pp)?;
            if is_m_matrix_pattern(&w, MONOTONE_TOLERANCE) {
                return Ok(Some(w));
            }
        }
        Ok(None)
    }

    /// Uses the (diagonal) two-point matrix when it is consistent, otherwise the polyhedral search
    fn monotone_hex(&self, geo: &CellGeometry, k: &Matrix) -> Result<Option<Matrix>, StrError> {
        if geo.nface() != 2 * geo.dim {
            return Ok(None);
        }
        if let Some(w) = tpfa(geo, k)? {
            let n = geo.offsets();
            let r = conormals(geo, k);
            let nf = geo.nface();
            let mut rmax = 0.0;
            let mut err = 0.0;
            for i in 0..nf {
                for a in 0..geo.dim {
                    rmax = f64::max(rmax, f64::abs(r.get(i, a)));
                    err = f64::max(err, f64::abs(w.get(i, i) * n.get(i, a) - r.get(i, a)));
                }
            }
            if err <= 1e-10 * rmax {
                return Ok(Some(w));
            }
        }
        self.monotone_polyhedron(geo, k)
    }

    /// Inverts the consistent mass matrix M = (1/|c|) N K⁻¹ Nᵀ + γ' (I - R (RᵀR)⁻¹ Rᵀ)
    fn support_operator(&self, geo: &CellGeometry, k: &Matrix) -> Result<Option<Matrix>, StrError> {
        let n = geo.offsets();
        let r = conormals(geo, k);
        let kinv = inverse(k)?;
        let mut mm = mat_k_mat_t(1.0 / geo.volume, &n, &kinv, &n)?;
        let pp = complement_projector(&r)?;
        let gamma = self.stability_factor * trace(&mm) / (geo.nface() as f64);
        add_scaled(&mut mm, gamma, &pp)?;
        match inverse(&mm) {
            Ok(w) => Ok(Some(w)),
            Err(_) => Ok(None),
        }
    }

    /// Projects the geometry onto the tangent plane and applies the scaled method
    fn surface(&self, geo: &CellGeometry, kk: &Tensor2) -> Result<Matrix, StrError> {
        if geo.dim != 3 || geo.manifold_dim != 2 {
            return Err("surface cells must be two-dimensional cells in 3D");
        }
        let n3 = geo.offsets();
        let nf = geo.nface();
        if nf < 3 {
            return Err("surface cell must have at least three edges");
        }
        let row = |i: usize| [n3.get(i, 0), n3.get(i, 1), n3.get(i, 2)];
        let t1 = normalized(row(0)).ok_or("degenerate surface cell")?;
        let mut best = [0.0; 3];
        for i in 1..nf {
            let c = cross(row(0), row(i));
            if norm(c) > norm(best) {
                best = c;
            }
        }
        let normal = normalized(best).ok_or("degenerate surface cell")?;
        let t2 = cross(normal, t1);
        let frame = [t1, t2];

        // local geometry
        let k3 = tensor_to_matrix(kk, 3);
        let mut k2 = Matrix::new(2, 2);
        for a in 0..2 {
            for b in 0..2 {
                let mut sum = 0.0;
                for p in 0..3 {
                    for q in 0..3 {
                        sum += frame[a][p] * k3.get(p, q) * frame[b][q];
                    }
                }
                k2.set(a, b, sum);
            }
        }
        let mut local = geo.clone();
        local.dim = 2;
        local.manifold_dim = 2;
        local.centroid = vec![0.0, 0.0];
        for i in 0..nf {
            let offset = row(i);
            let conormal = [geo.normals[i][0], geo.normals[i][1], geo.normals[i][2]];
            local.face_centroids[i] = vec![dot(offset, t1), dot(offset, t2)];
            local.normals[i] = vec![dot(conormal, t1), dot(conormal, t2)];
        }
        match self.scaled(&local, &k2)? {
            Some(w) => Ok(w),
            None => Err("cannot compute the surface mass matrix"),
        }
    }
}

/// Returns the trial scaling factors ordered by distance (in log scale) to 1.0
fn trial_factors() -> Vec<f64> {
    let mut factors = vec![1.0];
    for k in 1..=N_STABILITY_TRIALS {
        let s = f64::powf(2.0, (k as f64) / 4.0);
        factors.push(1.0 / s);
        factors.push(s);
    }
    factors
}

/// Returns R = Nn K with Nn the area-weighted outward normals
fn conormals(geo: &CellGeometry, k: &Matrix) -> Matrix {
    let nf = geo.nface();
    let mut r = Matrix::new(nf, geo.dim);
    for i in 0..nf {
        for a in 0..geo.dim {
            let mut sum = 0.0;
            for b in 0..geo.dim {
                sum += k.get(a, b) * geo.normals[i][b];
            }
            r.set(i, a, sum);
        }
    }
    r
}

/// Returns the consistency term W0 = (1/|c|) Nn K Nnᵀ and the projector onto the complement of range(N)
fn consistency_and_projector(geo: &CellGeometry, k: &Matrix) -> Result<(Matrix, Matrix), StrError> {
    let nn = geo.normals_matrix();
    let w0 = mat_k_mat_t(1.0 / geo.volume, &nn, k, &nn)?;
    let pp = complement_projector(&geo.offsets())?;
    Ok((w0, pp))
}

/// Returns the diagonal two-point matrix W(i,i) = (Nnᵢᵀ K Nnᵢ) / |Nᵢ · Nnᵢ|
fn tpfa(geo: &CellGeometry, k: &Matrix) -> Result<Option<Matrix>, StrError> {
    let nf = geo.nface();
    let n = geo.offsets();
    let mut w = Matrix::new(nf, nf);
    for i in 0..nf {
        let mut knn = 0.0;
        let mut dist = 0.0;
        for a in 0..geo.dim {
            dist += n.get(i, a) * geo.normals[i][a];
            for b in 0..geo.dim {
                knn += geo.normals[i][a] * k.get(a, b) * geo.normals[i][b];
            }
        }
        if f64::abs(dist) <= f64::EPSILON * geo.areas[i] {
            return Ok(None);
        }
        w.set(i, i, knn / f64::abs(dist));
    }
    Ok(Some(w))
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(a: [f64; 3]) -> f64 {
    f64::sqrt(dot(a, a))
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalized(a: [f64; 3]) -> Option<[f64; 3]> {
    let len = norm(a);
    if len <= f64::EPSILON {
        None
    } else {
        Some([a[0] / len, a[1] / len, a[2] / len])
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{ElementalStatus, MfdDiffusion};
    use crate::base::MfdMethod;
    use crate::mesh::MeshBox;
    use crate::mfd::{CellGeometry, NodalGeometry};
    use russell_lab::{approx_eq, mat_approx_eq, Matrix};
    use russell_tensor::{Mandel, Tensor2};

    fn identity_tensor() -> Tensor2 {
        let mut kk = Tensor2::new(Mandel::Symmetric);
        kk.sym_set(0, 0, 1.0);
        kk.sym_set(1, 1, 1.0);
        kk.sym_set(2, 2, 1.0);
        kk
    }

    // checks W · N = R
    fn check_consistency(geo: &CellGeometry, kk: &Tensor2, w: &Matrix, tol: f64) {
        let n = geo.offsets();
        let nf = geo.nface();
        for i in 0..nf {
            for a in 0..geo.dim {
                let mut wn = 0.0;
                for j in 0..nf {
                    wn += w.get(i, j) * n.get(j, a);
                }
                let mut r = 0.0;
                for b in 0..geo.dim {
                    r += kk.get(a, b) * geo.normals[i][b];
                }
                approx_eq(wn, r, tol);
            }
        }
    }

    #[test]
    fn modify_stability_scaling_factor_captures_errors() {
        let mut mfd = MfdDiffusion::new();
        assert_eq!(
            mfd.modify_stability_scaling_factor(0.0).err(),
            Some("stability scaling factor must be > 0.0")
        );
        assert_eq!(mfd.modify_stability_scaling_factor(2.0), Ok(()));
    }

    #[test]
    fn all_methods_are_consistent_on_a_box() {
        let mesh = MeshBox::new(&[0.0, 0.0, 0.0], &[2.0, 1.0, 0.5], &[1, 1, 1]).unwrap();
        let geo = CellGeometry::new(&mesh, 0).unwrap();
        let mut kk = Tensor2::new(Mandel::Symmetric);
        kk.sym_set(0, 0, 3.0);
        kk.sym_set(1, 1, 2.0);
        kk.sym_set(2, 2, 1.0);
        let mfd = MfdDiffusion::new();
        for method in [
            MfdMethod::MonotoneHex,
            MfdMethod::MonotonePolyhedron,
            MfdMethod::OptimizedScaled,
            MfdMethod::Tpfa,
            MfdMethod::SupportOperator,
            MfdMethod::Scaled,
        ] {
            let (status, w) = mfd.mass_matrix_inverse(method, &geo, &kk);
            assert_eq!(status, ElementalStatus::Ok);
            check_consistency(&geo, &kk, &w, 1e-12);
            for i in 0..6 {
                assert!(w.get(i, i) > 0.0);
                for j in 0..6 {
                    approx_eq(w.get(i, j), w.get(j, i), 1e-12);
                }
            }
        }
    }

    #[test]
    fn unit_cube_matrices_work() {
        let mesh = MeshBox::unit(3).unwrap();
        let geo = CellGeometry::new(&mesh, 0).unwrap();
        let kk = identity_tensor();
        let mfd = MfdDiffusion::new();

        // W = γ I + (1 - γ/2) W0 with γ = 1; opposite faces couple with -1/2
        let (status, w) = mfd.mass_matrix_inverse(MfdMethod::Scaled, &geo, &kk);
        assert_eq!(status, ElementalStatus::Ok);
        approx_eq(w.get(0, 0), 1.5, 1e-14);
        approx_eq(w.get(0, 1), -0.5, 1e-14);
        approx_eq(w.get(0, 2), 0.0, 1e-14);

        let (_, w_mono) = mfd.mass_matrix_inverse(MfdMethod::MonotonePolyhedron, &geo, &kk);
        mat_approx_eq(&w_mono, &w, 1e-14);

        // the two-point matrix is consistent on the cube: W = 2 I
        let (_, w_tpfa) = mfd.mass_matrix_inverse(MfdMethod::Tpfa, &geo, &kk);
        approx_eq(w_tpfa.get(3, 3), 2.0, 1e-14);
        let (_, w_hex) = mfd.mass_matrix_inverse(MfdMethod::MonotoneHex, &geo, &kk);
        mat_approx_eq(&w_hex, &w_tpfa, 1e-14);
    }

    #[test]
    fn monotone_hex_fails_for_non_hexahedra() {
        // a quadrilateral seen as a 3D cell with four faces
        let mesh = MeshBox::unit(2).unwrap();
        let mut geo = CellGeometry::new(&mesh, 0).unwrap();
        geo.areas.push(1.0);
        geo.face_centroids.push(vec![0.5, 0.5]);
        geo.normals.push(vec![0.0, 0.0]);
        let mut kk = Tensor2::new(Mandel::Symmetric2D);
        kk.sym_set(0, 0, 1.0);
        kk.sym_set(1, 1, 1.0);
        let mfd = MfdDiffusion::new();
        let (status, w) = mfd.mass_matrix_inverse(MfdMethod::MonotoneHex, &geo, &kk);
        assert_eq!(status, ElementalStatus::Failed);
        assert_eq!(w.dims(), (0, 0));
    }

    #[test]
    fn fallback_works() {
        let mesh = MeshBox::unit(3).unwrap();
        let mut geo = CellGeometry::new(&mesh, 0).unwrap();
        let kk = identity_tensor();
        let mfd = MfdDiffusion::new();
        let w = mfd
            .mass_matrix_inverse_with_fallback(MfdMethod::MonotoneHex, MfdMethod::Tpfa, 0, &geo, &kk)
            .unwrap();
        approx_eq(w.get(0, 0), 2.0, 1e-14);

        // collapse a face centroid onto the cell centroid: the two-point matrix fails
        geo.face_centroids[0] = vec![0.5, 0.5, 0.5];
        let (status, _) = mfd.mass_matrix_inverse(MfdMethod::Tpfa, &geo, &kk);
        assert_eq!(status, ElementalStatus::Failed);
        geo.face_centroids = vec![vec![0.5, 0.5, 0.5]; 6];
        assert_eq!(
            mfd.mass_matrix_inverse_with_fallback(MfdMethod::Tpfa, MfdMethod::Scaled, 0, &geo, &kk)
                .err(),
            Some("both the primary and secondary discretization methods failed")
        );
    }

    #[test]
    fn surface_cell_works() {
        // unit square lying on the plane x = 0 with in-plane conormals
        let mesh = MeshBox::unit(2).unwrap();
        let flat = CellGeometry::new(&mesh, 0).unwrap();
        let mut geo = flat.clone();
        geo.dim = 3;
        geo.manifold_dim = 2;
        geo.centroid = vec![0.0, 0.5, 0.5];
        for i in 0..4 {
            geo.face_centroids[i] = vec![0.0, flat.face_centroids[i][0], flat.face_centroids[i][1]];
            geo.normals[i] = vec![0.0, flat.normals[i][0], flat.normals[i][1]];
        }
        let kk = identity_tensor();
        let mfd = MfdDiffusion::new();
        let (status, w) = mfd.mass_matrix_inverse(MfdMethod::Tpfa, &geo, &kk);
        assert_eq!(status, ElementalStatus::Ok);

        let mut kk2 = Tensor2::new(Mandel::Symmetric2D);
        kk2.sym_set(0, 0, 1.0);
        kk2.sym_set(1, 1, 1.0);
        let (_, w_flat) = mfd.mass_matrix_inverse(MfdMethod::Scaled, &flat, &kk2);
        mat_approx_eq(&w, &w_flat, 1e-14);
    }

    #[test]
    fn stiffness_matrix_works() {
        let mesh = MeshBox::unit(2).unwrap();
        let geo = NodalGeometry::new(&mesh, 0).unwrap();
        let mut kk = Tensor2::new(Mandel::Symmetric2D);
        kk.sym_set(0, 0, 1.0);
        kk.sym_set(1, 1, 1.0);
        let mfd = MfdDiffusion::new();
        let aa = mfd.stiffness_matrix(&geo, &kk).unwrap();
        // constants are in the kernel and linear functions are reproduced
        for i in 0..4 {
            let row_sum: f64 = (0..4).map(|j| aa.get(i, j)).sum();
            approx_eq(row_sum, 0.0, 1e-14);
            let ax: f64 = (0..4).map(|j| aa.get(i, j) * geo.offsets.get(j, 0)).sum();
            approx_eq(ax, geo.conormals.get(i, 0), 1e-14);
        }
        approx_eq(aa.get(0, 0), 0.625, 1e-14);
    }
}
