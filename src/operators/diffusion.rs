use super::{apply_natural, enforce_essential, local_dofs, BcData, LocalOp, NonlinearCoefficient, Schema};
use crate::base::{BcModel, EntityKind, MfdMethod, ParallelType};
use crate::linalg::{assemble_local_matrix, schur_eliminate_last, Communicator, CompositeVector};
use crate::mesh::MeshQuery;
use crate::mfd::{CellGeometry, ElementalStatus, MfdDiffusion, NodalGeometry};
use crate::solvers::{LinearOperator, Preconditioner};
use crate::StrError;
use russell_lab::{mat_scale, mat_vec_mul, Matrix, Vector};
use russell_sparse::{CooMatrix, Sym};
use russell_tensor::Tensor2;
use std::collections::BTreeMap;

/// Returns the entities carrying the rows of the local matrix `i`
fn block_entities(mesh: &dyn MeshQuery, schema: Schema, i: usize) -> Vec<(EntityKind, usize)> {
    match schema {
        Schema::CellFace => {
            let mut entities: Vec<_> = mesh.cell_faces(i).iter().map(|f| (EntityKind::Face, *f)).collect();
            entities.push((EntityKind::Cell, i));
            entities
        }
        Schema::Node => mesh.cell_nodes(i).iter().map(|v| (EntityKind::Node, *v)).collect(),
        Schema::Cell => mesh.face_cells(i).iter().map(|c| (EntityKind::Cell, *c)).collect(),
    }
}

/// Returns the elevation of an entity (last coordinate)
fn elevation(mesh: &dyn MeshQuery, kind: EntityKind, id: usize) -> f64 {
    let x = match kind {
        EntityKind::Cell => mesh.cell_centroid(id),
        EntityKind::Face => mesh.face_centroid(id),
        EntityKind::Node => mesh.node_coordinates(id),
    };
    x[x.len() - 1]
}

/// Implements the diffusion operator `-∇·(k K ∇p)` discretized by mimetic finite differences
///
/// The operator keeps one dense matrix per base entity (see [Schema]) plus a right-hand side
/// and an accumulation diagonal. With the mixed schema, the cell unknowns may be eliminated
/// locally, leading to a face-only Schur complement handled by a black-box preconditioner.
pub struct OperatorDiffusion<'a> {
    /// Mesh
    mesh: &'a dyn MeshQuery,

    /// Communicator
    comm: &'a dyn Communicator,

    /// Location of the matrices and unknowns
    schema: Schema,

    /// Builder of the local matrices
    mfd: MfdDiffusion,

    /// Method tried first
    primary: MfdMethod,

    /// Method used when the primary one fails
    secondary: MfdMethod,

    /// Permeability tensor of each (used) cell
    permeability: Vec<Tensor2>,

    /// Inverse mass matrix of each owned cell (mixed schema)
    mass_matrices: Vec<Matrix>,

    /// One-sided transmissibility of each face (two-point schema)
    boundary_transmissibility: Vec<f64>,

    /// Nonlinear coefficient (None means one)
    coefficient: Option<NonlinearCoefficient>,

    /// Local matrices keyed by schema
    blocks: BTreeMap<Schema, LocalOp>,

    /// Right-hand side
    rhs: CompositeVector,

    /// Accumulation terms added to the diagonal
    diagonal: CompositeVector,

    /// ρ |g| given to the last call of [OperatorDiffusion::add_gravity_terms]
    density_gravity: f64,

    /// Preconditioner (of the face Schur complement with the mixed schema)
    preconditioner: Option<Box<dyn Preconditioner>>,
}

impl<'a> OperatorDiffusion<'a> {
    /// Allocates a new instance
    pub fn new(
        mesh: &'a dyn MeshQuery,
        comm: &'a dyn Communicator,
        schema: Schema,
        primary: MfdMethod,
        secondary: MfdMethod,
        stability_factor: f64,
    ) -> Result<Self, StrError> {
        if !secondary.can_be_secondary() {
            log::error!("method \"{}\" cannot be used as secondary method", secondary.name());
            return Err("secondary discretization method must be a robust method");
        }
        let mut mfd = MfdDiffusion::new();
        mfd.modify_stability_scaling_factor(stability_factor)?;
        let rhs = CompositeVector::new(mesh, schema.dof_kinds());
        let diagonal = rhs.clone();
        Ok(OperatorDiffusion {
            mesh,
            comm,
            schema,
            mfd,
            primary,
            secondary,
            permeability: Vec::new(),
            mass_matrices: Vec::new(),
            boundary_transmissibility: Vec::new(),
            coefficient: None,
            blocks: BTreeMap::new(),
            rhs,
            diagonal,
            density_gravity: 0.0,
            preconditioner: None,
        })
    }

    /// Returns the schema
    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Returns the right-hand side
    pub fn rhs(&self) -> &CompositeVector {
        &self.rhs
    }

    /// Returns the right-hand side for modification
    pub fn rhs_mut(&mut self) -> &mut CompositeVector {
        &mut self.rhs
    }

    /// Returns the accumulation diagonal
    pub fn diagonal(&self) -> &CompositeVector {
        &self.diagonal
    }

    /// Returns the local matrices
    pub fn local_op(&self) -> Result<&LocalOp, StrError> {
        self.blocks.get(&self.schema).ok_or("local matrices must be computed first")
    }

    /// Returns the position of an unknown in the arena of the composite vectors
    pub fn dof(&self, kind: EntityKind, id: usize) -> Result<usize, StrError> {
        match self.rhs.offset(kind) {
            Some(offset) if id < self.rhs.num_used(kind) => Ok(offset + id),
            _ => Err("entity does not carry an unknown of the operator"),
        }
    }

    /// Sets the permeability and the nonlinear coefficient and computes the mass matrices
    ///
    /// The permeability must be given for all used cells (owned plus ghosts).
    pub fn init_operator(
        &mut self,
        permeability: Vec<Tensor2>,
        coefficient: Option<NonlinearCoefficient>,
    ) -> Result<(), StrError> {
        let ncell_used = self.mesh.num_entities(EntityKind::Cell, ParallelType::Used);
        if permeability.len() != ncell_used {
            return Err("permeability must be given for all (used) cells");
        }
        self.permeability = permeability;
        self.mass_matrices.clear();
        if self.schema == Schema::CellFace {
            let ncell = self.mesh.num_entities(EntityKind::Cell, ParallelType::Owned);
            for c in 0..ncell {
                let geo = CellGeometry::new(self.mesh, c)?;
                let wff = self.mfd.mass_matrix_inverse_with_fallback(
                    self.primary,
                    self.secondary,
                    c,
                    &geo,
                    &self.permeability[c],
                )?;
                self.mass_matrices.push(wff);
            }
        }
        self.set_coefficient(coefficient)
    }

    /// Replaces the nonlinear coefficient
    pub fn set_coefficient(&mut self, coefficient: Option<NonlinearCoefficient>) -> Result<(), StrError> {
        if let Some(k) = &coefficient {
            let ncell = self.mesh.num_entities(EntityKind::Cell, ParallelType::Owned);
            let nface = self.mesh.num_entities(EntityKind::Face, ParallelType::Used);
            if k.cell_values.len() < ncell || k.face_values.len() < nface || k.face_derivatives.len() < nface {
                return Err("nonlinear coefficient is incompatible with the mesh");
            }
        }
        self.coefficient = coefficient;
        Ok(())
    }

    /// Zeroes the right-hand side and the accumulation diagonal
    pub fn reset_rhs_and_diagonal(&mut self) {
        self.rhs.put_scalar(0.0);
        self.diagonal.put_scalar(0.0);
        self.density_gravity = 0.0;
    }

    /// Adds owned values to the accumulation diagonal of an entity kind
    pub fn add_accumulation(&mut self, kind: EntityKind, values: &[f64]) -> Result<(), StrError> {
        let diag = self.diagonal.owned_mut(kind);
        if values.len() != diag.len() {
            return Err("accumulation values are incompatible with the operator");
        }
        for (d, v) in diag.iter_mut().zip(values) {
            *d += v;
        }
        Ok(())
    }

    /// Rebuilds the local matrices from scratch
    ///
    /// `flux` holds the face fluxes (including ghosts) enabling the Newton term of the mixed
    /// schema; the term is added only where it increases the diagonal.
    pub fn update_matrices(&mut self, flux: Option<&[f64]>) -> Result<(), StrError> {
        let local = match self.schema {
            Schema::CellFace => self.update_matrices_mixed(flux)?,
            Schema::Cell => self.update_matrices_tpfa()?,
            Schema::Node => self.update_matrices_nodal()?,
        };
        self.blocks.insert(self.schema, local);
        Ok(())
    }

    /// Computes the mixed (faces then cell) matrices
    fn update_matrices_mixed(&self, flux: Option<&[f64]>) -> Result<LocalOp, StrError> {
        let ncell = self.mesh.num_entities(EntityKind::Cell, ParallelType::Owned);
        if self.mass_matrices.len() != ncell {
            return Err("operator must be initialized first");
        }
        if let Some(q) = flux {
            if q.len() < self.mesh.num_entities(EntityKind::Face, ParallelType::Used) {
                return Err("flux vector is too short for the Newton term");
            }
        }
        let coef = self.coefficient.as_ref();
        let mut local = LocalOp::new(EntityKind::Cell, ncell);
        for c in 0..ncell {
            let faces = self.mesh.cell_faces(c);
            let dirs = self.mesh.cell_face_dirs(c);
            let wff = &self.mass_matrices[c];
            let nf = faces.len();
            let kc = coef.map(|k| k.cell_values[c]).unwrap_or(1.0);
            let mut a = Matrix::new(nf + 1, nf + 1);
            let mut total = 0.0;
            for n in 0..nf {
                let kf = coef.map(|k| k.face_values[faces[n]]).unwrap_or(1.0);
                let mut rowsum = 0.0;
                for m in 0..nf {
                    let value = wff.get(n, m) * kc * kf;
                    a.set(n, m, value);
                    rowsum += value;
                }
                a.set(n, nf, -rowsum);
                total += rowsum;
            }
            for m in 0..nf {
                let colsum = (0..nf).fold(0.0, |acc, n| acc + a.get(n, m));
                a.set(nf, m, -colsum);
            }
            a.set(nf, nf, total);
            if let (Some(q), Some(k)) = (flux, coef) {
                for n in 0..nf {
                    let f = faces[n];
                    let kf = k.face_values[f];
                    if kf > 0.0 {
                        let alpha = k.face_derivatives[f] / kf * q[f] * (dirs[n] as f64);
                        if alpha > 0.0 {
                            a.set(n, n, a.get(n, n) + kc * alpha);
                        }
                    }
                }
            }
            local.set(c, a);
        }
        Ok(local)
    }

    /// Computes the two-point (face-based) matrices
    ///
    /// Each half transmissibility is scaled by the cell value of the coefficient before the
    /// harmonic average; the face value then scales the result.
    fn update_matrices_tpfa(&mut self) -> Result<LocalOp, StrError> {
        let ncell = self.mesh.num_entities(EntityKind::Cell, ParallelType::Owned);
        let nface = self.mesh.num_entities(EntityKind::Face, ParallelType::Used);
        let nface_owned = self.mesh.num_entities(EntityKind::Face, ParallelType::Owned);
        if self.permeability.len() < ncell {
            return Err("operator must be initialized first");
        }
        let coef = self.coefficient.as_ref();
        let mut resistance = vec![0.0; nface];
        let mut one_sided = vec![0.0; nface];
        for c in 0..ncell {
            let geo = CellGeometry::new(self.mesh, c)?;
            let (status, wff) = self.mfd.mass_matrix_inverse(MfdMethod::Tpfa, &geo, &self.permeability[c]);
            if status == ElementalStatus::Failed {
                log::error!("two-point transmissibility failed for cell {}", c);
                return Err("two-point transmissibility failed");
            }
            let kc = coef.map(|k| k.cell_values[c]).unwrap_or(1.0);
            for (n, f) in self.mesh.cell_faces(c).iter().enumerate() {
                let half = kc * wff.get(n, n);
                resistance[*f] += if half > 0.0 { 1.0 / half } else { f64::INFINITY };
                one_sided[*f] = half;
            }
        }
        self.comm.gather_add(EntityKind::Face, &mut resistance);
        self.comm.scatter(EntityKind::Face, &mut resistance);
        let mut local = LocalOp::new(EntityKind::Face, nface_owned);
        for f in 0..nface_owned {
            let kf = coef.map(|k| k.face_values[f]).unwrap_or(1.0);
            if self.mesh.face_cells(f).len() == 2 {
                let t = kf / resistance[f];
                local.set(f, Matrix::from(&[[t, -t], [-t, t]]));
            } else {
                local.set(f, Matrix::new(1, 1));
            }
            one_sided[f] *= kf;
        }
        self.boundary_transmissibility = one_sided;
        Ok(local)
    }

    /// Computes the nodal stiffness matrices
    fn update_matrices_nodal(&self) -> Result<LocalOp, StrError> {
        let ncell = self.mesh.num_entities(EntityKind::Cell, ParallelType::Owned);
        if self.permeability.len() < ncell {
            return Err("operator must be initialized first");
        }
        let coef = self.coefficient.as_ref();
        let mut local = LocalOp::new(EntityKind::Cell, ncell);
        for c in 0..ncell {
            let geo = NodalGeometry::new(self.mesh, c)?;
            let mut a = self.mfd.stiffness_matrix(&geo, &self.permeability[c])?;
            mat_scale(&mut a, coef.map(|k| k.cell_values[c]).unwrap_or(1.0));
            local.set(c, a);
        }
        Ok(local)
    }

    /// Adds the gravity terms to the right-hand side
    ///
    /// Each local matrix contributes `A · ρ(g·x)` with gravity pointing downward along the last
    /// axis, so that hydrostatic states yield a zero residual.
    ///
    /// `density_gravity` is `ρ |g|`. The boundary conditions must be applied afterwards.
    pub fn add_gravity_terms(&mut self, density_gravity: f64) -> Result<(), StrError> {
        let local = self.blocks.get(&self.schema).ok_or("local matrices must be computed first")?;
        self.density_gravity = density_gravity;
        for i in 0..local.len() {
            let entities = block_entities(self.mesh, self.schema, i);
            let z = Vector::from(
                &entities
                    .iter()
                    .map(|(kind, id)| -density_gravity * elevation(self.mesh, *kind, *id))
                    .collect::<Vec<_>>(),
            );
            let mut az = Vector::new(entities.len());
            mat_vec_mul(&mut az, 1.0, &local.matrices[i], &z)?;
            for (r, (kind, id)) in entities.iter().enumerate() {
                self.rhs.used_mut(*kind)[*id] += az[r];
            }
        }
        self.rhs.gather_add_to_owned(self.comm);
        Ok(())
    }

    /// Applies the boundary conditions to the local matrices and right-hand side
    ///
    /// See [enforce_essential] for the meaning of `primary` and `eliminate`. With the two-point
    /// schema the faces carry no unknowns; Dirichlet faces then couple their cell to the
    /// prescribed value (plus the gravity potential difference) through the one-sided
    /// transmissibility.
    pub fn apply_bcs(&mut self, bc: &BcData, primary: bool, eliminate: bool) -> Result<(), StrError> {
        if self.schema == Schema::Cell {
            return self.apply_bcs_tpfa(bc);
        }
        let expected = match self.schema {
            Schema::Node => EntityKind::Node,
            _ => EntityKind::Face,
        };
        if bc.entity != expected {
            return Err("boundary data entity is incompatible with the schema");
        }
        let local = self
            .blocks
            .get_mut(&self.schema)
            .ok_or("local matrices must be computed first")?;
        for i in 0..local.len() {
            let entities = block_entities(self.mesh, self.schema, i);
            let dofs = local_dofs(self.mesh, &entities, bc, &self.rhs)?;
            enforce_essential(local, i, &dofs, self.rhs.as_mut_slice(), primary, eliminate)?;
        }
        apply_natural(self.mesh, bc, &mut self.rhs)
    }

    /// Applies the boundary conditions of the two-point schema
    fn apply_bcs_tpfa(&mut self, bc: &BcData) -> Result<(), StrError> {
        if bc.entity != EntityKind::Face {
            return Err("boundary data entity is incompatible with the schema");
        }
        let local = self
            .blocks
            .get_mut(&self.schema)
            .ok_or("local matrices must be computed first")?;
        for f in 0..local.len() {
            let cells = self.mesh.face_cells(f);
            if cells.len() != 1 {
                continue;
            }
            let c = cells[0];
            match bc.model(f) {
                BcModel::Dirichlet => {
                    let t = self.boundary_transmissibility[f];
                    let dz = elevation(self.mesh, EntityKind::Face, f) - elevation(self.mesh, EntityKind::Cell, c);
                    local.save_shadow(f);
                    local.matrices[f].set(0, 0, t);
                    self.rhs.used_mut(EntityKind::Cell)[c] += t * (bc.value(f) + self.density_gravity * dz);
                }
                BcModel::Neumann => self.rhs.used_mut(EntityKind::Cell)[c] -= bc.value(f),
                BcModel::None => (),
            }
        }
        self.rhs.gather_add_to_owned(self.comm);
        Ok(())
    }

    /// Assembles the global matrix (local matrices plus accumulation diagonal)
    ///
    /// Rows and columns follow the arena of the composite vectors of this operator.
    pub fn assemble_matrix(&self) -> Result<CooMatrix, StrError> {
        let local = self.local_op()?;
        let n = self.rhs.as_slice().len();
        let max_nnz = local.matrices.iter().fold(n, |acc, a| acc + a.dims().0 * a.dims().1);
        let mut mat = CooMatrix::new(n, n, usize::max(1, max_nnz), Sym::No)?;
        for i in 0..local.len() {
            let dofs = block_entities(self.mesh, self.schema, i)
                .iter()
                .map(|(kind, id)| self.dof(*kind, *id))
                .collect::<Result<Vec<_>, _>>()?;
            assemble_local_matrix(&mut mat, &local.matrices[i], &dofs)?;
        }
        for (k, d) in self.diagonal.as_slice().iter().enumerate() {
            if *d != 0.0 {
                mat.put(k, k, *d)?;
            }
        }
        Ok(mat)
    }

    /// Computes `y = A x` including the accumulation diagonal
    pub fn apply(&self, x: &CompositeVector, y: &mut CompositeVector) -> Result<(), StrError> {
        if !x.same_layout(&self.rhs) || !y.same_layout(&self.rhs) {
            return Err("vectors are incompatible with the operator");
        }
        let local = self.local_op()?;
        let xg = x.scatter_to_ghosted(self.comm);
        y.put_scalar(0.0);
        for i in 0..local.len() {
            let entities = block_entities(self.mesh, self.schema, i);
            let values = Vector::from(&entities.iter().map(|(kind, id)| xg.used(*kind)[*id]).collect::<Vec<_>>());
            let mut av = Vector::new(entities.len());
            mat_vec_mul(&mut av, 1.0, &local.matrices[i], &values)?;
            for (r, (kind, id)) in entities.iter().enumerate() {
                y.used_mut(*kind)[*id] += av[r];
            }
        }
        y.gather_add_to_owned(self.comm);
        for kind in self.schema.dof_kinds() {
            let d = self.diagonal.owned(*kind);
            let xo = x.owned(*kind);
            for (j, yj) in y.owned_mut(*kind).iter_mut().enumerate() {
                *yj += d[j] * xo[j];
            }
        }
        Ok(())
    }

    /// Computes `r = A u - rhs`
    pub fn compute_negative_residual(&self, u: &CompositeVector, r: &mut CompositeVector) -> Result<(), StrError> {
        self.apply(u, r)?;
        r.update(-1.0, &self.rhs, 1.0)
    }

    /// Reconstructs the face fluxes (oriented as the face normals) of the mixed schema
    ///
    /// The matrices saved before the boundary conditions are used. Each owned face is written
    /// once. `density_gravity` is `ρ |g|` (zero to skip gravity).
    pub fn update_flux(
        &self,
        u: &CompositeVector,
        flux: &mut CompositeVector,
        density_gravity: f64,
    ) -> Result<(), StrError> {
        if self.schema != Schema::CellFace {
            return Err("flux reconstruction requires the mixed schema");
        }
        if !flux.has(EntityKind::Face) {
            return Err("flux vector must have a face component");
        }
        let local = self.local_op()?;
        let ug = u.scatter_to_ghosted(self.comm);
        let nface_owned = flux.num_owned(EntityKind::Face);
        let mut done = vec![false; nface_owned];
        let out = flux.face_mut();
        for c in 0..local.len() {
            let a = local.original(c);
            let faces = self.mesh.cell_faces(c);
            let dirs = self.mesh.cell_face_dirs(c);
            let nf = faces.len();
            let mut v = Vector::new(nf + 1);
            for n in 0..nf {
                v[n] = ug.face()[faces[n]] + density_gravity * elevation(self.mesh, EntityKind::Face, faces[n]);
            }
            v[nf] = ug.cell()[c] + density_gravity * elevation(self.mesh, EntityKind::Cell, c);
            let mut av = Vector::new(nf + 1);
            mat_vec_mul(&mut av, 1.0, a, &v)?;
            for n in 0..nf {
                let f = faces[n];
                if f < nface_owned && !done[f] {
                    out[f] = -av[n] * (dirs[n] as f64);
                    done[f] = true;
                }
            }
        }
        Ok(())
    }

    /// Assembles the face Schur complement of the mixed schema
    ///
    /// The cell unknowns are eliminated with the pivot `A(nf,nf) + diag_c`. Rows and columns of
    /// Dirichlet faces are replaced by the identity.
    pub fn assemble_matrix_special(&self, bc: &BcData) -> Result<CooMatrix, StrError> {
        if self.schema != Schema::CellFace {
            return Err("the Schur complement requires the mixed schema");
        }
        let nface = self.rhs.num_used(EntityKind::Face);
        if bc.entity != EntityKind::Face || bc.len() < nface {
            return Err("boundary data entity is incompatible with the schema");
        }
        let local = self.local_op()?;
        let diag_c = self.diagonal.cell();
        let max_nnz = local.matrices.iter().fold(nface, |acc, a| acc + (a.dims().0 - 1) * (a.dims().0 - 1));
        let mut mat = CooMatrix::new(nface, nface, usize::max(1, max_nnz), Sym::No)?;
        for c in 0..local.len() {
            let s = schur_eliminate_last(&local.matrices[c], diag_c[c])?;
            let faces = self.mesh.cell_faces(c);
            for (n, fn_) in faces.iter().enumerate() {
                if bc.model(*fn_) == BcModel::Dirichlet {
                    continue;
                }
                for (m, fm) in faces.iter().enumerate() {
                    if bc.model(*fm) == BcModel::Dirichlet {
                        continue;
                    }
                    let value = s.get(n, m);
                    if value != 0.0 {
                        mat.put(*fn_, *fm, value)?;
                    }
                }
            }
        }
        let diag_f = self.diagonal.face();
        for f in 0..diag_f.len() {
            if bc.model(f) == BcModel::Dirichlet {
                mat.put(f, f, 1.0)?;
            } else if diag_f[f] != 0.0 {
                mat.put(f, f, diag_f[f])?;
            }
        }
        Ok(mat)
    }

    /// Sets the preconditioner
    ///
    /// With the mixed schema, the preconditioner acts on the face Schur complement.
    pub fn set_preconditioner(&mut self, preconditioner: Box<dyn Preconditioner>) {
        self.preconditioner = Some(preconditioner);
    }

    /// Assembles the Schur complement and updates the preconditioner
    pub fn init_preconditioner_special(&mut self, bc: &BcData) -> Result<(), StrError> {
        let mat = self.assemble_matrix_special(bc)?;
        let precon = self.preconditioner.as_mut().ok_or("preconditioner must be set first")?;
        log::trace!("updating preconditioner \"{}\" (nnz = {})", precon.name(), mat.get_info().2);
        precon.update(&mat)
    }

    /// Updates the preconditioner (Schur complement with the mixed schema, full matrix otherwise)
    pub fn init_preconditioner(&mut self, bc: &BcData) -> Result<(), StrError> {
        if self.schema == Schema::CellFace {
            return self.init_preconditioner_special(bc);
        }
        let mat = self.assemble_matrix()?;
        let precon = self.preconditioner.as_mut().ok_or("preconditioner must be set first")?;
        log::trace!("updating preconditioner \"{}\" (nnz = {})", precon.name(), mat.get_info().2);
        precon.update(&mat)
    }

    /// Applies the preconditioner computing `y = M⁻¹ x`
    pub fn apply_inverse(&mut self, x: &CompositeVector, y: &mut CompositeVector) -> Result<(), StrError> {
        if self.schema == Schema::CellFace {
            return self.apply_inverse_special(x, y);
        }
        if !x.same_layout(&self.rhs) || !y.same_layout(&self.rhs) {
            return Err("vectors are incompatible with the operator");
        }
        let precon = self.preconditioner.as_mut().ok_or("preconditioner must be set first")?;
        precon.apply_inverse(x.as_vector(), y.as_mut_vector())?;
        for kind in self.schema.dof_kinds() {
            self.comm.scatter(*kind, y.used_mut(*kind));
        }
        Ok(())
    }

    /// Applies the inverse of the mixed operator using the Schur complement
    ///
    /// Forward elimination of the cells, face solve by the preconditioner, and back substitution
    /// `y_c = (x_c - Σ A(nf,n) y_f) / (A(nf,nf) + diag_c)`.
    pub fn apply_inverse_special(&mut self, x: &CompositeVector, y: &mut CompositeVector) -> Result<(), StrError> {
        if !x.same_layout(&self.rhs) || !y.same_layout(&self.rhs) {
            return Err("vectors are incompatible with the operator");
        }
        let local = self
            .blocks
            .get(&Schema::CellFace)
            .ok_or("local matrices must be computed first")?;
        let precon = self.preconditioner.as_mut().ok_or("preconditioner must be set first")?;
        let nface = x.num_used(EntityKind::Face);
        let nface_owned = x.num_owned(EntityKind::Face);
        let diag_c = self.diagonal.cell();
        let xc = x.cell();

        // forward elimination
        let mut tf = Vector::new(nface);
        tf.as_mut_data()[..nface_owned].copy_from_slice(x.face());
        for c in 0..local.len() {
            let a = &local.matrices[c];
            let nf = a.dims().0 - 1;
            let pivot = a.get(nf, nf) + diag_c[c];
            for (n, f) in self.mesh.cell_faces(c).iter().enumerate() {
                tf[*f] -= a.get(n, nf) * xc[c] / pivot;
            }
        }
        self.comm.gather_add(EntityKind::Face, tf.as_mut_data());

        // face solve
        let mut yf = Vector::new(nface);
        precon.apply_inverse(&tf, &mut yf)?;
        self.comm.scatter(EntityKind::Face, yf.as_mut_data());

        // back substitution
        for c in 0..local.len() {
            let a = &local.matrices[c];
            let nf = a.dims().0 - 1;
            let pivot = a.get(nf, nf) + diag_c[c];
            let mut s = xc[c];
            for (n, f) in self.mesh.cell_faces(c).iter().enumerate() {
                s -= a.get(nf, n) * yf[*f];
            }
            y.cell_mut()[c] = s / pivot;
        }
        y.face_mut().copy_from_slice(&yf.as_data()[..nface_owned]);
        Ok(())
    }
}

impl<'a> LinearOperator for OperatorDiffusion<'a> {
    fn apply(&self, x: &CompositeVector, y: &mut CompositeVector) -> Result<(), StrError> {
        OperatorDiffusion::apply(self, x, y)
    }

    fn apply_inverse(&mut self, x: &CompositeVector, y: &mut CompositeVector) -> Result<(), StrError> {
        OperatorDiffusion::apply_inverse(self, x, y)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
