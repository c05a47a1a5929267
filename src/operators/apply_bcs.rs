use super::LocalOp;
use crate::base::{BcModel, EntityKind, ParallelType};
use crate::linalg::CompositeVector;
use crate::mesh::MeshQuery;
use crate::StrError;

/// Defines the kind of degree of freedom carried by each entity with boundary data
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DofKind {
    /// One value per entity
    Scalar,

    /// One vector per node (e.g., displacement)
    Point(usize),

    /// One vector per face
    Vector(usize),
}

impl DofKind {
    /// Returns the number of values per entity
    pub fn cardinality(&self) -> usize {
        match self {
            DofKind::Scalar => 1,
            DofKind::Point(d) | DofKind::Vector(d) => *d,
        }
    }
}

/// Holds the boundary models and values of one entity kind
///
/// Neumann values are the total (area-integrated) outward fluxes.
#[derive(Clone, Debug)]
pub struct BcData {
    /// Kind of entities carrying the data
    pub entity: EntityKind,

    /// Kind of degrees of freedom
    pub dof: DofKind,

    /// Models (num_entities × cardinality)
    models: Vec<BcModel>,

    /// Values (num_entities × cardinality)
    values: Vec<f64>,
}

impl BcData {
    /// Allocates a new instance with [BcModel::None] everywhere
    pub fn new(entity: EntityKind, dof: DofKind, n: usize) -> Result<Self, StrError> {
        match dof {
            DofKind::Scalar => (),
            DofKind::Point(d) | DofKind::Vector(d) if d == 0 => {
                return Err("the dimension of vector dofs must be ≥ 1");
            }
            DofKind::Point(_) if entity != EntityKind::Node => {
                return Err("point dofs require boundary data on nodes");
            }
            DofKind::Vector(_) if entity != EntityKind::Face => {
                return Err("vector dofs require boundary data on faces");
            }
            _ => (),
        }
        let size = n * dof.cardinality();
        Ok(BcData {
            entity,
            dof,
            models: vec![BcModel::None; size],
            values: vec![0.0; size],
        })
    }

    /// Allocates a new instance with scalar dofs
    pub fn new_scalar(entity: EntityKind, n: usize) -> Self {
        BcData {
            entity,
            dof: DofKind::Scalar,
            models: vec![BcModel::None; n],
            values: vec![0.0; n],
        }
    }

    /// Returns the number of entities
    pub fn len(&self) -> usize {
        self.models.len() / self.dof.cardinality()
    }

    /// Returns the number of values per entity
    pub fn cardinality(&self) -> usize {
        self.dof.cardinality()
    }

    /// Resets all models to [BcModel::None]
    pub fn reset(&mut self) {
        self.models.iter_mut().for_each(|m| *m = BcModel::None);
        self.values.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Sets the model and value of the first component of an entity
    pub fn set(&mut self, id: usize, model: BcModel, value: f64) {
        self.set_component(id, 0, model, value);
    }

    /// Sets the model and value of one component of an entity
    pub fn set_component(&mut self, id: usize, k: usize, model: BcModel, value: f64) {
        let i = id * self.dof.cardinality() + k;
        self.models[i] = model;
        self.values[i] = value;
    }

    /// Returns the model of the first component of an entity
    pub fn model(&self, id: usize) -> BcModel {
        self.models[id * self.dof.cardinality()]
    }

    /// Returns the value of the first component of an entity
    pub fn value(&self, id: usize) -> f64 {
        self.values[id * self.dof.cardinality()]
    }

    /// Returns the model of one component of an entity
    pub fn component_model(&self, id: usize, k: usize) -> BcModel {
        self.models[id * self.dof.cardinality() + k]
    }

    /// Returns the value of one component of an entity
    pub fn component_value(&self, id: usize, k: usize) -> f64 {
        self.values[id * self.dof.cardinality() + k]
    }
}

/// Holds the position of one row of a local matrix in the right-hand side
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalDof {
    /// Position in the right-hand side arena
    pub slot: usize,

    /// Prescribed (value, diagonal) if the dof is essential
    pub essential: Option<(f64, f64)>,
}

/// Computes the local dofs of a block given its entities
///
/// The entities with the kind of the boundary data expand into `cardinality` dofs each.
/// Essential node dofs receive the diagonal `1/ncells(node)` so that the assembled row has a unit diagonal.
pub fn local_dofs(
    mesh: &dyn MeshQuery,
    entities: &[(EntityKind, usize)],
    bc: &BcData,
    rhs: &CompositeVector,
) -> Result<Vec<LocalDof>, StrError> {
    let mut dofs = Vec::with_capacity(entities.len() * bc.cardinality());
    for (kind, id) in entities {
        let offset = rhs.offset(*kind).ok_or("entity kind is not a component of the right-hand side")?;
        if *kind != bc.entity {
            dofs.push(LocalDof {
                slot: offset + id,
                essential: None,
            });
            continue;
        }
        let card = bc.cardinality();
        for k in 0..card {
            let essential = match bc.component_model(*id, k) {
                BcModel::Dirichlet => {
                    let diagonal = match kind {
                        EntityKind::Node => 1.0 / (mesh.node_cells(*id).len() as f64),
                        _ => 1.0,
                    };
                    Some((bc.component_value(*id, k), diagonal))
                }
                _ => None,
            };
            dofs.push(LocalDof {
                slot: offset + id * card + k,
                essential,
            });
        }
    }
    Ok(dofs)
}

/// Enforces the essential conditions on one local matrix
///
/// The rows of the essential dofs are zeroed. If `eliminate`, their columns are moved into the
/// right-hand side and zeroed. If `primary`, the diagonal and the right-hand side of the
/// essential rows receive the prescribed diagonal and value. The shadow copy is saved before
/// the first modification.
pub fn enforce_essential(
    local: &mut LocalOp,
    i: usize,
    dofs: &[LocalDof],
    rhs: &mut [f64],
    primary: bool,
    eliminate: bool,
) -> Result<(), StrError> {
    let n = dofs.len();
    if local.matrices[i].dims() != (n, n) {
        return Err("local matrix is incompatible with the local dofs");
    }
    if dofs.iter().all(|d| d.essential.is_none()) {
        return Ok(());
    }
    local.save_shadow(i);
    let mat = &mut local.matrices[i];
    for (r, dof) in dofs.iter().enumerate() {
        if dof.essential.is_some() {
            for j in 0..n {
                mat.set(r, j, 0.0);
            }
        }
    }
    if eliminate {
        for (col, dof) in dofs.iter().enumerate() {
            if let Some((value, _)) = dof.essential {
                for (row, other) in dofs.iter().enumerate() {
                    rhs[other.slot] -= mat.get(row, col) * value;
                    mat.set(row, col, 0.0);
                }
            }
        }
    }
    if primary {
        for (r, dof) in dofs.iter().enumerate() {
            if let Some((value, diagonal)) = dof.essential {
                mat.set(r, r, diagonal);
                rhs[dof.slot] = value;
            }
        }
    }
    Ok(())
}

/// Adds the natural (Neumann) conditions to the right-hand side
///
/// Only owned entities contribute, so that each total flux is counted once.
pub fn apply_natural(mesh: &dyn MeshQuery, bc: &BcData, rhs: &mut CompositeVector) -> Result<(), StrError> {
    let offset = rhs
        .offset(bc.entity)
        .ok_or("entity kind is not a component of the right-hand side")?;
    let card = bc.cardinality();
    let n = usize::min(mesh.num_entities(bc.entity, ParallelType::Owned), bc.len());
    let data = rhs.as_mut_slice();
    for id in 0..n {
        for k in 0..card {
            if bc.component_model(id, k) == BcModel::Neumann {
                data[offset + id * card + k] -= bc.component_value(id, k);
            }
        }
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{apply_natural, enforce_essential, local_dofs, BcData, DofKind};
    use crate::base::{BcModel, EntityKind};
    use crate::linalg::CompositeVector;
    use crate::mesh::{MeshBox, MeshQuery};
    use crate::operators::LocalOp;
    use russell_lab::{approx_eq, Matrix};

    #[test]
    fn bc_data_works() {
        assert_eq!(
            BcData::new(EntityKind::Face, DofKind::Point(2), 3).err(),
            Some("point dofs require boundary data on nodes")
        );
        assert_eq!(
            BcData::new(EntityKind::Node, DofKind::Vector(2), 3).err(),
            Some("vector dofs require boundary data on faces")
        );
        assert_eq!(
            BcData::new(EntityKind::Node, DofKind::Point(0), 3).err(),
            Some("the dimension of vector dofs must be ≥ 1")
        );
        let mut bc = BcData::new(EntityKind::Node, DofKind::Point(2), 3).unwrap();
        assert_eq!(bc.len(), 3);
        assert_eq!(bc.cardinality(), 2);
        bc.set_component(1, 1, BcModel::Dirichlet, 4.0);
        assert_eq!(bc.component_model(1, 1), BcModel::Dirichlet);
        assert_eq!(bc.component_value(1, 1), 4.0);
        assert_eq!(bc.model(1), BcModel::None);
        bc.reset();
        assert_eq!(bc.component_model(1, 1), BcModel::None);
    }

    #[test]
    fn scalar_elimination_works() {
        // one square cell with four faces; local dofs: faces then the cell
        let mesh = MeshBox::unit(2).unwrap();
        let faces = mesh.cell_faces(0).to_vec();
        let mut entities: Vec<_> = faces.iter().map(|f| (EntityKind::Face, *f)).collect();
        entities.push((EntityKind::Cell, 0));

        let mut bc = BcData::new_scalar(EntityKind::Face, 4);
        bc.set(faces[0], BcModel::Dirichlet, 3.0);
        bc.set(faces[1], BcModel::Neumann, 2.0);

        let mut rhs = CompositeVector::new(&mesh, &[EntityKind::Cell, EntityKind::Face]);
        let dofs = local_dofs(&mesh, &entities, &bc, &rhs).unwrap();
        assert_eq!(dofs.len(), 5);
        assert_eq!(dofs[0].essential, Some((3.0, 1.0)));
        assert_eq!(dofs[4].slot, 0);

        let mut local = LocalOp::new(EntityKind::Cell, 1);
        let mut a = Matrix::new(5, 5);
        for i in 0..4 {
            a.set(i, i, 2.0);
            a.set(i, 4, -2.0);
            a.set(4, i, -2.0);
        }
        a.set(4, 4, 8.0);
        local.set(0, a);

        enforce_essential(&mut local, 0, &dofs, rhs.as_mut_slice(), true, true).unwrap();
        apply_natural(&mesh, &bc, &mut rhs).unwrap();

        // row and column of the Dirichlet face are replaced by the identity
        let m = &local.matrices[0];
        assert_eq!(m.get(0, 0), 1.0);
        assert_eq!(m.get(0, 4), 0.0);
        assert_eq!(m.get(4, 0), 0.0);
        assert_eq!(m.get(4, 4), 8.0);
        // the shadow keeps the original coupling
        assert_eq!(local.original(0).get(4, 0), -2.0);

        // cell rhs receives +2·3 from the eliminated column
        approx_eq(rhs.cell()[0], 6.0, 1e-15);
        approx_eq(rhs.face()[faces[0]], 3.0, 1e-15);
        approx_eq(rhs.face()[faces[1]], -2.0, 1e-15);
    }

    #[test]
    fn rows_only_keeps_columns() {
        let mesh = MeshBox::unit(2).unwrap();
        let faces = mesh.cell_faces(0).to_vec();
        let mut entities: Vec<_> = faces.iter().map(|f| (EntityKind::Face, *f)).collect();
        entities.push((EntityKind::Cell, 0));
        let mut bc = BcData::new_scalar(EntityKind::Face, 4);
        bc.set(faces[2], BcModel::Dirichlet, 1.0);
        let mut rhs = CompositeVector::new(&mesh, &[EntityKind::Cell, EntityKind::Face]);
        let dofs = local_dofs(&mesh, &entities, &bc, &rhs).unwrap();
        let mut local = LocalOp::new(EntityKind::Cell, 1);
        let mut a = Matrix::new(5, 5);
        for i in 0..5 {
            for j in 0..5 {
                a.set(i, j, 1.0);
            }
        }
        local.set(0, a);
        enforce_essential(&mut local, 0, &dofs, rhs.as_mut_slice(), false, false).unwrap();
        let m = &local.matrices[0];
        assert_eq!(m.get(2, 2), 0.0);
        assert_eq!(m.get(2, 4), 0.0);
        assert_eq!(m.get(4, 2), 1.0);
        assert_eq!(rhs.norm_inf(&crate::linalg::SerialComm::new()), 0.0);

        let wrong = [dofs[0]];
        assert_eq!(
            enforce_essential(&mut local, 0, &wrong, rhs.as_mut_slice(), true, true).err(),
            Some("local matrix is incompatible with the local dofs")
        );
    }

    #[test]
    fn point_dofs_work() {
        // one square cell with four nodes carrying two values each
        let mesh = MeshBox::unit(2).unwrap();
        let nodes = mesh.cell_nodes(0).to_vec();
        let entities: Vec<_> = nodes.iter().map(|v| (EntityKind::Node, *v)).collect();
        let mut bc = BcData::new(EntityKind::Node, DofKind::Point(2), 4).unwrap();
        bc.set_component(nodes[0], 1, BcModel::Dirichlet, 2.0);

        let mut rhs = CompositeVector::from_sizes(&[(EntityKind::Node, 8, 8)]);
        let dofs = local_dofs(&mesh, &entities, &bc, &rhs).unwrap();
        assert_eq!(dofs.len(), 8);
        for (r, dof) in dofs.iter().enumerate() {
            assert_eq!(dof.slot, nodes[r / 2] * 2 + r % 2);
        }
        assert_eq!(dofs[1].essential, Some((2.0, 1.0)));

        let mut local = LocalOp::new(EntityKind::Cell, 1);
        let mut a = Matrix::new(8, 8);
        for i in 0..8 {
            for j in 0..8 {
                a.set(i, j, (1 + i + j) as f64);
            }
        }
        local.set(0, a);
        enforce_essential(&mut local, 0, &dofs, rhs.as_mut_slice(), true, true).unwrap();

        let data = rhs.as_slice();
        assert_eq!(data[dofs[1].slot], 2.0);
        assert_eq!(data[dofs[0].slot], -4.0);
        assert_eq!(data[dofs[7].slot], -18.0);
        let m = &local.matrices[0];
        for j in 0..8 {
            let expected = if j == 1 { 1.0 } else { 0.0 };
            assert_eq!(m.get(1, j), expected);
            assert_eq!(m.get(j, 1), expected);
        }
        assert_eq!(m.get(0, 0), 1.0);
    }
}
