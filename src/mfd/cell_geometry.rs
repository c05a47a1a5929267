use crate::base::MFD_MAX_FACES;
use crate::mesh::MeshQuery;
use crate::StrError;
use russell_lab::Matrix;

/// Holds the geometry of a cell as seen by the mimetic discretization
#[derive(Clone, Debug)]
pub struct CellGeometry {
    /// Space dimension
    pub dim: usize,

    /// Cell (manifold) dimension
    pub manifold_dim: usize,

    /// Volume (area in 2D)
    pub volume: f64,

    /// Centroid
    pub centroid: Vec<f64>,

    /// Area of each face
    pub areas: Vec<f64>,

    /// Centroid of each face
    pub face_centroids: Vec<Vec<f64>>,

    /// Area-weighted normal of each face pointing outward with respect to the cell
    pub normals: Vec<Vec<f64>>,
}

impl CellGeometry {
    /// Extracts the geometry of cell `c` from the mesh
    pub fn new(mesh: &dyn MeshQuery, c: usize) -> Result<Self, StrError> {
        let faces = mesh.cell_faces(c);
        let dirs = mesh.cell_face_dirs(c);
        if faces.len() > MFD_MAX_FACES {
            return Err("cell has too many faces");
        }
        let volume = mesh.cell_volume(c);
        if volume <= 0.0 {
            log::error!("cell {} has non-positive volume {:?}", c, volume);
            return Err("cell volume must be positive");
        }
        let normals = faces
            .iter()
            .zip(dirs)
            .map(|(f, dir)| mesh.face_normal(*f).iter().map(|x| (*dir as f64) * x).collect())
            .collect();
        Ok(CellGeometry {
            dim: mesh.space_dimension(),
            manifold_dim: mesh.manifold_dimension(),
            volume,
            centroid: mesh.cell_centroid(c).to_vec(),
            areas: faces.iter().map(|f| mesh.face_area(*f)).collect(),
            face_centroids: faces.iter().map(|f| mesh.face_centroid(*f).to_vec()).collect(),
            normals,
        })
    }

    /// Returns the number of faces
    pub fn nface(&self) -> usize {
        self.areas.len()
    }

    /// Returns the matrix of offsets from the cell centroid to the face centroids (nface × dim)
    pub fn offsets(&self) -> Matrix {
        let mut nn = Matrix::new(self.nface(), self.dim);
        for i in 0..self.nface() {
            for a in 0..self.dim {
                nn.set(i, a, self.face_centroids[i][a] - self.centroid[a]);
            }
        }
        nn
    }

    /// Returns the matrix of area-weighted outward normals (nface × dim)
    pub fn normals_matrix(&self) -> Matrix {
        let mut nn = Matrix::new(self.nface(), self.dim);
        for i in 0..self.nface() {
            for a in 0..self.dim {
                nn.set(i, a, self.normals[i][a]);
            }
        }
        nn
    }
}

/// Holds the nodal geometry of a cell used by the nodal stiffness matrix
#[derive(Clone, Debug)]
pub struct NodalGeometry {
    /// Space dimension
    pub dim: usize,

    /// Volume (area in 2D)
    pub volume: f64,

    /// Nodes of the cell
    pub nodes: Vec<usize>,

    /// Offsets from the vertex average to each node (nnode × dim)
    pub offsets: Matrix,

    /// Nodal share of the area-weighted outward normals (nnode × dim)
    pub conormals: Matrix,
}

impl NodalGeometry {
    /// Extracts the nodal geometry of cell `c` from the mesh
    pub fn new(mesh: &dyn MeshQuery, c: usize) -> Result<Self, StrError> {
        let dim = mesh.space_dimension();
        let nodes = mesh.cell_nodes(c).to_vec();
        let nnode = nodes.len();
        if nnode < dim + 1 {
            return Err("cell has too few nodes");
        }
        let mut center = vec![0.0; dim];
        for v in &nodes {
            let x = mesh.node_coordinates(*v);
            for a in 0..dim {
                center[a] += x[a] / (nnode as f64);
            }
        }
        let mut offsets = Matrix::new(nnode, dim);
        for (i, v) in nodes.iter().enumerate() {
            let x = mesh.node_coordinates(*v);
            for a in 0..dim {
                offsets.set(i, a, x[a] - center[a]);
            }
        }
        let mut conormals = Matrix::new(nnode, dim);
        for (f, dir) in mesh.cell_faces(c).iter().zip(mesh.cell_face_dirs(c)) {
            let normal = mesh.face_normal(*f);
            let face_nodes = mesh.face_nodes(*f);
            let share = (*dir as f64) / (face_nodes.len() as f64);
            for v in face_nodes {
                let i = match nodes.iter().position(|n| n == v) {
                    Some(i) => i,
                    None => return Err("face node does not belong to the cell"),
                };
                for a in 0..dim {
                    conormals.set(i, a, conormals.get(i, a) + share * normal[a]);
                }
            }
        }
        Ok(NodalGeometry {
            dim,
            volume: mesh.cell_volume(c),
            nodes,
            offsets,
            conormals,
        })
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
