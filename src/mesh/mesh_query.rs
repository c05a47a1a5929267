use crate::base::{EntityKind, ParallelType};
use crate::StrError;

/// Defines the queries made to the (distributed) mesh
///
/// Entities are numbered locally with the owned entities first followed by the ghosts.
/// Face normals are area-weighted and point outward with respect to the first cell
/// returned by `face_cells`; `cell_face_dirs` gives +1 when the face normal is outward
/// with respect to the cell and -1 otherwise.
pub trait MeshQuery {
    /// Returns the dimension of the space
    fn space_dimension(&self) -> usize;

    /// Returns the dimension of the cells (equal to the space dimension except for surfaces)
    fn manifold_dimension(&self) -> usize;

    /// Returns the number of entities of a kind
    fn num_entities(&self, kind: EntityKind, ptype: ParallelType) -> usize;

    /// Returns the faces of a cell
    fn cell_faces(&self, c: usize) -> &[usize];

    /// Returns the orientation of the faces of a cell
    fn cell_face_dirs(&self, c: usize) -> &[i32];

    /// Returns the nodes of a cell
    fn cell_nodes(&self, c: usize) -> &[usize];

    /// Returns the (one or two) cells sharing a face
    fn face_cells(&self, f: usize) -> &[usize];

    /// Returns the nodes of a face
    fn face_nodes(&self, f: usize) -> &[usize];

    /// Returns the cells sharing a node
    fn node_cells(&self, v: usize) -> &[usize];

    /// Returns the volume (area in 2D) of a cell
    fn cell_volume(&self, c: usize) -> f64;

    /// Returns the centroid of a cell
    fn cell_centroid(&self, c: usize) -> &[f64];

    /// Returns the area (length in 2D) of a face
    fn face_area(&self, f: usize) -> f64;

    /// Returns the centroid of a face
    fn face_centroid(&self, f: usize) -> &[f64];

    /// Returns the area-weighted normal of a face
    fn face_normal(&self, f: usize) -> &[f64];

    /// Returns the coordinates of a node
    fn node_coordinates(&self, v: usize) -> &[f64];

    /// Returns the entities of a kind belonging to a named region
    fn region_entities(&self, name: &str, kind: EntityKind) -> Result<Vec<usize>, StrError>;

    /// Tells whether a face is on the domain boundary
    fn is_boundary_face(&self, f: usize) -> bool {
        self.face_cells(f).len() == 1
    }
}
