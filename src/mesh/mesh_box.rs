use super::MeshQuery;
use crate::base::{EntityKind, ParallelType};
use crate::StrError;
use std::collections::BTreeMap;

/// Implements a structured mesh of quadrilaterals (2D) or hexahedra (3D) over a box
///
/// The faces of each cell are ordered as `[xmin, xmax, ymin, ymax, (zmin, zmax)]`.
///
/// Predefined regions:
///
/// * `All` -- all cells
/// * `xmin`, `xmax`, `ymin`, `ymax`, `zmin`, `zmax` -- boundary faces on each side (3D: z sides)
/// * `boundary` -- all boundary faces
pub struct MeshBox {
    ndim: usize,
    cell_volume: f64,
    cell_faces: Vec<Vec<usize>>,
    cell_dirs: Vec<Vec<i32>>,
    cell_nodes: Vec<Vec<usize>>,
    cell_centroids: Vec<Vec<f64>>,
    face_cells: Vec<Vec<usize>>,
    face_nodes: Vec<Vec<usize>>,
    face_areas: Vec<f64>,
    face_centroids: Vec<Vec<f64>>,
    face_normals: Vec<Vec<f64>>,
    node_cells: Vec<Vec<usize>>,
    node_coords: Vec<Vec<f64>>,
    regions: BTreeMap<String, (EntityKind, Vec<usize>)>,
}

impl MeshBox {
    /// Allocates a new instance
    ///
    /// # Input
    ///
    /// * `xmin` -- min coordinates (len = ndim = 2 or 3)
    /// * `xmax` -- max coordinates (len = ndim)
    /// * `ndiv` -- number of divisions along each direction (len = ndim)
    pub fn new(xmin: &[f64], xmax: &[f64], ndiv: &[usize]) -> Result<Self, StrError> {
        let ndim = xmin.len();
        if ndim < 2 || ndim > 3 {
            return Err("ndim must be 2 or 3");
        }
        if xmax.len() != ndim || ndiv.len() != ndim {
            return Err("xmin, xmax, and ndiv must have the same length");
        }
        let mut n = [1_usize; 3];
        let mut h = [1.0; 3];
        let mut x0 = [0.0; 3];
        for a in 0..ndim {
            if ndiv[a] < 1 {
                return Err("ndiv must be ≥ 1");
            }
            if xmax[a] <= xmin[a] {
                return Err("xmax must be greater than xmin");
            }
            n[a] = ndiv[a];
            h[a] = (xmax[a] - xmin[a]) / (ndiv[a] as f64);
            x0[a] = xmin[a];
        }
        let cell_id = |i: usize, j: usize, k: usize| i + n[0] * (j + n[1] * k);

        // nodes
        let m = [n[0] + 1, n[1] + 1, if ndim == 3 { n[2] + 1 } else { 1 }];
        let node_id = |i: usize, j: usize, k: usize| i + m[0] * (j + m[1] * k);
        let mut node_coords = Vec::with_capacity(m[0] * m[1] * m[2]);
        for k in 0..m[2] {
            for j in 0..m[1] {
                for i in 0..m[0] {
                    let x = [
                        x0[0] + (i as f64) * h[0],
                        x0[1] + (j as f64) * h[1],
                        x0[2] + (k as f64) * h[2],
                    ];
                    node_coords.push(x[..ndim].to_vec());
                }
            }
        }

        // cells
        let ncell = n[0] * n[1] * n[2];
        let cell_volume = (0..ndim).fold(1.0, |acc, a| acc * h[a]);
        let mut cell_centroids = Vec::with_capacity(ncell);
        let mut cell_nodes = Vec::with_capacity(ncell);
        for k in 0..n[2] {
            for j in 0..n[1] {
                for i in 0..n[0] {
                    let x = [
                        x0[0] + (i as f64 + 0.5) * h[0],
                        x0[1] + (j as f64 + 0.5) * h[1],
                        x0[2] + (k as f64 + 0.5) * h[2],
                    ];
                    cell_centroids.push(x[..ndim].to_vec());
                    let mut nodes = vec![
                        node_id(i, j, k),
                        node_id(i + 1, j, k),
                        node_id(i + 1, j + 1, k),
                        node_id(i, j + 1, k),
                    ];
                    if ndim == 3 {
                        nodes.extend_from_slice(&[
                            node_id(i, j, k + 1),
                            node_id(i + 1, j, k + 1),
                            node_id(i + 1, j + 1, k + 1),
                            node_id(i, j + 1, k + 1),
                        ]);
                    }
                    cell_nodes.push(nodes);
                }
            }
        }

        // faces
        let side_names = [["xmin", "xmax"], ["ymin", "ymax"], ["zmin", "zmax"]];
        let mut regions: BTreeMap<String, (EntityKind, Vec<usize>)> = BTreeMap::new();
        regions.insert("All".to_string(), (EntityKind::Cell, (0..ncell).collect()));
        regions.insert("boundary".to_string(), (EntityKind::Face, Vec::new()));
        for a in 0..ndim {
            for name in side_names[a] {
                regions.insert(name.to_string(), (EntityKind::Face, Vec::new()));
            }
        }
        let mut cell_faces = vec![Vec::new(); ncell];
        let mut cell_dirs = vec![Vec::new(); ncell];
        let mut face_cells = Vec::new();
        let mut face_nodes = Vec::new();
        let mut face_areas = Vec::new();
        let mut face_centroids = Vec::new();
        let mut face_normals = Vec::new();
        for a in 0..ndim {
            let mut fa = n;
            fa[a] += 1;
            let area = (0..ndim).filter(|b| *b != a).fold(1.0, |acc, b| acc * h[b]);
            for k in 0..fa[2] {
                for j in 0..fa[1] {
                    for i in 0..fa[0] {
                        let f = face_cells.len();
                        let idx = [i, j, k];
                        let lower = if idx[a] > 0 {
                            let mut l = idx;
                            l[a] -= 1;
                            Some(cell_id(l[0], l[1], l[2]))
                        } else {
                            None
                        };
                        let upper = if idx[a] < n[a] {
                            Some(cell_id(i, j, k))
                        } else {
                            None
                        };
                        let mut normal = vec![0.0; ndim];
                        let mut cells = Vec::new();
                        match (lower, upper) {
                            (Some(lo), up) => {
                                normal[a] = area;
                                cells.push(lo);
                                cell_faces[lo].push(f);
                                cell_dirs[lo].push(1);
                                if let Some(up) = up {
                                    cells.push(up);
                                    cell_faces[up].push(f);
                                    cell_dirs[up].push(-1);
                                }
                            }
                            (None, Some(up)) => {
                                normal[a] = -area;
                                cells.push(up);
                                cell_faces[up].push(f);
                                cell_dirs[up].push(1);
                            }
                            (None, None) => return Err("face without cells"),
                        }
                        if cells.len() == 1 {
                            let side = if idx[a] == 0 { 0 } else { 1 };
                            if let Some(r) = regions.get_mut(side_names[a][side]) {
                                r.1.push(f);
                            }
                            if let Some(r) = regions.get_mut("boundary") {
                                r.1.push(f);
                            }
                        }
                        let mut centroid = vec![0.0; ndim];
                        for b in 0..ndim {
                            centroid[b] = if b == a {
                                x0[b] + (idx[b] as f64) * h[b]
                            } else {
                                x0[b] + (idx[b] as f64 + 0.5) * h[b]
                            };
                        }
                        let others: Vec<usize> = (0..ndim).filter(|b| *b != a).collect();
                        let corner = |di: usize, dj: usize| {
                            let mut c = idx;
                            c[others[0]] += di;
                            if others.len() > 1 {
                                c[others[1]] += dj;
                            }
                            node_id(c[0], c[1], c[2])
                        };
                        let nodes = if ndim == 3 {
                            vec![corner(0, 0), corner(1, 0), corner(1, 1), corner(0, 1)]
                        } else {
                            vec![corner(0, 0), corner(1, 0)]
                        };
                        face_cells.push(cells);
                        face_nodes.push(nodes);
                        face_areas.push(area);
                        face_centroids.push(centroid);
                        face_normals.push(normal);
                    }
                }
            }
        }

        // node to cells map
        let mut node_cells = vec![Vec::new(); node_coords.len()];
        for (c, nodes) in cell_nodes.iter().enumerate() {
            for v in nodes {
                node_cells[*v].push(c);
            }
        }

        Ok(MeshBox {
            ndim,
            cell_volume,
            cell_faces,
            cell_dirs,
            cell_nodes,
            cell_centroids,
            face_cells,
            face_nodes,
            face_areas,
            face_centroids,
            face_normals,
            node_cells,
            node_coords,
            regions,
        })
    }

    /// Returns a mesh with a single unit square (2D) or unit cube (3D)
    pub fn unit(ndim: usize) -> Result<Self, StrError> {
        MeshBox::new(&vec![0.0; ndim], &vec![1.0; ndim], &vec![1; ndim])
    }

    /// Adds a region with the cells whose centroids are inside the box [lower, upper]
    pub fn add_cell_region(&mut self, name: &str, lower: &[f64], upper: &[f64]) -> Result<&mut Self, StrError> {
        let cells = select_inside(&self.cell_centroids, lower, upper, self.ndim)?;
        self.regions.insert(name.to_string(), (EntityKind::Cell, cells));
        Ok(self)
    }

    /// Adds a region with the faces whose centroids are inside the box [lower, upper]
    pub fn add_face_region(&mut self, name: &str, lower: &[f64], upper: &[f64]) -> Result<&mut Self, StrError> {
        let faces = select_inside(&self.face_centroids, lower, upper, self.ndim)?;
        self.regions.insert(name.to_string(), (EntityKind::Face, faces));
        Ok(self)
    }
}

/// Returns the indices of the points inside the box [lower, upper]
fn select_inside(points: &Vec<Vec<f64>>, lower: &[f64], upper: &[f64], ndim: usize) -> Result<Vec<usize>, StrError> {
    if lower.len() != ndim || upper.len() != ndim {
        return Err("lower and upper must have length equal to ndim");
    }
    let tol = 1e-12;
    Ok(points
        .iter()
        .enumerate()
        .filter(|(_, x)| (0..ndim).all(|a| x[a] >= lower[a] - tol && x[a] <= upper[a] + tol))
        .map(|(i, _)| i)
        .collect())
}

impl MeshQuery for MeshBox {
    fn space_dimension(&self) -> usize {
        self.ndim
    }

    fn manifold_dimension(&self) -> usize {
        self.ndim
    }

    fn num_entities(&self, kind: EntityKind, _ptype: ParallelType) -> usize {
        match kind {
            EntityKind::Cell => self.cell_faces.len(),
            EntityKind::Face => self.face_cells.len(),
            EntityKind::Node => self.node_coords.len(),
        }
    }

    fn cell_faces(&self, c: usize) -> &[usize] {
        &self.cell_faces[c]
    }

    fn cell_face_dirs(&self, c: usize) -> &[i32] {
        &self.cell_dirs[c]
    }

    fn cell_nodes(&self, c: usize) -> &[usize] {
        &self.cell_nodes[c]
    }

    fn face_cells(&self, f: usize) -> &[usize] {
        &self.face_cells[f]
    }

    fn face_nodes(&self, f: usize) -> &[usize] {
        &self.face_nodes[f]
    }

    fn node_cells(&self, v: usize) -> &[usize] {
        &self.node_cells[v]
    }

    fn cell_volume(&self, _c: usize) -> f64 {
        self.cell_volume
    }

    fn cell_centroid(&self, c: usize) -> &[f64] {
        &self.cell_centroids[c]
    }

    fn face_area(&self, f: usize) -> f64 {
        self.face_areas[f]
    }

    fn face_centroid(&self, f: usize) -> &[f64] {
        &self.face_centroids[f]
    }

    fn face_normal(&self, f: usize) -> &[f64] {
        &self.face_normals[f]
    }

    fn node_coordinates(&self, v: usize) -> &[f64] {
        &self.node_coords[v]
    }

    fn region_entities(&self, name: &str, kind: EntityKind) -> Result<Vec<usize>, StrError> {
        match self.regions.get(name) {
            Some((k, ids)) => {
                if *k != kind {
                    log::error!("region \"{}\" holds {:?} entities, not {:?}", name, k, kind);
                    return Err("region holds entities of another kind");
                }
                Ok(ids.clone())
            }
            None => {
                log::error!("cannot find region \"{}\"", name);
                Err("cannot find region")
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::MeshBox;
    use crate::base::{EntityKind, ParallelType};
    use crate::mesh::MeshQuery;

    #[test]
    fn new_captures_errors() {
        assert_eq!(MeshBox::new(&[0.0], &[1.0], &[1]).err(), Some("ndim must be 2 or 3"));
        assert_eq!(
            MeshBox::new(&[0.0, 0.0], &[1.0], &[1, 1]).err(),
            Some("xmin, xmax, and ndiv must have the same length")
        );
        assert_eq!(MeshBox::new(&[0.0, 0.0], &[1.0, 1.0], &[1, 0]).err(), Some("ndiv must be ≥ 1"));
        assert_eq!(
            MeshBox::new(&[0.0, 0.0], &[1.0, 0.0], &[1, 1]).err(),
            Some("xmax must be greater than xmin")
        );
    }

    #[test]
    fn unit_cube_works() {
        let mesh = MeshBox::unit(3).unwrap();
        assert_eq!(mesh.num_entities(EntityKind::Cell, ParallelType::Owned), 1);
        assert_eq!(mesh.num_entities(EntityKind::Face, ParallelType::Owned), 6);
        assert_eq!(mesh.num_entities(EntityKind::Node, ParallelType::Used), 8);
        assert_eq!(mesh.cell_faces(0), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(mesh.cell_face_dirs(0), &[1, 1, 1, 1, 1, 1]);
        assert_eq!(mesh.face_normal(0), &[-1.0, 0.0, 0.0]);
        assert_eq!(mesh.face_normal(5), &[0.0, 0.0, 1.0]);
        assert_eq!(mesh.face_centroid(2), &[0.5, 0.0, 0.5]);
        assert_eq!(mesh.cell_volume(0), 1.0);
        assert_eq!(mesh.face_nodes(4).len(), 4);
        assert_eq!(mesh.node_cells(7), &[0]);
        assert!(mesh.is_boundary_face(3));
        assert_eq!(mesh.region_entities("zmax", EntityKind::Face).unwrap(), &[5]);
        assert_eq!(mesh.region_entities("boundary", EntityKind::Face).unwrap().len(), 6);
        assert_eq!(
            mesh.region_entities("zmax", EntityKind::Cell).err(),
            Some("region holds entities of another kind")
        );
        assert_eq!(mesh.region_entities("top", EntityKind::Face).err(), Some("cannot find region"));
    }

    #[test]
    fn two_by_one_quads_work() {
        //  3-----4-----5
        //  |     |     |
        //  | [0] 2 [1] |   faces 0,1,2 normal to x
        //  |     |     |   faces 3,4 (bottom) and 5,6 (top)
        //  0-----1-----2
        let mut mesh = MeshBox::new(&[0.0, 0.0], &[2.0, 1.0], &[2, 1]).unwrap();
        assert_eq!(mesh.num_entities(EntityKind::Face, ParallelType::Owned), 7);
        assert_eq!(mesh.cell_faces(0), &[0, 1, 3, 5]);
        assert_eq!(mesh.cell_faces(1), &[1, 2, 4, 6]);
        assert_eq!(mesh.face_cells(1), &[0, 1]);
        assert_eq!(mesh.cell_face_dirs(1), &[-1, 1, 1, 1]);
        assert_eq!(mesh.face_normal(1), &[1.0, 0.0]);
        assert_eq!(mesh.face_normal(3), &[0.0, -1.0]);
        assert_eq!(mesh.face_nodes(1), &[1, 4]);
        assert_eq!(mesh.node_cells(1), &[0, 1]);
        assert_eq!(mesh.region_entities("ymax", EntityKind::Face).unwrap(), &[5, 6]);
        mesh.add_cell_region("right", &[1.0, 0.0], &[2.0, 1.0]).unwrap();
        assert_eq!(mesh.region_entities("right", EntityKind::Cell).unwrap(), &[1]);
        mesh.add_face_region("left-bottom", &[0.0, 0.0], &[1.0, 0.0]).unwrap();
        assert_eq!(mesh.region_entities("left-bottom", EntityKind::Face).unwrap(), &[3]);
    }
}
