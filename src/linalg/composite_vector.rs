use super::Communicator;
use crate::base::{EntityKind, ParallelType};
use crate::mesh::MeshQuery;
use crate::StrError;
use russell_lab::{vec_copy, vec_inner, vec_norm, vec_scale, vec_update, Norm, Vector};
use std::borrow::Cow;

/// Defines the position of one component in the arena
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct Segment {
    start: usize,
    owned: usize,
    used: usize,
}

/// Holds the values of several entity kinds in a single arena
///
/// Each component (cell, face, node) is stored as the owned values followed by the
/// ghost values. Routines reading neighbor (ghost) data must obtain a [Ghosted] handle
/// via [CompositeVector::scatter_to_ghosted]; the plain accessors expose owned values only.
#[derive(Clone, Debug)]
pub struct CompositeVector {
    data: Vector,
    segments: [Option<Segment>; 3],
}

/// Holds a ghost-consistent (read-only) view of a composite vector
pub struct Ghosted<'a> {
    data: Cow<'a, [f64]>,
    segments: [Option<Segment>; 3],
}

#[inline]
fn index(kind: EntityKind) -> usize {
    match kind {
        EntityKind::Cell => 0,
        EntityKind::Face => 1,
        EntityKind::Node => 2,
    }
}

impl CompositeVector {
    /// Allocates a new instance with the given components sized by the mesh
    pub fn new(mesh: &dyn MeshQuery, kinds: &[EntityKind]) -> Self {
        let sizes: Vec<_> = kinds
            .iter()
            .map(|k| {
                (
                    *k,
                    mesh.num_entities(*k, ParallelType::Owned),
                    mesh.num_entities(*k, ParallelType::Used),
                )
            })
            .collect();
        CompositeVector::from_sizes(&sizes)
    }

    /// Allocates a new instance given (kind, num_owned, num_used) for each component
    pub fn from_sizes(sizes: &[(EntityKind, usize, usize)]) -> Self {
        let mut segments = [None; 3];
        let mut start = 0;
        for (kind, owned, used) in sizes {
            segments[index(*kind)] = Some(Segment {
                start,
                owned: *owned,
                used: usize::max(*owned, *used),
            });
            start += usize::max(*owned, *used);
        }
        CompositeVector {
            data: Vector::new(start),
            segments,
        }
    }

    /// Tells whether the component exists
    pub fn has(&self, kind: EntityKind) -> bool {
        self.segments[index(kind)].is_some()
    }

    /// Returns the number of owned values of a component (zero if absent)
    pub fn num_owned(&self, kind: EntityKind) -> usize {
        self.segments[index(kind)].map(|s| s.owned).unwrap_or(0)
    }

    /// Returns the number of owned plus ghost values of a component (zero if absent)
    pub fn num_used(&self, kind: EntityKind) -> usize {
        self.segments[index(kind)].map(|s| s.used).unwrap_or(0)
    }

    /// Returns the position of the first value of a component in the arena
    pub fn offset(&self, kind: EntityKind) -> Option<usize> {
        self.segments[index(kind)].map(|s| s.start)
    }

    /// Returns the whole arena (owned and ghost values of all components)
    pub fn as_slice(&self) -> &[f64] {
        self.data.as_data()
    }

    /// Returns the whole arena for modification
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.data.as_mut_data()
    }

    /// Returns the arena as a vector
    pub fn as_vector(&self) -> &Vector {
        &self.data
    }

    /// Returns the arena as a vector for modification
    pub fn as_mut_vector(&mut self) -> &mut Vector {
        &mut self.data
    }

    /// Returns the owned values of a component (empty if absent)
    pub fn owned(&self, kind: EntityKind) -> &[f64] {
        match self.segments[index(kind)] {
            Some(s) => &self.data.as_data()[s.start..(s.start + s.owned)],
            None => &[],
        }
    }

    /// Returns the owned values of a component for modification (empty if absent)
    pub fn owned_mut(&mut self, kind: EntityKind) -> &mut [f64] {
        match self.segments[index(kind)] {
            Some(s) => &mut self.data.as_mut_data()[s.start..(s.start + s.owned)],
            None => &mut [],
        }
    }

    /// Returns the owned and ghost slots of a component for accumulation
    ///
    /// The ghost slots receive contributions that are later summed into the owners
    /// by [CompositeVector::gather_add_to_owned].
    pub fn used_mut(&mut self, kind: EntityKind) -> &mut [f64] {
        match self.segments[index(kind)] {
            Some(s) => &mut self.data.as_mut_data()[s.start..(s.start + s.used)],
            None => &mut [],
        }
    }

    /// Returns the owned cell values
    pub fn cell(&self) -> &[f64] {
        self.owned(EntityKind::Cell)
    }

    /// Returns the owned cell values for modification
    pub fn cell_mut(&mut self) -> &mut [f64] {
        self.owned_mut(EntityKind::Cell)
    }

    /// Returns the owned face values
    pub fn face(&self) -> &[f64] {
        self.owned(EntityKind::Face)
    }

    /// Returns the owned face values for modification
    pub fn face_mut(&mut self) -> &mut [f64] {
        self.owned_mut(EntityKind::Face)
    }

    /// Returns the owned node values
    pub fn node(&self) -> &[f64] {
        self.owned(EntityKind::Node)
    }

    /// Returns the owned node values for modification
    pub fn node_mut(&mut self) -> &mut [f64] {
        self.owned_mut(EntityKind::Node)
    }

    /// Tells whether both vectors have the same components and sizes
    pub fn same_layout(&self, other: &CompositeVector) -> bool {
        self.segments == other.segments
    }

    /// Tells whether some component has ghost values
    pub fn has_ghosts(&self) -> bool {
        self.segments.iter().flatten().any(|s| s.used > s.owned)
    }

    /// Sets all values (including ghosts)
    pub fn put_scalar(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Copies all values from another vector with the same layout
    pub fn copy_from(&mut self, other: &CompositeVector) -> Result<(), StrError> {
        if !self.same_layout(other) {
            return Err("composite vectors have different layouts");
        }
        vec_copy(&mut self.data, &other.data)
    }

    /// Computes `self := alpha · x + beta · self`
    pub fn update(&mut self, alpha: f64, x: &CompositeVector, beta: f64) -> Result<(), StrError> {
        if !self.same_layout(x) {
            return Err("composite vectors have different layouts");
        }
        if beta != 1.0 {
            vec_scale(&mut self.data, beta);
        }
        vec_update(&mut self.data, alpha, &x.data)
    }

    /// Computes the inner product of the owned values
    pub fn dot(&self, other: &CompositeVector, comm: &dyn Communicator) -> f64 {
        if !self.has_ghosts() {
            return comm.global_sum(vec_inner(&self.data, &other.data));
        }
        let mut sum = 0.0;
        for seg in self.segments.iter().flatten() {
            for i in seg.start..(seg.start + seg.owned) {
                sum += self.data[i] * other.data[i];
            }
        }
        comm.global_sum(sum)
    }

    /// Computes the maximum absolute value of the owned values
    pub fn norm_inf(&self, comm: &dyn Communicator) -> f64 {
        if !self.has_ghosts() {
            return comm.global_max(vec_norm(&self.data, Norm::Max));
        }
        let mut max = 0.0;
        for seg in self.segments.iter().flatten() {
            for i in seg.start..(seg.start + seg.owned) {
                max = f64::max(max, f64::abs(self.data[i]));
            }
        }
        comm.global_max(max)
    }

    /// Returns a ghost-consistent view
    ///
    /// With a single process there are no ghosts and the view borrows the arena.
    pub fn scatter_to_ghosted(&self, comm: &dyn Communicator) -> Ghosted<'_> {
        if comm.size() == 1 {
            return Ghosted {
                data: Cow::Borrowed(self.data.as_data().as_slice()),
                segments: self.segments,
            };
        }
        let mut data = self.data.as_data().clone();
        for (i, kind) in [EntityKind::Cell, EntityKind::Face, EntityKind::Node].iter().enumerate() {
            if let Some(s) = self.segments[i] {
                comm.scatter(*kind, &mut data[s.start..(s.start + s.used)]);
            }
        }
        Ghosted {
            data: Cow::Owned(data),
            segments: self.segments,
        }
    }

    /// Sums the ghost contributions into the owners
    pub fn gather_add_to_owned(&mut self, comm: &dyn Communicator) {
        for (i, kind) in [EntityKind::Cell, EntityKind::Face, EntityKind::Node].iter().enumerate() {
            if let Some(s) = self.segments[i] {
                comm.gather_add(*kind, &mut self.data.as_mut_data()[s.start..(s.start + s.used)]);
            }
        }
    }
}

impl<'a> Ghosted<'a> {
    /// Returns the owned and ghost values of a component (empty if absent)
    pub fn used(&self, kind: EntityKind) -> &[f64] {
        match self.segments[index(kind)] {
            Some(s) => &self.data[s.start..(s.start + s.used)],
            None => &[],
        }
    }

    /// Returns the cell values including ghosts
    pub fn cell(&self) -> &[f64] {
        self.used(EntityKind::Cell)
    }

    /// Returns the face values including ghosts
    pub fn face(&self) -> &[f64] {
        self.used(EntityKind::Face)
    }

    /// Returns the node values including ghosts
    pub fn node(&self) -> &[f64] {
        self.used(EntityKind::Node)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::CompositeVector;
    use crate::base::EntityKind;
    use crate::linalg::SerialComm;

    #[test]
    fn layout_and_views_work() {
        let mut v = CompositeVector::from_sizes(&[(EntityKind::Cell, 2, 3), (EntityKind::Face, 4, 4)]);
        assert!(v.has(EntityKind::Cell));
        assert!(!v.has(EntityKind::Node));
        assert_eq!(v.num_owned(EntityKind::Cell), 2);
        assert_eq!(v.num_used(EntityKind::Cell), 3);
        assert_eq!(v.node().len(), 0);
        v.cell_mut().copy_from_slice(&[1.0, 2.0]);
        v.used_mut(EntityKind::Cell)[2] = 7.0;
        v.face_mut()[3] = -5.0;
        assert_eq!(v.cell(), &[1.0, 2.0]);
        assert_eq!(v.face(), &[0.0, 0.0, 0.0, -5.0]);

        let comm = SerialComm::new();
        let ghosted = v.scatter_to_ghosted(&comm);
        assert_eq!(ghosted.cell(), &[1.0, 2.0, 7.0]);
        assert_eq!(ghosted.face().len(), 4);
        assert_eq!(ghosted.node().len(), 0);
        assert_eq!(v.offset(EntityKind::Face), Some(3));
        assert_eq!(v.offset(EntityKind::Node), None);
        assert_eq!(v.as_slice()[3 + 3], -5.0);
        v.as_mut_slice()[0] = 9.0;
        assert_eq!(v.cell(), &[9.0, 2.0]);
    }

    #[test]
    fn algebra_works() {
        let comm = SerialComm::new();
        let mut a = CompositeVector::from_sizes(&[(EntityKind::Cell, 2, 2), (EntityKind::Face, 2, 2)]);
        let mut b = a.clone();
        assert!(a.same_layout(&b));
        a.put_scalar(1.0);
        b.cell_mut().copy_from_slice(&[2.0, -3.0]);
        assert_eq!(a.dot(&b, &comm), -1.0);
        assert_eq!(b.norm_inf(&comm), 3.0);
        a.update(2.0, &b, 1.0).unwrap();
        assert_eq!(a.cell(), &[5.0, -5.0]);
        assert_eq!(a.face(), &[1.0, 1.0]);
        a.update(1.0, &b, -1.0).unwrap();
        assert_eq!(a.cell(), &[-3.0, 2.0]);
        assert_eq!(a.face(), &[-1.0, -1.0]);
        a.copy_from(&b).unwrap();
        assert_eq!(a.cell(), &[2.0, -3.0]);
        a.gather_add_to_owned(&comm);
        assert_eq!(a.cell(), &[2.0, -3.0]);
        assert_eq!(a.as_vector().dim(), 4);
        a.as_mut_vector()[2] = 6.0;
        assert_eq!(a.face(), &[6.0, 0.0]);

        let mut c = CompositeVector::from_sizes(&[(EntityKind::Cell, 2, 2)]);
        assert_eq!(c.update(1.0, &a, 1.0).err(), Some("composite vectors have different layouts"));
        assert_eq!(c.copy_from(&a).err(), Some("composite vectors have different layouts"));
    }

    #[test]
    fn reductions_skip_ghost_values() {
        let comm = SerialComm::new();
        let mut a = CompositeVector::from_sizes(&[(EntityKind::Cell, 2, 3)]);
        assert!(a.has_ghosts());
        a.used_mut(EntityKind::Cell).copy_from_slice(&[1.0, -2.0, 100.0]);
        assert_eq!(a.dot(&a, &comm), 5.0);
        assert_eq!(a.norm_inf(&comm), 2.0);
    }
}
