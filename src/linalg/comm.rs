use crate::base::EntityKind;

/// Defines the parallel communication layer
///
/// Each process owns a subset of the mesh entities and holds read-only copies (ghosts) of
/// some entities owned by the neighbors. The values of an entity kind are stored as the
/// owned values followed by the ghost values.
pub trait Communicator {
    /// Returns the rank of this process
    fn rank(&self) -> usize;

    /// Returns the number of processes
    fn size(&self) -> usize;

    /// Returns the maximum of the value over all processes
    fn global_max(&self, value: f64) -> f64;

    /// Returns the sum of the value over all processes
    fn global_sum(&self, value: f64) -> f64;

    /// Copies the owned values into the ghost slots of the neighbors
    fn scatter(&self, kind: EntityKind, values: &mut [f64]);

    /// Adds the ghost contributions into the owned slots and zeroes the ghosts
    fn gather_add(&self, kind: EntityKind, values: &mut [f64]);

    /// Tells whether this process is the root process
    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// Implements the communicator for a single process
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialComm;

impl SerialComm {
    /// Allocates a new instance
    pub fn new() -> Self {
        SerialComm
    }
}

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn global_max(&self, value: f64) -> f64 {
        value
    }

    fn global_sum(&self, value: f64) -> f64 {
        value
    }

    fn scatter(&self, _kind: EntityKind, _values: &mut [f64]) {}

    fn gather_add(&self, _kind: EntityKind, _values: &mut [f64]) {}
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{Communicator, SerialComm};
    use crate::base::EntityKind;

    #[test]
    fn serial_comm_works() {
        let comm = SerialComm::new();
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
        assert!(comm.is_root());
        assert_eq!(comm.global_max(3.0), 3.0);
        assert_eq!(comm.global_sum(-2.0), -2.0);
        let mut values = vec![1.0, 2.0];
        comm.scatter(EntityKind::Face, &mut values);
        comm.gather_add(EntityKind::Face, &mut values);
        assert_eq!(values, &[1.0, 2.0]);
    }
}
