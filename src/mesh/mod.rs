//! Implements the mesh interface and a structured box mesh

mod mesh_box;
mod mesh_query;
pub use crate::mesh::mesh_box::*;
pub use crate::mesh::mesh_query::*;
