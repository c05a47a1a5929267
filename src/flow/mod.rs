//! Implements the Richards flow process and its boundary conditions

mod bcs;
mod richards;
pub use crate::flow::bcs::*;
pub use crate::flow::richards::*;
