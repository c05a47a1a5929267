//! Implements the linear algebra structures: sparse assembly, dense helpers, composite vectors, and communicators

mod assembly;
mod comm;
mod composite_vector;
mod dense;
pub use crate::linalg::assembly::*;
pub use crate::linalg::comm::*;
pub use crate::linalg::composite_vector::*;
pub use crate::linalg::dense::*;
