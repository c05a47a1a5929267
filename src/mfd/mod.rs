//! Implements the local matrices of the mimetic finite difference method

mod cell_geometry;
mod mfd_diffusion;
pub use crate::mfd::cell_geometry::*;
pub use crate::mfd::mfd_diffusion::*;
