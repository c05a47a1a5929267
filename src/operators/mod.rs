//! Implements the discrete diffusion operator, the upwinding, and the boundary conditions

mod apply_bcs;
mod diffusion;
mod local_op;
mod nonlinear_coefficient;
mod schema;
mod upwind;
pub use crate::operators::apply_bcs::*;
pub use crate::operators::diffusion::*;
pub use crate::operators::local_op::*;
pub use crate::operators::nonlinear_coefficient::*;
pub use crate::operators::schema::*;
pub use crate::operators::upwind::*;
