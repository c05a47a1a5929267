//! Implements the linear and nonlinear solvers and the time integrator

mod bdf2;
mod nka;
mod pcg;
mod preconditioner;
mod timestep_controller;
pub use crate::solvers::bdf2::*;
pub use crate::solvers::nka::*;
pub use crate::solvers::pcg::*;
pub use crate::solvers::preconditioner::*;
pub use crate::solvers::timestep_controller::*;
