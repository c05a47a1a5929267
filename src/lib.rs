//! Porous media flow with mimetic finite differences
//!
//! This crate implements the mimetic finite difference (MFD) discretization of the
//! Richards equation for variably saturated flow, including:
//!
//! * local inverse mass matrices with several stabilization strategies ([mfd])
//! * relative permeability upwinding and the mixed (cell+face) diffusion operator ([operators])
//! * a BDF2 nonlinear time integrator accelerated by NKA ([solvers])
//! * the Richards flow process with its phase state machine ([flow])
//!
//! The mesh and the parallel communicator are consumed through the [mesh::MeshQuery] and
//! [linalg::Communicator] traits.

/// Defines a type alias for the error type as a static string
pub type StrError = &'static str;

pub mod base;
pub mod flow;
pub mod linalg;
pub mod mesh;
pub mod mfd;
pub mod models;
pub mod operators;
pub mod prelude;
pub mod solvers;
