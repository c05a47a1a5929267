//! Makes available common structures needed to run a simulation
//!
//! You may write `use pmflow::prelude::*` in your code and obtain
//! access to commonly used functionality.

pub use crate::base::{Config, EntityKind, MfdMethod, ParamBc, ParamBcKind, ParamMedium, ParamWrm, TiSpecs};
pub use crate::base::{ParamLinearSolver, ParamPreconditioner, ParamTimeIntegrator, FLOW_PRESSURE_ATMOSPHERIC};
pub use crate::flow::{PhaseReport, Richards, RichardsState};
pub use crate::linalg::{Communicator, CompositeVector, SerialComm};
pub use crate::mesh::{MeshBox, MeshQuery};
