//! Implements the base structures for a flow simulation

mod config;
mod constants;
mod enums;
mod parameters;
mod ti_specs;
pub use crate::base::config::*;
pub use crate::base::constants::*;
pub use crate::base::enums::*;
pub use crate::base::parameters::*;
pub use crate::base::ti_specs::*;
