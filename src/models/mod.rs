//! Implements the water retention models and the relative permeability

mod model_brooks_corey;
mod model_van_genuchten;
mod rel_perm;
mod water_retention;
mod wrm_curves;
mod wrm_partition;
pub use crate::models::model_brooks_corey::*;
pub use crate::models::model_van_genuchten::*;
pub use crate::models::rel_perm::*;
pub use crate::models::water_retention::*;
pub use crate::models::wrm_curves::*;
pub use crate::models::wrm_partition::*;
