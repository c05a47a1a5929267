use super::{ModelBrooksCorey, ModelVanGenuchten};
use crate::base::ParamWrmModel;
use crate::StrError;

/// Defines the water retention models
///
/// The capillary pressure is `pc = p_atm - p` (positive in unsaturated conditions).
pub trait WaterRetention {
    /// Calculates the saturation
    fn saturation(&self, pc: f64) -> f64;

    /// Calculates dS/dpc
    fn dsaturation_dpc(&self, pc: f64) -> f64;

    /// Calculates the relative permeability
    fn k_relative(&self, pc: f64) -> f64;

    /// Calculates dkr/dpc
    fn dk_relative_dpc(&self, pc: f64) -> f64;

    /// Calculates the capillary pressure corresponding to a saturation
    fn capillary_pressure(&self, saturation: f64) -> Result<f64, StrError>;

    /// Returns the residual saturation
    fn residual_saturation(&self) -> f64;
}

/// Allocates a water retention model
pub fn allocate_water_retention(param: &ParamWrmModel) -> Result<Box<dyn WaterRetention>, StrError> {
    let model: Box<dyn WaterRetention> = match param {
        ParamWrmModel::VanGenuchten { alpha, m, sr } => Box::new(ModelVanGenuchten::new(*alpha, *m, *sr)?),
        ParamWrmModel::BrooksCorey { lambda, pc_ae, sr } => Box::new(ModelBrooksCorey::new(*lambda, *pc_ae, *sr)?),
    };
    Ok(model)
}

/// Converts a saturation into the effective saturation, checking the limits
pub(crate) fn effective_saturation(saturation: f64, sr: f64) -> Result<f64, StrError> {
    if saturation > 1.0 {
        return Err("saturation must be ≤ 1.0");
    }
    let se = (saturation - sr) / (1.0 - sr);
    if se <= 0.0 {
        return Err("saturation must be greater than the residual saturation");
    }
    Ok(se)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::allocate_water_retention;
    use crate::base::ParamWrmModel;
    use russell_lab::approx_eq;

    #[test]
    fn allocate_water_retention_works() {
        let vg = ParamWrmModel::VanGenuchten {
            alpha: 1e-4,
            m: 0.5,
            sr: 0.1,
        };
        let model = allocate_water_retention(&vg).unwrap();
        assert_eq!(model.residual_saturation(), 0.1);
        assert_eq!(model.saturation(-10.0), 1.0);

        let bc = ParamWrmModel::BrooksCorey {
            lambda: 2.0,
            pc_ae: 1000.0,
            sr: 0.05,
        };
        let model = allocate_water_retention(&bc).unwrap();
        approx_eq(model.saturation(2000.0), 0.05 + 0.95 * 0.25, 1e-15);

        let bad = ParamWrmModel::BrooksCorey {
            lambda: -2.0,
            pc_ae: 1000.0,
            sr: 0.05,
        };
        assert_eq!(
            allocate_water_retention(&bad).err(),
            Some("lambda parameter for the Brooks-Corey retention model is invalid")
        );
    }
}
