use super::WrmPartition;
use crate::StrError;

/// Holds the relative permeability and its derivative with respect to the pressure at cells
#[derive(Clone, Debug)]
pub struct CellRelPerm {
    /// Relative permeability
    pub values: Vec<f64>,

    /// Derivative of the relative permeability with respect to the pressure
    pub derivatives: Vec<f64>,
}

impl CellRelPerm {
    /// Evaluates the models at the given cell pressures
    ///
    /// The capillary pressure is `pc = p_atm - p`; hence `dk/dp = -dk/dpc`.
    pub fn new(wrm: &WrmPartition, pressure: &[f64], atm_pressure: f64) -> Result<Self, StrError> {
        let mut values = vec![0.0; pressure.len()];
        let mut derivatives = vec![0.0; pressure.len()];
        for c in 0..pressure.len() {
            let model = wrm.model(c)?;
            let pc = atm_pressure - pressure[c];
            values[c] = model.k_relative(pc);
            derivatives[c] = -model.dk_relative_dpc(pc);
        }
        Ok(CellRelPerm { values, derivatives })
    }
}

/// Computes the saturation at cells
pub fn cell_saturation(wrm: &WrmPartition, pressure: &[f64], atm_pressure: f64) -> Result<Vec<f64>, StrError> {
    let mut saturation = vec![0.0; pressure.len()];
    for c in 0..pressure.len() {
        saturation[c] = wrm.model(c)?.saturation(atm_pressure - pressure[c]);
    }
    Ok(saturation)
}

/// Computes the pressure corresponding to a saturation in a cell
pub fn pressure_from_saturation(
    wrm: &WrmPartition,
    c: usize,
    saturation: f64,
    atm_pressure: f64,
) -> Result<f64, StrError> {
    let pc = wrm.model(c)?.capillary_pressure(saturation)?;
    Ok(atm_pressure - pc)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
