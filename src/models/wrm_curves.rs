use super::WrmPartition;
use crate::StrError;

/// Tabulates the relative permeability of each model versus the capillary pressure
///
/// Each row holds `[pc, krel_0, krel_1, ...]` for `pc` in `[start, end)` with increment `step`.
pub fn krel_pc_curves(wrm: &WrmPartition, start: f64, step: f64, end: f64) -> Result<Vec<Vec<f64>>, StrError> {
    let mut table = Vec::new();
    for pc in sample_points(start, step, end)? {
        let mut row = Vec::with_capacity(1 + wrm.len());
        row.push(pc);
        for i in 0..wrm.len() {
            row.push(wrm.model_at(i).k_relative(pc));
        }
        table.push(row);
    }
    Ok(table)
}

/// Tabulates the relative permeability of each model versus the saturation
///
/// Each row holds `[s, krel_0, krel_1, ...]` for `s` in `[start, end)` with increment `step`.
/// Saturations at or below the residual saturation of a model yield a zero relative permeability.
pub fn krel_sat_curves(wrm: &WrmPartition, start: f64, step: f64, end: f64) -> Result<Vec<Vec<f64>>, StrError> {
    let mut table = Vec::new();
    for s in sample_points(start, step, end)? {
        let mut row = Vec::with_capacity(1 + wrm.len());
        row.push(s);
        for i in 0..wrm.len() {
            let model = wrm.model_at(i);
            if s <= model.residual_saturation() {
                row.push(0.0);
            } else {
                let pc = model.capillary_pressure(f64::min(s, 1.0))?;
                row.push(model.k_relative(pc));
            }
        }
        table.push(row);
    }
    Ok(table)
}

/// Returns the points in [start, end) separated by step
fn sample_points(start: f64, step: f64, end: f64) -> Result<Vec<f64>, StrError> {
    if step <= 0.0 {
        return Err("curve increment must be > 0.0");
    }
    if end < start {
        return Err("curve end must be ≥ curve start");
    }
    let n = f64::ceil((end - start) / step) as usize;
    Ok((0..n).map(|i| start + (i as f64) * step).filter(|x| *x < end).collect())
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
