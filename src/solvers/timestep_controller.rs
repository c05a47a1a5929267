use crate::base::{DtMethod, TiSpecs};
use crate::StrError;

/// Selects the time step from the number of nonlinear iterations
///
/// With the adaptive method, Δt grows by `increase` when fewer than `min_iterations` were
/// needed and shrinks by `reduction` when more than `limit_iterations` were needed. Failed
/// steps are always retried with a reduced Δt.
#[derive(Clone, Copy, Debug)]
pub struct TimestepController {
    method: DtMethod,
    dt_min: f64,
    dt_max: f64,
    min_iterations: usize,
    limit_iterations: usize,
    increase: f64,
    reduction: f64,
}

impl TimestepController {
    /// Allocates a new instance
    pub fn new(specs: &TiSpecs) -> Self {
        TimestepController {
            method: specs.dt_method,
            dt_min: specs.dt_min,
            dt_max: specs.dt_max,
            min_iterations: specs.min_iterations,
            limit_iterations: specs.limit_iterations,
            increase: specs.dt_increase_factor,
            reduction: specs.dt_reduction_factor,
        }
    }

    /// Returns the time step following a converged step
    pub fn next_dt(&self, dt: f64, iterations: usize) -> f64 {
        let next = match self.method {
            DtMethod::Fixed => dt,
            DtMethod::Adaptive => {
                if iterations < self.min_iterations {
                    dt * self.increase
                } else if iterations > self.limit_iterations {
                    dt * self.reduction
                } else {
                    dt
                }
            }
        };
        f64::min(f64::max(next, self.dt_min), self.dt_max)
    }

    /// Returns the time step to retry a failed step
    pub fn reduced_dt(&self, dt: f64) -> Result<f64, StrError> {
        let next = dt * self.reduction;
        if next < self.dt_min {
            log::error!("Δt = {:?} is smaller than dt_min = {:?}", next, self.dt_min);
            return Err("Δt is smaller than the allowed minimum");
        }
        Ok(next)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
