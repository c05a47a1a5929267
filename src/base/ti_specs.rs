use super::{DtMethod, ErrorControl, ParamTimeIntegrator, TiMethod};
use crate::StrError;

/// Holds the parsed specifications of one time integration phase
///
/// The specs are immutable once parsed.
#[derive(Clone, Debug)]
pub struct TiSpecs {
    /// Time integration method
    pub method: TiMethod,

    /// Error control mask
    pub error_control: ErrorControl,

    /// Name of the preconditioner
    pub preconditioner: String,

    /// Name of the linear solver
    pub linear_solver: String,

    /// Initializes the pressure with a Darcy solve
    pub initialize_with_darcy: bool,

    /// Time step method
    pub dt_method: DtMethod,

    /// Start time
    pub t_start: f64,

    /// End time
    pub t_end: f64,

    /// Initial time step
    pub dt_initial: f64,

    /// Minimum time step
    pub dt_min: f64,

    /// Maximum time step
    pub dt_max: f64,

    /// Maximum number of time steps
    pub max_steps: usize,

    /// Tolerance on the error norm
    pub error_tolerance: f64,

    /// Maximum number of nonlinear iterations
    pub max_iterations: usize,

    /// Lower iteration count for the adaptive time step
    pub min_iterations: usize,

    /// Upper iteration count for the adaptive time step
    pub limit_iterations: usize,

    /// Time step increase factor
    pub dt_increase_factor: f64,

    /// Time step reduction factor
    pub dt_reduction_factor: f64,

    /// Number of vectors kept by the NKA accelerator
    pub nka_max_vectors: usize,

    /// Tolerance for dropping nearly dependent NKA vectors
    pub nka_vector_tolerance: f64,
}

impl TiSpecs {
    /// Parses and validates the raw parameters
    pub fn new(param: &ParamTimeIntegrator) -> Result<Self, StrError> {
        let method = TiMethod::from_name(&param.method)?;
        let error_control = ErrorControl::from_names(&param.error_control_options)?;
        let dt_method = DtMethod::from_name(&param.dt_method)?;
        if param.t_end < param.t_start {
            return Err("t_end must be ≥ t_start");
        }
        if param.dt_initial <= 0.0 {
            return Err("dt_initial must be > 0.0");
        }
        if param.dt_min <= 0.0 || param.dt_min > param.dt_max {
            return Err("dt_min must satisfy 0.0 < dt_min ≤ dt_max");
        }
        if param.error_tolerance <= 0.0 {
            return Err("error_tolerance must be > 0.0");
        }
        if param.max_iterations < 1 {
            return Err("max_iterations must be ≥ 1");
        }
        if param.min_iterations > param.limit_iterations {
            return Err("min_iterations must be ≤ limit_iterations");
        }
        if param.dt_increase_factor < 1.0 {
            return Err("dt_increase_factor must be ≥ 1.0");
        }
        if param.dt_reduction_factor <= 0.0 || param.dt_reduction_factor >= 1.0 {
            return Err("dt_reduction_factor must satisfy 0.0 < factor < 1.0");
        }
        Ok(TiSpecs {
            method,
            error_control,
            preconditioner: param.preconditioner.clone(),
            linear_solver: param.linear_solver.clone(),
            initialize_with_darcy: param.initialize_with_darcy,
            dt_method,
            t_start: param.t_start,
            t_end: param.t_end,
            dt_initial: param.dt_initial,
            dt_min: param.dt_min,
            dt_max: param.dt_max,
            max_steps: param.max_steps,
            error_tolerance: param.error_tolerance,
            max_iterations: param.max_iterations,
            min_iterations: param.min_iterations,
            limit_iterations: param.limit_iterations,
            dt_increase_factor: param.dt_increase_factor,
            dt_reduction_factor: param.dt_reduction_factor,
            nka_max_vectors: param.nka_max_vectors,
            nka_vector_tolerance: param.nka_vector_tolerance,
        })
    }
}

/// Validates the combination of phase specs
///
/// The Darcy initialization may be requested by one phase only and the adaptive
/// time step is reserved to the transient phase.
pub fn analysis_ti_specs(
    initial_guess: Option<&TiSpecs>,
    steady_state: Option<&TiSpecs>,
    transient: Option<&TiSpecs>,
) -> Result<(), StrError> {
    let phases = [initial_guess, steady_state, transient];
    let n_darcy = phases
        .iter()
        .filter(|p| p.map(|s| s.initialize_with_darcy).unwrap_or(false))
        .count();
    if n_darcy > 1 {
        return Err("the Darcy pressure initialization must be requested by one phase at most");
    }
    for specs in [initial_guess, steady_state].iter().flatten() {
        if specs.dt_method == DtMethod::Adaptive {
            return Err("the adaptive time step is only available in the transient phase");
        }
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
