/// Defines the atmospheric pressure (Pa)
pub const FLOW_PRESSURE_ATMOSPHERIC: f64 = 101325.0;

/// Defines the default tolerance used to detect near-zero fluxes during upwinding
pub const OPERATOR_UPWIND_RELATIVE_TOLERANCE: f64 = 1e-12;

/// Defines the time step used to prime the preconditioner of a phase without time steps
pub const INITIAL_PRECON_DT: f64 = 1e-3;

/// Defines the default scaling factor for the MFD stability term
pub const MFD_STABILITY_FACTOR: f64 = 1.0;

/// Defines the maximum number of faces of a cell handled by the local matrices
pub const MFD_MAX_FACES: usize = 64;

/// Defines the directory where the simulation result files are saved
pub const DEFAULT_OUT_DIR: &str = "/tmp/pmflow/results";
