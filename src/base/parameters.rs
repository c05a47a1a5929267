use serde::{Deserialize, Serialize};

/// Holds parameters for water retention models
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub enum ParamWrmModel {
    VanGenuchten {
        /// α parameter (1/Pa)
        alpha: f64,

        /// m parameter with n = 1/(1-m) (Mualem)
        m: f64,

        /// Residual saturation
        sr: f64,
    },
    BrooksCorey {
        /// Slope coefficient
        lambda: f64,

        /// Air-entry pressure (Pa)
        pc_ae: f64,

        /// Residual saturation
        sr: f64,
    },
}

/// Holds a water retention model assigned to a cell region
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ParamWrm {
    /// Name of the cell region
    pub region: String,

    /// Model parameters
    pub model: ParamWrmModel,
}

/// Holds the absolute permeability tensor components (m²)
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct ParamPermeability {
    /// x-component of the permeability tensor
    pub kx: f64,

    /// y-component of the permeability tensor
    pub ky: f64,

    /// z-component of the permeability tensor
    pub kz: f64,
}

/// Holds the properties of the porous medium in a cell region
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ParamMedium {
    /// Name of the cell region
    pub region: String,

    /// Porosity φ
    pub porosity: f64,

    /// Absolute permeability
    pub permeability: ParamPermeability,
}

/// Defines the boundary conditions for the flow problem
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub enum ParamBcKind {
    /// Prescribed pressure (Pa)
    Pressure(f64),

    /// Prescribed water table elevation (m) converted into a hydrostatic pressure
    StaticHead(f64),

    /// Prescribed outward mass flux per unit area
    MassFlux(f64),

    /// Seepage face with the given outward flux while the face pressure is below atmospheric
    Seepage(f64),
}

/// Holds a boundary condition assigned to face regions
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ParamBc {
    /// Names of the face regions
    pub regions: Vec<String>,

    /// Condition
    pub kind: ParamBcKind,
}

/// Defines the preconditioners
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum ParamPreconditioner {
    /// Direct sparse factorization (UMFPACK)
    Direct,

    /// Inverse of the diagonal (Jacobi)
    Diagonal,

    /// No preconditioning
    Identity,
}

/// Holds parameters for the iterative linear solver
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ParamLinearSolver {
    /// Maximum number of iterations
    pub max_iterations: usize,

    /// Relative tolerance on the residual norm
    pub tolerance: f64,

    /// Name of the preconditioner
    pub preconditioner: String,
}

impl ParamLinearSolver {
    /// Returns the default parameters
    pub fn new() -> Self {
        ParamLinearSolver {
            max_iterations: 100,
            tolerance: 1e-12,
            preconditioner: "direct".to_string(),
        }
    }
}

/// Holds the (raw) parameters of one time integration phase
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ParamTimeIntegrator {
    /// Time integration method name ("BDF1", "backward Euler", "BDF2")
    pub method: String,

    /// Error control options ("pressure", "saturation", "residual")
    pub error_control_options: Vec<String>,

    /// Name of the preconditioner
    pub preconditioner: String,

    /// Name of the linear solver (used by the Darcy initialization)
    pub linear_solver: String,

    /// Initializes the pressure with a (steady) Darcy solve
    pub initialize_with_darcy: bool,

    /// Time step method ("fixed", "adaptive")
    pub dt_method: String,

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

    /// Tolerance on the error norm for the nonlinear iterations
    pub error_tolerance: f64,

    /// Maximum number of nonlinear iterations
    pub max_iterations: usize,

    /// The time step increases if the number of iterations is below this value
    pub min_iterations: usize,

    /// The time step decreases if the number of iterations is above this value
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

impl Default for ParamTimeIntegrator {
    fn default() -> Self {
        ParamTimeIntegrator {
            method: "BDF2".to_string(),
            error_control_options: vec!["pressure".to_string()],
            preconditioner: "direct".to_string(),
            linear_solver: "pcg".to_string(),
            initialize_with_darcy: false,
            dt_method: "fixed".to_string(),
            t_start: 0.0,
            t_end: 1.0,
            dt_initial: 1.0,
            dt_min: 1e-10,
            dt_max: 1e10,
            max_steps: 1000,
            error_tolerance: 1e-6,
            max_iterations: 30,
            min_iterations: 5,
            limit_iterations: 15,
            dt_increase_factor: 1.25,
            dt_reduction_factor: 0.8,
            nka_max_vectors: 10,
            nka_vector_tolerance: 0.01,
        }
    }
}
