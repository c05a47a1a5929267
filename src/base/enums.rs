use crate::StrError;
use serde::{Deserialize, Serialize};

/// Defines the kinds of mesh entities
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Deserialize, Serialize)]
pub enum EntityKind {
    Cell,
    Face,
    Node,
}

/// Selects owned entities only or owned plus ghost entities
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParallelType {
    /// Entities owned by this process
    Owned,

    /// Owned entities followed by the ghost entities
    Used,
}

/// Defines the methods to compute the local (inverse) mass matrix
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Deserialize, Serialize)]
pub enum MfdMethod {
    /// Monotone stabilization for hexahedra (falls back to the polyhedral search)
    MonotoneHex,

    /// Monotone stabilization for general polyhedra (M-matrix search)
    MonotonePolyhedron,

    /// Scaled stabilization with the parameter optimized for monotonicity
    OptimizedScaled,

    /// Two-point flux approximation (diagonal)
    Tpfa,

    /// Support operator method (inverts a consistent mass matrix)
    SupportOperator,

    /// Scaled stabilization
    Scaled,
}

impl MfdMethod {
    /// Parses the name used in the input file
    pub fn from_name(name: &str) -> Result<Self, StrError> {
        match name {
            "monotone mfd hex" => Ok(MfdMethod::MonotoneHex),
            "monotone mfd" => Ok(MfdMethod::MonotonePolyhedron),
            "optimized mfd scaled" => Ok(MfdMethod::OptimizedScaled),
            "two point flux approximation" => Ok(MfdMethod::Tpfa),
            "support operator" => Ok(MfdMethod::SupportOperator),
            "mfd scaled" => Ok(MfdMethod::Scaled),
            _ => {
                log::error!("unknown discretization method: \"{}\"", name);
                Err("unknown discretization method")
            }
        }
    }

    /// Returns the name used in the input file
    pub fn name(&self) -> &'static str {
        match self {
            MfdMethod::MonotoneHex => "monotone mfd hex",
            MfdMethod::MonotonePolyhedron => "monotone mfd",
            MfdMethod::OptimizedScaled => "optimized mfd scaled",
            MfdMethod::Tpfa => "two point flux approximation",
            MfdMethod::SupportOperator => "support operator",
            MfdMethod::Scaled => "mfd scaled",
        }
    }

    /// Tells whether the method always succeeds on valid geometry and may act as secondary method
    pub fn can_be_secondary(&self) -> bool {
        match self {
            MfdMethod::MonotoneHex | MfdMethod::MonotonePolyhedron => false,
            _ => true,
        }
    }
}

/// Defines how the relative permeability is evaluated on faces
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum RelPermMethod {
    /// Upwinding driven by the direction of gravity
    UpwindGravity,

    /// Upwinding driven by the Darcy flux
    UpwindFlux,

    /// Cell-centered values (no face coefficient)
    CellCentered,
}

impl RelPermMethod {
    /// Parses the name used in the input file
    pub fn from_name(name: &str) -> Result<Self, StrError> {
        match name {
            "upwind with gravity" => Ok(RelPermMethod::UpwindGravity),
            "upwind with Darcy flux" => Ok(RelPermMethod::UpwindFlux),
            "cell centered" => Ok(RelPermMethod::CellCentered),
            _ => {
                log::error!("unknown relative permeability method: \"{}\"", name);
                Err("unknown relative permeability method")
            }
        }
    }
}

/// Defines the time integration methods
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum TiMethod {
    /// Backward Euler
    Bdf1,

    /// Second-order backward differentiation formula (variable step)
    Bdf2,
}

impl TiMethod {
    /// Parses the name used in the input file
    pub fn from_name(name: &str) -> Result<Self, StrError> {
        match name {
            "BDF1" | "backward Euler" => Ok(TiMethod::Bdf1),
            "BDF2" => Ok(TiMethod::Bdf2),
            _ => {
                log::error!("unknown time integration method: \"{}\"", name);
                Err("unknown time integration method")
            }
        }
    }
}

/// Defines the time step selection methods
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum DtMethod {
    /// Constant time step
    Fixed,

    /// Iteration-count based adaptive time step
    Adaptive,
}

impl DtMethod {
    /// Parses the name used in the input file
    pub fn from_name(name: &str) -> Result<Self, StrError> {
        match name {
            "fixed" | "simple" => Ok(DtMethod::Fixed),
            "adaptive" => Ok(DtMethod::Adaptive),
            _ => {
                log::error!("unknown time step method: \"{}\"", name);
                Err("unknown time step method")
            }
        }
    }
}

/// Defines the nonlinear solver used by the time integrator
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum NonlinearSolver {
    /// Preconditioned fixed-point iteration accelerated by NKA
    Nka,

    /// Preconditioned correction with the Newton term in the operator
    Newton,

    /// Picard iteration with the Newton term in the preconditioner only
    PicardNewton,
}

impl NonlinearSolver {
    /// Parses the name used in the input file
    pub fn from_name(name: &str) -> Result<Self, StrError> {
        match name {
            "nka" => Ok(NonlinearSolver::Nka),
            "newton" => Ok(NonlinearSolver::Newton),
            "picard-newton" => Ok(NonlinearSolver::PicardNewton),
            _ => {
                log::error!("unknown experimental solver: \"{}\"", name);
                Err("unknown experimental solver")
            }
        }
    }
}

/// Holds the error-control options as a bit mask
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct ErrorControl(u8);

impl ErrorControl {
    pub const PRESSURE: ErrorControl = ErrorControl(1);
    pub const SATURATION: ErrorControl = ErrorControl(2);
    pub const RESIDUAL: ErrorControl = ErrorControl(4);

    /// Parses a list of option names
    ///
    /// An empty list yields the pressure control only.
    pub fn from_names(names: &[String]) -> Result<Self, StrError> {
        if names.is_empty() {
            return Ok(ErrorControl::PRESSURE);
        }
        let mut mask = ErrorControl::default();
        for name in names {
            mask = match name.as_str() {
                "pressure" => mask.with(ErrorControl::PRESSURE),
                "saturation" => mask.with(ErrorControl::SATURATION),
                "residual" => mask.with(ErrorControl::RESIDUAL),
                _ => {
                    log::error!("unknown error control option: \"{}\"", name);
                    return Err("unknown error control option");
                }
            };
        }
        Ok(mask)
    }

    /// Returns the union of two masks
    pub fn with(self, other: ErrorControl) -> Self {
        ErrorControl(self.0 | other.0)
    }

    /// Tells whether all bits of `other` are set
    pub fn contains(&self, other: ErrorControl) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Defines the boundary models seen by the discrete operators
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BcModel {
    None,
    Dirichlet,
    Neumann,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
