use super::{MfdMethod, NonlinearSolver, RelPermMethod};
use super::{ParamBc, ParamLinearSolver, ParamMedium, ParamPreconditioner, ParamTimeIntegrator, ParamWrm};
use super::{FLOW_PRESSURE_ATMOSPHERIC, MFD_STABILITY_FACTOR, OPERATOR_UPWIND_RELATIVE_TOLERANCE};
use crate::StrError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Holds configuration data such as fluid properties, discretization options, and phases
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Fluid density ρ (kg/m³)
    pub density: f64,

    /// Dynamic viscosity μ (Pa·s)
    pub viscosity: f64,

    /// Gravity acceleration magnitude (m/s²), acting along the last axis
    pub gravity: f64,

    /// Atmospheric pressure (Pa)
    pub atm_pressure: f64,

    /// Primary discretization method name
    pub discretization_primary: String,

    /// Secondary discretization method name
    pub discretization_secondary: String,

    /// Names of the entity kinds carrying the unknowns ("cell", "face", "node")
    pub schema: Vec<String>,

    /// Scaling factor for the MFD stability term
    pub stability_factor: f64,

    /// Relative permeability method name
    pub relative_permeability: String,

    /// Tolerance used to detect near-zero fluxes during upwinding
    pub upwind_tolerance: f64,

    /// Adds the Newton correction term to the preconditioner
    pub newton_correction: bool,

    /// Nonlinear solver name ("nka", "newton", "picard-newton")
    pub experimental_solver: String,

    /// Water retention models per cell region
    pub water_retention_models: Vec<ParamWrm>,

    /// Porous medium properties per cell region
    pub media: Vec<ParamMedium>,

    /// Boundary conditions per face region
    pub boundary_conditions: Vec<ParamBc>,

    /// Initial saturation per cell region (converted into pressure)
    pub initial_saturation: Vec<(String, f64)>,

    /// Initial uniform pressure when no saturation is given
    pub initial_pressure: f64,

    /// Named preconditioners
    pub preconditioners: BTreeMap<String, ParamPreconditioner>,

    /// Named linear solvers
    pub linear_solvers: BTreeMap<String, ParamLinearSolver>,

    /// Initial guess phase
    pub initial_guess: Option<ParamTimeIntegrator>,

    /// Steady state phase
    pub steady_state: Option<ParamTimeIntegrator>,

    /// Transient phase
    pub transient: Option<ParamTimeIntegrator>,

    /// Skips the validation of the combination of phases
    pub developer_access_granted: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl Config {
    /// Allocates a new instance with water properties at 20 ℃
    pub fn new() -> Self {
        let mut preconditioners = BTreeMap::new();
        preconditioners.insert("direct".to_string(), ParamPreconditioner::Direct);
        preconditioners.insert("diagonal".to_string(), ParamPreconditioner::Diagonal);
        let mut linear_solvers = BTreeMap::new();
        linear_solvers.insert("pcg".to_string(), ParamLinearSolver::new());
        Config {
            density: 998.2,
            viscosity: 1.002e-3,
            gravity: 9.81,
            atm_pressure: FLOW_PRESSURE_ATMOSPHERIC,
            discretization_primary: "monotone mfd".to_string(),
            discretization_secondary: "optimized mfd scaled".to_string(),
            schema: vec!["cell".to_string(), "face".to_string()],
            stability_factor: MFD_STABILITY_FACTOR,
            relative_permeability: "upwind with gravity".to_string(),
            upwind_tolerance: OPERATOR_UPWIND_RELATIVE_TOLERANCE,
            newton_correction: false,
            experimental_solver: "nka".to_string(),
            water_retention_models: Vec::new(),
            media: Vec::new(),
            boundary_conditions: Vec::new(),
            initial_saturation: Vec::new(),
            initial_pressure: FLOW_PRESSURE_ATMOSPHERIC,
            preconditioners,
            linear_solvers,
            initial_guess: None,
            steady_state: None,
            transient: None,
            developer_access_granted: false,
        }
    }

    /// Reads a JSON file
    pub fn read_json<P>(full_path: &P) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let input = File::open(path).map_err(|_| "cannot open config file")?;
        let buffered = BufReader::new(input);
        let config: Config = serde_json::from_reader(buffered).map_err(|e| {
            log::error!("cannot parse config: {}", e);
            "cannot parse config file"
        })?;
        Ok(config)
    }

    /// Sets the fluid density
    pub fn set_density(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if value <= 0.0 {
            return Err("density must be > 0.0");
        }
        self.density = value;
        Ok(self)
    }

    /// Sets the dynamic viscosity
    pub fn set_viscosity(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if value <= 0.0 {
            return Err("viscosity must be > 0.0");
        }
        self.viscosity = value;
        Ok(self)
    }

    /// Sets the gravity acceleration
    pub fn set_gravity(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if value < 0.0 {
            return Err("gravity must be ≥ 0.0");
        }
        self.gravity = value;
        Ok(self)
    }

    /// Sets the atmospheric pressure
    pub fn set_atm_pressure(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if value <= 0.0 {
            return Err("atmospheric pressure must be > 0.0");
        }
        self.atm_pressure = value;
        Ok(self)
    }

    /// Sets the primary and secondary discretization methods
    pub fn set_discretization(&mut self, primary: &str, secondary: &str) -> Result<&mut Self, StrError> {
        MfdMethod::from_name(primary)?;
        let second = MfdMethod::from_name(secondary)?;
        if !second.can_be_secondary() {
            return Err("secondary discretization method must be a robust method");
        }
        self.discretization_primary = primary.to_string();
        self.discretization_secondary = secondary.to_string();
        Ok(self)
    }

    /// Sets the relative permeability method
    pub fn set_relative_permeability(&mut self, name: &str) -> Result<&mut Self, StrError> {
        RelPermMethod::from_name(name)?;
        self.relative_permeability = name.to_string();
        Ok(self)
    }

    /// Sets the upwind tolerance
    pub fn set_upwind_tolerance(&mut self, value: f64) -> Result<&mut Self, StrError> {
        if value < 0.0 {
            return Err("upwind tolerance must be ≥ 0.0");
        }
        self.upwind_tolerance = value;
        Ok(self)
    }

    /// Sets the nonlinear solver
    pub fn set_experimental_solver(&mut self, name: &str) -> Result<&mut Self, StrError> {
        NonlinearSolver::from_name(name)?;
        self.experimental_solver = name.to_string();
        Ok(self)
    }

    /// Sets the Newton correction flag
    pub fn set_newton_correction(&mut self, flag: bool) -> Result<&mut Self, StrError> {
        self.newton_correction = flag;
        Ok(self)
    }

    /// Adds a water retention model
    pub fn add_water_retention(&mut self, param: ParamWrm) -> Result<&mut Self, StrError> {
        self.water_retention_models.push(param);
        Ok(self)
    }

    /// Adds a porous medium
    pub fn add_medium(&mut self, param: ParamMedium) -> Result<&mut Self, StrError> {
        if param.porosity <= 0.0 || param.porosity > 1.0 {
            return Err("porosity must satisfy 0.0 < φ ≤ 1.0");
        }
        let k = &param.permeability;
        if k.kx <= 0.0 || k.ky <= 0.0 || k.kz <= 0.0 {
            return Err("permeability components must be > 0.0");
        }
        self.media.push(param);
        Ok(self)
    }

    /// Adds a boundary condition
    pub fn add_boundary_condition(&mut self, param: ParamBc) -> Result<&mut Self, StrError> {
        if param.regions.is_empty() {
            return Err("boundary condition requires at least one region");
        }
        self.boundary_conditions.push(param);
        Ok(self)
    }

    /// Sets the initial saturation of a region
    pub fn set_initial_saturation(&mut self, region: &str, value: f64) -> Result<&mut Self, StrError> {
        if value <= 0.0 || value > 1.0 {
            return Err("initial saturation must satisfy 0.0 < s ≤ 1.0");
        }
        self.initial_saturation.push((region.to_string(), value));
        Ok(self)
    }

    /// Sets the initial uniform pressure
    pub fn set_initial_pressure(&mut self, value: f64) -> Result<&mut Self, StrError> {
        self.initial_pressure = value;
        Ok(self)
    }

    /// Sets the initial guess phase
    pub fn set_initial_guess(&mut self, param: ParamTimeIntegrator) -> Result<&mut Self, StrError> {
        self.initial_guess = Some(param);
        Ok(self)
    }

    /// Sets the steady state phase
    pub fn set_steady_state(&mut self, param: ParamTimeIntegrator) -> Result<&mut Self, StrError> {
        self.steady_state = Some(param);
        Ok(self)
    }

    /// Sets the transient phase
    pub fn set_transient(&mut self, param: ParamTimeIntegrator) -> Result<&mut Self, StrError> {
        self.transient = Some(param);
        Ok(self)
    }

    /// Validates all data
    ///
    /// Returns a message with the inconsistent data, or returns None if everything is all right.
    pub fn validate(&self) -> Option<String> {
        if self.density <= 0.0 {
            return Some(format!("density = {:?} is incorrect; it must be > 0.0", self.density));
        }
        if self.viscosity <= 0.0 {
            return Some(format!("viscosity = {:?} is incorrect; it must be > 0.0", self.viscosity));
        }
        if self.gravity < 0.0 {
            return Some(format!("gravity = {:?} is incorrect; it must be ≥ 0.0", self.gravity));
        }
        if self.atm_pressure <= 0.0 {
            return Some(format!(
                "atm_pressure = {:?} is incorrect; it must be > 0.0",
                self.atm_pressure
            ));
        }
        if MfdMethod::from_name(&self.discretization_primary).is_err() {
            return Some(format!(
                "discretization_primary = {:?} is not a valid method",
                self.discretization_primary
            ));
        }
        match MfdMethod::from_name(&self.discretization_secondary) {
            Ok(m) if m.can_be_secondary() => (),
            _ => {
                return Some(format!(
                    "discretization_secondary = {:?} is not a valid secondary method",
                    self.discretization_secondary
                ))
            }
        }
        if RelPermMethod::from_name(&self.relative_permeability).is_err() {
            return Some(format!(
                "relative_permeability = {:?} is not a valid method",
                self.relative_permeability
            ));
        }
        if NonlinearSolver::from_name(&self.experimental_solver).is_err() {
            return Some(format!(
                "experimental_solver = {:?} is not a valid solver",
                self.experimental_solver
            ));
        }
        if self.water_retention_models.is_empty() {
            return Some("at least one water retention model is required".to_string());
        }
        if self.media.is_empty() {
            return Some("at least one porous medium is required".to_string());
        }
        if self.initial_guess.is_none() && self.steady_state.is_none() && self.transient.is_none() {
            return Some("at least one time integration phase is required".to_string());
        }
        for phase in [&self.initial_guess, &self.steady_state, &self.transient] {
            if let Some(p) = phase {
                if !self.preconditioners.contains_key(&p.preconditioner) {
                    return Some(format!("preconditioner {:?} is not defined", p.preconditioner));
                }
                if p.initialize_with_darcy && !self.linear_solvers.contains_key(&p.linear_solver) {
                    return Some(format!("linear solver {:?} is not defined", p.linear_solver));
                }
            }
        }
        None // all good
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration data\n")?;
        write!(f, "==================\n")?;
        write!(f, "density = {:?}\n", self.density)?;
        write!(f, "viscosity = {:?}\n", self.viscosity)?;
        write!(f, "gravity = {:?}\n", self.gravity)?;
        write!(f, "atm_pressure = {:?}\n", self.atm_pressure)?;
        write!(f, "discretization_primary = {:?}\n", self.discretization_primary)?;
        write!(f, "discretization_secondary = {:?}\n", self.discretization_secondary)?;
        write!(f, "relative_permeability = {:?}\n", self.relative_permeability)?;
        write!(f, "experimental_solver = {:?}\n", self.experimental_solver)?;

        write!(f, "\nWater retention models\n")?;
        write!(f, "======================\n")?;
        for p in &self.water_retention_models {
            write!(f, "{} → {:?}\n", p.region, p.model)?;
        }

        write!(f, "\nPorous media\n")?;
        write!(f, "============\n")?;
        for p in &self.media {
            write!(f, "{} → φ = {:?}, {:?}\n", p.region, p.porosity, p.permeability)?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
