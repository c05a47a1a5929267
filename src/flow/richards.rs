use super::FlowBcs;
use crate::base::{analysis_ti_specs, Config, EntityKind, ErrorControl, MfdMethod, NonlinearSolver, ParallelType};
use crate::base::{ParamLinearSolver, ParamPreconditioner, RelPermMethod, TiSpecs, INITIAL_PRECON_DT};
use crate::linalg::{Communicator, CompositeVector};
use crate::mesh::MeshQuery;
use crate::models::{cell_saturation, pressure_from_saturation, CellRelPerm, WrmPartition};
use crate::operators::{BcData, NonlinearCoefficient, OperatorDiffusion, Schema, Upwind};
use crate::solvers::{allocate_preconditioner, Bdf2, Bdf2Stats, BdfFunction, LinearSolverPcg};
use crate::StrError;
use russell_tensor::{Mandel, Tensor2};
use std::collections::BTreeMap;

/// Defines the phases of a Richards simulation
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RichardsState {
    Uninitialized,
    InitialGuess,
    SteadyState,
    Transient,
    Done,
}

/// Holds the summary of one completed phase
#[derive(Clone, Copy, Debug)]
pub struct PhaseReport {
    /// Phase
    pub state: RichardsState,

    /// Final time
    pub time: f64,

    /// Statistics of the time integrator
    pub stats: Bdf2Stats,
}

/// Implements the Richards equation for variably saturated flow
///
/// ```text
/// ∂(ρ φ S(p))/∂t - ∇·(ρ kr(p) K/μ ∇(p + ρ g z)) = 0
/// ```
///
/// The capillary pressure is `pc = p_atm - p`. The simulation runs the configured phases
/// (initial guess, steady state, transient) in this order, each one with its own time
/// integration specs.
pub struct Richards<'a> {
    /// Mesh
    mesh: &'a dyn MeshQuery,

    /// Communicator
    comm: &'a dyn Communicator,

    /// Fluid density ρ
    density: f64,

    /// ρ |g|
    density_gravity: f64,

    /// Atmospheric pressure
    atm_pressure: f64,

    /// Initial uniform pressure
    initial_pressure: f64,

    /// Initial saturation per cell region
    initial_saturation: Vec<(String, f64)>,

    /// Location of the unknowns
    schema: Schema,

    /// Relative permeability method
    rel_perm: RelPermMethod,

    /// Nonlinear solver
    solver: NonlinearSolver,

    /// Adds the Newton term to the preconditioner
    newton_correction: bool,

    /// Water retention models
    wrm: WrmPartition,

    /// Upwind selection of the relative permeability
    upwind: Upwind<'a>,

    /// Flow boundary conditions
    bcs: FlowBcs,

    /// Operator boundary data (updated at each evaluation)
    bc: BcData,

    /// Porosity of each owned cell
    porosity: Vec<f64>,

    /// Named preconditioners
    preconditioners: BTreeMap<String, ParamPreconditioner>,

    /// Named linear solvers
    linear_solvers: BTreeMap<String, ParamLinearSolver>,

    /// Specs of the phases (initial guess, steady state, transient)
    phases: [Option<TiSpecs>; 3],

    /// Operator of the residual
    matrix: OperatorDiffusion<'a>,

    /// Operator of the preconditioner
    precon: OperatorDiffusion<'a>,

    /// Error control of the current phase
    error_control: ErrorControl,

    /// Largest scaled residual of the last evaluation
    residual_max: f64,

    /// Cell with the largest scaled residual
    residual_cell: usize,

    /// Current phase
    state: RichardsState,

    /// Current time
    time: f64,

    /// Pressure (cells and faces with the mixed schema)
    solution: CompositeVector,

    /// Darcy flux at faces (oriented as the face normals)
    darcy_flux: CompositeVector,

    /// Summaries of the completed phases
    reports: Vec<PhaseReport>,
}

impl<'a> Richards<'a> {
    /// Allocates a new instance
    pub fn new(mesh: &'a dyn MeshQuery, comm: &'a dyn Communicator, config: &Config) -> Result<Self, StrError> {
        if let Some(message) = config.validate() {
            log::error!("{}", message);
            return Err("configuration is invalid");
        }
        let primary = MfdMethod::from_name(&config.discretization_primary)?;
        let secondary = MfdMethod::from_name(&config.discretization_secondary)?;
        let schema = Schema::from_names(&config.schema)?;
        if schema == Schema::Node {
            return Err("Richards flow requires the cell-face or the cell schema");
        }
        let rel_perm = RelPermMethod::from_name(&config.relative_permeability)?;
        if rel_perm == RelPermMethod::UpwindFlux && schema != Schema::CellFace {
            return Err("flux-based upwinding requires the cell-face schema");
        }
        let solver = NonlinearSolver::from_name(&config.experimental_solver)?;

        // phases
        let mut phases = [None, None, None];
        for (i, param) in [&config.initial_guess, &config.steady_state, &config.transient]
            .iter()
            .enumerate()
        {
            if let Some(p) = param {
                phases[i] = Some(TiSpecs::new(p)?);
            }
        }
        if !config.developer_access_granted {
            analysis_ti_specs(phases[0].as_ref(), phases[1].as_ref(), phases[2].as_ref())?;
        }

        // materials
        let wrm = WrmPartition::new(mesh, &config.water_retention_models)?;
        let ncell_owned = mesh.num_entities(EntityKind::Cell, ParallelType::Owned);
        let ncell_used = mesh.num_entities(EntityKind::Cell, ParallelType::Used);
        let mut porosity = vec![0.0; ncell_owned];
        let mut permeability = vec![Tensor2::new(Mandel::Symmetric); ncell_used];
        let mut assigned = vec![false; ncell_used];
        let scale = config.density / config.viscosity;
        for medium in &config.media {
            if medium.porosity <= 0.0 || medium.porosity > 1.0 {
                log::error!("porosity of region \"{}\" is {:?}", medium.region, medium.porosity);
                return Err("porosity must satisfy 0.0 < φ ≤ 1.0");
            }
            let k = &medium.permeability;
            if k.kx <= 0.0 || k.ky <= 0.0 || k.kz <= 0.0 {
                log::error!("permeability of region \"{}\" is {:?}", medium.region, k);
                return Err("permeability components must be > 0.0");
            }
            for c in mesh.region_entities(&medium.region, EntityKind::Cell)? {
                if c >= ncell_used {
                    return Err("region refers to a cell that does not exist");
                }
                if assigned[c] {
                    log::error!("cell {} belongs to more than one porous medium", c);
                    return Err("porous media regions overlap");
                }
                assigned[c] = true;
                if c < ncell_owned {
                    porosity[c] = medium.porosity;
                }
                let kk = &mut permeability[c];
                kk.sym_set(0, 0, k.kx * scale);
                kk.sym_set(1, 1, k.ky * scale);
                kk.sym_set(2, 2, k.kz * scale);
            }
        }
        if let Some(c) = (0..ncell_owned).find(|c| !assigned[*c]) {
            log::error!("cell {} is not covered by any porous medium", c);
            return Err("porous media regions do not cover all owned cells");
        }

        // operators
        let mut matrix = OperatorDiffusion::new(mesh, comm, schema, primary, secondary, config.stability_factor)?;
        let mut precon = OperatorDiffusion::new(mesh, comm, schema, primary, secondary, config.stability_factor)?;
        matrix.init_operator(permeability.clone(), None)?;
        precon.init_operator(permeability, None)?;

        let nface_used = mesh.num_entities(EntityKind::Face, ParallelType::Used);
        Ok(Richards {
            mesh,
            comm,
            density: config.density,
            density_gravity: config.density * config.gravity,
            atm_pressure: config.atm_pressure,
            initial_pressure: config.initial_pressure,
            initial_saturation: config.initial_saturation.clone(),
            schema,
            rel_perm,
            solver,
            newton_correction: config.newton_correction,
            wrm,
            upwind: Upwind::new(mesh, rel_perm, config.upwind_tolerance)?,
            bcs: FlowBcs::new(mesh, &config.boundary_conditions)?,
            bc: BcData::new_scalar(EntityKind::Face, nface_used),
            porosity,
            preconditioners: config.preconditioners.clone(),
            linear_solvers: config.linear_solvers.clone(),
            phases,
            matrix,
            precon,
            error_control: ErrorControl::PRESSURE,
            residual_max: 0.0,
            residual_cell: 0,
            state: RichardsState::Uninitialized,
            time: 0.0,
            solution: CompositeVector::new(mesh, schema.dof_kinds()),
            darcy_flux: CompositeVector::new(mesh, &[EntityKind::Face]),
            reports: Vec::new(),
        })
    }

    /// Returns the current phase
    pub fn state(&self) -> RichardsState {
        self.state
    }

    /// Returns the current time
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Returns the pressure
    pub fn solution(&self) -> &CompositeVector {
        &self.solution
    }

    /// Returns the Darcy flux at faces
    pub fn darcy_flux(&self) -> &CompositeVector {
        &self.darcy_flux
    }

    /// Returns the water retention models
    pub fn wrm(&self) -> &WrmPartition {
        &self.wrm
    }

    /// Returns the summaries of the completed phases
    pub fn reports(&self) -> &[PhaseReport] {
        &self.reports
    }

    /// Returns the largest scaled residual of the last evaluation and its cell
    pub fn residual_max(&self) -> (f64, usize) {
        (self.residual_max, self.residual_cell)
    }

    /// Computes the saturation of the owned cells
    pub fn saturation(&self) -> Result<Vec<f64>, StrError> {
        cell_saturation(&self.wrm, self.solution.cell(), self.atm_pressure)
    }

    /// Sets the initial pressure from the uniform value and the initial saturations
    ///
    /// Face pressures are the averages of the neighbor cells.
    pub fn initialize_pressure(&mut self) -> Result<(), StrError> {
        let p0 = self.initial_pressure;
        self.solution.put_scalar(p0);
        for (region, s) in &self.initial_saturation {
            let ncell = self.solution.num_owned(EntityKind::Cell);
            for c in self.mesh.region_entities(region, EntityKind::Cell)? {
                if c < ncell {
                    self.solution.cell_mut()[c] = pressure_from_saturation(&self.wrm, c, *s, self.atm_pressure)?;
                }
            }
        }
        if self.schema == Schema::CellFace {
            let ug = self.solution.scatter_to_ghosted(self.comm);
            let nface = self.solution.num_owned(EntityKind::Face);
            let faces: Vec<_> = (0..nface)
                .map(|f| {
                    let cells = self.mesh.face_cells(f);
                    cells.iter().fold(0.0, |acc, c| acc + ug.cell()[*c]) / (cells.len() as f64)
                })
                .collect();
            drop(ug);
            self.solution.face_mut().copy_from_slice(&faces);
        }
        self.state = RichardsState::Uninitialized;
        Ok(())
    }

    /// Runs all configured phases
    pub fn run(&mut self) -> Result<(), StrError> {
        self.initialize_pressure()?;
        let states = [
            RichardsState::InitialGuess,
            RichardsState::SteadyState,
            RichardsState::Transient,
        ];
        for (i, state) in states.iter().enumerate() {
            if let Some(specs) = self.phases[i].clone() {
                self.state = *state;
                self.advance_phase(&specs)?;
            }
        }
        self.state = RichardsState::Done;
        Ok(())
    }

    /// Integrates one phase from `t_start` to `t_end`
    fn advance_phase(&mut self, specs: &TiSpecs) -> Result<(), StrError> {
        log::info!(
            "{:?} phase: t = {:?} → {:?} with {:?}",
            self.state,
            specs.t_start,
            specs.t_end,
            specs.method
        );
        self.error_control = specs.error_control;
        let param = self.preconditioners.get(&specs.preconditioner).copied().ok_or_else(|| {
            log::error!("preconditioner \"{}\" is not defined", specs.preconditioner);
            "preconditioner is not defined"
        })?;
        self.precon.set_preconditioner(allocate_preconditioner(param)?);

        let mut u = self.solution.clone();
        if specs.initialize_with_darcy {
            self.initialize_with_darcy(specs, &mut u)?;
        }
        self.update_darcy_flux(&u)?;

        // prime the preconditioner with the first time step; the first iteration reuses it
        let comm = self.comm;
        let mut bdf = Bdf2::new(specs, self.solver, comm)?;
        let dt_first = if specs.t_end > specs.t_start {
            f64::min(specs.dt_initial, specs.t_end - specs.t_start)
        } else {
            INITIAL_PRECON_DT
        };
        self.update_precon(specs.t_start, &u, dt_first)?;
        bdf.set_primed_precon(dt_first);
        let mut t = specs.t_start;
        let mut dt = specs.dt_initial;
        let mut steps = 0;
        let eps = 1e-12 * f64::max(1.0, f64::abs(specs.t_end));
        while specs.t_end - t > eps && steps < specs.max_steps {
            let dt_try = f64::min(dt, specs.t_end - t);
            let (used, next) = bdf.step(self, t, dt_try, &mut u)?;
            t += used;
            dt = next;
            steps += 1;
            self.time = t;
            self.update_darcy_flux(&u)?;
            log::debug!("{:?} step {}: t = {:?}, next Δt = {:?}", self.state, steps, t, dt);
        }
        if specs.t_end - t > eps {
            log::warn!("{:?} phase stopped at t = {:?} after {} steps", self.state, t, steps);
        }
        self.solution = u;
        self.time = t;
        let stats = bdf.stats;
        log::info!(
            "{:?} phase done: {} steps ({} failed), {} nonlinear iterations, Δt ∈ [{:?}, {:?}]",
            self.state,
            stats.steps,
            stats.failed_steps,
            stats.nonlinear_iterations,
            stats.dt_min,
            stats.dt_max
        );
        self.reports.push(PhaseReport {
            state: self.state,
            time: t,
            stats,
        });
        Ok(())
    }

    /// Solves the steady saturated (kr = 1) Darcy problem to initialize the pressure
    fn initialize_with_darcy(&mut self, specs: &TiSpecs, u: &mut CompositeVector) -> Result<(), StrError> {
        let param = self.linear_solvers.get(&specs.linear_solver).cloned().ok_or_else(|| {
            log::error!("linear solver \"{}\" is not defined", specs.linear_solver);
            "linear solver is not defined"
        })?;
        let precon = self.preconditioners.get(&param.preconditioner).copied().ok_or_else(|| {
            log::error!("preconditioner \"{}\" is not defined", param.preconditioner);
            "preconditioner is not defined"
        })?;
        let pcg = LinearSolverPcg::new(param.max_iterations, param.tolerance)?;

        self.update_bcs(u)?;
        let ncell = self.mesh.num_entities(EntityKind::Cell, ParallelType::Used);
        let nface = self.mesh.num_entities(EntityKind::Face, ParallelType::Used);
        self.matrix.set_coefficient(Some(NonlinearCoefficient::unit(ncell, nface)))?;
        self.matrix.reset_rhs_and_diagonal();
        self.matrix.update_matrices(None)?;
        self.matrix.add_gravity_terms(self.density_gravity)?;
        self.matrix.apply_bcs(&self.bc, true, true)?;
        self.matrix.set_preconditioner(allocate_preconditioner(precon)?);
        self.matrix.init_preconditioner(&self.bc)?;

        let rhs = self.matrix.rhs().clone();
        let stats = pcg.solve(&mut self.matrix, &rhs, u, self.comm)?;
        log::info!(
            "Darcy initialization: {} PCG iterations, residual = {:.3e} (initial = {:.3e})",
            stats.iterations,
            stats.residual,
            stats.initial_residual
        );
        Ok(())
    }

    /// Returns the pressure at the (used) faces
    ///
    /// With the cell schema, the pressure of the first neighbor cell is used.
    fn face_pressure(&self, u: &CompositeVector) -> Vec<f64> {
        let ug = u.scatter_to_ghosted(self.comm);
        if self.schema == Schema::CellFace {
            return ug.face().to_vec();
        }
        let nface = self.mesh.num_entities(EntityKind::Face, ParallelType::Used);
        (0..nface).map(|f| ug.cell()[self.mesh.face_cells(f)[0]]).collect()
    }

    /// Computes the operator boundary data at the given state
    fn update_bcs(&mut self, u: &CompositeVector) -> Result<(), StrError> {
        let face_pressure = self.face_pressure(u);
        self.bcs.compute(
            self.mesh,
            &face_pressure,
            self.atm_pressure,
            self.density_gravity,
            &mut self.bc,
        )
    }

    /// Computes the relative permeability coefficient at the given state
    ///
    /// The boundary data must be up to date.
    fn coefficient(&self, u: &CompositeVector) -> Result<NonlinearCoefficient, StrError> {
        let ug = u.scatter_to_ghosted(self.comm);
        let krel = CellRelPerm::new(&self.wrm, ug.cell(), self.atm_pressure)?;
        let nface = self.mesh.num_entities(EntityKind::Face, ParallelType::Used);
        if self.rel_perm == RelPermMethod::CellCentered {
            return Ok(NonlinearCoefficient::cell_centered(&krel.values, nface));
        }
        let flux = self.darcy_flux.scatter_to_ghosted(self.comm);
        let choices = self.upwind.choices(Some(flux.face()), &self.bc, self.comm)?;
        let wrm = &self.wrm;
        let atm_pressure = self.atm_pressure;
        NonlinearCoefficient::upwinded(&choices, &krel.values, &krel.derivatives, |c, p| {
            let model = wrm.model(c)?;
            let pc = atm_pressure - p;
            Ok((model.k_relative(pc), -model.dk_relative_dpc(pc)))
        })
    }

    /// Computes the stiffness matrices and right-hand side of the residual operator
    fn update_matrix(&mut self, u: &CompositeVector) -> Result<(), StrError> {
        self.update_bcs(u)?;
        let coefficient = self.coefficient(u)?;
        self.matrix.set_coefficient(Some(coefficient))?;
        self.matrix.reset_rhs_and_diagonal();
        self.matrix.update_matrices(None)?;
        self.matrix.add_gravity_terms(self.density_gravity)?;
        self.matrix.apply_bcs(&self.bc, true, true)
    }

    /// Reconstructs the Darcy flux at the given state (mixed schema only)
    fn update_darcy_flux(&mut self, u: &CompositeVector) -> Result<(), StrError> {
        if self.schema != Schema::CellFace {
            return Ok(());
        }
        self.update_matrix(u)?;
        self.matrix.update_flux(u, &mut self.darcy_flux, self.density_gravity)
    }
}

impl<'a> BdfFunction for Richards<'a> {
    /// Computes `f = A u - g + (S(u) - S(u - udot Δt)) ρφV/Δt`
    fn fun(
        &mut self,
        _t: f64,
        u: &CompositeVector,
        udot: &CompositeVector,
        f: &mut CompositeVector,
        dt: f64,
    ) -> Result<(), StrError> {
        self.update_matrix(u)?;
        self.matrix.compute_negative_residual(u, f)?;

        let uc = u.cell();
        let udot_c = udot.cell();
        let fc = f.cell_mut();
        self.residual_max = 0.0;
        self.residual_cell = 0;
        for i in 0..self.wrm.len() {
            let model = self.wrm.model_at(i);
            for c in self.wrm.cells(i) {
                let c = *c;
                let v = uc[c] - udot_c[c] * dt;
                let s1 = model.saturation(self.atm_pressure - uc[c]);
                let s2 = model.saturation(self.atm_pressure - v);
                let factor = self.density * self.porosity[c] * self.mesh.cell_volume(c) / dt;
                fc[c] += (s1 - s2) * factor;
                let scaled = f64::abs(fc[c]) / factor;
                if scaled > self.residual_max {
                    self.residual_max = scaled;
                    self.residual_cell = c;
                }
            }
        }
        Ok(())
    }

    fn precon(&mut self, f: &CompositeVector, pf: &mut CompositeVector) -> Result<(), StrError> {
        self.precon.apply_inverse(f, pf)
    }

    /// Computes the stiffness matrices plus the storage derivative `ρφV/Δt dS/dp` and
    /// updates the preconditioner
    fn update_precon(&mut self, _t: f64, u: &CompositeVector, dt: f64) -> Result<i32, StrError> {
        self.update_bcs(u)?;
        let coefficient = self.coefficient(u)?;
        self.precon.set_coefficient(Some(coefficient))?;
        self.precon.reset_rhs_and_diagonal();
        if self.newton_correction && self.schema == Schema::CellFace {
            let flux = self.darcy_flux.scatter_to_ghosted(self.comm);
            self.precon.update_matrices(Some(flux.face()))?;
        } else {
            self.precon.update_matrices(None)?;
        }

        let uc = u.cell();
        let mut accumulation = vec![0.0; uc.len()];
        for i in 0..self.wrm.len() {
            let model = self.wrm.model_at(i);
            for c in self.wrm.cells(i) {
                let c = *c;
                let factor = self.density * self.porosity[c] * self.mesh.cell_volume(c) / dt;
                accumulation[c] = -model.dsaturation_dpc(self.atm_pressure - uc[c]) * factor;
            }
        }
        self.precon.add_accumulation(EntityKind::Cell, &accumulation)?;
        self.precon.apply_bcs(&self.bc, true, true)?;
        self.precon.init_preconditioner(&self.bc)?;
        Ok(0)
    }

    /// Returns the STOMP-like error norm
    ///
    /// ```text
    /// error_p = max |du_c| / (|u_c - p_atm| + p_atm)
    /// error_r = max |f_c| / (ρφV/Δt)
    /// ```
    fn enorm(&self, u: &CompositeVector, du: &CompositeVector) -> Result<f64, StrError> {
        let mut error_p = 0.0;
        let mut cell_p = 0;
        if self.error_control.contains(ErrorControl::PRESSURE) {
            let uc = u.cell();
            for (c, d) in du.cell().iter().enumerate() {
                let value = f64::abs(*d) / (f64::abs(uc[c] - self.atm_pressure) + self.atm_pressure);
                if value > error_p {
                    error_p = value;
                    cell_p = c;
                }
            }
        }
        let error_r = if self.error_control.contains(ErrorControl::RESIDUAL) {
            self.residual_max
        } else {
            0.0
        };
        let error = self.comm.global_max(f64::max(error_p, error_r));
        log::trace!(
            "residual = {:.3e} at cell {}; pressure error = {:.3e} at cell {}",
            self.residual_max,
            self.residual_cell,
            error_p,
            cell_p
        );
        Ok(error)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
