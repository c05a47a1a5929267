use super::{Nka, TimestepController};
use crate::base::{NonlinearSolver, TiMethod, TiSpecs};
use crate::linalg::{Communicator, CompositeVector};
use crate::StrError;

/// Defines the nonlinear problem solved at each time step
///
/// The time integrator replaces `du/dt` by `udot = (u - ũ)/Δt_eff`, where `ũ` gathers the
/// history terms of the BDF formula, and drives `f(t, u, udot) = 0`.
pub trait BdfFunction {
    /// Computes the residual `f(t, u, udot)`; `dt` is the effective time step
    fn fun(
        &mut self,
        t: f64,
        u: &CompositeVector,
        udot: &CompositeVector,
        f: &mut CompositeVector,
        dt: f64,
    ) -> Result<(), StrError>;

    /// Applies the preconditioner to the residual
    fn precon(&mut self, f: &CompositeVector, pf: &mut CompositeVector) -> Result<(), StrError>;

    /// Updates the preconditioner at the given state and returns an error code (zero means success)
    fn update_precon(&mut self, t: f64, u: &CompositeVector, dt: f64) -> Result<i32, StrError>;

    /// Returns the error norm of the correction `du`; values below one mean convergence
    fn enorm(&self, u: &CompositeVector, du: &CompositeVector) -> Result<f64, StrError>;
}

/// Holds the statistics of the time integration
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bdf2Stats {
    /// Number of converged steps
    pub steps: usize,

    /// Number of failed (retried) steps
    pub failed_steps: usize,

    /// Total number of nonlinear iterations of the converged steps
    pub nonlinear_iterations: usize,

    /// Number of preconditioner updates
    pub precon_updates: usize,

    /// Smallest time step of the converged steps
    pub dt_min: f64,

    /// Largest time step of the converged steps
    pub dt_max: f64,
}

/// Implements the variable-step BDF2 (and BDF1) time integrator
///
/// With `ω = Δt/Δt_prev`, the BDF2 formula reads
///
/// ```text
/// ũ = ((1+ω)² uₙ - ω² uₙ₋₁) / (1+2ω)
/// Δt_eff = Δt (1+ω) / (1+2ω)
/// ```
///
/// The first step of a phase uses BDF1 (`ũ = uₙ`, `Δt_eff = Δt`). The nonlinear system is
/// solved by a preconditioned fixed-point iteration, optionally accelerated by NKA.
pub struct Bdf2<'a> {
    /// Communicator
    comm: &'a dyn Communicator,

    /// Integration formula
    method: TiMethod,

    /// Nonlinear solver
    solver: NonlinearSolver,

    /// Tolerance on the error norm
    tolerance: f64,

    /// Max number of nonlinear iterations per step
    max_iterations: usize,

    /// Time step selection
    controller: TimestepController,

    /// Nonlinear accelerator
    nka: Nka,

    /// Previous state and time step
    history: Option<(CompositeVector, f64)>,

    /// Effective time step of a preconditioner already computed at the initial state
    primed: Option<f64>,

    /// Statistics
    pub stats: Bdf2Stats,
}

impl<'a> Bdf2<'a> {
    /// Allocates a new instance
    pub fn new(specs: &TiSpecs, solver: NonlinearSolver, comm: &'a dyn Communicator) -> Result<Self, StrError> {
        Ok(Bdf2 {
            comm,
            method: specs.method,
            solver,
            tolerance: specs.error_tolerance,
            max_iterations: specs.max_iterations,
            controller: TimestepController::new(specs),
            nka: Nka::new(specs.nka_max_vectors, specs.nka_vector_tolerance)?,
            history: None,
            primed: None,
            stats: Bdf2Stats::default(),
        })
    }

    /// Discards the history so that the next step starts with BDF1
    pub fn reset_history(&mut self) {
        self.history = None;
        self.nka.restart();
    }

    /// Tells that the preconditioner is up to date at the current state for the time step `dt`
    ///
    /// The first iteration of the next attempt skips the preconditioner update if the attempt
    /// starts from that state (no history) with the same effective time step.
    pub fn set_primed_precon(&mut self, dt: f64) {
        self.primed = Some(dt);
    }

    /// Advances the state by one step, retrying with smaller time steps on failure
    ///
    /// Returns `(dt_used, dt_next)`.
    pub fn step(
        &mut self,
        fun: &mut dyn BdfFunction,
        t: f64,
        dt: f64,
        u: &mut CompositeVector,
    ) -> Result<(f64, f64), StrError> {
        let mut h = dt;
        loop {
            match self.attempt(fun, t, h, u)? {
                Some((u_new, iterations)) => {
                    let u_old = std::mem::replace(u, u_new);
                    self.history = Some((u_old, h));
                    self.stats.steps += 1;
                    self.stats.nonlinear_iterations += iterations;
                    if self.stats.steps == 1 {
                        self.stats.dt_min = h;
                        self.stats.dt_max = h;
                    } else {
                        self.stats.dt_min = f64::min(self.stats.dt_min, h);
                        self.stats.dt_max = f64::max(self.stats.dt_max, h);
                    }
                    let next = self.controller.next_dt(h, iterations);
                    log::debug!("step at t = {:?} converged in {} iterations (Δt = {:?})", t + h, iterations, h);
                    return Ok((h, next));
                }
                None => {
                    self.stats.failed_steps += 1;
                    log::info!("step at t = {:?} failed with Δt = {:?}; reducing Δt", t + h, h);
                    h = self.controller.reduced_dt(h)?;
                }
            }
        }
    }

    /// Attempts one step; returns None if the nonlinear iteration does not converge
    fn attempt(
        &mut self,
        fun: &mut dyn BdfFunction,
        t: f64,
        h: f64,
        u_n: &CompositeVector,
    ) -> Result<Option<(CompositeVector, usize)>, StrError> {
        // history terms and predictor
        let mut u = u_n.clone();
        let mut u_tilde = u_n.clone();
        let mut h_eff = h;
        if let Some((u_prev, h_prev)) = &self.history {
            let omega = h / h_prev;
            if self.method == TiMethod::Bdf2 {
                let den = 1.0 + 2.0 * omega;
                u_tilde.update(-omega * omega / den, u_prev, (1.0 + omega) * (1.0 + omega) / den)?;
                h_eff = h * (1.0 + omega) / den;
            }
            u.update(-omega, u_prev, 1.0 + omega)?;
        }

        let t_new = t + h;
        let mut f = u.clone();
        let mut udot = u.clone();
        let mut du = u.clone();
        let primed = self.primed.take();
        let mut reuse = self.history.is_none() && primed == Some(h_eff);
        if reuse {
            log::trace!("reusing the primed preconditioner (Δt = {:?})", h_eff);
        }
        if self.solver == NonlinearSolver::Nka {
            if !reuse {
                self.update_precon(fun, t_new, &u, h_eff)?;
            }
            self.nka.restart();
        }
        for iter in 1..=self.max_iterations {
            if self.solver != NonlinearSolver::Nka && !std::mem::take(&mut reuse) {
                self.update_precon(fun, t_new, &u, h_eff)?;
            }
            udot.copy_from(&u)?;
            udot.update(-1.0 / h_eff, &u_tilde, 1.0 / h_eff)?;
            fun.fun(t_new, &u, &udot, &mut f, h_eff)?;
            fun.precon(&f, &mut du)?;
            if self.solver == NonlinearSolver::Nka {
                du = self.nka.correction(&du, self.comm)?;
            }
            u.update(-1.0, &du, 1.0)?;
            let error = fun.enorm(&u, &du)?;
            log::trace!("iteration {}: error = {:.6e}", iter, error);
            if !error.is_finite() {
                return Ok(None);
            }
            if error < self.tolerance {
                return Ok(Some((u, iter)));
            }
        }
        Ok(None)
    }

    /// Updates the preconditioner and checks the returned code
    fn update_precon(&mut self, fun: &mut dyn BdfFunction, t: f64, u: &CompositeVector, dt: f64) -> Result<(), StrError> {
        let code = fun.update_precon(t, u, dt)?;
        self.stats.precon_updates += 1;
        if code != 0 {
            log::error!("preconditioner update failed with code {}", code);
            return Err("preconditioner update failed");
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{Bdf2, BdfFunction};
    use crate::base::{EntityKind, NonlinearSolver, ParamTimeIntegrator, TiSpecs};
    use crate::linalg::{CompositeVector, SerialComm};
    use crate::StrError;

    /// du/dt = -u written as f = udot + u
    struct Decay {
        dt: f64,
        converge: bool,
    }

    impl BdfFunction for Decay {
        fn fun(
            &mut self,
            _t: f64,
            u: &CompositeVector,
            udot: &CompositeVector,
            f: &mut CompositeVector,
            _dt: f64,
        ) -> Result<(), StrError> {
            f.cell_mut()[0] = udot.cell()[0] + u.cell()[0];
            Ok(())
        }

        fn precon(&mut self, f: &CompositeVector, pf: &mut CompositeVector) -> Result<(), StrError> {
            pf.cell_mut()[0] = f.cell()[0] / (1.0 / self.dt + 1.0);
            Ok(())
        }

        fn update_precon(&mut self, _t: f64, _u: &CompositeVector, dt: f64) -> Result<i32, StrError> {
            self.dt = dt;
            Ok(0)
        }

        fn enorm(&self, _u: &CompositeVector, du: &CompositeVector) -> Result<f64, StrError> {
            if self.converge {
                Ok(f64::abs(du.cell()[0]) * 1e4)
            } else {
                Ok(f64::INFINITY)
            }
        }
    }

    fn integrate(method: &str, solver: NonlinearSolver) -> (f64, usize) {
        let mut param = ParamTimeIntegrator::default();
        param.method = method.to_string();
        let specs = TiSpecs::new(&param).unwrap();
        let comm = SerialComm::new();
        let mut bdf = Bdf2::new(&specs, solver, &comm).unwrap();
        let mut fun = Decay {
            dt: 1.0,
            converge: true,
        };
        let mut u = CompositeVector::from_sizes(&[(EntityKind::Cell, 1, 1)]);
        u.cell_mut()[0] = 1.0;
        let mut t = 0.0;
        let dt = 0.01;
        for _ in 0..100 {
            let (used, next) = bdf.step(&mut fun, t, dt, &mut u).unwrap();
            assert_eq!(used, dt);
            assert_eq!(next, dt);
            t += used;
        }
        assert_eq!(bdf.stats.steps, 100);
        assert_eq!(bdf.stats.failed_steps, 0);
        (u.cell()[0], bdf.stats.precon_updates)
    }

    #[test]
    fn bdf2_is_second_order() {
        let exact = f64::exp(-1.0);
        let (bdf1, _) = integrate("BDF1", NonlinearSolver::Newton);
        let (bdf2, _) = integrate("BDF2", NonlinearSolver::Newton);
        let e1 = f64::abs(bdf1 - exact);
        let e2 = f64::abs(bdf2 - exact);
        assert!(e1 > 1e-3 && e1 < 3e-3);
        assert!(e2 < 1e-4);
    }

    #[test]
    fn nka_updates_the_preconditioner_once_per_step() {
        let (value, updates) = integrate("BDF2", NonlinearSolver::Nka);
        assert!(f64::abs(value - f64::exp(-1.0)) < 1e-4);
        assert_eq!(updates, 100);
        let (_, updates) = integrate("BDF2", NonlinearSolver::PicardNewton);
        assert!(updates > 100);
    }

    fn first_step(solver: NonlinearSolver, primed: Option<f64>) -> (f64, usize, usize) {
        let specs = TiSpecs::new(&ParamTimeIntegrator::default()).unwrap();
        let comm = SerialComm::new();
        let mut bdf = Bdf2::new(&specs, solver, &comm).unwrap();
        let mut fun = Decay {
            dt: 1.0,
            converge: true,
        };
        let mut u = CompositeVector::from_sizes(&[(EntityKind::Cell, 1, 1)]);
        u.cell_mut()[0] = 1.0;
        if let Some(dt) = primed {
            fun.update_precon(0.0, &u, dt).unwrap();
            bdf.set_primed_precon(dt);
        }
        bdf.step(&mut fun, 0.0, 0.01, &mut u).unwrap();
        (u.cell()[0], bdf.stats.precon_updates, bdf.stats.nonlinear_iterations)
    }

    #[test]
    fn primed_preconditioner_is_reused_by_the_first_iteration() {
        for solver in [NonlinearSolver::Newton, NonlinearSolver::Nka] {
            let (plain, plain_updates, plain_iterations) = first_step(solver, None);
            let (reused, reused_updates, reused_iterations) = first_step(solver, Some(0.01));
            assert_eq!(reused, plain);
            assert_eq!(reused_iterations, plain_iterations);
            assert_eq!(reused_updates, plain_updates - 1);

            // a different time step is not reused
            let (_, updates, _) = first_step(solver, Some(1e-3));
            assert_eq!(updates, plain_updates);
        }
    }

    #[test]
    fn step_fails_below_dt_min() {
        let mut param = ParamTimeIntegrator::default();
        param.dt_min = 0.5;
        param.max_iterations = 2;
        let specs = TiSpecs::new(&param).unwrap();
        let comm = SerialComm::new();
        let mut bdf = Bdf2::new(&specs, NonlinearSolver::Newton, &comm).unwrap();
        let mut fun = Decay {
            dt: 1.0,
            converge: false,
        };
        let mut u = CompositeVector::from_sizes(&[(EntityKind::Cell, 1, 1)]);
        assert_eq!(
            bdf.step(&mut fun, 0.0, 1.0, &mut u).err(),
            Some("Δt is smaller than the allowed minimum")
        );
        // 1.0 → 0.8 → 0.64 → 0.512 → (0.4096 < 0.5)
        assert_eq!(bdf.stats.failed_steps, 4);
    }
}
