use pmflow::base::{ParamPermeability, ParamWrmModel};
use pmflow::prelude::*;
use pmflow::StrError;
use russell_lab::approx_eq;

fn column_config() -> Result<Config, StrError> {
    let mut config = Config::new();
    config
        .add_water_retention(ParamWrm {
            region: "All".to_string(),
            model: ParamWrmModel::VanGenuchten {
                alpha: 2e-4,
                m: 0.5,
                sr: 0.1,
            },
        })?
        .add_medium(ParamMedium {
            region: "All".to_string(),
            porosity: 0.25,
            permeability: ParamPermeability {
                kx: 1e-12,
                ky: 1e-12,
                kz: 1e-12,
            },
        })?;
    Ok(config)
}

#[test]
fn test_column_hydrostatic() -> Result<(), StrError> {
    // 10 m column with the water table at 5 m
    let mesh = MeshBox::new(&[0.0, 0.0], &[1.0, 10.0], &[1, 10])?;
    let comm = SerialComm::new();
    let mut config = column_config()?;
    config.add_boundary_condition(ParamBc {
        regions: vec!["ymin".to_string()],
        kind: ParamBcKind::StaticHead(5.0),
    })?;
    let mut initial = ParamTimeIntegrator::default();
    initial.method = "BDF1".to_string();
    initial.initialize_with_darcy = true;
    initial.t_end = 1e3;
    initial.dt_initial = 1e3;
    config.set_initial_guess(initial)?;
    let mut steady = ParamTimeIntegrator::default();
    steady.t_start = 1e3;
    steady.t_end = 1e5;
    steady.dt_initial = 1e4;
    config.set_steady_state(steady)?;

    // run
    let mut flow = Richards::new(&mesh, &comm, &config)?;
    flow.run()?;
    assert_eq!(flow.reports().len(), 2);
    assert_eq!(flow.reports()[0].state, RichardsState::InitialGuess);
    assert_eq!(flow.reports()[1].state, RichardsState::SteadyState);
    approx_eq(flow.time(), 1e5, 1e-6);

    // hydrostatic pressure
    let rho_g = config.density * config.gravity;
    let p = flow.solution().cell();
    for c in 0..p.len() {
        let z = mesh.cell_centroid(c)[1];
        let correct = config.atm_pressure + rho_g * (5.0 - z);
        approx_eq(p[c] / config.atm_pressure, correct / config.atm_pressure, 1e-8);
    }

    // saturated below the water table only
    let s = flow.saturation()?;
    for c in 0..s.len() {
        let z = mesh.cell_centroid(c)[1];
        if z < 5.0 {
            assert_eq!(s[c], 1.0);
        } else {
            assert!(s[c] < 1.0 && s[c] > 0.1);
        }
    }

    // no flow
    let scale = 1e-12 * config.density / config.viscosity * rho_g;
    for q in flow.darcy_flux().face() {
        assert!(f64::abs(*q) < 1e-6 * scale);
    }
    Ok(())
}

#[test]
fn test_column_hydrostatic_cell_schema() -> Result<(), StrError> {
    // two-point fluxes with cell-centered relative permeability
    let mesh = MeshBox::new(&[0.0, 0.0], &[1.0, 10.0], &[1, 10])?;
    let comm = SerialComm::new();
    let mut config = column_config()?;
    config.schema = vec!["cell".to_string()];
    config.relative_permeability = "cell centered".to_string();
    config.add_boundary_condition(ParamBc {
        regions: vec!["ymin".to_string()],
        kind: ParamBcKind::StaticHead(5.0),
    })?;
    let mut initial = ParamTimeIntegrator::default();
    initial.method = "BDF1".to_string();
    initial.initialize_with_darcy = true;
    initial.t_end = 1e3;
    initial.dt_initial = 1e3;
    config.set_initial_guess(initial)?;
    let mut steady = ParamTimeIntegrator::default();
    steady.t_start = 1e3;
    steady.t_end = 1e5;
    steady.dt_initial = 1e4;
    config.set_steady_state(steady)?;

    // run
    let mut flow = Richards::new(&mesh, &comm, &config)?;
    flow.run()?;
    assert_eq!(flow.reports().len(), 2);
    assert_eq!(flow.solution().face().len(), 0);
    for report in flow.reports() {
        assert_eq!(report.stats.failed_steps, 0);
    }

    // hydrostatic pressure
    let rho_g = config.density * config.gravity;
    let p = flow.solution().cell();
    for c in 0..p.len() {
        let z = mesh.cell_centroid(c)[1];
        let correct = config.atm_pressure + rho_g * (5.0 - z);
        approx_eq(p[c] / config.atm_pressure, correct / config.atm_pressure, 1e-8);
    }

    // saturated below the water table only
    let s = flow.saturation()?;
    for c in 0..s.len() {
        let z = mesh.cell_centroid(c)[1];
        if z < 5.0 {
            assert_eq!(s[c], 1.0);
        } else {
            assert!(s[c] < 1.0 && s[c] > 0.1);
        }
    }
    Ok(())
}

#[test]
fn test_column_infiltration() -> Result<(), StrError> {
    let mesh = MeshBox::new(&[0.0, 0.0], &[1.0, 10.0], &[1, 10])?;
    let comm = SerialComm::new();
    let mut config = column_config()?;
    config
        .set_initial_saturation("All", 0.5)?
        .add_boundary_condition(ParamBc {
            regions: vec!["ymin".to_string()],
            kind: ParamBcKind::StaticHead(0.0),
        })?
        .add_boundary_condition(ParamBc {
            regions: vec!["ymax".to_string()],
            kind: ParamBcKind::MassFlux(-1e-3),
        })?;
    let mut transient = ParamTimeIntegrator::default();
    transient.dt_method = "adaptive".to_string();
    transient.t_end = 1e4;
    transient.dt_initial = 10.0;
    transient.dt_max = 1e3;
    config.set_transient(transient)?;

    // run
    let mut flow = Richards::new(&mesh, &comm, &config)?;
    flow.initialize_pressure()?;
    let s_ini = flow.saturation()?;
    let top = s_ini.len() - 1;
    approx_eq(s_ini[top], 0.5, 1e-10);
    flow.run()?;
    assert_eq!(flow.state(), RichardsState::Done);
    approx_eq(flow.time(), 1e4, 1e-6);

    // water enters the top of the column
    let s = flow.saturation()?;
    assert!(s[top] > s_ini[top]);
    let stats = &flow.reports()[0].stats;
    assert!(stats.steps > 10);
    assert!(stats.dt_max > 10.0);
    Ok(())
}
