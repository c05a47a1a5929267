use pmflow::base::DEFAULT_OUT_DIR;
use pmflow::models::{krel_pc_curves, krel_sat_curves};
use pmflow::prelude::*;
use pmflow::StrError;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use structopt::StructOpt;

/// Command line options
#[derive(StructOpt, Debug)]
#[structopt(
    name = "pmflow",
    about = "Solves the Richards equation on a box mesh and writes the results as JSON"
)]
struct Options {
    /// Configuration file (JSON)
    config: String,

    /// Width of the box (along x)
    #[structopt(long, default_value = "1.0")]
    width: f64,

    /// Height of the box (along the last axis)
    #[structopt(long, default_value = "1.0")]
    height: f64,

    /// Number of divisions along x
    #[structopt(long, default_value = "1")]
    nx: usize,

    /// Number of divisions along the last axis
    #[structopt(long, default_value = "10")]
    nz: usize,

    /// Output directory (default: /tmp/pmflow/results)
    #[structopt(long)]
    out_dir: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[structopt(long, default_value = "info")]
    log_level: String,

    /// Increment of the capillary pressure in the krel tables
    #[structopt(long, default_value = "1000.0")]
    pc_step: f64,
}

/// Holds the results written to the output directory
#[derive(Serialize)]
struct Results {
    time: f64,
    centroids: Vec<Vec<f64>>,
    pressure: Vec<f64>,
    saturation: Vec<f64>,
    darcy_flux: Vec<f64>,
}

fn main() -> Result<(), StrError> {
    // parse options
    let options = Options::from_args();
    let level = options
        .log_level
        .parse::<log::LevelFilter>()
        .map_err(|_| "log level must be error, warn, info, debug, or trace")?;
    env_logger::Builder::new().filter_level(level).init();
    let config = Config::read_json(&options.config)?;
    log::info!("{}", config);

    // mesh
    let mesh = MeshBox::new(
        &[0.0, 0.0],
        &[options.width, options.height],
        &[options.nx, options.nz],
    )?;
    let comm = SerialComm::new();

    // run
    let mut flow = Richards::new(&mesh, &comm, &config)?;
    flow.run()?;
    for report in flow.reports() {
        println!(
            "{:?}: t = {:?}, {} steps, {} failed, {} nonlinear iterations",
            report.state, report.time, report.stats.steps, report.stats.failed_steps, report.stats.nonlinear_iterations
        );
    }

    // results
    let out_dir = options.out_dir.as_deref().unwrap_or(DEFAULT_OUT_DIR);
    fs::create_dir_all(out_dir).map_err(|_| "cannot create output directory")?;
    let ncell = flow.solution().num_owned(EntityKind::Cell);
    let results = Results {
        time: flow.time(),
        centroids: (0..ncell).map(|c| mesh.cell_centroid(c).to_vec()).collect(),
        pressure: flow.solution().cell().to_vec(),
        saturation: flow.saturation()?,
        darcy_flux: flow.darcy_flux().face().to_vec(),
    };
    let path = Path::new(out_dir).join("pmflow.json");
    let file = File::create(&path).map_err(|_| "cannot create results file")?;
    serde_json::to_writer_pretty(BufWriter::new(file), &results).map_err(|_| "cannot write results file")?;

    // relative permeability tables
    let pc_end = 100.0 * options.pc_step;
    write_table(
        &Path::new(out_dir).join("krel_pc.dat"),
        &krel_pc_curves(flow.wrm(), 0.0, options.pc_step, pc_end)?,
    )?;
    write_table(
        &Path::new(out_dir).join("krel_sat.dat"),
        &krel_sat_curves(flow.wrm(), 0.0, 0.01, 1.0 + 1e-12)?,
    )?;
    println!("results written to {}", out_dir);
    Ok(())
}

/// Writes a table with one row per line
fn write_table(path: &Path, table: &[Vec<f64>]) -> Result<(), StrError> {
    let file = File::create(path).map_err(|_| "cannot create table file")?;
    let mut buffer = BufWriter::new(file);
    for row in table {
        let line: Vec<_> = row.iter().map(|x| format!("{:>13.6e}", x)).collect();
        writeln!(buffer, "{}", line.join(" ")).map_err(|_| "cannot write table file")?;
    }
    buffer.flush().map_err(|_| "cannot flush table file")?;
    Ok(())
}
