use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{info, warn};
use tracing_subscriber::{Layer, filter::LevelFilter, fmt, layer::SubscriberExt};

use crate::{
    disc::mesh::{mesh2d::Mesh2d, raw::RawMesh},
    io::{
        IoError, IoResult, gmsh, param_parser::RunConfig, write_to_csv::write_series,
        write_to_vtu::{VtuSnapshotWriter, write_field},
    },
    solver::{NoopObserver, Simulation, StepObserver},
};

pub const SERIES_FILE: &str = "fishing_ground.csv";
pub const FIELD_FILE: &str = "field.vtu";
pub const SNAPSHOT_DIR: &str = "snapshots";

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub name: String,
    pub steps: usize,
    pub initial_fishing_ground_total: f64,
    pub final_fishing_ground_total: f64,
    pub peak_fishing_ground_total: f64,
    pub results_dir: PathBuf,
}

/// Sorted `*.json` files directly inside `folder`.
pub fn find_configs(folder: impl AsRef<Path>) -> IoResult<Vec<PathBuf>> {
    let folder = folder.as_ref();
    let entries = fs::read_dir(folder).map_err(|e| IoError::io(folder, e))?;
    let mut configs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| IoError::io(folder, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            configs.push(path);
        }
    }
    configs.sort();
    Ok(configs)
}

/// Creates `<results_root>/<config name>`; an existing folder is never reused.
pub fn initialize_results_dir(config: &RunConfig, results_root: &Path) -> IoResult<PathBuf> {
    let results_dir = results_root.join(config.name());
    if results_dir.exists() {
        return Err(IoError::ResultsExist(results_dir));
    }
    fs::create_dir_all(&results_dir).map_err(|e| IoError::io(&results_dir, e))?;
    Ok(results_dir)
}

pub fn initialize_mesh(config: &RunConfig) -> IoResult<RawMesh> {
    gmsh::load(config.mesh_path())
}

/// Loads the configuration, reads and links its mesh, then runs it, logging
/// everything at debug level to `<results>/<log_name>.log`. The results
/// folder is only created once the mesh is accepted, so a bad mesh leaves
/// nothing behind.
pub fn run_config(
    config_path: impl AsRef<Path>,
    results_root: impl AsRef<Path>,
) -> IoResult<RunSummary> {
    let config = RunConfig::parse(config_path)?;
    let raw = initialize_mesh(&config)?;
    let simulation = initialize_simulation(&config, &raw)?;
    let results_dir = initialize_results_dir(&config, results_root.as_ref())?;
    let log_path = results_dir.join(format!("{}.log", config.io.log_name));
    let log_file = File::create(&log_path).map_err(|e| IoError::io(&log_path, e))?;

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(Mutex::new(log_file))
                .with_ansi(false)
                .with_filter(LevelFilter::DEBUG),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(LevelFilter::WARN),
        );
    tracing::subscriber::with_default(subscriber, || {
        info!(
            config = %config.source.display(),
            nodes = simulation.mesh().nodes().len(),
            triangles = simulation.mesh().triangle_count(),
            segments = simulation.mesh().segment_count(),
            "starting run"
        );
        simulate(&config, simulation, &results_dir)
    })
}

/// Builds and links the mesh and checks it is fit for the solver.
pub fn initialize_simulation(config: &RunConfig, raw: &RawMesh) -> IoResult<Simulation> {
    let mesh = Mesh2d::build(raw)?;
    if !mesh.is_connected() {
        warn!("mesh is not connected");
    }
    Ok(Simulation::new(mesh, config.fishing_ground())?)
}

/// Runs `simulation` as configured, writing results into the existing
/// `results_dir`.
pub fn simulate(
    config: &RunConfig,
    mut simulation: Simulation,
    results_dir: &Path,
) -> IoResult<RunSummary> {
    let params = config.solver_parameters();
    let delta_t = params.delta_t();
    info!(
        n_steps = params.final_step,
        t_end = params.final_time,
        delta_t,
        mesh = %config.mesh_path().display(),
        borders = ?config.geometry.borders,
        write_frequency = ?config.io.write_frequency,
        "run parameters"
    );

    simulation.initial_conditions()?;

    match config.io.write_frequency {
        Some(write_frequency) => {
            let mut writer =
                VtuSnapshotWriter::new(results_dir.join(SNAPSHOT_DIR), write_frequency)?;
            run_steps(&mut simulation, params.final_step, delta_t, &mut writer)?;
            info!(snapshots = writer.written().len(), "snapshots written");
        }
        None => run_steps(&mut simulation, params.final_step, delta_t, &mut NoopObserver)?,
    }

    let series = simulation.fishing_ground_series();
    write_series(series, delta_t, results_dir.join(SERIES_FILE))?;
    write_field(simulation.mesh(), results_dir.join(FIELD_FILE))?;

    let initial = simulation.initial_fishing_ground_total().unwrap_or_default();
    let summary = RunSummary {
        name: config.name(),
        steps: series.len(),
        initial_fishing_ground_total: initial,
        final_fishing_ground_total: series.last().copied().unwrap_or(initial),
        peak_fishing_ground_total: series.iter().copied().fold(initial, f64::max),
        results_dir: results_dir.to_path_buf(),
    };
    info!(
        steps = summary.steps,
        final_total = summary.final_fishing_ground_total,
        peak_total = summary.peak_fishing_ground_total,
        "run finished"
    );
    Ok(summary)
}

fn run_steps<O: StepObserver>(
    simulation: &mut Simulation,
    steps: usize,
    delta_t: f64,
    observer: &mut O,
) -> IoResult<()> {
    simulation.solver_with_observer(steps, delta_t, observer)?;
    Ok(())
}
