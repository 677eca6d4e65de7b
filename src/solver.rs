use nalgebra::Vector2;
use ndarray::Array1;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::disc::{
    cell::{Cell, TriangleCell},
    flow_field::{initial_concentration, velocity_field},
    mesh::mesh2d::Mesh2d,
    riemann_solver::upwind_flux,
};
use crate::error::{ObserverError, SimError, SimResult};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverParameters {
    pub final_time: f64,
    pub final_step: usize,
}
impl SolverParameters {
    pub fn delta_t(&self) -> f64 {
        self.final_time / self.final_step as f64
    }
}

/// Axis-aligned region over which the field is integrated every step.
/// Bounds are inclusive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FishingGround {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}
impl FishingGround {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }
    pub fn from_borders(borders: [[f64; 2]; 2]) -> Self {
        Self::new(borders[0][0], borders[0][1], borders[1][0], borders[1][1])
    }
    pub fn contains(&self, point: &Vector2<f64>) -> bool {
        (self.x_min..=self.x_max).contains(&point[0]) && (self.y_min..=self.y_max).contains(&point[1])
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepReport {
    /// Zero-based index into the fishing ground series.
    pub step: usize,
    pub time: f64,
    pub fishing_ground_total: f64,
}

/// Receives every committed step. The mesh reflects the committed field.
pub trait StepObserver {
    fn on_step(&mut self, report: &StepReport, mesh: &Mesh2d) -> Result<(), ObserverError>;
}
impl<F> StepObserver for F
where
    F: FnMut(&StepReport, &Mesh2d) -> Result<(), ObserverError>,
{
    fn on_step(&mut self, report: &StepReport, mesh: &Mesh2d) -> Result<(), ObserverError> {
        self(report, mesh)
    }
}
pub struct NoopObserver;
impl StepObserver for NoopObserver {
    fn on_step(&mut self, _report: &StepReport, _mesh: &Mesh2d) -> Result<(), ObserverError> {
        Ok(())
    }
}

/// Explicit upwind finite-volume transport of the concentration field.
pub struct Simulation {
    mesh: Mesh2d,
    fishing_ground: FishingGround,
    oil_in_fishing_grounds: Vec<f64>,
    initial_total: Option<f64>,
    current_time: f64,
}
impl Simulation {
    /// Takes ownership of a linked, closed mesh.
    pub fn new(mesh: Mesh2d, fishing_ground: FishingGround) -> SimResult<Self> {
        mesh.validate_closed()?;
        let flat = mesh.triangles().filter(|t| t.area() <= f64::EPSILON).count();
        if flat > 0 {
            warn!(count = flat, "mesh contains triangles with vanishing area");
        }
        Ok(Self {
            mesh,
            fishing_ground,
            oil_in_fishing_grounds: Vec::new(),
            initial_total: None,
            current_time: 0.0,
        })
    }
    /// Sets the Gaussian initial field and the per-edge mean flow. Calling it
    /// again restarts the run.
    pub fn initial_conditions(&mut self) -> SimResult<()> {
        let centroids: Vec<Option<Vector2<f64>>> = self
            .mesh
            .cells()
            .iter()
            .map(|cell| cell.as_triangle().map(TriangleCell::centroid))
            .collect();
        for cell in self.mesh.cells_mut().iter_mut() {
            let Some(tri) = cell.as_triangle_mut() else {
                continue;
            };
            let centroid = tri.centroid();
            tri.set_concentration(initial_concentration(&centroid));
            let own_flow = velocity_field(&centroid);
            let ineighbors = tri.ineighbors().to_vec();
            for (local_id, ineighbor) in ineighbors.into_iter().enumerate() {
                let ineighbor = ineighbor.ok_or_else(|| missing_neighbor(tri, local_id))?;
                // across a boundary segment the cell's own velocity is used
                let mean_flow = match centroids[ineighbor] {
                    Some(neighbor_centroid) => 0.5 * (own_flow + velocity_field(&neighbor_centroid)),
                    None => own_flow,
                };
                tri.set_mean_flow(local_id, mean_flow);
            }
        }
        self.oil_in_fishing_grounds.clear();
        self.current_time = 0.0;
        let total = self.fishing_ground_total();
        self.initial_total = Some(total);
        info!(
            fishing_ground_total = total,
            total_mass = self.total_mass(),
            "initial conditions set"
        );
        Ok(())
    }
    pub fn solver(&mut self, number_of_steps: usize, delta_t: f64) -> SimResult<()> {
        self.solver_with_observer(number_of_steps, delta_t, &mut NoopObserver)
    }
    /// Advances `number_of_steps` steps of size `delta_t`, appending one
    /// fishing ground total per step and notifying `observer` after each
    /// commit.
    pub fn solver_with_observer<O: StepObserver + ?Sized>(
        &mut self,
        number_of_steps: usize,
        delta_t: f64,
        observer: &mut O,
    ) -> SimResult<()> {
        if self.initial_total.is_none() {
            return Err(SimError::NotInitialized);
        }
        info!(number_of_steps, delta_t, "solving");
        for _ in 0..number_of_steps {
            let staging = self.stage(delta_t)?;
            self.commit(&staging);
            self.current_time += delta_t;

            let total = self.fishing_ground_total();
            let step = self.oil_in_fishing_grounds.len();
            self.oil_in_fishing_grounds.push(total);
            debug!(step, fishing_ground_total = total, "step committed");

            let report = StepReport {
                step,
                time: self.current_time,
                fishing_ground_total: total,
            };
            observer
                .on_step(&report, &self.mesh)
                .map_err(|source| SimError::Observer { step, source })?;
        }
        Ok(())
    }
    /// New values for every cell, computed from the pre-step field only.
    /// Slots of boundary cells stay zero and are never committed.
    fn stage(&self, delta_t: f64) -> SimResult<Array1<f64>> {
        let cells = self.mesh.cells();
        let staged = cells
            .par_iter()
            .map(|cell| match cell.as_triangle() {
                Some(tri) => advance_cell(tri, cells, delta_t),
                None => Ok(0.0),
            })
            .collect::<SimResult<Vec<f64>>>()?;
        Ok(Array1::from(staged))
    }
    fn commit(&mut self, staging: &Array1<f64>) {
        for (cell, &value) in self.mesh.cells_mut().iter_mut().zip(staging.iter()) {
            if let Some(tri) = cell.as_triangle_mut() {
                tri.set_concentration(value);
            }
        }
    }
    /// Σ concentration·area over triangles whose centroid is in the fishing
    /// ground.
    pub fn fishing_ground_total(&self) -> f64 {
        self.mesh
            .triangles()
            .filter(|tri| self.fishing_ground.contains(&tri.centroid()))
            .map(|tri| tri.concentration() * tri.area())
            .sum()
    }
    /// Σ concentration·area over all triangles.
    pub fn total_mass(&self) -> f64 {
        self.mesh
            .triangles()
            .map(|tri| tri.concentration() * tri.area())
            .sum()
    }
    /// Concentration per cell id; boundary cells read zero.
    pub fn concentrations(&self) -> Array1<f64> {
        self.mesh
            .cells()
            .iter()
            .map(|cell| cell.as_triangle().map_or(0.0, TriangleCell::concentration))
            .collect()
    }
    pub fn fishing_ground_series(&self) -> &[f64] {
        &self.oil_in_fishing_grounds
    }
    pub fn initial_fishing_ground_total(&self) -> Option<f64> {
        self.initial_total
    }
    pub fn current_time(&self) -> f64 {
        self.current_time
    }
    pub fn mesh(&self) -> &Mesh2d {
        &self.mesh
    }
    pub fn region(&self) -> &FishingGround {
        &self.fishing_ground
    }
}

fn advance_cell(tri: &TriangleCell, cells: &[Cell], delta_t: f64) -> SimResult<f64> {
    let concentration = tri.concentration();
    let mut net_flux = 0.0;
    for (local_id, ineighbor) in tri.ineighbors().iter().enumerate() {
        let ineighbor = ineighbor.ok_or_else(|| missing_neighbor(tri, local_id))?;
        // no flux through the domain boundary
        let Some(neighbor) = cells[ineighbor].as_triangle() else {
            continue;
        };
        net_flux += upwind_flux(
            &tri.normals()[local_id],
            &tri.mean_flows()[local_id],
            concentration,
            neighbor.concentration(),
        );
    }
    Ok(concentration - delta_t * net_flux / tri.area())
}

fn missing_neighbor(tri: &TriangleCell, local_id: usize) -> SimError {
    SimError::InconsistentTopology(format!(
        "cell {} has no neighbor across edge {}",
        tri.id(),
        tri.edges()[local_id]
    ))
}
