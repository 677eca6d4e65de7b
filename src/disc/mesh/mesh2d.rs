use std::collections::VecDeque;

use hashbrown::HashMap;
use nalgebra::Vector2;
use tracing::{debug, info, warn};

use super::raw::RawMesh;
use crate::disc::cell::{Cell, Edge, TriangleCell};
use crate::disc::cell_factory::CellFactory;
use crate::error::{SimError, SimResult};

/// Construction phase of a mesh. The solver only accepts `Linked` meshes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshPhase {
    Constructed,
    Indexed,
    Linked,
}

#[derive(Clone, Debug)]
pub struct Mesh2d {
    nodes: Vec<Vector2<f64>>,
    // dense arena, cell id == index
    cells: Vec<Cell>,
    edge_cells: HashMap<Edge, Vec<usize>>,
    phase: MeshPhase,
}
impl Mesh2d {
    pub fn new(nodes: Vec<Vector2<f64>>) -> Self {
        Self {
            nodes,
            cells: Vec::new(),
            edge_cells: HashMap::new(),
            phase: MeshPhase::Constructed,
        }
    }
    /// Instantiates every non-vertex row of `raw` through `factory`.
    pub fn from_raw(raw: &RawMesh, factory: &CellFactory) -> SimResult<Self> {
        let mut mesh = Self::new(raw.nodes.clone());
        for record in raw.records() {
            let cell = factory.create(&record?)?;
            mesh.push_cell(cell)?;
        }
        debug!(
            nodes = mesh.nodes.len(),
            cells = mesh.cells.len(),
            "created cells"
        );
        Ok(mesh)
    }
    /// Cells, adjacency index, and neighbor links with the default factory.
    pub fn build(raw: &RawMesh) -> SimResult<Self> {
        let mut mesh = Self::from_raw(raw, &CellFactory::default())?;
        mesh.build_topology()?;
        mesh.assign_neighbors()?;
        info!(
            nodes = mesh.nodes.len(),
            triangles = mesh.triangle_count(),
            segments = mesh.segment_count(),
            edges = mesh.edge_cells.len(),
            "mesh built"
        );
        Ok(mesh)
    }
    pub fn create_eight_tri_mesh() -> SimResult<Self> {
        Self::build(&RawMesh::eight_tri_mesh())
    }
    /// Appends a cell whose id must equal its future index.
    pub fn push_cell(&mut self, cell: Cell) -> SimResult<usize> {
        if self.phase != MeshPhase::Constructed {
            return Err(SimError::InconsistentTopology(format!(
                "cell {} added after topology was built",
                cell.id()
            )));
        }
        let id = self.cells.len();
        if cell.id() != id {
            return Err(SimError::InconsistentTopology(format!(
                "cell id {} does not match its position {id}",
                cell.id()
            )));
        }
        self.cells.push(cell);
        Ok(id)
    }
    /// Rebuilds the edge -> cell ids index from scratch.
    pub fn build_topology(&mut self) -> SimResult<()> {
        self.edge_cells.clear();
        for cell in self.cells.iter() {
            for edge in cell.edges() {
                self.edge_cells.entry(*edge).or_default().push(cell.id());
            }
        }
        if let Some((edge, icells)) = self.edge_cells.iter().find(|(_, icells)| icells.len() > 2)
        {
            return Err(SimError::InconsistentTopology(format!(
                "edge {edge} is shared by {} cells {:?}",
                icells.len(),
                icells
            )));
        }
        let open = self.open_edges();
        if !open.is_empty() {
            warn!(count = open.len(), first = %open[0], "mesh has open edges");
        }
        self.phase = MeshPhase::Indexed;
        Ok(())
    }
    /// Records, for every cell edge, the other cell sharing it.
    pub fn assign_neighbors(&mut self) -> SimResult<()> {
        if self.phase == MeshPhase::Constructed {
            return Err(SimError::InconsistentTopology(
                "neighbors assigned before the edge index was built".to_string(),
            ));
        }
        let Self {
            cells, edge_cells, ..
        } = self;
        for cell in cells.iter_mut() {
            cell.clear_neighbors();
            let id = cell.id();
            for edge in cell.edges().to_vec() {
                let icells = edge_cells.get(&edge).ok_or_else(|| {
                    SimError::InconsistentTopology(format!("edge {edge} of cell {id} not indexed"))
                })?;
                for &ineighbor in icells.iter().filter(|&&i| i != id) {
                    cell.set_neighbor(edge, ineighbor);
                }
            }
        }
        self.phase = MeshPhase::Linked;
        Ok(())
    }
    /// Checks the invariants the solver relies on: linked, every edge shared
    /// by exactly two cells, every segment bounding a triangle.
    pub fn validate_closed(&self) -> SimResult<()> {
        if self.phase != MeshPhase::Linked {
            return Err(SimError::InconsistentTopology(format!(
                "mesh is {:?}, expected Linked",
                self.phase
            )));
        }
        let open = self.open_edges();
        if let Some(edge) = open.first() {
            return Err(SimError::InconsistentTopology(format!(
                "{} edges bounded by a single cell, first {edge}",
                open.len()
            )));
        }
        for cell in self.cells.iter().filter(|c| !c.carries_field()) {
            for (edge, ineighbor) in cell.neighbors() {
                if !self.cells[ineighbor].carries_field() {
                    return Err(SimError::InconsistentTopology(format!(
                        "boundary cell {} meets boundary cell {ineighbor} at {edge}",
                        cell.id()
                    )));
                }
            }
        }
        Ok(())
    }
    /// Edges with a single cell, sorted.
    pub fn open_edges(&self) -> Vec<Edge> {
        let mut open: Vec<Edge> = self
            .edge_cells
            .iter()
            .filter(|(_, icells)| icells.len() == 1)
            .map(|(edge, _)| *edge)
            .collect();
        open.sort_unstable();
        open
    }
    /// Whether every cell is reachable from cell 0 through neighbor links.
    pub fn is_connected(&self) -> bool {
        if self.cells.is_empty() {
            return true;
        }
        let mut visited = vec![false; self.cells.len()];
        let mut queue = VecDeque::from([0]);
        visited[0] = true;
        let mut visited_num = 1;
        while let Some(icell) = queue.pop_front() {
            for (_, ineighbor) in self.cells[icell].neighbors() {
                if !visited[ineighbor] {
                    visited[ineighbor] = true;
                    visited_num += 1;
                    queue.push_back(ineighbor);
                }
            }
        }
        visited_num == self.cells.len()
    }
    pub fn phase(&self) -> MeshPhase {
        self.phase
    }
    pub fn nodes(&self) -> &[Vector2<f64>] {
        &self.nodes
    }
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
    pub fn cell(&self, id: usize) -> Option<&Cell> {
        self.cells.get(id)
    }
    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }
    pub fn edge_cells(&self) -> &HashMap<Edge, Vec<usize>> {
        &self.edge_cells
    }
    pub fn triangles(&self) -> impl Iterator<Item = &TriangleCell> + '_ {
        self.cells.iter().filter_map(Cell::as_triangle)
    }
    pub fn triangle_count(&self) -> usize {
        self.triangles().count()
    }
    pub fn segment_count(&self) -> usize {
        self.cells.len() - self.triangle_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disc::mesh::raw::CellBlock;
    use approx::assert_relative_eq;

    fn two_triangles() -> RawMesh {
        // unit square split along 0-2, no boundary lines
        RawMesh::new(
            vec![
                Vector2::new(0.0, 0.0),
                Vector2::new(1.0, 0.0),
                Vector2::new(1.0, 1.0),
                Vector2::new(0.0, 1.0),
            ],
            vec![CellBlock {
                cell_type: "triangle".into(),
                rows: vec![vec![0, 1, 2], vec![0, 2, 3]],
            }],
        )
    }

    #[test]
    fn test_eight_tri_mesh_topology() {
        let mesh = Mesh2d::create_eight_tri_mesh().unwrap();
        assert_eq!(mesh.nodes().len(), 8);
        assert_eq!(mesh.cells().len(), 14);
        assert_eq!(mesh.segment_count(), 6);
        assert_eq!(mesh.triangle_count(), 8);
        assert_eq!(mesh.phase(), MeshPhase::Linked);
        // 6 boundary + 9 interior edges
        assert_eq!(mesh.edge_cells().len(), 15);
        assert!(mesh.edge_cells().values().all(|icells| icells.len() == 2));
        assert!(mesh.validate_closed().is_ok());
    }

    #[test]
    fn test_ids_match_positions() {
        let mesh = Mesh2d::create_eight_tri_mesh().unwrap();
        for (i, cell) in mesh.cells().iter().enumerate() {
            assert_eq!(cell.id(), i);
        }
    }

    #[test]
    fn test_neighbor_counts_and_types() {
        let mesh = Mesh2d::create_eight_tri_mesh().unwrap();
        for cell in mesh.cells() {
            if cell.carries_field() {
                assert_eq!(cell.neighbor_count(), 3);
            } else {
                assert_eq!(cell.neighbor_count(), 1);
                let (_, ineighbor) = cell.neighbors().next().unwrap();
                assert!(mesh.cells()[ineighbor].carries_field());
            }
            assert!(cell.neighbors().all(|(_, n)| n != cell.id()));
        }
    }

    #[test]
    fn test_neighbors_are_symmetric() {
        let mesh = Mesh2d::create_eight_tri_mesh().unwrap();
        for (edge, icells) in mesh.edge_cells() {
            let (a, b) = (icells[0], icells[1]);
            assert_eq!(mesh.cells()[a].neighbor(*edge), Some(b));
            assert_eq!(mesh.cells()[b].neighbor(*edge), Some(a));
        }
    }

    #[test]
    fn test_every_cell_registered_on_its_edges() {
        let mesh = Mesh2d::create_eight_tri_mesh().unwrap();
        for cell in mesh.cells() {
            for edge in cell.edges() {
                assert!(mesh.edge_cells()[edge].contains(&cell.id()));
            }
        }
    }

    #[test]
    fn test_triangle_normals_on_built_mesh() {
        let mesh = Mesh2d::create_eight_tri_mesh().unwrap();
        for tri in mesh.triangles() {
            for (local_id, normal) in tri.normals().iter().enumerate() {
                let p0 = tri.coords()[local_id];
                let p1 = tri.coords()[(local_id + 1) % 3];
                assert_relative_eq!(normal.norm(), (p1 - p0).norm(), epsilon = 1e-12);
                assert_relative_eq!(normal.dot(&(p1 - p0)), 0.0, epsilon = 1e-12);
                let midpoint = 0.5 * (p0 + p1);
                assert!(normal.dot(&(tri.centroid() - midpoint)) < 0.0);
            }
        }
    }

    #[test]
    fn test_connected() {
        let mesh = Mesh2d::create_eight_tri_mesh().unwrap();
        assert!(mesh.is_connected());
    }

    #[test]
    fn test_topology_is_idempotent() {
        let mut mesh = Mesh2d::create_eight_tri_mesh().unwrap();
        let index = mesh.edge_cells().clone();
        let links: Vec<Vec<(Edge, usize)>> =
            mesh.cells().iter().map(|c| c.neighbors().collect()).collect();
        mesh.build_topology().unwrap();
        mesh.assign_neighbors().unwrap();
        mesh.build_topology().unwrap();
        mesh.assign_neighbors().unwrap();
        assert_eq!(mesh.edge_cells(), &index);
        let relinked: Vec<Vec<(Edge, usize)>> =
            mesh.cells().iter().map(|c| c.neighbors().collect()).collect();
        assert_eq!(relinked, links);
    }

    #[test]
    fn test_open_edges_are_reported_and_rejected() {
        let mesh = Mesh2d::build(&two_triangles()).unwrap();
        assert_eq!(
            mesh.open_edges(),
            vec![
                Edge::new(0, 1),
                Edge::new(0, 3),
                Edge::new(1, 2),
                Edge::new(2, 3)
            ]
        );
        assert_eq!(mesh.cells()[0].neighbor(Edge::new(0, 2)), Some(1));
        assert_eq!(mesh.cells()[0].neighbor_count(), 1);
        assert!(matches!(
            mesh.validate_closed(),
            Err(SimError::InconsistentTopology(_))
        ));
    }

    #[test]
    fn test_edge_shared_by_three_cells() {
        let mut raw = two_triangles();
        raw.nodes.push(Vector2::new(2.0, -1.0));
        raw.blocks[0].rows.push(vec![0, 4, 2]);
        let err = Mesh2d::build(&raw).unwrap_err();
        assert!(format!("{err}").contains("shared by 3 cells"));
    }

    #[test]
    fn test_neighbors_before_index() {
        let mut mesh = Mesh2d::from_raw(&two_triangles(), &CellFactory::default()).unwrap();
        assert_eq!(mesh.phase(), MeshPhase::Constructed);
        assert!(mesh.assign_neighbors().is_err());
    }

    #[test]
    fn test_push_cell_checks_id() {
        let raw = two_triangles();
        let mut mesh = Mesh2d::new(raw.nodes.clone());
        let mut records = raw.records();
        let _first = records.next().unwrap().unwrap();
        let second = records.next().unwrap().unwrap();
        let cell = CellFactory::default().create(&second).unwrap();
        assert!(mesh.push_cell(cell).is_err());
    }

    #[test]
    fn test_unknown_block_type() {
        let mut raw = two_triangles();
        raw.blocks.push(CellBlock {
            cell_type: "quad".into(),
            rows: vec![vec![0, 1, 2, 3]],
        });
        assert!(matches!(
            Mesh2d::build(&raw),
            Err(SimError::UnknownCellType(tag)) if tag == "quad"
        ));
    }

    #[test]
    fn test_duplicate_boundary_line_is_rejected() {
        let mut raw = RawMesh::eight_tri_mesh();
        raw.blocks.push(CellBlock {
            cell_type: "line".into(),
            rows: vec![vec![1, 0]],
        });
        let err = Mesh2d::build(&raw).unwrap_err();
        assert!(matches!(err, SimError::InconsistentTopology(_)));
    }

    #[test]
    fn test_segment_pair_without_triangle() {
        let raw = RawMesh::new(
            vec![Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0)],
            vec![CellBlock {
                cell_type: "line".into(),
                rows: vec![vec![0, 1], vec![1, 0]],
            }],
        );
        let mesh = Mesh2d::build(&raw).unwrap();
        let err = mesh.validate_closed().unwrap_err();
        assert!(format!("{err}").contains("boundary cell 0 meets boundary cell 1"));
    }
}
