use std::fmt;

use hashbrown::HashMap;
use nalgebra::Vector2;

use super::geometric::Geometric2D;
use crate::error::{SimError, SimResult};

pub const TRIANGLE_TAG: &str = "triangle";
pub const SEGMENT_TAG: &str = "line";

/// Unordered pair of node ids, stored sorted so both traversal directions
/// produce the same key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge(usize, usize);
impl Edge {
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b { Edge(a, b) } else { Edge(b, a) }
    }
    pub fn nodes(&self) -> (usize, usize) {
        (self.0, self.1)
    }
}
impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// Data shared by every cell variant.
#[derive(Clone, Debug)]
pub struct CellBase {
    id: usize,
    inodes: Vec<usize>,
    edges: Vec<Edge>,
    // aligned with inodes
    coords: Vec<Vector2<f64>>,
    // aligned with edges, filled by the topology pass
    ineighbors: Vec<Option<usize>>,
}
impl CellBase {
    fn new(
        cell_type: &'static str,
        id: usize,
        inodes: &[usize],
        coords: &HashMap<usize, Vector2<f64>>,
        node_num: usize,
    ) -> SimResult<Self> {
        if inodes.len() != node_num {
            return Err(SimError::MalformedCell {
                cell_type: cell_type.to_string(),
                id,
                reason: format!("expected {} nodes, got {}", node_num, inodes.len()),
            });
        }
        let coords = inodes
            .iter()
            .map(|inode| {
                coords.get(inode).copied().ok_or_else(|| SimError::MalformedCell {
                    cell_type: cell_type.to_string(),
                    id,
                    reason: format!("no coordinate for node {inode}"),
                })
            })
            .collect::<SimResult<Vec<_>>>()?;
        // closed polygon for more than two nodes, a single edge otherwise
        let edges: Vec<Edge> = if node_num == 2 {
            vec![Edge::new(inodes[0], inodes[1])]
        } else {
            (0..node_num)
                .map(|i| Edge::new(inodes[i], inodes[(i + 1) % node_num]))
                .collect()
        };
        let ineighbors = vec![None; edges.len()];
        Ok(Self {
            id,
            inodes: inodes.to_vec(),
            edges,
            coords,
            ineighbors,
        })
    }
    fn local_edge_id(&self, edge: Edge) -> Option<usize> {
        self.edges.iter().position(|e| *e == edge)
    }
    fn coord(&self, inode: usize) -> Option<&Vector2<f64>> {
        self.inodes
            .iter()
            .position(|&n| n == inode)
            .map(|local| &self.coords[local])
    }
}

/// Control volume carrying the transported concentration.
#[derive(Clone, Debug)]
pub struct TriangleCell {
    base: CellBase,
    centroid: Vector2<f64>,
    area: f64,
    // outward, scaled to edge length; aligned with the cell's edges
    normals: [Vector2<f64>; 3],
    mean_flow: [Vector2<f64>; 3],
    concentration: f64,
}
impl Geometric2D for TriangleCell {}
impl TriangleCell {
    pub fn new(
        id: usize,
        inodes: &[usize],
        coords: &HashMap<usize, Vector2<f64>>,
    ) -> SimResult<Self> {
        let base = CellBase::new(TRIANGLE_TAG, id, inodes, coords, 3)?;
        let x: [f64; 3] = std::array::from_fn(|i| base.coords[i][0]);
        let y: [f64; 3] = std::array::from_fn(|i| base.coords[i][1]);
        let centroid = Self::compute_centroid(&x, &y);
        let area = Self::compute_element_area(&x, &y);
        let mut normals = [Vector2::zeros(); 3];
        // local edge i joins local nodes i and i + 1
        for (local_id, edge) in base.edges.iter().enumerate() {
            let p0 = &base.coords[local_id];
            let p1 = &base.coords[(local_id + 1) % 3];
            normals[local_id] = Self::compute_scaled_outward_normal(p0, p1, &centroid)
                .ok_or(SimError::DegenerateGeometry { id, edge: *edge })?;
        }
        Ok(Self {
            base,
            centroid,
            area,
            normals,
            mean_flow: [Vector2::zeros(); 3],
            concentration: 0.0,
        })
    }
    pub fn centroid(&self) -> Vector2<f64> {
        self.centroid
    }
    pub fn area(&self) -> f64 {
        self.area
    }
    pub fn normals(&self) -> &[Vector2<f64>; 3] {
        &self.normals
    }
    pub fn normal(&self, edge: Edge) -> Option<Vector2<f64>> {
        self.base.local_edge_id(edge).map(|i| self.normals[i])
    }
    pub fn mean_flows(&self) -> &[Vector2<f64>; 3] {
        &self.mean_flow
    }
    pub fn mean_flow(&self, edge: Edge) -> Option<Vector2<f64>> {
        self.base.local_edge_id(edge).map(|i| self.mean_flow[i])
    }
    pub fn concentration(&self) -> f64 {
        self.concentration
    }
    pub fn edges(&self) -> &[Edge] {
        &self.base.edges
    }
    pub fn id(&self) -> usize {
        self.base.id
    }
    pub fn inodes(&self) -> &[usize] {
        &self.base.inodes
    }
    pub fn coords(&self) -> &[Vector2<f64>] {
        &self.base.coords
    }
    /// Neighbor ids aligned with `edges()`.
    pub fn ineighbors(&self) -> &[Option<usize>] {
        &self.base.ineighbors
    }
    pub(crate) fn set_mean_flow(&mut self, local_id: usize, flow: Vector2<f64>) {
        self.mean_flow[local_id] = flow;
    }
    pub(crate) fn set_concentration(&mut self, value: f64) {
        self.concentration = value;
    }
}

/// Boundary marker. Terminates flux exchange, carries no field.
#[derive(Clone, Debug)]
pub struct SegmentCell {
    base: CellBase,
}
impl SegmentCell {
    pub fn new(
        id: usize,
        inodes: &[usize],
        coords: &HashMap<usize, Vector2<f64>>,
    ) -> SimResult<Self> {
        let base = CellBase::new(SEGMENT_TAG, id, inodes, coords, 2)?;
        Ok(Self { base })
    }
    pub fn edge(&self) -> Edge {
        self.base.edges[0]
    }
    pub fn length(&self) -> f64 {
        (self.base.coords[1] - self.base.coords[0]).norm()
    }
}

#[derive(Clone, Debug)]
pub enum Cell {
    Triangle(TriangleCell),
    Segment(SegmentCell),
}
impl Cell {
    fn base(&self) -> &CellBase {
        match self {
            Cell::Triangle(t) => &t.base,
            Cell::Segment(s) => &s.base,
        }
    }
    fn base_mut(&mut self) -> &mut CellBase {
        match self {
            Cell::Triangle(t) => &mut t.base,
            Cell::Segment(s) => &mut s.base,
        }
    }
    pub fn id(&self) -> usize {
        self.base().id
    }
    pub fn type_tag(&self) -> &'static str {
        match self {
            Cell::Triangle(_) => TRIANGLE_TAG,
            Cell::Segment(_) => SEGMENT_TAG,
        }
    }
    /// Only triangles hold a concentration and exchange flux.
    pub fn carries_field(&self) -> bool {
        matches!(self, Cell::Triangle(_))
    }
    pub fn as_triangle(&self) -> Option<&TriangleCell> {
        match self {
            Cell::Triangle(t) => Some(t),
            Cell::Segment(_) => None,
        }
    }
    pub fn as_triangle_mut(&mut self) -> Option<&mut TriangleCell> {
        match self {
            Cell::Triangle(t) => Some(t),
            Cell::Segment(_) => None,
        }
    }
    pub fn inodes(&self) -> &[usize] {
        &self.base().inodes
    }
    pub fn edges(&self) -> &[Edge] {
        &self.base().edges
    }
    pub fn coords(&self) -> &[Vector2<f64>] {
        &self.base().coords
    }
    pub fn coord(&self, inode: usize) -> Option<&Vector2<f64>> {
        self.base().coord(inode)
    }
    pub fn neighbor(&self, edge: Edge) -> Option<usize> {
        let base = self.base();
        base.local_edge_id(edge).and_then(|i| base.ineighbors[i])
    }
    /// Recorded (edge, neighbor id) pairs in edge order.
    pub fn neighbors(&self) -> impl Iterator<Item = (Edge, usize)> + '_ {
        let base = self.base();
        base.edges
            .iter()
            .zip(base.ineighbors.iter())
            .filter_map(|(edge, ineighbor)| ineighbor.map(|n| (*edge, n)))
    }
    pub fn neighbor_count(&self) -> usize {
        self.base().ineighbors.iter().flatten().count()
    }
    pub(crate) fn set_neighbor(&mut self, edge: Edge, neighbor: usize) -> bool {
        let base = self.base_mut();
        match base.local_edge_id(edge) {
            Some(i) => {
                base.ineighbors[i] = Some(neighbor);
                true
            }
            None => false,
        }
    }
    pub(crate) fn clear_neighbors(&mut self) {
        self.base_mut().ineighbors.fill(None);
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = self.base();
        writeln!(f, "--- Cell {} ({}) ---", base.id, self.type_tag())?;
        writeln!(f, "Nodes:         {:?}", base.inodes)?;
        let edges: Vec<String> = base.edges.iter().map(|e| e.to_string()).collect();
        writeln!(f, "Edges:         [{}]", edges.join(", "))?;
        write!(f, "Neighbours:   ")?;
        if self.neighbor_count() == 0 {
            writeln!(f, " None")?;
        } else {
            writeln!(f)?;
            for (edge, n) in self.neighbors() {
                writeln!(f, "    {edge}: {n}")?;
            }
        }
        writeln!(f, "Coordinates:")?;
        for (inode, c) in base.inodes.iter().zip(base.coords.iter()) {
            writeln!(f, "    {inode}: ({}, {})", c[0], c[1])?;
        }
        if let Cell::Triangle(t) = self {
            writeln!(f, "Centerpoint:   ({}, {})", t.centroid[0], t.centroid[1])?;
            writeln!(f, "Area:          {}", t.area)?;
            writeln!(f, "Normals:")?;
            for (edge, n) in base.edges.iter().zip(t.normals.iter()) {
                writeln!(f, "    {edge}: ({}, {})", n[0], n[1])?;
            }
            writeln!(f, "Mean Flow:")?;
            for (edge, v) in base.edges.iter().zip(t.mean_flow.iter()) {
                writeln!(f, "    {edge}: ({}, {})", v[0], v[1])?;
            }
            writeln!(f, "Concentration: {:.4}", t.concentration)?;
        }
        Ok(())
    }
}
