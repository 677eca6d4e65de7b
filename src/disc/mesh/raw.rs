use hashbrown::HashMap;
use nalgebra::Vector2;

use crate::disc::cell_factory::CellRecord;
use crate::error::{SimError, SimResult};

pub const VERTEX_TAG: &str = "vertex";

/// Rows of node ids sharing one type tag.
#[derive(Clone, Debug, PartialEq)]
pub struct CellBlock {
    pub cell_type: String,
    pub rows: Vec<Vec<usize>>,
}

/// Geometry as delivered by a mesh reader: node coordinates (index = node id)
/// and untyped cell groups.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawMesh {
    pub nodes: Vec<Vector2<f64>>,
    pub blocks: Vec<CellBlock>,
}
impl RawMesh {
    pub fn new(nodes: Vec<Vector2<f64>>, blocks: Vec<CellBlock>) -> Self {
        Self { nodes, blocks }
    }
    /// Factory records in block/row order with sequential ids from 0.
    /// Vertex blocks are skipped and take no ids.
    pub fn records(&self) -> impl Iterator<Item = SimResult<CellRecord>> + '_ {
        self.blocks
            .iter()
            .filter(|block| block.cell_type != VERTEX_TAG)
            .flat_map(|block| block.rows.iter().map(move |row| (block, row)))
            .enumerate()
            .map(|(id, (block, row))| self.record(id, &block.cell_type, row))
    }
    /// Hexagon-like domain with two interior nodes: 8 nodes, 6 boundary
    /// lines and 8 triangles.
    pub fn eight_tri_mesh() -> Self {
        let nodes = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(0.5, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(0.5, 1.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(0.3, 0.5),
            Vector2::new(0.7, 0.5),
        ];
        let lines = CellBlock {
            cell_type: "line".into(),
            rows: vec![
                vec![0, 1],
                vec![1, 2],
                vec![2, 3],
                vec![3, 4],
                vec![4, 5],
                vec![5, 0],
            ],
        };
        let triangles = CellBlock {
            cell_type: "triangle".into(),
            rows: vec![
                vec![0, 1, 6],
                vec![1, 7, 6],
                vec![1, 2, 7],
                vec![2, 3, 7],
                vec![3, 4, 7],
                vec![4, 6, 7],
                vec![4, 5, 6],
                vec![5, 0, 6],
            ],
        };
        Self::new(nodes, vec![lines, triangles])
    }
    /// Structured triangulation of [x0, x1] x [y0, y1] with `x_num` by
    /// `y_num` quads, each split along its rising diagonal, bounded by lines.
    pub fn create_tri_mesh(
        x_num: usize,
        y_num: usize,
        x0: f64,
        x1: f64,
        y0: f64,
        y1: f64,
    ) -> Self {
        let dx = (x1 - x0) / x_num as f64;
        let dy = (y1 - y0) / y_num as f64;
        let inode = |i: usize, j: usize| j * (x_num + 1) + i;
        let mut nodes = Vec::with_capacity((x_num + 1) * (y_num + 1));
        for j in 0..=y_num {
            for i in 0..=x_num {
                nodes.push(Vector2::new(x0 + i as f64 * dx, y0 + j as f64 * dy));
            }
        }
        let mut lines = Vec::with_capacity(2 * (x_num + y_num));
        for i in 0..x_num {
            lines.push(vec![inode(i, 0), inode(i + 1, 0)]);
        }
        for j in 0..y_num {
            lines.push(vec![inode(x_num, j), inode(x_num, j + 1)]);
        }
        for i in (0..x_num).rev() {
            lines.push(vec![inode(i + 1, y_num), inode(i, y_num)]);
        }
        for j in (0..y_num).rev() {
            lines.push(vec![inode(0, j + 1), inode(0, j)]);
        }
        let mut triangles = Vec::with_capacity(2 * x_num * y_num);
        for j in 0..y_num {
            for i in 0..x_num {
                let (a, b, c, d) = (
                    inode(i, j),
                    inode(i + 1, j),
                    inode(i + 1, j + 1),
                    inode(i, j + 1),
                );
                triangles.push(vec![a, b, c]);
                triangles.push(vec![a, c, d]);
            }
        }
        Self::new(
            nodes,
            vec![
                CellBlock {
                    cell_type: "line".into(),
                    rows: lines,
                },
                CellBlock {
                    cell_type: "triangle".into(),
                    rows: triangles,
                },
            ],
        )
    }
    fn record(&self, id: usize, cell_type: &str, row: &[usize]) -> SimResult<CellRecord> {
        let coords = row
            .iter()
            .map(|&inode| {
                self.nodes
                    .get(inode)
                    .map(|p| (inode, *p))
                    .ok_or_else(|| SimError::MalformedCell {
                        cell_type: cell_type.to_string(),
                        id,
                        reason: format!(
                            "node {inode} outside node table of {} nodes",
                            self.nodes.len()
                        ),
                    })
            })
            .collect::<SimResult<HashMap<_, _>>>()?;
        Ok(CellRecord {
            cell_type: cell_type.to_string(),
            id,
            inodes: row.to_vec(),
            coords,
        })
    }
}
