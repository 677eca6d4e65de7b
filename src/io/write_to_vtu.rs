use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use vtkio::{
    Vtk,
    model::{
        Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType,
        IOBuffer, UnstructuredGridPiece, Version, VertexNumbers,
    },
};

use super::{IoError, IoResult};
use crate::disc::mesh::mesh2d::Mesh2d;
use crate::error::ObserverError;
use crate::solver::{StepObserver, StepReport};

/// Writes the triangles of `mesh` with their concentration as cell data.
pub fn write_field(mesh: &Mesh2d, filename: impl AsRef<Path>) -> IoResult<()> {
    let filename = filename.as_ref();
    let vtk_points: Vec<f64> = mesh
        .nodes()
        .iter()
        .flat_map(|node| [node[0], node[1], 0.0])
        .collect();

    let triangle_num = mesh.triangle_count();
    let mut connectivity = Vec::with_capacity(triangle_num * 3);
    let mut concentrations = Vec::with_capacity(triangle_num);
    let mut cell_ids = Vec::with_capacity(triangle_num);
    for tri in mesh.triangles() {
        connectivity.extend(tri.inodes().iter().map(|&inode| inode as u64));
        concentrations.push(tri.concentration());
        cell_ids.push(tri.id() as u64);
    }

    let vtk_file = Vtk {
        version: Version::XML { major: 1, minor: 0 },
        title: "Concentration".into(),
        byte_order: ByteOrder::native(),
        data: DataSet::inline(UnstructuredGridPiece {
            points: IOBuffer::F64(vtk_points),
            cells: Cells {
                cell_verts: VertexNumbers::XML {
                    connectivity,
                    offsets: (0..triangle_num).map(|i| ((i + 1) * 3) as u64).collect(),
                },
                types: vec![CellType::Triangle; triangle_num],
            },
            data: Attributes {
                point: vec![],
                cell: vec![
                    Attribute::DataArray(DataArray {
                        name: "concentration".to_string(),
                        elem: ElementType::Scalars {
                            num_comp: 1,
                            lookup_table: None,
                        },
                        data: IOBuffer::F64(concentrations),
                    }),
                    Attribute::DataArray(DataArray {
                        name: "cell_id".to_string(),
                        elem: ElementType::Scalars {
                            num_comp: 1,
                            lookup_table: None,
                        },
                        data: IOBuffer::U64(cell_ids),
                    }),
                ],
            },
        }),
        file_path: None,
    };

    vtk_file.export(filename).map_err(|e| IoError::Vtk {
        path: filename.to_path_buf(),
        reason: format!("{e:?}"),
    })
}

/// Step observer writing `field_<step>.vtu` into `dir` every
/// `write_frequency` steps, starting with step 0.
pub struct VtuSnapshotWriter {
    dir: PathBuf,
    write_frequency: usize,
    written: Vec<PathBuf>,
}
impl VtuSnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>, write_frequency: usize) -> IoResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| IoError::io(&dir, e))?;
        Ok(Self {
            dir,
            write_frequency: write_frequency.max(1),
            written: Vec::new(),
        })
    }
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}
impl StepObserver for VtuSnapshotWriter {
    fn on_step(&mut self, report: &StepReport, mesh: &Mesh2d) -> Result<(), ObserverError> {
        if report.step % self.write_frequency != 0 {
            return Ok(());
        }
        let path = self.dir.join(format!("field_{}.vtu", report.step));
        write_field(mesh, &path)?;
        debug!(step = report.step, path = %path.display(), "wrote snapshot");
        self.written.push(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_write_field() {
        let dir = scratch_dir("vtu_field");
        fs::create_dir_all(&dir).unwrap();
        let mesh = Mesh2d::create_eight_tri_mesh().unwrap();
        let path = dir.join("field.vtu");
        write_field(&mesh, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("UnstructuredGrid"));
        assert!(content.contains("concentration"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_snapshot_frequency() {
        let dir = scratch_dir("vtu_snapshots");
        let mesh = Mesh2d::create_eight_tri_mesh().unwrap();
        let mut writer = VtuSnapshotWriter::new(&dir, 2).unwrap();
        for step in 0..5 {
            let report = StepReport {
                step,
                time: step as f64,
                fishing_ground_total: 0.0,
            };
            writer.on_step(&report, &mesh).unwrap();
        }
        let names: Vec<String> = writer
            .written()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["field_0.vtu", "field_2.vtu", "field_4.vtu"]);
        assert!(writer.written().iter().all(|p| p.is_file()));
        fs::remove_dir_all(&dir).unwrap();
    }
}
