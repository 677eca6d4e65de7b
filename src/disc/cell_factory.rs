use hashbrown::HashMap;
use nalgebra::Vector2;

use super::cell::{Cell, SEGMENT_TAG, SegmentCell, TRIANGLE_TAG, TriangleCell};
use crate::error::{SimError, SimResult};

/// One untyped input row handed to the factory.
#[derive(Clone, Debug, PartialEq)]
pub struct CellRecord {
    pub cell_type: String,
    pub id: usize,
    pub inodes: Vec<usize>,
    /// Coordinates of this row's nodes only.
    pub coords: HashMap<usize, Vector2<f64>>,
}

pub type CellConstructor = fn(&CellRecord) -> SimResult<Cell>;

pub fn create_triangle(record: &CellRecord) -> SimResult<Cell> {
    TriangleCell::new(record.id, &record.inodes, &record.coords).map(Cell::Triangle)
}
pub fn create_segment(record: &CellRecord) -> SimResult<Cell> {
    SegmentCell::new(record.id, &record.inodes, &record.coords).map(Cell::Segment)
}

/// Maps a type tag to the constructor of a cell variant.
///
/// The two built-in tags are registered on construction. Callers add new
/// tags through [`CellFactory::register`]; an existing tag is never
/// overwritten.
#[derive(Clone, Debug)]
pub struct CellFactory {
    constructors: HashMap<String, CellConstructor>,
}
impl Default for CellFactory {
    fn default() -> Self {
        let mut constructors: HashMap<String, CellConstructor> = HashMap::new();
        constructors.insert(SEGMENT_TAG.to_string(), create_segment);
        constructors.insert(TRIANGLE_TAG.to_string(), create_triangle);
        Self { constructors }
    }
}
impl CellFactory {
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns `false` when the tag was already taken.
    pub fn register(&mut self, tag: &str, constructor: CellConstructor) -> bool {
        if self.constructors.contains_key(tag) {
            return false;
        }
        self.constructors.insert(tag.to_string(), constructor);
        true
    }
    pub fn is_registered(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
    pub fn create(&self, record: &CellRecord) -> SimResult<Cell> {
        let constructor = self
            .constructors
            .get(record.cell_type.as_str())
            .ok_or_else(|| SimError::UnknownCellType(record.cell_type.clone()))?;
        constructor(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(cell_type: &str, inodes: &[usize]) -> CellRecord {
        let points = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.5, 0.0), (1.0, 0.5)];
        CellRecord {
            cell_type: cell_type.to_string(),
            id: 0,
            inodes: inodes.to_vec(),
            coords: inodes
                .iter()
                .map(|&i| (i, Vector2::new(points[i].0, points[i].1)))
                .collect(),
        }
    }

    // second order triangle: keep the corner nodes, drop the mid-side ones
    fn create_triangle6(record: &CellRecord) -> SimResult<Cell> {
        let corners = &record.inodes[..record.inodes.len().min(3)];
        TriangleCell::new(record.id, corners, &record.coords).map(Cell::Triangle)
    }

    #[test]
    fn test_default_tags() {
        let factory = CellFactory::new();
        assert_eq!(factory.tags(), vec!["line", "triangle"]);
        assert!(factory.is_registered("line"));
        assert!(!factory.is_registered("vertex"));
    }

    #[test]
    fn test_dispatch_by_tag() {
        let factory = CellFactory::new();
        let tri = factory.create(&record("triangle", &[0, 1, 2])).unwrap();
        assert!(tri.carries_field());
        let seg = factory.create(&record("line", &[0, 1])).unwrap();
        assert_eq!(seg.type_tag(), "line");
    }

    #[test]
    fn test_unknown_tag() {
        let factory = CellFactory::new();
        let err = factory.create(&record("quad", &[0, 1, 2, 3])).unwrap_err();
        assert!(matches!(err, SimError::UnknownCellType(tag) if tag == "quad"));
    }

    #[test]
    fn test_register_new_tag() {
        let mut factory = CellFactory::new();
        assert!(factory.register("triangle6", create_triangle6));
        let cell = factory
            .create(&record("triangle6", &[0, 1, 2, 4, 5, 3]))
            .unwrap();
        assert_eq!(cell.inodes(), &[0, 1, 2]);
    }

    #[test]
    fn test_first_registration_wins() {
        let mut factory = CellFactory::new();
        assert!(!factory.register("line", create_triangle));
        // "line" still builds segments
        let cell = factory.create(&record("line", &[0, 1])).unwrap();
        assert!(!cell.carries_field());
    }
}
