//! ASCII Gmsh `.msh` reader, formats 2.2 and 4.1.
//!
//! Node tags are remapped to dense ids in file order. Elements are grouped
//! into [`CellBlock`]s named after their Gmsh element type:
//!
//! ```ignore
//! let raw = gmsh::load("inputs/bay.msh")?;
//! let mesh = Mesh2d::build(&raw)?;
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use hashbrown::HashMap;
use nalgebra::Vector2;
use tracing::debug;

use super::{IoError, IoResult};
use crate::disc::mesh::raw::{CellBlock, RawMesh};

/// Type tag for a Gmsh element type number.
pub fn element_type_name(element_type: usize) -> String {
    match element_type {
        15 => "vertex".to_string(),
        1 => "line".to_string(),
        2 => "triangle".to_string(),
        3 => "quad".to_string(),
        8 => "line3".to_string(),
        9 => "triangle6".to_string(),
        other => format!("gmsh:{other}"),
    }
}

pub fn load(path: impl AsRef<Path>) -> IoResult<RawMesh> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IoError::io(path, e))?;
    let raw = load_from_reader(BufReader::new(file))?;
    debug!(
        path = %path.display(),
        nodes = raw.nodes.len(),
        blocks = raw.blocks.len(),
        "read gmsh file"
    );
    Ok(raw)
}

pub fn load_from_reader<R: BufRead>(reader: R) -> IoResult<RawMesh> {
    let mut lines = Lines::new(reader);
    let mut version = 2;
    let mut nodes: Option<(Vec<Vector2<f64>>, HashMap<usize, usize>)> = None;
    let mut blocks: Option<Vec<CellBlock>> = None;

    while let Some(line) = lines.next_line()? {
        match line.as_str() {
            "$MeshFormat" => {
                version = parse_format(&mut lines)?;
                lines.skip_to("$EndMeshFormat")?;
            }
            "$Nodes" => {
                nodes = Some(if version >= 4 {
                    parse_nodes_v4(&mut lines)?
                } else {
                    parse_nodes_v2(&mut lines)?
                });
                lines.skip_to("$EndNodes")?;
            }
            "$Elements" => {
                let Some((_, node_map)) = nodes.as_ref() else {
                    return Err(lines.error("$Elements before $Nodes"));
                };
                blocks = Some(if version >= 4 {
                    parse_elements_v4(&mut lines, node_map)?
                } else {
                    parse_elements_v2(&mut lines, node_map)?
                });
                lines.skip_to("$EndElements")?;
            }
            section if section.starts_with('$') && !section.starts_with("$End") => {
                let end = format!("$End{}", &section[1..]);
                lines.skip_to(&end)?;
            }
            _ => {}
        }
    }
    let Some((nodes, _)) = nodes else {
        return Err(lines.error("missing $Nodes section"));
    };
    let Some(blocks) = blocks else {
        return Err(lines.error("missing $Elements section"));
    };
    Ok(RawMesh::new(nodes, blocks))
}

/// Major version of an ASCII file.
fn parse_format<R: BufRead>(lines: &mut Lines<R>) -> IoResult<u32> {
    let line = lines.expect_line("mesh format")?;
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(lines.error("bad $MeshFormat line"));
    }
    let version: f64 = lines.parse(parts[0])?;
    if parts[1] != "0" {
        return Err(lines.error("binary mesh files are not supported"));
    }
    if !(2.0..5.0).contains(&version) {
        return Err(lines.error(&format!("unsupported format version {version}")));
    }
    Ok(version as u32)
}

fn parse_nodes_v2<R: BufRead>(
    lines: &mut Lines<R>,
) -> IoResult<(Vec<Vector2<f64>>, HashMap<usize, usize>)> {
    let count_line = lines.expect_line("node count")?;
    let count: usize = lines.parse(&count_line)?;
    let mut nodes = Vec::with_capacity(count);
    let mut node_map = HashMap::with_capacity(count);
    for _ in 0..count {
        let line = lines.expect_line("node")?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return Err(lines.error("node line needs a tag and coordinates"));
        }
        let tag: usize = lines.parse(parts[0])?;
        let x: f64 = lines.parse(parts[1])?;
        let y: f64 = lines.parse(parts[2])?;
        node_map.insert(tag, nodes.len());
        nodes.push(Vector2::new(x, y));
    }
    Ok((nodes, node_map))
}

fn parse_nodes_v4<R: BufRead>(
    lines: &mut Lines<R>,
) -> IoResult<(Vec<Vector2<f64>>, HashMap<usize, usize>)> {
    let header = lines.expect_line("node header")?;
    let header: Vec<usize> = lines.parse_all(&header)?;
    if header.len() < 2 {
        return Err(lines.error("bad node header"));
    }
    let (block_num, total) = (header[0], header[1]);
    let mut nodes = Vec::with_capacity(total);
    let mut node_map = HashMap::with_capacity(total);
    for _ in 0..block_num {
        let block_header = lines.expect_line("node block header")?;
        let block_header: Vec<usize> = lines.parse_all(&block_header)?;
        if block_header.len() < 4 {
            return Err(lines.error("bad node block header"));
        }
        let node_num = block_header[3];
        let mut tags = Vec::with_capacity(node_num);
        for _ in 0..node_num {
            let line = lines.expect_line("node tag")?;
            tags.push(lines.parse::<usize>(&line)?);
        }
        for tag in tags {
            let line = lines.expect_line("node coordinates")?;
            let coords: Vec<f64> = lines.parse_all(&line)?;
            if coords.len() < 2 {
                return Err(lines.error("node line needs coordinates"));
            }
            node_map.insert(tag, nodes.len());
            nodes.push(Vector2::new(coords[0], coords[1]));
        }
    }
    Ok((nodes, node_map))
}

/// Consecutive elements of one type form a block.
fn parse_elements_v2<R: BufRead>(
    lines: &mut Lines<R>,
    node_map: &HashMap<usize, usize>,
) -> IoResult<Vec<CellBlock>> {
    let count_line = lines.expect_line("element count")?;
    let count: usize = lines.parse(&count_line)?;
    let mut blocks: Vec<CellBlock> = Vec::new();
    let mut current_type = None;
    for _ in 0..count {
        let line = lines.expect_line("element")?;
        let parts: Vec<usize> = lines.parse_all(&line)?;
        if parts.len() < 3 {
            return Err(lines.error("element line too short"));
        }
        let (element_type, tag_num) = (parts[1], parts[2]);
        let start = 3 + tag_num;
        if parts.len() <= start {
            return Err(lines.error("element has no nodes"));
        }
        let row = remap(lines, node_map, &parts[start..])?;
        match blocks.last_mut() {
            Some(block) if current_type == Some(element_type) => block.rows.push(row),
            _ => {
                current_type = Some(element_type);
                blocks.push(CellBlock {
                    cell_type: element_type_name(element_type),
                    rows: vec![row],
                });
            }
        }
    }
    Ok(blocks)
}

/// Every entity block becomes one block.
fn parse_elements_v4<R: BufRead>(
    lines: &mut Lines<R>,
    node_map: &HashMap<usize, usize>,
) -> IoResult<Vec<CellBlock>> {
    let header = lines.expect_line("element header")?;
    let header: Vec<usize> = lines.parse_all(&header)?;
    if header.len() < 2 {
        return Err(lines.error("bad element header"));
    }
    let block_num = header[0];
    let mut blocks = Vec::with_capacity(block_num);
    for _ in 0..block_num {
        let block_header = lines.expect_line("element block header")?;
        let block_header: Vec<usize> = lines.parse_all(&block_header)?;
        if block_header.len() < 4 {
            return Err(lines.error("bad element block header"));
        }
        let (element_type, element_num) = (block_header[2], block_header[3]);
        let mut rows = Vec::with_capacity(element_num);
        for _ in 0..element_num {
            let line = lines.expect_line("element")?;
            let parts: Vec<usize> = lines.parse_all(&line)?;
            if parts.len() < 2 {
                return Err(lines.error("element has no nodes"));
            }
            rows.push(remap(lines, node_map, &parts[1..])?);
        }
        blocks.push(CellBlock {
            cell_type: element_type_name(element_type),
            rows,
        });
    }
    Ok(blocks)
}

fn remap<R: BufRead>(
    lines: &Lines<R>,
    node_map: &HashMap<usize, usize>,
    tags: &[usize],
) -> IoResult<Vec<usize>> {
    tags.iter()
        .map(|tag| {
            node_map
                .get(tag)
                .copied()
                .ok_or_else(|| lines.error(&format!("unknown node tag {tag}")))
        })
        .collect()
}

/// Line source that trims input and remembers the current line number.
struct Lines<R> {
    inner: std::io::Lines<R>,
    line_no: usize,
}
impl<R: BufRead> Lines<R> {
    fn new(reader: R) -> Self {
        Self {
            inner: reader.lines(),
            line_no: 0,
        }
    }
    fn next_line(&mut self) -> IoResult<Option<String>> {
        match self.inner.next() {
            Some(Ok(line)) => {
                self.line_no += 1;
                Ok(Some(line.trim().to_string()))
            }
            Some(Err(e)) => Err(IoError::MeshParse {
                line: self.line_no + 1,
                reason: e.to_string(),
            }),
            None => Ok(None),
        }
    }
    fn expect_line(&mut self, what: &str) -> IoResult<String> {
        self.next_line()?
            .ok_or_else(|| self.error(&format!("unexpected end of file, expected {what}")))
    }
    fn skip_to(&mut self, end: &str) -> IoResult<()> {
        while let Some(line) = self.next_line()? {
            if line == end {
                return Ok(());
            }
        }
        Err(self.error(&format!("missing {end}")))
    }
    fn parse<T: std::str::FromStr>(&self, token: &str) -> IoResult<T> {
        token
            .trim()
            .parse()
            .map_err(|_| self.error(&format!("cannot parse '{token}'")))
    }
    fn parse_all<T: std::str::FromStr>(&self, line: &str) -> IoResult<Vec<T>> {
        line.split_whitespace().map(|t| self.parse(t)).collect()
    }
    fn error(&self, reason: &str) -> IoError {
        IoError::MeshParse {
            line: self.line_no,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SQUARE_V2: &str = "\
$MeshFormat
2.2 0 8
$EndMeshFormat
$PhysicalNames
1
1 1 \"coast\"
$EndPhysicalNames
$Nodes
4
10 0 0 0
20 1 0 0
30 1 1 0
40 0 1 0
$EndNodes
$Elements
7
1 15 2 0 1 10
2 1 2 1 1 10 20
3 1 2 1 2 20 30
4 1 2 1 3 30 40
5 1 2 1 4 40 10
6 2 2 0 1 10 20 30
7 2 2 0 1 10 30 40
$EndElements
";

    const SQUARE_V4: &str = "\
$MeshFormat
4.1 0 8
$EndMeshFormat
$Entities
0 0 1 0
1 0 0 0 1 1 0 0 0
$EndEntities
$Nodes
2 4 1 4
0 1 0 1
1
0 0 0
2 1 0 3
2
3
4
1 0 0
1 1 0
0 1 0
$EndNodes
$Elements
2 6 1 6
1 1 1 4
1 1 2
2 2 3
3 3 4
4 4 1
2 1 2 2
5 1 2 3
6 1 3 4
$EndElements
";

    #[test]
    fn test_element_type_names() {
        assert_eq!(element_type_name(2), "triangle");
        assert_eq!(element_type_name(1), "line");
        assert_eq!(element_type_name(15), "vertex");
        assert_eq!(element_type_name(4), "gmsh:4");
    }

    #[test]
    fn test_v2_blocks_and_remapping() {
        let raw = load_from_reader(Cursor::new(SQUARE_V2)).unwrap();
        assert_eq!(raw.nodes.len(), 4);
        assert_eq!(raw.nodes[2], Vector2::new(1.0, 1.0));
        let types: Vec<&str> = raw.blocks.iter().map(|b| b.cell_type.as_str()).collect();
        assert_eq!(types, vec!["vertex", "line", "triangle"]);
        assert_eq!(raw.blocks[1].rows.len(), 4);
        assert_eq!(raw.blocks[2].rows, vec![vec![0, 1, 2], vec![0, 2, 3]]);
    }

    #[test]
    fn test_v4_entity_blocks() {
        let raw = load_from_reader(Cursor::new(SQUARE_V4)).unwrap();
        assert_eq!(raw.nodes.len(), 4);
        assert_eq!(raw.nodes[3], Vector2::new(0.0, 1.0));
        assert_eq!(raw.blocks.len(), 2);
        assert_eq!(raw.blocks[0].cell_type, "line");
        assert_eq!(raw.blocks[0].rows[3], vec![3, 0]);
        assert_eq!(raw.blocks[1].rows, vec![vec![0, 1, 2], vec![0, 2, 3]]);
    }

    #[test]
    fn test_both_versions_read_the_same_square() {
        let v2 = load_from_reader(Cursor::new(SQUARE_V2)).unwrap();
        let v4 = load_from_reader(Cursor::new(SQUARE_V4)).unwrap();
        assert_eq!(v2.nodes, v4.nodes);
        let v2_records: Vec<_> = v2.records().map(Result::unwrap).collect();
        let v4_records: Vec<_> = v4.records().map(Result::unwrap).collect();
        assert_eq!(v2_records.len(), 6);
        assert_eq!(v2_records, v4_records);
    }

    #[test]
    fn test_binary_is_rejected() {
        let err = load_from_reader(Cursor::new("$MeshFormat\n4.1 1 8\n$EndMeshFormat\n"))
            .unwrap_err();
        assert!(format!("{err}").contains("binary"));
    }

    #[test]
    fn test_missing_sections() {
        let err = load_from_reader(Cursor::new("$MeshFormat\n2.2 0 8\n$EndMeshFormat\n"))
            .unwrap_err();
        assert!(format!("{err}").contains("missing $Nodes"));
        let text = SQUARE_V2.split("$Elements").next().unwrap();
        let err = load_from_reader(Cursor::new(text)).unwrap_err();
        assert!(format!("{err}").contains("missing $Elements"));
    }

    #[test]
    fn test_unknown_node_tag_reports_line() {
        let text = SQUARE_V2.replace("7 2 2 0 1 10 30 40", "7 2 2 0 1 10 30 99");
        match load_from_reader(Cursor::new(text)).unwrap_err() {
            IoError::MeshParse { line, reason } => {
                assert_eq!(line, 23);
                assert!(reason.contains("99"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
