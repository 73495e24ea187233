//! OBJ-style mesh parser: `v`/`vt`/`vn` tables plus `f` records with
//! `position/texcoord/normal` corners, expanded into flat vertex buffers.

use std::{collections::HashMap, fs, num::IntErrorKind, path::Path};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::mesh::{AttributeKind, FlatVertexBuffers, IndexedMesh};

/// Errors produced while reading mesh text.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MeshError {
    #[error("Malformed '{record}' record on line {line}: {reason}")]
    Malformed {
        line: usize,
        record: String,
        reason: String,
    },
    #[error("{kind} index {index} out of range on line {line} ({len} defined)")]
    IndexOutOfRange {
        line: usize,
        kind: AttributeKind,
        /// As written in the face record; saturated if it overflows `i128`.
        index: i128,
        len: usize,
    },
}

fn malformed(line: usize, record: &str, reason: impl Into<String>) -> MeshError {
    MeshError::Malformed {
        line,
        record: record.to_owned(),
        reason: reason.into(),
    }
}

/// Read mesh text from disk. Parsing is left to [`parse`] or [`parse_indexed`].
pub fn read_obj_source(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to open OBJ file: {}", path.display()))?;
    log::info!("Read mesh {} ({} bytes)", path.display(), text.len());
    Ok(text)
}

/// Parse mesh text into flat buffers, one output vertex per face corner.
///
/// Corners are never deduplicated, so vertex `i` of the output is simply the
/// `i`-th corner across all `f` records in file order.
pub fn parse(text: &str) -> Result<FlatVertexBuffers, MeshError> {
    RawMeshTables::read(text)?.expand()
}

/// Parse mesh text, sharing one output vertex between identical corners.
pub fn parse_indexed(text: &str) -> Result<IndexedMesh, MeshError> {
    RawMeshTables::read(text)?.expand_indexed()
}

/// 0-based references into the three attribute tables.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct Corner {
    position: usize,
    tex_coord: usize,
    normal: usize,
}

struct Face {
    line: usize,
    corners: Vec<Corner>,
}

#[derive(Default)]
struct RawMeshTables {
    positions: Vec<f32>,
    tex_coords: Vec<f32>,
    normals: Vec<f32>,
    faces: Vec<Face>,
}

/// Values dropped from the front of a record before its components are kept.
/// Texture coordinates arrive as three values of which the first is unused.
const fn leading_skip(kind: AttributeKind) -> usize {
    match kind {
        AttributeKind::TexCoord => 1,
        AttributeKind::Position | AttributeKind::Normal => 0,
    }
}

impl RawMeshTables {
    fn read(text: &str) -> Result<Self, MeshError> {
        let mut tables = Self::default();

        for (line_no, line) in text.lines().enumerate() {
            let line_no = line_no + 1;
            let mut parts = line.split_whitespace();
            let Some(tag) = parts.next() else {
                continue;
            };

            match tag {
                "v" => tables.push_record(AttributeKind::Position, tag, parts, line_no)?,
                "vt" => tables.push_record(AttributeKind::TexCoord, tag, parts, line_no)?,
                "vn" => tables.push_record(AttributeKind::Normal, tag, parts, line_no)?,
                "f" => {
                    let face = tables.read_face(parts, line_no)?;
                    tables.faces.push(face);
                }
                _ => {
                    // Comments, groups, materials and the like carry nothing we use.
                }
            }
        }

        Ok(tables)
    }

    fn table(&self, kind: AttributeKind) -> &[f32] {
        match kind {
            AttributeKind::Position => &self.positions,
            AttributeKind::TexCoord => &self.tex_coords,
            AttributeKind::Normal => &self.normals,
        }
    }

    fn entries(&self, kind: AttributeKind) -> usize {
        self.table(kind).len() / kind.stride()
    }

    fn push_record<'a>(
        &mut self,
        kind: AttributeKind,
        tag: &str,
        parts: impl Iterator<Item = &'a str>,
        line: usize,
    ) -> Result<(), MeshError> {
        let values = parts
            .map(|token| {
                token
                    .parse::<f32>()
                    .map_err(|_| malformed(line, tag, format!("'{token}' is not a number")))
            })
            .collect::<Result<Vec<f32>, MeshError>>()?;

        let skip = leading_skip(kind);
        let needed = skip + kind.stride();
        let components = values.get(skip..needed).ok_or_else(|| {
            malformed(
                line,
                tag,
                format!("expected at least {needed} values, found {}", values.len()),
            )
        })?;

        match kind {
            AttributeKind::Position => self.positions.extend_from_slice(components),
            AttributeKind::TexCoord => self.tex_coords.extend_from_slice(components),
            AttributeKind::Normal => self.normals.extend_from_slice(components),
        }
        Ok(())
    }

    fn read_face<'a>(
        &self,
        tokens: impl Iterator<Item = &'a str>,
        line: usize,
    ) -> Result<Face, MeshError> {
        let corners = tokens
            .map(|token| self.read_corner(token, line))
            .collect::<Result<Vec<Corner>, MeshError>>()?;

        if corners.len() < 3 {
            return Err(malformed(
                line,
                "f",
                format!("a face needs at least 3 corners, found {}", corners.len()),
            ));
        }
        Ok(Face { line, corners })
    }

    fn read_corner(&self, token: &str, line: usize) -> Result<Corner, MeshError> {
        let mut split = token.split('/');
        let mut next_index = |kind: AttributeKind| -> Result<usize, MeshError> {
            let part = split.next().filter(|p| !p.is_empty()).ok_or_else(|| {
                malformed(line, "f", format!("corner '{token}' has no {kind} index"))
            })?;
            let raw = match part.parse::<i128>() {
                Ok(raw) => raw,
                Err(e) => match e.kind() {
                    IntErrorKind::PosOverflow => i128::MAX,
                    IntErrorKind::NegOverflow => i128::MIN,
                    _ => {
                        return Err(malformed(
                            line,
                            "f",
                            format!("invalid {kind} index '{part}' in '{token}'"),
                        ));
                    }
                },
            };
            self.resolve_index(kind, raw, line)
        };

        let position = next_index(AttributeKind::Position)?;
        let tex_coord = next_index(AttributeKind::TexCoord)?;
        let normal = next_index(AttributeKind::Normal)?;

        if split.next().is_some() {
            return Err(malformed(
                line,
                "f",
                format!("corner '{token}' has more than three indices"),
            ));
        }

        Ok(Corner {
            position,
            tex_coord,
            normal,
        })
    }

    /// 1-based indices count from the start, negative ones back from the
    /// entries defined so far. Upper bounds are checked at expansion time.
    fn resolve_index(
        &self,
        kind: AttributeKind,
        raw: i128,
        line: usize,
    ) -> Result<usize, MeshError> {
        let len = self.entries(kind);
        let resolved = match raw {
            0 => None,
            r if r > 0 => Some(r - 1),
            r => (len as i128).checked_add(r),
        };

        match resolved.and_then(|idx| usize::try_from(idx).ok()) {
            Some(idx) => Ok(idx),
            None => Err(MeshError::IndexOutOfRange {
                line,
                kind,
                index: raw,
                len,
            }),
        }
    }

    fn entry(&self, kind: AttributeKind, index: usize, line: usize) -> Result<&[f32], MeshError> {
        let stride = kind.stride();
        let table = self.table(kind);
        index
            .checked_mul(stride)
            .and_then(|start| Some(start..start.checked_add(stride)?))
            .and_then(|range| table.get(range))
            .ok_or(MeshError::IndexOutOfRange {
                line,
                kind,
                index: index as i128 + 1,
                len: table.len() / stride,
            })
    }

    fn lookup(&self, corner: &Corner, line: usize) -> Result<[&[f32]; 3], MeshError> {
        Ok([
            self.entry(AttributeKind::Position, corner.position, line)?,
            self.entry(AttributeKind::TexCoord, corner.tex_coord, line)?,
            self.entry(AttributeKind::Normal, corner.normal, line)?,
        ])
    }

    fn corner_count(&self) -> usize {
        self.faces.iter().map(|face| face.corners.len()).sum()
    }

    fn expand(&self) -> Result<FlatVertexBuffers, MeshError> {
        let mut flat = FlatVertexBuffers::with_capacity(self.corner_count());
        for face in &self.faces {
            for corner in &face.corners {
                let [position, tex_coord, normal] = self.lookup(corner, face.line)?;
                flat.push_vertex(position, tex_coord, normal);
            }
        }
        Ok(flat)
    }

    fn expand_indexed(&self) -> Result<IndexedMesh, MeshError> {
        let mut unique: HashMap<Corner, u32> = HashMap::new();
        let mut vertices = FlatVertexBuffers::default();
        let mut indices: Vec<u32> = Vec::with_capacity(self.corner_count());

        for face in &self.faces {
            for corner in &face.corners {
                let index = match unique.get(corner) {
                    Some(&idx) => idx,
                    None => {
                        let [position, tex_coord, normal] = self.lookup(corner, face.line)?;
                        let idx = u32::try_from(vertices.vertex_count()).map_err(|_| {
                            malformed(face.line, "f", format!("more than {} vertices", u32::MAX))
                        })?;
                        vertices.push_vertex(position, tex_coord, normal);
                        unique.insert(*corner, idx);
                        idx
                    }
                };
                indices.push(index);
            }
        }

        Ok(IndexedMesh::new(vertices, indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0 0\nvt 0 1 0\nvt 0 0.5 1\nvn 0 0 1\nf 1/1/1 2/2/1 3/3/1\n";

    #[test]
    fn parse_simple_triangle() {
        let mesh = parse(TRIANGLE).expect("parse triangle");
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(
            mesh.positions(),
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        );
        // `vt 0 1 0` drops its leading value and stores (1, 0).
        assert_eq!(mesh.texcoords(), &[0.0, 0.0, 1.0, 0.0, 0.5, 1.0]);
        assert_eq!(
            mesh.normals(),
            &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn buffer_lengths_follow_corner_count() {
        let src = r#"
            # a quad and a triangle sharing an edge
            o thing
            v 0 0 0
            v 1 0 0
            v 1 1 0
            v 0 1 0
            vt 0 0 0
            vt 0 1 1
            vn 0 0 1
            s off
            f 1/1/1 2/2/1 3/2/1 4/1/1
            f 1/1/1 3/2/1 4/2/1
        "#;
        let mesh = parse(src).expect("parse");
        let v = mesh.vertex_count();
        assert_eq!(v, 7);
        assert_eq!(mesh.positions().len(), 3 * v);
        assert_eq!(mesh.texcoords().len(), 2 * v);
        assert_eq!(mesh.normals().len(), 3 * v);
    }

    #[test]
    fn parsing_twice_is_bit_identical() {
        let a = parse(TRIANGLE).unwrap();
        let b = parse(TRIANGLE).unwrap();
        let bits = |xs: &[f32]| xs.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(a.positions()), bits(b.positions()));
        assert_eq!(bits(a.texcoords()), bits(b.texcoords()));
        assert_eq!(bits(a.normals()), bits(b.normals()));
    }

    #[test]
    fn texcoord_drops_leading_value() {
        let src = "v 0 0 0\nvt 0.1 0.2 0.3\nvn 0 0 1\nf 1/1/1 1/1/1 1/1/1\n";
        let mesh = parse(src).unwrap();
        assert_eq!(mesh.vertex(0).unwrap().1, [0.2, 0.3]);
    }

    #[test]
    fn face_indices_are_one_based() {
        let src = "v 1 1 1\nv 2 2 2\nv 3 3 3\nvt 0 0 0\nvn 0 1 0\nf 2/1/1 1/1/1 3/1/1\n";
        let mesh = parse(src).unwrap();
        assert_eq!(mesh.vertex(0).unwrap().0, [2.0, 2.0, 2.0]);
    }

    #[test]
    fn corners_are_emitted_in_order() {
        let src = "v 1 0 0\nv 2 0 0\nv 3 0 0\n\
                   vt 0 0.1 0.1\nvt 0 0.2 0.2\nvt 0 0.3 0.3\n\
                   vn 1 0 0\nvn 0 1 0\nvn 0 0 1\n\
                   f 1/1/1 2/2/2 3/3/3\n";
        let mesh = parse(src).unwrap();
        assert_eq!(
            mesh.positions(),
            &[1.0, 0.0, 0.0, 2.0, 0.0, 0.0, 3.0, 0.0, 0.0]
        );
        assert_eq!(mesh.texcoords(), &[0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
        assert_eq!(
            mesh.normals(),
            &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn out_of_range_position_is_reported() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0 0\nvn 0 0 1\nf 99/1/1 1/1/1 2/1/1\n";
        let err = parse(src).unwrap_err();
        assert_eq!(
            err,
            MeshError::IndexOutOfRange {
                line: 6,
                kind: AttributeKind::Position,
                index: 99,
                len: 3,
            }
        );
    }

    #[test]
    fn out_of_range_normal_is_reported() {
        let src = "v 0 0 0\nvt 0 0 0\nvn 0 0 1\nf 1/1/1 1/1/2 1/1/1\n";
        match parse(src) {
            Err(MeshError::IndexOutOfRange { kind, index, .. }) => {
                assert_eq!(kind, AttributeKind::Normal);
                assert_eq!(index, 2);
            }
            other => panic!("expected out-of-range normal, got {other:?}"),
        }
    }

    #[test]
    fn zero_index_is_out_of_range() {
        let src = "v 0 0 0\nvt 0 0 0\nvn 0 0 1\nf 0/1/1 1/1/1 1/1/1\n";
        assert!(matches!(
            parse(src),
            Err(MeshError::IndexOutOfRange { index: 0, .. })
        ));
    }

    #[test]
    fn index_too_large_for_integers_is_out_of_range() {
        let src = "v 0 0 0\nvt 0 0 0\nvn 0 0 1\nf 99999999999999999999/1/1 1/1/1 1/1/1\n";
        assert_eq!(
            parse(src),
            Err(MeshError::IndexOutOfRange {
                line: 4,
                kind: AttributeKind::Position,
                index: 99_999_999_999_999_999_999,
                len: 1,
            })
        );

        let huge = format!("v 0 0 0\nvt 0 0 0\nvn 0 0 1\nf 1/1/-{} 1/1/1 1/1/1\n", "9".repeat(50));
        assert!(matches!(
            parse(&huge),
            Err(MeshError::IndexOutOfRange {
                kind: AttributeKind::Normal,
                index: i128::MIN,
                ..
            })
        ));
    }

    #[test]
    fn negative_indices_count_back_from_defined_entries() {
        let src = "v 1 0 0\nv 2 0 0\nv 3 0 0\nvt 0 0 0\nvn 0 0 1\nf -3/-1/-1 -2/-1/-1 -1/-1/-1\n";
        let mesh = parse(src).unwrap();
        assert_eq!(
            mesh.positions(),
            &[1.0, 0.0, 0.0, 2.0, 0.0, 0.0, 3.0, 0.0, 0.0]
        );

        let too_far = "v 1 0 0\nvt 0 0 0\nvn 0 0 1\nf -2/1/1 1/1/1 1/1/1\n";
        assert!(matches!(
            parse(too_far),
            Err(MeshError::IndexOutOfRange { index: -2, len: 1, .. })
        ));
    }

    #[test]
    fn missing_normal_index_is_malformed() {
        let src = "v 0 0 0\nvt 0 0 0\nvn 0 0 1\nf 1/1 1/1 1/1\n";
        assert!(matches!(
            parse(src),
            Err(MeshError::Malformed { line: 4, .. })
        ));
    }

    #[test]
    fn empty_texcoord_index_is_malformed() {
        let src = "v 0 0 0\nvn 0 0 1\nf 1//1 1//1 1//1\n";
        assert!(matches!(parse(src), Err(MeshError::Malformed { .. })));
    }

    #[test]
    fn short_records_fail_fast() {
        for src in ["v 1 2\n", "vt 0 0.5\n", "vn 0 1\n"] {
            assert!(
                matches!(parse(src), Err(MeshError::Malformed { line: 1, .. })),
                "{src:?} should be rejected"
            );
        }
    }

    #[test]
    fn non_numeric_component_is_malformed() {
        let err = parse("v 0 zero 0\n").unwrap_err();
        assert!(err.to_string().contains("'zero' is not a number"), "{err}");
    }

    #[test]
    fn degenerate_face_is_malformed() {
        let src = "v 0 0 0\nvt 0 0 0\nvn 0 0 1\nf 1/1/1 1/1/1\n";
        assert!(matches!(parse(src), Err(MeshError::Malformed { .. })));
    }

    #[test]
    fn unknown_records_and_blank_lines_are_ignored() {
        let src = "\n# comment\nmtllib a.mtl\nusemtl skin\ng body\n\n";
        let mesh = parse(src).unwrap();
        assert!(mesh.is_empty());
    }

    #[test]
    fn crlf_input_is_accepted() {
        let mesh = parse(&TRIANGLE.replace('\n', "\r\n")).unwrap();
        assert_eq!(mesh, parse(TRIANGLE).unwrap());
    }

    #[test]
    fn indexed_parse_shares_identical_corners() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvt 0 0 0\nvn 0 0 1\n\
                   f 1/1/1 2/1/1 3/1/1\nf 1/1/1 3/1/1 4/1/1\n";
        let indexed = parse_indexed(src).unwrap();
        assert_eq!(indexed.vertices().vertex_count(), 4);
        assert_eq!(indexed.indices(), &[0, 1, 2, 0, 2, 3]);
        assert_eq!(indexed.expand(), parse(src).unwrap());
    }

    #[test]
    fn indexed_parse_reports_out_of_range() {
        let src = "v 0 0 0\nvt 0 0 0\nvn 0 0 1\nf 1/1/1 1/3/1 1/1/1\n";
        assert!(matches!(
            parse_indexed(src),
            Err(MeshError::IndexOutOfRange {
                kind: AttributeKind::TexCoord,
                ..
            })
        ));
    }

    #[test]
    fn bundled_sphere_parses() {
        let src = include_str!("../../../assets/sphere.obj");
        let mesh = parse(src).expect("parse sphere");
        assert_eq!(mesh.vertex_count(), 768 * 3);

        let indexed = parse_indexed(src).expect("parse sphere indexed");
        assert!(indexed.vertices().vertex_count() < mesh.vertex_count());
        assert_eq!(indexed.expand(), mesh);
    }

    #[test]
    fn read_missing_file_names_path() {
        let err = read_obj_source("definitely/not/here.obj").unwrap_err();
        assert!(format!("{err}").contains("definitely/not/here.obj"));
    }
}
