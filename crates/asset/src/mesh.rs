//! CPU-side mesh representation produced by the loaders.

use std::fmt;

/// Attribute channel of a mesh record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Position,
    TexCoord,
    Normal,
}

impl AttributeKind {
    /// Number of floats per entry of this channel.
    pub const fn stride(self) -> usize {
        match self {
            AttributeKind::Position => 3,
            AttributeKind::TexCoord => 2,
            AttributeKind::Normal => 3,
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeKind::Position => "position",
            AttributeKind::TexCoord => "texture coordinate",
            AttributeKind::Normal => "normal",
        };
        f.write_str(name)
    }
}

/// Parallel per-vertex attribute arrays with no index indirection.
///
/// Vertex `i` owns `positions[3i..3i+3]`, `texcoords[2i..2i+2]` and
/// `normals[3i..3i+3]`, all taken from the same face corner. The buffers are
/// only built by the parser and cannot be modified afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlatVertexBuffers {
    positions: Vec<f32>,
    texcoords: Vec<f32>,
    normals: Vec<f32>,
}

impl FlatVertexBuffers {
    pub(crate) fn with_capacity(vertices: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices * AttributeKind::Position.stride()),
            texcoords: Vec::with_capacity(vertices * AttributeKind::TexCoord.stride()),
            normals: Vec::with_capacity(vertices * AttributeKind::Normal.stride()),
        }
    }

    /// Append one vertex. Slices must already have the channel strides.
    pub(crate) fn push_vertex(&mut self, position: &[f32], texcoord: &[f32], normal: &[f32]) {
        debug_assert_eq!(position.len(), AttributeKind::Position.stride());
        debug_assert_eq!(texcoord.len(), AttributeKind::TexCoord.stride());
        debug_assert_eq!(normal.len(), AttributeKind::Normal.stride());
        self.positions.extend_from_slice(position);
        self.texcoords.extend_from_slice(texcoord);
        self.normals.extend_from_slice(normal);
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    pub fn texcoords(&self) -> &[f32] {
        &self.texcoords
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    /// Number of emitted vertices (one per face corner).
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / AttributeKind::Position.stride()
    }

    /// Returns `true` if no vertex was emitted.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Attribute groups of vertex `i`, in (position, texcoord, normal) order.
    pub fn vertex(&self, i: usize) -> Option<([f32; 3], [f32; 2], [f32; 3])> {
        if i >= self.vertex_count() {
            return None;
        }
        let p = &self.positions[i * 3..i * 3 + 3];
        let t = &self.texcoords[i * 2..i * 2 + 2];
        let n = &self.normals[i * 3..i * 3 + 3];
        Some(([p[0], p[1], p[2]], [t[0], t[1]], [n[0], n[1], n[2]]))
    }
}

/// Deduplicated variant: unique corners plus one index per face corner.
///
/// Every index refers to an entry of `vertices`; only the parser builds it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexedMesh {
    vertices: FlatVertexBuffers,
    indices: Vec<u32>,
}

impl IndexedMesh {
    pub(crate) fn new(vertices: FlatVertexBuffers, indices: Vec<u32>) -> Self {
        debug_assert!(
            indices
                .iter()
                .all(|&i| (i as usize) < vertices.vertex_count())
        );
        Self { vertices, indices }
    }

    pub fn vertices(&self) -> &FlatVertexBuffers {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Re-expand the indices into a flat buffer set, one vertex per index.
    pub fn expand(&self) -> FlatVertexBuffers {
        let mut flat = FlatVertexBuffers::with_capacity(self.indices.len());
        for (p, t, n) in self
            .indices
            .iter()
            .filter_map(|&index| self.vertices.vertex(index as usize))
        {
            flat.push_vertex(&p, &t, &n);
        }
        flat
    }
}
