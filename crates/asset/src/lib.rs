//! Asset loading/parsers (meshes, textures).
//! Meshes are expanded into flat per-vertex attribute buffers ready for upload.

pub mod mesh;
pub mod obj;
pub mod texture;

pub use mesh::{AttributeKind, FlatVertexBuffers, IndexedMesh};
pub use obj::{MeshError, parse, parse_indexed, read_obj_source};
pub use texture::{TextureData, TextureSource};
