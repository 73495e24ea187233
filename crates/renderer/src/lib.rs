//! Renderer: wgpu context plus the `RenderBackend` implementation that draws
//! the textured, lit mesh.
//! wgpu = 26.x, winit = 0.30.x

mod backend;
mod context;
mod uniform;

pub use backend::WgpuBackend;
pub use context::GpuContext;
pub use uniform::SceneUniform;

/// Vertex stage: `vs_main`, inputs at locations 0..=2 (position, texcoord, normal).
pub const MESH_VERTEX_SHADER: &str = include_str!("shaders/mesh_vs.wgsl");
/// Fragment stage: `fs_main`, Phong lighting with a normal-perturbing texture.
pub const MESH_FRAGMENT_SHADER: &str = include_str!("shaders/mesh_fs.wgsl");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shaders_declare_entry_points() {
        assert!(MESH_VERTEX_SHADER.contains("fn vs_main"));
        assert!(MESH_FRAGMENT_SHADER.contains("fn fs_main"));
    }

    #[test]
    fn shader_blocks_agree_on_layout() {
        let block = |src: &str| {
            let start = src.find("struct Scene").expect("Scene struct");
            let end = src[start..].find("};").expect("struct end") + start;
            src[start..end].to_string()
        };
        assert_eq!(block(MESH_VERTEX_SHADER), block(MESH_FRAGMENT_SHADER));
    }
}
