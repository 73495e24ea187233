//! CPU mirror of the `Scene` uniform block declared in the WGSL shaders.

use bytemuck::{Pod, Zeroable};
use corelib::{
    FrameError, Mat4, UniformValue, Uniforms,
    render_api::{U_LIGHT_DIRECTION, U_PROJECTION, U_VIEW, U_WORLD},
};

/// Scene UBO (16-byte aligned, std140-compatible).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SceneUniform {
    pub world: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    /// xyz = direction, w unused.
    pub light_direction: [f32; 4],
}

impl Default for SceneUniform {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY.to_cols_array_2d(),
            view: Mat4::IDENTITY.to_cols_array_2d(),
            projection: Mat4::IDENTITY.to_cols_array_2d(),
            light_direction: [0.0, 0.0, 1.0, 0.0],
        }
    }
}

impl SceneUniform {
    /// Store one named value. Names outside the block are rejected.
    pub fn apply(&mut self, name: &str, value: UniformValue) -> Result<(), FrameError> {
        match (name, value) {
            (U_WORLD, UniformValue::Mat4(m)) => self.world = m.to_cols_array_2d(),
            (U_VIEW, UniformValue::Mat4(m)) => self.view = m.to_cols_array_2d(),
            (U_PROJECTION, UniformValue::Mat4(m)) => self.projection = m.to_cols_array_2d(),
            (U_LIGHT_DIRECTION, UniformValue::Vec3(v)) => {
                self.light_direction = v.extend(0.0).to_array()
            }
            (name, value) => {
                return Err(FrameError::Backend(format!(
                    "uniform '{name}' ({value:?}) does not match the scene block"
                )));
            }
        }
        Ok(())
    }

    pub fn apply_all(&mut self, uniforms: &Uniforms) -> Result<(), FrameError> {
        uniforms
            .iter()
            .try_for_each(|(name, value)| self.apply(name, value))
    }
}
