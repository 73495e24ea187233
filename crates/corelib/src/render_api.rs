//! Boundary between the frame driver and a concrete GPU backend.

use std::future::Future;

use asset::{FlatVertexBuffers, TextureSource};

use crate::{
    Mat4, Vec3,
    error::{FrameError, InitializationError},
};

pub const U_LIGHT_DIRECTION: &str = "u_lightDirection";
pub const U_VIEW: &str = "u_view";
pub const U_PROJECTION: &str = "u_projection";
pub const U_WORLD: &str = "u_world";

/// Handle for a compiled and linked shader program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

/// Handle for an uploaded set of vertex buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u32);

/// Handle for an uploaded texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Vec3(Vec3),
    Mat4(Mat4),
}

/// Named uniform values, in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Uniforms {
    entries: Vec<(&'static str, UniformValue)>,
}

impl Uniforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn set(&mut self, name: &'static str, value: UniformValue) -> &mut Self {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, value)| *value)
    }

    pub fn vec3(&self, name: &str) -> Option<Vec3> {
        match self.get(name)? {
            UniformValue::Vec3(v) => Some(v),
            UniformValue::Mat4(_) => None,
        }
    }

    pub fn mat4(&self, name: &str) -> Option<Mat4> {
        match self.get(name)? {
            UniformValue::Mat4(m) => Some(m),
            UniformValue::Vec3(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, UniformValue)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Operations the frame driver needs from a graphics API.
///
/// Setup calls fail with [`InitializationError`]; per-frame calls fail with
/// [`FrameError`]. Handles are only meaningful to the backend that issued them.
pub trait RenderBackend {
    fn create_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramHandle, InitializationError>;

    fn create_buffers(
        &mut self,
        buffers: &FlatVertexBuffers,
    ) -> Result<BufferHandle, InitializationError>;

    /// Decode and upload a texture. The handle is usable once the future
    /// resolves.
    fn load_texture(
        &mut self,
        source: &TextureSource,
    ) -> impl Future<Output = Result<TextureHandle, InitializationError>>;

    fn bind_texture(
        &mut self,
        program: ProgramHandle,
        texture: TextureHandle,
    ) -> Result<(), InitializationError>;

    /// Free a program created during a setup that did not complete. Unknown
    /// handles are ignored.
    fn release_program(&mut self, program: ProgramHandle);

    fn release_buffers(&mut self, buffers: BufferHandle);

    fn release_texture(&mut self, texture: TextureHandle);

    fn bind_buffers_and_attributes(
        &mut self,
        program: ProgramHandle,
        buffers: BufferHandle,
    ) -> Result<(), FrameError>;

    fn set_uniforms(
        &mut self,
        program: ProgramHandle,
        uniforms: &Uniforms,
    ) -> Result<(), FrameError>;

    fn draw(&mut self, buffers: BufferHandle) -> Result<(), FrameError>;

    /// Width over height of the current render target.
    fn aspect_ratio(&self) -> f32;

    fn resize(&mut self, width: u32, height: u32);
}
