//! Frame driver: brings the scene up once, then advances and draws it one
//! tick at a time.

use std::time::Duration;

use asset::TextureSource;

use crate::{
    error::{FrameError, InitializationError},
    render_api::{BufferHandle, ProgramHandle, RenderBackend},
    scene::{SceneSettings, SceneSnapshot, SceneState},
};

/// Inputs consumed while initializing.
#[derive(Clone, Copy, Debug)]
pub struct SceneAssets<'a> {
    pub mesh_source: &'a str,
    pub texture: &'a TextureSource,
    pub vertex_shader: &'a str,
    pub fragment_shader: &'a str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Running,
}

struct Running {
    scene: SceneState,
    program: ProgramHandle,
    buffers: BufferHandle,
}

pub struct FrameDriver<B: RenderBackend> {
    backend: B,
    settings: SceneSettings,
    running: Option<Running>,
}

impl<B: RenderBackend> FrameDriver<B> {
    pub fn new(backend: B, settings: SceneSettings) -> Self {
        Self {
            backend,
            settings,
            running: None,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.running.is_some() {
            Phase::Running
        } else {
            Phase::Initializing
        }
    }

    /// Scene state, once running.
    pub fn scene(&self) -> Option<&SceneState> {
        self.running.as_ref().map(|r| &r.scene)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Parse the mesh, set up the program and buffers, and wait for the
    /// texture. The driver only switches to `Running` when every step
    /// succeeded; backend resources made by an earlier step are released
    /// when a later one fails.
    pub async fn initialize(
        &mut self,
        assets: &SceneAssets<'_>,
    ) -> Result<(), InitializationError> {
        if self.running.is_some() {
            return Err(InitializationError::AlreadyRunning);
        }

        let mesh = asset::parse(assets.mesh_source)?;
        log::info!("Mesh expanded to {} vertices", mesh.vertex_count());

        let program = self
            .backend
            .create_program(assets.vertex_shader, assets.fragment_shader)?;
        let buffers = match self.backend.create_buffers(&mesh) {
            Ok(buffers) => buffers,
            Err(err) => {
                self.backend.release_program(program);
                return Err(err);
            }
        };

        if let Err(err) = self.attach_texture(program, assets.texture).await {
            log::warn!("Releasing program {} and buffer set {}", program.0, buffers.0);
            self.backend.release_buffers(buffers);
            self.backend.release_program(program);
            return Err(err);
        }

        let scene = SceneState::new(&self.settings, self.backend.aspect_ratio());
        self.running = Some(Running {
            scene,
            program,
            buffers,
        });
        log::info!("Scene initialized, entering render loop");
        Ok(())
    }

    async fn attach_texture(
        &mut self,
        program: ProgramHandle,
        source: &TextureSource,
    ) -> Result<(), InitializationError> {
        log::info!("Waiting for texture: {}", source.describe());
        let texture = self.backend.load_texture(source).await?;
        if let Err(err) = self.backend.bind_texture(program, texture) {
            self.backend.release_texture(texture);
            return Err(err);
        }
        Ok(())
    }

    /// Advance the world transform by one spin step and draw the result.
    pub fn tick(&mut self, delta_hint: Duration) -> Result<SceneSnapshot, FrameError> {
        let running = self.running.as_mut().ok_or(FrameError::NotRunning)?;

        running.scene.advance();
        let snapshot = running.scene.snapshot();
        log::trace!("tick {} (frame delta {:?})", snapshot.tick, delta_hint);

        self.backend
            .bind_buffers_and_attributes(running.program, running.buffers)?;
        self.backend
            .set_uniforms(running.program, &snapshot.uniforms())?;
        self.backend.draw(running.buffers)?;

        Ok(snapshot)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.backend.resize(width, height);
        let aspect = self.backend.aspect_ratio();
        if let Some(running) = self.running.as_mut() {
            running.scene.set_aspect(aspect);
        }
    }
}
