//! Platform layer: window, event loop and frame scheduling.
//!
//! The scene is fully initialized (mesh, program, buffers, texture) inside
//! `resumed` before the first redraw is requested. Each `RedrawRequested`
//! runs one driver tick and requests the next redraw.

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result, anyhow};
use asset::TextureSource;
use corelib::{FrameDriver, SceneAssets, SceneSettings};
use renderer::{GpuContext, MESH_FRAGMENT_SHADER, MESH_VERTEX_SHADER, WgpuBackend};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

/// Everything the viewer needs to start.
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub backends: wgpu::Backends,
    pub width: u32,
    pub height: u32,
    pub show_fps: bool,
    pub mesh_path: PathBuf,
    pub texture: TextureSource,
    pub scene: SceneSettings,
}

/// Open the window and render until it is closed.
/// Initialization failures end the loop and are returned here.
pub fn run_with_renderer(config: ViewerConfig) -> Result<()> {
    let mesh_source = asset::read_obj_source(&config.mesh_path)?;

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = Viewer::new(config, mesh_source);
    event_loop
        .run_app(&mut viewer)
        .map_err(|e| anyhow!("Event loop error: {e:?}"))?;

    match viewer.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct Viewer {
    config: ViewerConfig,
    mesh_source: String,
    window: Option<Arc<Window>>,
    driver: Option<FrameDriver<WgpuBackend>>,
    failure: Option<anyhow::Error>,
    last_frame: Instant,
    fps: FpsCounter,
}

impl Viewer {
    fn new(config: ViewerConfig, mesh_source: String) -> Self {
        Self {
            config,
            mesh_source,
            window: None,
            driver: None,
            failure: None,
            last_frame: Instant::now(),
            fps: FpsCounter::new(Duration::from_secs(1)),
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("Orbitview")
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("Failed to create window")?,
        );
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let ctx = pollster::block_on(GpuContext::new(window.clone(), self.config.backends))?;
        let mut driver = FrameDriver::new(WgpuBackend::new(ctx), self.config.scene);

        let assets = SceneAssets {
            mesh_source: &self.mesh_source,
            texture: &self.config.texture,
            vertex_shader: MESH_VERTEX_SHADER,
            fragment_shader: MESH_FRAGMENT_SHADER,
        };
        pollster::block_on(driver.initialize(&assets)).context("Scene initialization failed")?;

        self.last_frame = Instant::now();
        window.request_redraw();
        self.window = Some(window);
        self.driver = Some(driver);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure = Some(err);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(driver) = self.driver.as_mut() else {
            return;
        };

        let now = Instant::now();
        let delta = now - self.last_frame;
        self.last_frame = now;

        match driver.tick(delta) {
            Ok(_) => {
                if let Some(fps) = self.fps.frame(now) {
                    if self.config.show_fps {
                        log::info!("FPS: {:.1}", fps);
                    }
                }
            }
            Err(e) if WgpuBackend::is_surface_lost(&e) => {
                log::warn!("Surface lost, reconfiguring");
                driver.backend_mut().recreate_surface();
            }
            Err(e) => {
                self.fail(event_loop, anyhow!(e).context("Frame rendering failed"));
                return;
            }
        }

        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.driver.is_some() || self.failure.is_some() {
            return;
        }
        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                log::info!("Resized: {}x{}", new_size.width, new_size.height);
                if let Some(driver) = self.driver.as_mut() {
                    driver.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                log::info!("Scale factor changed: {:.3}", scale_factor);
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }
}

/// Counts frames and reports the rate once per `window`.
struct FpsCounter {
    window: Duration,
    started: Option<Instant>,
    frames: u32,
}

impl FpsCounter {
    fn new(window: Duration) -> Self {
        Self {
            window,
            started: None,
            frames: 0,
        }
    }

    fn frame(&mut self, now: Instant) -> Option<f64> {
        let started = *self.started.get_or_insert(now);
        self.frames += 1;

        let elapsed = now.duration_since(started);
        if elapsed < self.window {
            return None;
        }
        let fps = f64::from(self.frames) / elapsed.as_secs_f64();
        self.started = Some(now);
        self.frames = 0;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_reported_once_per_window() {
        let mut counter = FpsCounter::new(Duration::from_secs(1));
        let t0 = Instant::now();
        assert_eq!(counter.frame(t0), None);
        for i in 1..60 {
            assert_eq!(counter.frame(t0 + Duration::from_millis(i * 16)), None);
        }
        let fps = counter.frame(t0 + Duration::from_secs(1)).expect("report");
        assert!((fps - 61.0).abs() < 1e-9, "{fps}");
        assert_eq!(counter.frame(t0 + Duration::from_millis(1016)), None);
    }
}
