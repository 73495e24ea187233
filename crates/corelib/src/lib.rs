//! Core types: math re-exports, camera, scene state, the rendering boundary
//! and the frame driver.

pub use glam::{Mat4, Quat, Vec3, vec3};

pub mod camera;
pub mod driver;
pub mod error;
pub mod render_api;
pub mod scene;

pub use driver::{FrameDriver, Phase, SceneAssets};
pub use error::{FrameError, InitializationError};
pub use render_api::{
    BufferHandle, ProgramHandle, RenderBackend, TextureHandle, UniformValue, Uniforms,
};
pub use scene::{SceneSettings, SceneSnapshot, SceneState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_pv_is_finite() {
        let cam = camera::Camera::new_perspective(
            vec3(0.0, 0.0, 4.0),
            vec3(0.0, 0.0, 0.0),
            Vec3::Y,
            60f32.to_radians(),
            0.1,
            100.0,
            16.0 / 9.0,
        );
        let pv = cam.proj() * cam.view();
        let a = pv.to_cols_array();
        assert!(a.iter().all(|f| f.is_finite()));
    }

    #[test]
    fn camera_looks_down_target_direction() {
        let cam = SceneSettings::default().camera(1.0);
        // The eye sits at z = 1.5 looking towards -Z, so the target ends up
        // straight ahead at view-space z = -0.5.
        let target = cam.view().transform_point3(cam.target);
        assert!(target.abs_diff_eq(vec3(0.0, 0.0, -0.5), 1e-6));
    }
}
