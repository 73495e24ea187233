//! Per-frame scene state: camera matrices, light and the spinning world
//! transform.

use crate::{
    Mat4, Quat, Vec3,
    camera::Camera,
    render_api::{U_LIGHT_DIRECTION, U_PROJECTION, U_VIEW, U_WORLD, UniformValue, Uniforms},
    vec3,
};

/// Fixed scene parameters, chosen before the loop starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneSettings {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_deg: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub light_direction: Vec3,
    /// Axis of the per-tick world rotation; normalised when used.
    pub spin_axis: Vec3,
    pub spin_deg_per_tick: f32,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            eye: vec3(0.0, 0.0, 1.5),
            target: vec3(0.0, 0.0, 1.0),
            up: Vec3::Y,
            fov_y_deg: 90.0,
            z_near: 0.01,
            z_far: 10.0,
            light_direction: vec3(1.0, 1.0, 1.0),
            spin_axis: vec3(1.0, 1.0, 0.0),
            spin_deg_per_tick: 0.01,
        }
    }
}

impl SceneSettings {
    pub fn camera(&self, aspect: f32) -> Camera {
        Camera::new_perspective(
            self.eye,
            self.target,
            self.up,
            self.fov_y_deg.to_radians(),
            self.z_near,
            self.z_far,
            aspect,
        )
    }

    /// Rotation applied to the world transform once per tick.
    pub fn spin(&self) -> Mat4 {
        let axis = self.spin_axis.try_normalize().unwrap_or(Vec3::Y);
        Mat4::from_quat(Quat::from_axis_angle(axis, self.spin_deg_per_tick.to_radians()))
    }
}

/// Mutable scene record owned by the frame driver.
#[derive(Clone, Debug)]
pub struct SceneState {
    world: Mat4,
    view: Mat4,
    projection: Mat4,
    light_direction: Vec3,
    spin: Mat4,
    camera: Camera,
    ticks: u64,
}

impl SceneState {
    pub fn new(settings: &SceneSettings, aspect: f32) -> Self {
        let camera = settings.camera(aspect);
        Self {
            world: Mat4::IDENTITY,
            view: camera.view(),
            projection: camera.proj(),
            light_direction: settings.light_direction,
            spin: settings.spin(),
            camera,
            ticks: 0,
        }
    }

    /// Compose one more spin increment onto the world transform.
    pub fn advance(&mut self) {
        self.world *= self.spin;
        self.ticks += 1;
    }

    /// Rebuild the projection for a new viewport; the world transform is kept.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.camera = self.camera.with_aspect(aspect);
        self.projection = self.camera.proj();
    }

    pub fn world(&self) -> Mat4 {
        self.world
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            tick: self.ticks,
            world: self.world,
            view: self.view,
            projection: self.projection,
            light_direction: self.light_direction,
        }
    }
}

/// Read-only copy of the scene handed to the renderer each tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneSnapshot {
    pub tick: u64,
    pub world: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub light_direction: Vec3,
}

impl SceneSnapshot {
    pub fn uniforms(&self) -> Uniforms {
        let mut uniforms = Uniforms::new();
        uniforms
            .set(U_LIGHT_DIRECTION, UniformValue::Vec3(self.light_direction))
            .set(U_VIEW, UniformValue::Mat4(self.view))
            .set(U_PROJECTION, UniformValue::Mat4(self.projection))
            .set(U_WORLD, UniformValue::Mat4(self.world));
        uniforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: Mat4, b: Mat4) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    #[test]
    fn world_starts_at_identity() {
        let scene = SceneState::new(&SceneSettings::default(), 1.0);
        assert_eq!(scene.world(), Mat4::IDENTITY);
        assert_eq!(scene.ticks(), 0);
    }

    #[test]
    fn world_accumulates_rotation() {
        let settings = SceneSettings {
            spin_deg_per_tick: 30.0,
            spin_axis: Vec3::Z,
            ..SceneSettings::default()
        };
        let mut scene = SceneState::new(&settings, 1.0);
        for _ in 0..3 {
            scene.advance();
        }
        assert_eq!(scene.ticks(), 3);
        assert!(approx_eq(
            scene.world(),
            Mat4::from_rotation_z(90f32.to_radians())
        ));
    }

    #[test]
    fn zero_spin_axis_falls_back_to_y() {
        let settings = SceneSettings {
            spin_axis: Vec3::ZERO,
            spin_deg_per_tick: 45.0,
            ..SceneSettings::default()
        };
        assert!(approx_eq(
            settings.spin(),
            Mat4::from_rotation_y(45f32.to_radians())
        ));
    }

    #[test]
    fn resize_keeps_world_and_view() {
        let mut scene = SceneState::new(&SceneSettings::default(), 1.0);
        scene.advance();
        let before = scene.snapshot();
        scene.set_aspect(2.0);
        let after = scene.snapshot();
        assert_eq!(before.world, after.world);
        assert_eq!(before.view, after.view);
        assert_ne!(before.projection, after.projection);
    }

    #[test]
    fn snapshot_exposes_four_uniforms() {
        let scene = SceneState::new(&SceneSettings::default(), 16.0 / 9.0);
        let snapshot = scene.snapshot();
        let uniforms = snapshot.uniforms();
        assert_eq!(uniforms.len(), 4);
        assert_eq!(
            uniforms.vec3(U_LIGHT_DIRECTION),
            Some(vec3(1.0, 1.0, 1.0))
        );
        assert_eq!(uniforms.mat4(U_WORLD), Some(Mat4::IDENTITY));
        assert_eq!(uniforms.mat4(U_VIEW), Some(snapshot.view));
        assert_eq!(uniforms.mat4(U_PROJECTION), Some(snapshot.projection));
    }

    #[test]
    fn default_projection_is_finite() {
        let scene = SceneState::new(&SceneSettings::default(), 16.0 / 9.0);
        let snapshot = scene.snapshot();
        let pv = snapshot.projection * snapshot.view;
        assert!(pv.to_cols_array().iter().all(|f| f.is_finite()));
    }
}
