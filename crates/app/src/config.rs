//! Command-line configuration. Flags use the `--key=value` form; unknown
//! flags are ignored.

use std::path::PathBuf;

use asset::TextureSource;
use corelib::SceneSettings;
use platform::ViewerConfig;

const DEFAULT_MESH: &str = "assets/sphere.obj";
const CHECKERBOARD_SIZE: u32 = 64;

pub fn parse_backend_arg(args: &[String]) -> wgpu::Backends {
    // Accept: --gpu-backend=auto|vulkan|dx12|metal|gl
    let mut backends = wgpu::Backends::all(); // default = auto
    for arg in args {
        if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            backends = match val.to_ascii_lowercase().as_str() {
                "auto" => wgpu::Backends::all(),
                "vulkan" | "vk" => wgpu::Backends::VULKAN,
                "dx12" | "d3d12" => wgpu::Backends::DX12,
                "metal" | "mtl" => wgpu::Backends::METAL,
                "gl" | "opengl" | "gles" => wgpu::Backends::GL,
                other => {
                    log::warn!("Unknown backend '{}', falling back to auto.", other);
                    wgpu::Backends::all()
                }
            };
        }
    }
    backends
}

pub fn parse_show_fps_arg(args: &[String]) -> bool {
    // --show-fps[=on|off], off by default
    for arg in args {
        if arg == "--show-fps" {
            return true;
        }
        if let Some(val) = arg.strip_prefix("--show-fps=") {
            return matches!(
                val.to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            );
        }
    }
    false
}

pub fn parse_size_args(args: &[String]) -> (u32, u32) {
    let mut w: Option<u32> = None;
    let mut h: Option<u32> = None;

    for arg in args {
        if let Some(v) = arg.strip_prefix("--size=") {
            if let Some((sw, sh)) = v.split_once('x').or_else(|| v.split_once('X')) {
                if let (Ok(pw), Ok(ph)) = (sw.parse::<u32>(), sh.parse::<u32>()) {
                    w = Some(pw);
                    h = Some(ph);
                }
            }
        } else if let Some(v) = arg.strip_prefix("--width=") {
            if let Ok(pw) = v.parse::<u32>() {
                w = Some(pw);
            }
        } else if let Some(v) = arg.strip_prefix("--height=") {
            if let Ok(ph) = v.parse::<u32>() {
                h = Some(ph);
            }
        }
    }

    let ww = w.unwrap_or(1280).max(1);
    let hh = h.unwrap_or(720).max(1);
    (ww, hh)
}

fn last_value<'a>(args: &'a [String], prefix: &str) -> Option<&'a str> {
    args.iter().rev().find_map(|arg| arg.strip_prefix(prefix))
}

pub fn parse_mesh_arg(args: &[String]) -> PathBuf {
    PathBuf::from(last_value(args, "--mesh=").unwrap_or(DEFAULT_MESH))
}

pub fn parse_texture_arg(args: &[String]) -> TextureSource {
    match last_value(args, "--texture=") {
        Some(path) if !path.is_empty() => TextureSource::File(PathBuf::from(path)),
        _ => TextureSource::Checkerboard(CHECKERBOARD_SIZE),
    }
}

pub fn parse_scene_args(args: &[String]) -> SceneSettings {
    let mut scene = SceneSettings::default();
    if let Some(v) = last_value(args, "--spin-deg=") {
        match v.parse::<f32>() {
            Ok(deg) if deg.is_finite() => scene.spin_deg_per_tick = deg,
            _ => log::warn!("Ignoring invalid --spin-deg value '{}'", v),
        }
    }
    scene
}

pub fn parse_config(args: &[String]) -> ViewerConfig {
    let (width, height) = parse_size_args(args);
    ViewerConfig {
        backends: parse_backend_arg(args),
        width,
        height,
        show_fps: parse_show_fps_arg(args),
        mesh_path: parse_mesh_arg(args),
        texture: parse_texture_arg(args),
        scene: parse_scene_args(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_without_flags() {
        let config = parse_config(&args(&["app"]));
        assert_eq!(config.backends, wgpu::Backends::all());
        assert_eq!((config.width, config.height), (1280, 720));
        assert!(!config.show_fps);
        assert_eq!(config.mesh_path, PathBuf::from(DEFAULT_MESH));
        assert_eq!(config.texture, TextureSource::Checkerboard(CHECKERBOARD_SIZE));
        assert_eq!(config.scene, SceneSettings::default());
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse_config(&args(&[
            "app",
            "--gpu-backend=Vulkan",
            "--size=800x600",
            "--show-fps=on",
            "--mesh=models/orange.obj",
            "--texture=models/orange.png",
            "--spin-deg=0.5",
        ]));
        assert_eq!(config.backends, wgpu::Backends::VULKAN);
        assert_eq!((config.width, config.height), (800, 600));
        assert!(config.show_fps);
        assert_eq!(config.mesh_path, PathBuf::from("models/orange.obj"));
        assert_eq!(
            config.texture,
            TextureSource::File(PathBuf::from("models/orange.png"))
        );
        assert_eq!(config.scene.spin_deg_per_tick, 0.5);
    }

    #[test]
    fn size_is_clamped_and_partial_flags_apply() {
        assert_eq!(parse_size_args(&args(&["--width=0"])), (1, 720));
        assert_eq!(parse_size_args(&args(&["--height=300"])), (1280, 300));
        assert_eq!(parse_size_args(&args(&["--size=bogus"])), (1280, 720));
    }

    #[test]
    fn invalid_spin_keeps_default() {
        let scene = parse_scene_args(&args(&["--spin-deg=fast"]));
        assert_eq!(scene.spin_deg_per_tick, SceneSettings::default().spin_deg_per_tick);
    }

    #[test]
    fn unknown_backend_falls_back_to_auto() {
        assert_eq!(
            parse_backend_arg(&args(&["--gpu-backend=glide"])),
            wgpu::Backends::all()
        );
    }
}
