//! Entry point for Orbitview: logging, CLI flags, then the render loop.

mod config;

use anyhow::Result;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let config = config::parse_config(&args);
    log::info!(
        "Starting Orbitview. Backend: {:?}, show_fps={}, window_size={}x{}, mesh={}, texture={}",
        config.backends,
        config.show_fps,
        config.width,
        config.height,
        config.mesh_path.display(),
        config.texture.describe()
    );

    platform::run_with_renderer(config)?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
