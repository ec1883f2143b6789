//! Demo viewer
//!
//! Builds a floor, a sphere and a cube, then flies a camera around them with
//! the mouse and WASD. Settings are read from `b3_viewer.toml` when it exists.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use b3_engine::assets::TextureError;
use b3_engine::config::ConfigError;
use b3_engine::foundation::logging;
use b3_engine::prelude::*;
use b3_engine::scene::CullingError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_PATH: &str = "b3_viewer.toml";

/// Engine settings plus the demo's own options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ViewerConfig {
    #[serde(flatten)]
    engine: EngineConfig,
    /// Image for the floor; a grey solid color when unset
    floor_texture: Option<PathBuf>,
}

impl Config for ViewerConfig {}

#[derive(Error, Debug)]
enum ViewerError {
    #[error("Failed to load {CONFIG_PATH}: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Failed to load floor texture: {0}")]
    Texture(#[from] TextureError),

    #[error("Invalid mesh: {0}")]
    Mesh(#[from] CullingError),
}

fn solid(r: f32, g: f32, b: f32) -> Arc<Texture> {
    Arc::new(Texture::solid_color(RgbaColor::new(r, g, b, 1.0)))
}

fn build_scene(scene: &mut SceneGraph, floor_texture: Arc<Texture>) -> Result<(), CullingError> {
    let floor = plane_mesh(6.0, 6.0, UpAxis::Z, 1, 1, UvMap::default());
    scene.add_node(Node::new(Arc::new(floor), floor_texture)?.with_position(Vec3::new(0.0, 0.0, -0.5)));

    let sphere = sphere_mesh(0.5, 32, 32);
    scene.add_node(Node::new(Arc::new(sphere), solid(0.0, 1.0, 0.0))?.with_position(Vec3::new(1.0, 0.0, 0.0)));

    let cube = cube_mesh(1.0, 1.0, 1.0, 1, 1);
    scene.add_node(Node::new(Arc::new(cube), solid(0.0, 0.0, 1.0))?.with_position(Vec3::new(-1.0, 0.0, 0.0)));

    Ok(())
}

fn run() -> Result<(), ViewerError> {
    let config = match ViewerConfig::load_or_default(CONFIG_PATH) {
        Ok(config) => {
            logging::init_with_level(config.engine.log_level_filter());
            config
        }
        Err(e) => {
            logging::init_with_level(logging::LevelFilter::Info);
            return Err(e.into());
        }
    };

    let floor_texture = match &config.floor_texture {
        Some(path) => {
            log::info!("Loading floor texture {}", path.display());
            Arc::new(Texture::from_file(path, true)?)
        }
        None => solid(0.5, 0.5, 0.5),
    };

    let mut engine = Engine::new(&config.engine)?;
    build_scene(engine.scene_mut(), floor_texture)?;
    engine.run()?;

    log::info!("Viewer closed");
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_scene_layout() {
        let mut scene = SceneGraph::new();
        build_scene(&mut scene, solid(0.5, 0.5, 0.5)).unwrap();

        let positions: Vec<Vec3> = scene.iter().map(|(_, node)| node.position()).collect();
        assert_eq!(
            positions,
            vec![
                Vec3::new(0.0, 0.0, -0.5),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(-1.0, 0.0, 0.0),
            ]
        );
    }

    #[test]
    fn test_viewer_config_reads_flattened_engine_settings() {
        let config: ViewerConfig = toml::from_str(
            "log_level = \"debug\"\nfloor_texture = \"floor.png\"\n[shadow]\nmap_size = 1024\n",
        )
        .unwrap();

        assert_eq!(config.engine.log_level, "debug");
        assert_eq!(config.engine.shadow.map_size, 1024);
        assert_eq!(config.floor_texture, Some(PathBuf::from("floor.png")));
    }
}
