//! # Engine Configuration
//!
//! All tunables for the window, renderer, shadow pass, lighting and camera in
//! one serializable tree. Every section has defaults, so a config file only
//! needs the values it wants to change:
//!
//! ```toml
//! log_level = "debug"
//!
//! [shadow]
//! map_size = 4096
//!
//! [lighting]
//! position = [0.0, 3.0, 6.0]
//! ```
//!
//! ## Sections
//!
//! - **window**: title and initial size
//! - **renderer**: Vulkan instance settings, shader location, capacities
//! - **shadow**: shadow map resolution, depth bias and light projection
//! - **lighting**: the single directional-style point light
//! - **camera**: initial eye/target and movement tuning

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::foundation::math::Vec3;

pub use crate::config::{Config, ConfigError};

/// Window creation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "b3Engine".to_string(),
            width: 1024,
            height: 768,
        }
    }
}

/// # Vulkan Renderer Configuration
///
/// Settings for the Vulkan backend, including capacities of the per-node
/// uniform buffers and the bindless texture array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Whether to enable Vulkan validation layers (`None` = debug builds only)
    pub enable_validation: Option<bool>,
    /// Directory holding the compiled SPIR-V shaders
    pub shader_dir: PathBuf,
    /// Upper bound on MSAA samples for the color pass
    pub max_msaa_samples: u32,
    /// Capacity of the per-node uniform buffers
    pub max_nodes: u32,
    /// Capacity of the texture array
    pub max_textures: u32,
    /// Color the color pass clears to
    pub clear_color: [f32; 4],
}

impl RendererConfig {
    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            application_name: "b3Engine".to_string(),
            enable_validation: None,
            shader_dir: PathBuf::from("target/shaders"),
            max_msaa_samples: 4,
            max_nodes: 32,
            max_textures: 4096,
            clear_color: [0.01, 0.01, 0.033, 1.0],
        }
    }
}

/// Shadow pass settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Width and height of the square shadow map in texels
    pub map_size: u32,
    /// Constant depth bias applied while rendering the shadow map
    pub depth_bias_constant: f32,
    /// Slope-scaled depth bias applied while rendering the shadow map
    pub depth_bias_slope: f32,
    /// Vertical field of view of the light projection, in degrees
    pub fov_degrees: f32,
    /// Light projection near plane
    pub near: f32,
    /// Light projection far plane
    pub far: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            map_size: 2048,
            depth_bias_constant: 1.25,
            depth_bias_slope: 1.75,
            fov_degrees: 60.0,
            near: 0.1,
            far: 10.0,
        }
    }
}

/// Scene light settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Light position in world space
    pub position: Vec3,
    /// Linear RGB light color
    pub color: Vec3,
    /// Light intensity multiplier
    pub intensity: f32,
    /// Ambient factor applied to shadowed and unlit surfaces
    pub ambient: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 5.0, 5.0),
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            ambient: 0.1,
        }
    }
}

/// Initial camera placement and controls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Initial eye position
    pub eye: Vec3,
    /// Point the camera initially looks at
    pub target: Vec3,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Near plane
    pub near: f32,
    /// Far plane
    pub far: f32,
    /// Movement speed in units per second
    pub speed: f32,
    /// Degrees of rotation per unit of mouse motion
    pub sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            eye: Vec3::new(1.7, 1.7, 1.0),
            target: Vec3::zeros(),
            fov_degrees: 60.0,
            near: 0.1,
            far: 10.0,
            speed: 1.0,
            sensitivity: 0.1,
        }
    }
}

/// # Engine Configuration
///
/// Root of the configuration tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log level (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
    /// Window settings
    pub window: WindowConfig,
    /// Renderer settings
    pub renderer: RendererConfig,
    /// Shadow pass settings
    pub shadow: ShadowConfig,
    /// Light settings
    pub lighting: LightingConfig,
    /// Camera settings
    pub camera: CameraConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            window: WindowConfig::default(),
            renderer: RendererConfig::default(),
            shadow: ShadowConfig::default(),
            lighting: LightingConfig::default(),
            camera: CameraConfig::default(),
        }
    }
}

impl Config for EngineConfig {}

impl EngineConfig {
    /// Create a configuration with every section at its default
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window title and size
    pub fn with_window(mut self, title: impl Into<String>, width: u32, height: u32) -> Self {
        self.window = WindowConfig {
            title: title.into(),
            width,
            height,
        };
        self
    }

    /// Set the log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.renderer.enable_validation = Some(enabled);
        self
    }

    /// Set the shader directory
    pub fn with_shader_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.renderer.shader_dir = dir.into();
        self
    }

    /// Set the shadow map resolution
    pub fn with_shadow_map_size(mut self, size: u32) -> Self {
        self.shadow.map_size = size;
        self
    }

    /// Set the light position
    pub fn with_light_position(mut self, position: Vec3) -> Self {
        self.lighting.position = position;
        self
    }

    /// Parsed log level, falling back to `info` for unknown names
    pub fn log_level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid("window size must be non-zero".to_string()));
        }

        if self.renderer.max_nodes == 0 {
            return Err(ConfigError::Invalid("max_nodes must be at least 1".to_string()));
        }

        if self.renderer.max_textures == 0 {
            return Err(ConfigError::Invalid("max_textures must be at least 1".to_string()));
        }

        if !self.shadow.map_size.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "shadow map size {} is not a power of two",
                self.shadow.map_size
            )));
        }

        if self.shadow.near <= 0.0 || self.shadow.near >= self.shadow.far {
            return Err(ConfigError::Invalid(format!(
                "shadow projection needs 0 < near < far, got {}..{}",
                self.shadow.near, self.shadow.far
            )));
        }

        if self.camera.near <= 0.0 || self.camera.near >= self.camera.far {
            return Err(ConfigError::Invalid(format!(
                "camera projection needs 0 < near < far, got {}..{}",
                self.camera.near, self.camera.far
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.shadow.map_size, 2048);
        assert_eq!(config.renderer.max_nodes, 32);
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 768);
    }

    #[test]
    fn test_non_power_of_two_shadow_map_is_rejected() {
        let config = EngineConfig::new().with_shadow_map_size(1000);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_inverted_clip_planes_are_rejected() {
        let mut config = EngineConfig::new();
        config.shadow.near = 20.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config: EngineConfig = toml::from_str(
            "log_level = \"debug\"\n[shadow]\nmap_size = 4096\n",
        )
        .unwrap();

        assert_eq!(config.shadow.map_size, 4096);
        assert_eq!(config.shadow.depth_bias_constant, 1.25);
        assert_eq!(config.lighting.ambient, 0.1);
        assert_eq!(config.log_level_filter(), log::LevelFilter::Debug);
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_info() {
        let config = EngineConfig::new().with_log_level("chatty");
        assert_eq!(config.log_level_filter(), log::LevelFilter::Info);
    }
}
