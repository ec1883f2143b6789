//! # Core Engine Module
//!
//! Shared configuration types used by every subsystem.

pub mod config;

pub use config::{
    CameraConfig, Config, ConfigError, EngineConfig, LightingConfig, RendererConfig,
    ShadowConfig, WindowConfig,
};
