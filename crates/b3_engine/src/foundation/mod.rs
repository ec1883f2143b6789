//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and projection helpers
//! - Arena collections for the scene graph
//! - Logging setup
//! - Frame timing

pub mod collections;
pub mod logging;
pub mod math;
pub mod time;
