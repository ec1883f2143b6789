//! Backend implementations for the render module

pub mod vulkan;

#[cfg(test)]
pub mod recording;
