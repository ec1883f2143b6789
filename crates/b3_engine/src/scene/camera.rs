//! # Fly Camera
//!
//! Z-up first-person camera driven by yaw and pitch angles in degrees. Mouse
//! motion turns it, WASD moves it along its facing.
//!
//! The camera knows nothing about the windowing layer: callers translate key
//! state into a [`MovementInput`] and cursor deltas into
//! [`Camera::handle_mouse_motion`].

use crate::core::config::CameraConfig;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};

const PITCH_LIMIT: f32 = 89.0;

/// Which movement keys are held this frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementInput {
    /// Move along the facing direction
    pub forward: bool,
    /// Move against the facing direction
    pub backward: bool,
    /// Strafe left
    pub left: bool,
    /// Strafe right
    pub right: bool,
}

/// Perspective fly camera
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    /// Degrees, measured from +X toward +Y
    yaw: f32,
    /// Degrees above the XY plane
    pitch: f32,
    speed: f32,
    sensitivity: f32,
    fov_degrees: f32,
    near: f32,
    far: f32,
}

impl Camera {
    /// Camera at `eye` facing `center`, with default projection and controls
    pub fn look_at(eye: Vec3, center: Vec3) -> Self {
        Self::from_config(&CameraConfig {
            eye,
            target: center,
            ..CameraConfig::default()
        })
    }

    /// Camera placed and tuned from configuration
    pub fn from_config(config: &CameraConfig) -> Self {
        let direction = (config.target - config.eye)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vec3::x);
        let horizontal = (direction.x * direction.x + direction.y * direction.y).sqrt();

        Self {
            position: config.eye,
            yaw: utils::rad_to_deg(direction.y.atan2(direction.x)),
            pitch: utils::rad_to_deg(direction.z.atan2(horizontal)),
            speed: config.speed,
            sensitivity: config.sensitivity,
            fov_degrees: config.fov_degrees,
            near: config.near,
            far: config.far,
        }
    }

    /// Turn by a cursor delta in screen units
    pub fn handle_mouse_motion(&mut self, dx: f32, dy: f32) {
        self.yaw -= dx * self.sensitivity;
        self.pitch = (self.pitch - dy * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Move for `dt` seconds with the given keys held
    pub fn update_movement(&mut self, input: MovementInput, dt: f32) {
        let front = self.front();
        let right = front.cross(&Vec3::z()).normalize();
        let step = self.speed * dt;

        if input.forward {
            self.position += front * step;
        }
        if input.backward {
            self.position -= front * step;
        }
        if input.left {
            self.position -= right * step;
        }
        if input.right {
            self.position += right * step;
        }
    }

    /// Unit facing direction
    pub fn front(&self) -> Vec3 {
        let (yaw, pitch) = (utils::deg_to_rad(self.yaw), utils::deg_to_rad(self.pitch));
        Vec3::new(yaw.cos() * pitch.cos(), yaw.sin() * pitch.cos(), pitch.sin()).normalize()
    }

    /// World-to-view transform
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(&self.position, &(self.position + self.front()), &Vec3::z())
    }

    /// Vulkan perspective projection for the given viewport aspect ratio
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::vulkan_perspective(utils::deg_to_rad(self.fov_degrees), aspect, self.near, self.far)
    }

    /// Position in world space
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Yaw in degrees
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Pitch in degrees
    pub fn pitch(&self) -> f32 {
        self.pitch
    }
}
