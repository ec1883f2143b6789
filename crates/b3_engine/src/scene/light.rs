//! Scene light and its shadow projection

use crate::core::config::{LightingConfig, ShadowConfig};
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};

/// Point light aimed at the world origin for shadow rendering
#[derive(Debug, Clone)]
pub struct Light {
    /// Position in world space
    pub position: Vec3,
    /// Linear RGB color
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
    /// Ambient term used for unlit and shadowed surfaces
    pub ambient: f32,
    fov_degrees: f32,
    near: f32,
    far: f32,
}

impl Light {
    /// Build the light from its lighting and shadow sections
    pub fn from_config(lighting: &LightingConfig, shadow: &ShadowConfig) -> Self {
        Self {
            position: lighting.position,
            color: lighting.color,
            intensity: lighting.intensity,
            ambient: lighting.ambient,
            fov_degrees: shadow.fov_degrees,
            near: shadow.near,
            far: shadow.far,
        }
    }

    /// View from the light toward the origin with +Z up
    pub fn view_matrix(&self) -> Mat4 {
        // +Z up degenerates when the light sits on the Z axis
        let horizontal = self.position.xy().norm();
        let up = if horizontal > f32::EPSILON { Vec3::z() } else { Vec3::y() };
        Mat4::look_at(&self.position, &Vec3::zeros(), &up)
    }

    /// Square perspective projection covering the shadow map
    pub fn projection(&self) -> Mat4 {
        Mat4::vulkan_perspective(utils::deg_to_rad(self.fov_degrees), 1.0, self.near, self.far)
    }

    /// Light view-projection, the transform the shadow pass renders with
    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view_matrix()
    }
}

impl Default for Light {
    fn default() -> Self {
        Self::from_config(&LightingConfig::default(), &ShadowConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_origin_projects_to_shadow_map_center() {
        let light = Light::default();
        let clip = light.view_projection() * Vec4::new(0.0, 0.0, 0.0, 1.0);

        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = EPSILON);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = EPSILON);
        let depth = clip.z / clip.w;
        assert!((0.0..=1.0).contains(&depth));
    }

    #[test]
    fn test_projection_is_square() {
        let projection = Light::default().projection();
        assert_relative_eq!(projection[(0, 0)], -projection[(1, 1)], epsilon = EPSILON);
    }

    #[test]
    fn test_light_above_origin_has_finite_view() {
        let mut light = Light::default();
        light.position = Vec3::new(0.0, 0.0, 5.0);
        assert!(light.view_matrix().iter().all(|v| v.is_finite()));
    }
}
