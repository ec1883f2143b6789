//! Math utilities and types
//!
//! Thin aliases over nalgebra plus the projection helpers the renderer needs.
//! All matrices are column-major and applied as `M * v`.
//!
//! ## Conventions
//!
//! - World space is right-handed with +Z up.
//! - Clip space follows Vulkan: depth in `[0, 1]` and +Y pointing down. The Y
//!   flip lives in [`Mat4Ext::vulkan_perspective`], not in the view matrix.

pub use nalgebra::{Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Math utility functions
pub mod utils {
    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians.to_degrees()
    }
}

/// Build a rotation from XYZ euler angles in radians.
///
/// Matches the usual `quat(vec3(pitch, yaw, roll))` construction: the result
/// is `Rz * Ry * Rx`, so X is applied first.
pub fn quat_from_euler(angles: Vec3) -> Quat {
    Quat::from_euler_angles(angles.x, angles.y, angles.z)
}

/// Extension trait for Mat4 with the projection and view builders used by the renderer
pub trait Mat4Ext {
    /// Right-handed perspective projection with depth mapped to `[0, 1]`.
    ///
    /// `fov_y` is in radians. Y is not flipped.
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// [`Mat4Ext::perspective`] with the Y axis flipped for Vulkan's
    /// downward-pointing clip-space Y.
    fn vulkan_perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Right-handed look-at view matrix
    fn look_at(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (near - far);
        result[(2, 3)] = -(far * near) / (far - near);
        result[(3, 2)] = -1.0;
        result
    }

    fn vulkan_perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let mut result = Self::perspective(fov_y, aspect, near, far);
        result[(1, 1)] *= -1.0;
        result
    }

    fn look_at(eye: &Vec3, target: &Vec3, up: &Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(*eye), &Point3::from(*target), up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_perspective_maps_near_and_far_to_unit_depth() {
        let proj = Mat4::perspective(utils::deg_to_rad(60.0), 1.0, 0.1, 10.0);

        let near = proj * Vec4::new(0.0, 0.0, -0.1, 1.0);
        let far = proj * Vec4::new(0.0, 0.0, -10.0, 1.0);

        assert_relative_eq!(near.z / near.w, 0.0, epsilon = EPSILON);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_vulkan_perspective_flips_y() {
        let proj = Mat4::perspective(1.0, 1.5, 0.1, 10.0);
        let flipped = Mat4::vulkan_perspective(1.0, 1.5, 0.1, 10.0);

        assert_relative_eq!(flipped[(1, 1)], -proj[(1, 1)], epsilon = EPSILON);
        assert_relative_eq!(flipped[(0, 0)], proj[(0, 0)], epsilon = EPSILON);
    }

    #[test]
    fn test_look_at_moves_target_onto_negative_z() {
        let eye = Vec3::new(0.0, 5.0, 5.0);
        let view = Mat4::look_at(&eye, &Vec3::zeros(), &Vec3::z());

        let origin = view.transform_point(&Point3::origin());
        let distance = eye.norm();

        assert_relative_eq!(origin.x, 0.0, epsilon = EPSILON);
        assert_relative_eq!(origin.y, 0.0, epsilon = EPSILON);
        assert_relative_eq!(origin.z, -distance, epsilon = EPSILON);
    }

    #[test]
    fn test_zero_euler_is_identity() {
        let q = quat_from_euler(Vec3::zeros());
        assert_relative_eq!(q, Quat::identity(), epsilon = EPSILON);
    }
}
