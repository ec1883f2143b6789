//! Frustum extraction and sphere culling
//!
//! Planes are pulled straight out of a combined view-projection matrix with
//! the Gribb-Hartmann row combinations, then normalized so that
//! [`Plane::signed_distance`] is a true Euclidean distance. Every plane normal
//! points into the frustum.
//!
//! The sphere test is conservative: an object is only rejected when its
//! bounding sphere lies entirely on the outside of at least one plane. A
//! sphere that touches a plane from outside (distance exactly `-radius`)
//! still counts as visible.

use crate::foundation::math::{Mat4, Vec3, Vec4};

use super::bounds::BoundingSphere;

/// Plane in Hessian normal form: points `p` on the plane satisfy `normal·p + d = 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Plane normal, unit length after normalization
    pub normal: Vec3,
    /// Offset term
    pub d: f32,
}

impl Plane {
    /// Create a plane from an already-normalized normal and offset
    pub fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Build a plane from raw `(a, b, c, d)` coefficients without normalizing
    pub fn from_coefficients(coefficients: Vec4) -> Self {
        Self {
            normal: coefficients.xyz(),
            d: coefficients.w,
        }
    }

    /// Scale normal and offset so the normal has unit length.
    ///
    /// A zero-length normal cannot be normalized; the plane is returned
    /// unchanged and `false` is reported.
    pub fn normalized(self) -> (Self, bool) {
        let length = self.normal.norm();
        if length == 0.0 {
            return (self, false);
        }
        (
            Self {
                normal: self.normal / length,
                d: self.d / length,
            },
            true,
        )
    }

    /// Signed distance of a point to the plane (positive on the inside)
    pub fn signed_distance(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// Index of each plane inside [`Frustum::planes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrustumSide {
    /// x >= -w
    Left = 0,
    /// x <= w
    Right = 1,
    /// y >= -w
    Bottom = 2,
    /// y <= w
    Top = 3,
    /// z >= -w
    Near = 4,
    /// z <= w
    Far = 5,
}

/// Six clip planes ordered left, right, bottom, top, near, far
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// The clip planes, indexed by [`FrustumSide`]
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract the six clip planes of a view-projection matrix.
    ///
    /// Each plane is `row4 ± row_i` of the matrix, normalized by the length of
    /// its normal. Planes with a zero-length normal (a degenerate projection)
    /// are kept unnormalized and logged.
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let row = |i: usize| -> Vec4 { view_projection.row(i).transpose() };
        let (x, y, z, w) = (row(0), row(1), row(2), row(3));

        let raw = [w + x, w - x, w + y, w - y, w + z, w - z];

        let planes = raw.map(|coefficients| {
            let (plane, ok) = Plane::from_coefficients(coefficients).normalized();
            if !ok {
                log::debug!("Degenerate frustum plane {:?}, skipping normalization", coefficients);
            }
            plane
        });

        Self { planes }
    }

    /// Get a plane by side
    pub fn plane(&self, side: FrustumSide) -> &Plane {
        &self.planes[side as usize]
    }

    /// Test a world-space sphere against the frustum.
    ///
    /// Returns `false` as soon as one plane has the center further than
    /// `radius` on its outside, `true` otherwise.
    pub fn intersects_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(&sphere.center) >= -sphere.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{utils::deg_to_rad, Mat4Ext};
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    /// Orthographic box mapping [-10, 10] on every axis to clip space [-1, 1]
    fn box_frustum() -> Frustum {
        Frustum::from_view_projection(&Mat4::new_scaling(0.1))
    }

    fn sample_view_projections() -> Vec<Mat4> {
        let eye = Vec3::new(1.7, 1.7, 1.0);
        let view = Mat4::look_at(&eye, &Vec3::zeros(), &Vec3::z());
        let light_view = Mat4::look_at(&Vec3::new(0.0, 5.0, 5.0), &Vec3::zeros(), &Vec3::z());

        vec![
            Mat4::vulkan_perspective(deg_to_rad(60.0), 1024.0 / 768.0, 0.1, 10.0) * view,
            Mat4::vulkan_perspective(deg_to_rad(60.0), 1.0, 0.1, 10.0) * light_view,
            Mat4::perspective(deg_to_rad(90.0), 2.0, 1.0, 96.0) * view,
            Mat4::new_scaling(0.1),
            Mat4::new_nonuniform_scaling(&Vec3::new(0.5, 0.25, 2.0)) * light_view,
        ]
    }

    #[test]
    fn test_extracted_planes_are_unit_length() {
        for vp in sample_view_projections() {
            let frustum = Frustum::from_view_projection(&vp);
            for plane in &frustum.planes {
                assert_relative_eq!(plane.normal.norm(), 1.0, epsilon = EPSILON);
            }
        }
    }

    #[test]
    fn test_box_frustum_plane_order_and_orientation() {
        let frustum = box_frustum();

        assert_relative_eq!(frustum.plane(FrustumSide::Left).normal, Vec3::new(1.0, 0.0, 0.0), epsilon = EPSILON);
        assert_relative_eq!(frustum.plane(FrustumSide::Right).normal, Vec3::new(-1.0, 0.0, 0.0), epsilon = EPSILON);
        assert_relative_eq!(frustum.plane(FrustumSide::Bottom).normal, Vec3::new(0.0, 1.0, 0.0), epsilon = EPSILON);
        assert_relative_eq!(frustum.plane(FrustumSide::Top).normal, Vec3::new(0.0, -1.0, 0.0), epsilon = EPSILON);
        assert_relative_eq!(frustum.plane(FrustumSide::Near).normal, Vec3::new(0.0, 0.0, 1.0), epsilon = EPSILON);
        assert_relative_eq!(frustum.plane(FrustumSide::Far).normal, Vec3::new(0.0, 0.0, -1.0), epsilon = EPSILON);

        for plane in &frustum.planes {
            assert_relative_eq!(plane.d, 10.0, epsilon = EPSILON);
        }
    }

    #[test]
    fn test_signed_distance_is_euclidean() {
        let frustum = box_frustum();
        let left = frustum.plane(FrustumSide::Left);

        assert_relative_eq!(left.signed_distance(&Vec3::new(-10.0, 3.0, 3.0)), 0.0, epsilon = EPSILON);
        assert_relative_eq!(left.signed_distance(&Vec3::new(-13.0, 0.0, 0.0)), -3.0, epsilon = EPSILON);
        assert_relative_eq!(left.signed_distance(&Vec3::new(0.0, 0.0, 0.0)), 10.0, epsilon = EPSILON);
    }

    #[test]
    fn test_sphere_fully_inside_is_visible() {
        let frustum = box_frustum();
        let sphere = BoundingSphere::new(Vec3::new(2.0, -3.0, 4.0), 1.0);

        for plane in &frustum.planes {
            assert!(plane.signed_distance(&sphere.center) >= sphere.radius);
        }
        assert!(frustum.intersects_sphere(&sphere));
    }

    #[test]
    fn test_sphere_beyond_one_plane_is_culled() {
        let frustum = box_frustum();

        assert!(!frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(12.0, 0.0, 0.0), 1.0)));
        assert!(!frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, -11.5, 0.0), 1.0)));
        assert!(!frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, 0.0, 20.0), 5.0)));
    }

    #[test]
    fn test_sphere_straddling_plane_is_visible() {
        let frustum = box_frustum();
        let sphere = BoundingSphere::new(Vec3::new(10.5, 0.0, 0.0), 1.0);
        assert!(frustum.intersects_sphere(&sphere));
    }

    #[test]
    fn test_tangent_sphere_outside_is_visible() {
        let frustum = Frustum::new([
            Plane::new(Vec3::new(1.0, 0.0, 0.0), 10.0),
            Plane::new(Vec3::new(-1.0, 0.0, 0.0), 10.0),
            Plane::new(Vec3::new(0.0, 1.0, 0.0), 10.0),
            Plane::new(Vec3::new(0.0, -1.0, 0.0), 10.0),
            Plane::new(Vec3::new(0.0, 0.0, 1.0), 10.0),
            Plane::new(Vec3::new(0.0, 0.0, -1.0), 10.0),
        ]);
        // Center 2 units outside the right plane with radius 2: distance == -radius
        let sphere = BoundingSphere::new(Vec3::new(12.0, 0.0, 0.0), 2.0);

        let distance = frustum.plane(FrustumSide::Right).signed_distance(&sphere.center);
        assert_eq!(distance, -sphere.radius);
        assert!(frustum.intersects_sphere(&sphere));
    }

    #[test]
    fn test_perspective_frustum_culls_behind_camera() {
        let view = Mat4::look_at(&Vec3::new(0.0, -5.0, 0.0), &Vec3::zeros(), &Vec3::z());
        let vp = Mat4::vulkan_perspective(deg_to_rad(60.0), 1.0, 0.1, 10.0) * view;
        let frustum = Frustum::from_view_projection(&vp);

        assert!(frustum.intersects_sphere(&BoundingSphere::new(Vec3::zeros(), 0.5)));
        assert!(!frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, -8.0, 0.0), 0.5)));
        assert!(!frustum.intersects_sphere(&BoundingSphere::new(Vec3::new(0.0, 20.0, 0.0), 0.5)));
    }

    #[test]
    fn test_zero_normal_plane_is_left_unnormalized() {
        let (plane, ok) = Plane::from_coefficients(Vec4::new(0.0, 0.0, 0.0, 2.0)).normalized();
        assert!(!ok);
        assert_eq!(plane.normal, Vec3::zeros());
        assert_eq!(plane.d, 2.0);
    }

    #[test]
    fn test_degenerate_matrix_does_not_produce_nan() {
        let frustum = Frustum::from_view_projection(&Mat4::zeros());
        for plane in &frustum.planes {
            assert!(plane.normal.iter().all(|c| c.is_finite()));
            assert!(plane.d.is_finite());
        }
    }
}
