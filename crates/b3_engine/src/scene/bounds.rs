//! Bounding spheres
//!
//! Spheres are built with Ritter's approximation: a cheap two-pass seed from
//! the farthest pair of points followed by a single growing pass. The result
//! always contains every input point but can be up to roughly 5% larger than
//! the minimal enclosing sphere, which is fine for culling.

use thiserror::Error;

use crate::foundation::math::{Mat4, Point3, Vec3};

/// Errors raised while building bounding volumes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CullingError {
    /// A bounding sphere was requested for a mesh with no vertices
    #[error("cannot bound an empty vertex set")]
    EmptyVertexSet,
}

/// Sphere with a center and non-negative radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Sphere center
    pub center: Vec3,
    /// Sphere radius
    pub radius: f32,
}

impl BoundingSphere {
    /// Create a sphere from center and radius
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Ritter's approximate bounding sphere of a point set.
    ///
    /// Ties in the farthest-point scans keep the first point found.
    pub fn from_points(points: &[Vec3]) -> Result<Self, CullingError> {
        let seed = points.first().ok_or(CullingError::EmptyVertexSet)?;

        let a = farthest_from(points, seed);
        let b = farthest_from(points, &a);

        let mut center = (a + b) * 0.5;
        let mut radius = (b - a).norm() * 0.5;

        for point in points {
            let offset = point - center;
            let distance = offset.norm();
            if distance > radius {
                let new_radius = (radius + distance) * 0.5;
                center += offset * ((new_radius - radius) / distance);
                radius = new_radius;
            }
        }

        Ok(Self { center, radius })
    }

    /// Move the sphere into the space described by `transform`.
    ///
    /// Only the rigid part is applied, so the radius is unchanged.
    pub fn transformed(&self, transform: &Mat4) -> Self {
        Self {
            center: transform.transform_point(&Point3::from(self.center)).coords,
            radius: self.radius,
        }
    }

    /// Whether a point lies inside the sphere, allowing `tolerance` of slack
    pub fn contains(&self, point: &Vec3, tolerance: f32) -> bool {
        (point - self.center).norm() <= self.radius + tolerance
    }
}

fn farthest_from(points: &[Vec3], origin: &Vec3) -> Vec3 {
    let mut best = points[0];
    let mut best_distance = (best - origin).norm_squared();

    for point in &points[1..] {
        let distance = (point - origin).norm_squared();
        if distance > best_distance {
            best = *point;
            best_distance = distance;
        }
    }

    best
}
