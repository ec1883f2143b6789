//! Primitive mesh generators
//!
//! Subdivided planes, cubes and UV spheres. All generators emit
//! counter-clockwise triangles when seen from outside the surface.
//! Subdivision counts below one are raised to one.

use crate::foundation::math::{Vec2, Vec3};

use super::mesh::Mesh;

/// Axis a generated plane faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpAxis {
    /// Plane spans Y and Z
    X,
    /// Plane spans Z and X
    Y,
    /// Plane spans X and Y
    #[default]
    Z,
}

impl UpAxis {
    fn normal(self) -> Vec3 {
        match self {
            UpAxis::X => Vec3::x(),
            UpAxis::Y => Vec3::y(),
            UpAxis::Z => Vec3::z(),
        }
    }

    /// Place in-plane coordinates `(s, t)` at `offset` along the axis.
    ///
    /// The mapping keeps `s × t` equal to the axis direction.
    fn place(self, s: f32, t: f32, offset: f32) -> Vec3 {
        match self {
            UpAxis::Z => Vec3::new(s, t, offset),
            UpAxis::Y => Vec3::new(t, offset, s),
            UpAxis::X => Vec3::new(offset, s, t),
        }
    }
}

/// Texture coordinates of three plane corners.
///
/// `a` is the top-left corner, `b` the top-right and `c` the bottom-left, in
/// Vulkan's top-down texture space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvMap {
    /// Top-left
    pub a: Vec2,
    /// Top-right
    pub b: Vec2,
    /// Bottom-left
    pub c: Vec2,
}

impl Default for UvMap {
    fn default() -> Self {
        Self {
            a: Vec2::new(0.0, 0.0),
            b: Vec2::new(1.0, 0.0),
            c: Vec2::new(0.0, 1.0),
        }
    }
}

/// Flat grid of `(nx + 1) × (ny + 1)` vertices facing `up`
pub fn plane_mesh(width: f32, height: f32, up: UpAxis, nx: u32, ny: u32, uv_map: UvMap) -> Mesh {
    let (nx, ny) = (nx.max(1), ny.max(1));
    let ab = uv_map.b - uv_map.a;
    let ac = uv_map.c - uv_map.a;

    let mut mesh = Mesh::default();
    let normal = up.normal();

    for i in 0..=nx {
        let i_ratio = i as f32 / nx as f32;
        let s = -width * 0.5 + i_ratio * width;
        let uv_row = uv_map.a + ab * i_ratio;

        for j in 0..=ny {
            let j_ratio = j as f32 / ny as f32;
            let t = -height * 0.5 + j_ratio * height;
            let uv = uv_row + ac * (1.0 - j_ratio);
            mesh.add_vertex(up.place(s, t, 0.0), normal, [uv.x, uv.y]);
        }
    }

    push_grid_indices(&mut mesh, 0, nx, ny, false);
    mesh
}

/// Box centered at the origin, each face split into `nx × ny` quads
pub fn cube_mesh(width: f32, height: f32, depth: f32, nx: u32, ny: u32) -> Mesh {
    let (nx, ny) = (nx.max(1), ny.max(1));
    let mut mesh = Mesh::default();

    // (axis, face extent along s, along t, offset, sign)
    let faces = [
        (UpAxis::Z, width, height, depth * 0.5, 1.0),
        (UpAxis::Z, width, height, -depth * 0.5, -1.0),
        (UpAxis::X, height, depth, width * 0.5, 1.0),
        (UpAxis::X, height, depth, -width * 0.5, -1.0),
        (UpAxis::Y, depth, width, height * 0.5, 1.0),
        (UpAxis::Y, depth, width, -height * 0.5, -1.0),
    ];

    for (axis, face_width, face_height, offset, sign) in faces {
        let start = mesh.vertices.len() as u32;
        let normal = axis.normal() * sign;

        for i in 0..=nx {
            let s = -face_width * 0.5 + i as f32 * face_width / nx as f32;
            let u = 1.0 - i as f32 / nx as f32;

            for j in 0..=ny {
                let t = -face_height * 0.5 + j as f32 * face_height / ny as f32;
                let v = j as f32 / ny as f32;
                mesh.add_vertex(axis.place(s, t, offset), normal, [u, v]);
            }
        }

        push_grid_indices(&mut mesh, start, nx, ny, sign < 0.0);
    }

    mesh
}

/// UV sphere with Y as the polar axis
pub fn sphere_mesh(radius: f32, longs: u32, lats: u32) -> Mesh {
    let (longs, lats) = (longs.max(1), lats.max(1));
    let mut mesh = Mesh::default();

    for lat in 0..=lats {
        let theta = lat as f32 * std::f32::consts::PI / lats as f32;
        let (sin_theta, cos_theta) = theta.sin_cos();

        for long in 0..=longs {
            let phi = long as f32 * 2.0 * std::f32::consts::PI / longs as f32;
            let (sin_phi, cos_phi) = phi.sin_cos();

            let unit = Vec3::new(cos_phi * sin_theta, cos_theta, sin_phi * sin_theta);
            let u = 1.0 - long as f32 / longs as f32;
            let v = lat as f32 / lats as f32;
            mesh.add_vertex(unit * radius, unit, [u, v]);
        }
    }

    for lat in 0..lats {
        for long in 0..longs {
            let first = lat * (longs + 1) + long;
            let second = first + longs + 1;
            let third = first + 1;
            let fourth = second + 1;

            mesh.add_triangle(first, third, second);
            mesh.add_triangle(second, third, fourth);
        }
    }

    mesh
}

/// Two triangles per grid cell. Vertices are laid out with the outer loop over
/// `nx` and the inner loop over `ny`.
fn push_grid_indices(mesh: &mut Mesh, start: u32, nx: u32, ny: u32, flip: bool) {
    for i in 0..nx {
        for j in 0..ny {
            let first = start + i * (ny + 1) + j;
            let second = first + ny + 1;
            let third = first + 1;
            let fourth = second + 1;

            if flip {
                mesh.add_triangle(first, third, second);
                mesh.add_triangle(third, fourth, second);
            } else {
                mesh.add_triangle(first, second, third);
                mesh.add_triangle(third, second, fourth);
            }
        }
    }
}
