//! Sample meshes for the lit-cube scene.

use glam::{Mat4, Vec3};

use crate::vertex::VertexLayout;

/// Floats per [`CUBE_VERTICES`] vertex: position, normal, uv.
pub const CUBE_STRIDE: usize = 8;

/// Unit cube as 36 unindexed vertices.
#[rustfmt::skip]
pub const CUBE_VERTICES: [f32; 36 * CUBE_STRIDE] = [
    // positions        // normals         // uv
    -0.5, -0.5, -0.5,   0.0,  0.0, -1.0,   0.0, 0.0,
     0.5, -0.5, -0.5,   0.0,  0.0, -1.0,   1.0, 0.0,
     0.5,  0.5, -0.5,   0.0,  0.0, -1.0,   1.0, 1.0,
     0.5,  0.5, -0.5,   0.0,  0.0, -1.0,   1.0, 1.0,
    -0.5,  0.5, -0.5,   0.0,  0.0, -1.0,   0.0, 1.0,
    -0.5, -0.5, -0.5,   0.0,  0.0, -1.0,   0.0, 0.0,

    -0.5, -0.5,  0.5,   0.0,  0.0,  1.0,   0.0, 0.0,
     0.5, -0.5,  0.5,   0.0,  0.0,  1.0,   1.0, 0.0,
     0.5,  0.5,  0.5,   0.0,  0.0,  1.0,   1.0, 1.0,
     0.5,  0.5,  0.5,   0.0,  0.0,  1.0,   1.0, 1.0,
    -0.5,  0.5,  0.5,   0.0,  0.0,  1.0,   0.0, 1.0,
    -0.5, -0.5,  0.5,   0.0,  0.0,  1.0,   0.0, 0.0,

    -0.5,  0.5,  0.5,  -1.0,  0.0,  0.0,   1.0, 0.0,
    -0.5,  0.5, -0.5,  -1.0,  0.0,  0.0,   1.0, 1.0,
    -0.5, -0.5, -0.5,  -1.0,  0.0,  0.0,   0.0, 1.0,
    -0.5, -0.5, -0.5,  -1.0,  0.0,  0.0,   0.0, 1.0,
    -0.5, -0.5,  0.5,  -1.0,  0.0,  0.0,   0.0, 0.0,
    -0.5,  0.5,  0.5,  -1.0,  0.0,  0.0,   1.0, 0.0,

     0.5,  0.5,  0.5,   1.0,  0.0,  0.0,   1.0, 0.0,
     0.5,  0.5, -0.5,   1.0,  0.0,  0.0,   1.0, 1.0,
     0.5, -0.5, -0.5,   1.0,  0.0,  0.0,   0.0, 1.0,
     0.5, -0.5, -0.5,   1.0,  0.0,  0.0,   0.0, 1.0,
     0.5, -0.5,  0.5,   1.0,  0.0,  0.0,   0.0, 0.0,
     0.5,  0.5,  0.5,   1.0,  0.0,  0.0,   1.0, 0.0,

    -0.5, -0.5, -0.5,   0.0, -1.0,  0.0,   0.0, 1.0,
     0.5, -0.5, -0.5,   0.0, -1.0,  0.0,   1.0, 1.0,
     0.5, -0.5,  0.5,   0.0, -1.0,  0.0,   1.0, 0.0,
     0.5, -0.5,  0.5,   0.0, -1.0,  0.0,   1.0, 0.0,
    -0.5, -0.5,  0.5,   0.0, -1.0,  0.0,   0.0, 0.0,
    -0.5, -0.5, -0.5,   0.0, -1.0,  0.0,   0.0, 1.0,

    -0.5,  0.5, -0.5,   0.0,  1.0,  0.0,   0.0, 1.0,
     0.5,  0.5, -0.5,   0.0,  1.0,  0.0,   1.0, 1.0,
     0.5,  0.5,  0.5,   0.0,  1.0,  0.0,   1.0, 0.0,
     0.5,  0.5,  0.5,   0.0,  1.0,  0.0,   1.0, 0.0,
    -0.5,  0.5,  0.5,   0.0,  1.0,  0.0,   0.0, 0.0,
    -0.5,  0.5, -0.5,   0.0,  1.0,  0.0,   0.0, 1.0,
];

/// World positions of the ten cubes in the scene.
pub const CUBE_POSITIONS: [Vec3; 10] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(2.0, 5.0, -15.0),
    Vec3::new(-1.5, -2.2, -2.5),
    Vec3::new(-3.8, -2.0, -12.3),
    Vec3::new(2.4, -0.4, -3.5),
    Vec3::new(-1.7, 3.0, -7.5),
    Vec3::new(1.3, -2.0, -2.5),
    Vec3::new(1.5, 2.0, -2.5),
    Vec3::new(1.5, 0.2, -1.5),
    Vec3::new(-1.3, 1.0, -1.5),
];

/// Textured quad with per-corner colors: position, color, uv.
#[rustfmt::skip]
pub const QUAD_VERTICES: [f32; 4 * 8] = [
     0.5,  0.5, 0.0,   1.0, 0.0, 0.0,   1.0, 1.0,
     0.5, -0.5, 0.0,   0.0, 1.0, 0.0,   1.0, 0.0,
    -0.5, -0.5, 0.0,   0.0, 0.0, 1.0,   0.0, 0.0,
    -0.5,  0.5, 0.0,   1.0, 1.0, 0.0,   0.0, 1.0,
];

pub const QUAD_INDICES: [u32; 6] = [0, 1, 3, 1, 2, 3];

/// Layout shared by [`CUBE_VERTICES`] and [`QUAD_VERTICES`].
pub fn position_normal_uv_layout() -> VertexLayout {
    VertexLayout::interleaved(&[3, 3, 2])
}

/// Model matrix of cube `index`: translated to its slot in
/// [`CUBE_POSITIONS`] and turned `20 * index` degrees about a fixed axis.
pub fn cube_model(index: usize) -> Mat4 {
    let position = CUBE_POSITIONS[index % CUBE_POSITIONS.len()];
    let axis = Vec3::new(1.0, 0.3, 0.5).normalize();
    let angle = (20.0 * index as f32).to_radians();
    Mat4::from_translation(position) * Mat4::from_axis_angle(axis, angle)
}
