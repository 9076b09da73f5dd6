use glam::{Mat4, Quat, Vec2, Vec3};

/// Transform mapping the unit quad onto a `size` rectangle centered at `center`,
/// rotated by `rotation` radians around +Z.
#[inline]
pub fn quad_transform(center: Vec3, size: Vec2, rotation: f32) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        size.extend(1.0),
        Quat::from_rotation_z(rotation),
        center,
    )
}

/// Transform placing the unit quad over the rectangle `[min, min + size]`.
#[inline]
pub fn rect_transform(min: Vec2, size: Vec2, z: f32) -> Mat4 {
    quad_transform((min + size * 0.5).extend(z), size, 0.0)
}

/// Pixel-space orthographic projection, origin bottom-left, +Y up.
#[inline]
pub fn pixel_projection(width: u32, height: u32) -> Mat4 {
    Mat4::orthographic_rh(0.0, width.max(1) as f32, 0.0, height.max(1) as f32, -1.0, 1.0)
}
