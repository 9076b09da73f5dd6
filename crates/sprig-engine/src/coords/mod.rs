//! Geometry helpers shared by the asset cache and the batch renderer.
//!
//! Canonical space:
//! - texture rows and UVs have a bottom-left origin
//! - quads are the unit square centered on the origin, placed by a `Mat4`

mod transform;
mod uv_rect;

pub use transform::{pixel_projection, quad_transform, rect_transform};
pub use uv_rect::UvRect;
