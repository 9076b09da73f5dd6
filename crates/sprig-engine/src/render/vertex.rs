use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::coords::UvRect;
use crate::paint::Color;

/// Per-vertex data of a batched quad.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub color: [f32; 4], // premultiplied
    pub uv: [f32; 2],
    /// Texture slot, float-encoded.
    pub tex_index: f32,
    pub tag: i32,
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x4,
        2 => Float32x2,
        3 => Float32,
        4 => Sint32,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }

    #[inline]
    pub fn slot(&self) -> u32 {
        self.tex_index as u32
    }
}

pub const VERTICES_PER_QUAD: usize = 4;
pub const INDICES_PER_QUAD: usize = 6;

/// Unit quad centered on the origin: bottom-left, bottom-right, top-right, top-left.
pub const UNIT_QUAD: [Vec4; 4] = [
    Vec4::new(-0.5, -0.5, 0.0, 1.0),
    Vec4::new(0.5, -0.5, 0.0, 1.0),
    Vec4::new(0.5, 0.5, 0.0, 1.0),
    Vec4::new(-0.5, 0.5, 0.0, 1.0),
];

/// `0,1,2, 2,3,0` repeated for `max_quads` quads.
pub fn quad_indices(max_quads: u32) -> Vec<u32> {
    (0..max_quads)
        .flat_map(|q| {
            let b = q * VERTICES_PER_QUAD as u32;
            [b, b + 1, b + 2, b + 2, b + 3, b]
        })
        .collect()
}

/// Builds the four vertices of one quad.
pub(crate) fn quad_vertices(
    transform: &Mat4,
    uv: UvRect,
    color: Color,
    slot: u32,
    tag: i32,
) -> [QuadVertex; 4] {
    let uvs = uv.corners();
    let color = [color.r, color.g, color.b, color.a];
    std::array::from_fn(|i| {
        let p = *transform * UNIT_QUAD[i];
        QuadVertex {
            position: [p.x, p.y, p.z],
            color,
            uv: uvs[i],
            tex_index: slot as f32,
            tag,
        }
    })
}
