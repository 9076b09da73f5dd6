use super::{
    BufferHandle, GpuDevice, ShaderHandle, TextureDesc, TextureFormat, TextureHandle,
    TextureRegion,
};
use crate::render::QuadVertex;

const DEFAULT_SLOTS: u32 = 32;

/// CPU-side record of a texture.
#[derive(Debug, Clone)]
pub struct RecordedTexture {
    pub label: String,
    pub size: [u32; 2],
    pub format: TextureFormat,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
struct RecordedBuffer {
    capacity: u64,
    data: Vec<u8>,
}

/// One `draw_indexed` submission and the state it was issued with.
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub index_count: u32,
    pub shader: Option<ShaderHandle>,
    pub view_projection: [[f32; 4]; 4],
    /// Texture bound to each slot at submission time.
    pub bindings: Vec<Option<TextureHandle>>,
    vertex_bytes: Vec<u8>,
}

impl DrawCall {
    #[inline]
    pub fn quad_count(&self) -> u32 {
        self.index_count / 6
    }

    pub fn texture_at(&self, slot: u32) -> Option<TextureHandle> {
        self.bindings.get(slot as usize).copied().flatten()
    }

    /// Vertices referenced by this draw (`4 * quad_count`).
    pub fn vertices(&self) -> Vec<QuadVertex> {
        let len = self.quad_count() as usize * 4 * std::mem::size_of::<QuadVertex>();
        let len = len.min(self.vertex_bytes.len());
        bytemuck::pod_collect_to_vec(&self.vertex_bytes[..len])
    }
}

/// A [`GpuDevice`] that keeps everything in memory and records submissions.
///
/// Used for headless dry runs and in tests. Contract violations panic the
/// same way a real backend would.
#[derive(Debug)]
pub struct RecordingDevice {
    max_slots: u32,
    textures: Vec<Option<RecordedTexture>>,
    buffers: Vec<Option<RecordedBuffer>>,
    shaders: Vec<Option<String>>,
    bindings: Vec<Option<TextureHandle>>,
    shader: Option<ShaderHandle>,
    view_projection: [[f32; 4]; 4],
    draws: Vec<DrawCall>,
    released_textures: Vec<TextureHandle>,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::with_texture_slots(DEFAULT_SLOTS)
    }

    pub fn with_texture_slots(max_slots: u32) -> Self {
        Self {
            max_slots,
            textures: Vec::new(),
            buffers: Vec::new(),
            shaders: Vec::new(),
            bindings: vec![None; max_slots as usize],
            shader: None,
            view_projection: glam::Mat4::IDENTITY.to_cols_array_2d(),
            draws: Vec::new(),
            released_textures: Vec::new(),
        }
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }

    /// Quads submitted across every recorded draw.
    pub fn total_quads(&self) -> u32 {
        self.draws.iter().map(DrawCall::quad_count).sum()
    }

    pub fn clear_draws(&mut self) {
        self.draws.clear();
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&RecordedTexture> {
        self.textures.get(handle.raw() as usize).and_then(Option::as_ref)
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.iter().filter(|t| t.is_some()).count()
    }

    pub fn released_textures(&self) -> &[TextureHandle] {
        &self.released_textures
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.iter().filter(|b| b.is_some()).count()
    }

    pub fn shader_label(&self, handle: ShaderHandle) -> Option<&str> {
        self.shaders.get(handle.raw() as usize).and_then(|s| s.as_deref())
    }

    fn texture_mut(&mut self, handle: TextureHandle) -> &mut RecordedTexture {
        self.textures
            .get_mut(handle.raw() as usize)
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("unknown or released texture {handle:?}"))
    }

    fn buffer_mut(&mut self, handle: BufferHandle) -> &mut RecordedBuffer {
        self.buffers
            .get_mut(handle.raw() as usize)
            .and_then(Option::as_mut)
            .unwrap_or_else(|| panic!("unknown buffer {handle:?}"))
    }

    fn push_buffer(&mut self, buffer: RecordedBuffer) -> BufferHandle {
        self.buffers.push(Some(buffer));
        BufferHandle::from_raw(self.buffers.len() as u32 - 1)
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuDevice for RecordingDevice {
    fn max_texture_slots(&self) -> u32 {
        self.max_slots
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> TextureHandle {
        desc.validate();
        let len = desc.width as usize * desc.height as usize * desc.format.bytes_per_pixel();
        let pixels = desc.pixels.map_or_else(|| vec![0; len], <[u8]>::to_vec);
        self.textures.push(Some(RecordedTexture {
            label: desc.label.to_owned(),
            size: [desc.width, desc.height],
            format: desc.format,
            pixels,
        }));
        TextureHandle::from_raw(self.textures.len() as u32 - 1)
    }

    fn upload_subregion(&mut self, texture: TextureHandle, region: TextureRegion, data: &[u8]) {
        let tex = self.texture_mut(texture);
        region.validate(tex.size, tex.format, data);

        let bpp = tex.format.bytes_per_pixel();
        let row_len = region.width as usize * bpp;
        for row in 0..region.height as usize {
            let dst = ((region.y as usize + row) * tex.size[0] as usize + region.x as usize) * bpp;
            let src = row * row_len;
            tex.pixels[dst..dst + row_len].copy_from_slice(&data[src..src + row_len]);
        }
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if let Some(slot) = self.textures.get_mut(texture.raw() as usize) {
            if slot.take().is_some() {
                self.released_textures.push(texture);
            }
        }
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        if let Some(slot) = self.buffers.get_mut(buffer.raw() as usize) {
            slot.take();
        }
    }

    fn create_vertex_buffer(&mut self, capacity: u64) -> BufferHandle {
        self.push_buffer(RecordedBuffer {
            capacity,
            data: Vec::new(),
        })
    }

    fn create_index_buffer(&mut self, indices: &[u32]) -> BufferHandle {
        let data: Vec<u8> = bytemuck::cast_slice(indices).to_vec();
        self.push_buffer(RecordedBuffer {
            capacity: data.len() as u64,
            data,
        })
    }

    fn upload(&mut self, buffer: BufferHandle, data: &[u8]) {
        let buf = self.buffer_mut(buffer);
        assert!(
            data.len() as u64 <= buf.capacity,
            "upload of {} bytes overflows buffer capacity {}",
            data.len(),
            buf.capacity
        );
        buf.data.clear();
        buf.data.extend_from_slice(data);
    }

    fn create_shader(&mut self, label: &str, _vertex_src: &str, _fragment_src: &str) -> ShaderHandle {
        self.shaders.push(Some(label.to_owned()));
        ShaderHandle::from_raw(self.shaders.len() as u32 - 1)
    }

    fn release_shader(&mut self, shader: ShaderHandle) {
        if let Some(slot) = self.shaders.get_mut(shader.raw() as usize) {
            *slot = None;
        }
    }

    fn bind_shader(&mut self, shader: Option<ShaderHandle>) {
        self.shader = shader;
    }

    fn set_view_projection(&mut self, matrix: [[f32; 4]; 4]) {
        self.view_projection = matrix;
    }

    fn bind_texture(&mut self, texture: TextureHandle, slot: u32) {
        assert!(
            slot < self.max_slots,
            "slot {slot} out of range (device has {})",
            self.max_slots
        );
        assert!(self.texture(texture).is_some(), "binding unknown texture {texture:?}");
        self.bindings[slot as usize] = Some(texture);
    }

    fn draw_indexed(&mut self, vertices: BufferHandle, indices: BufferHandle, index_count: u32) {
        let index_len = self.buffer_mut(indices).data.len() / std::mem::size_of::<u32>();
        assert!(
            index_count as usize <= index_len,
            "draw of {index_count} indices exceeds index buffer ({index_len})"
        );
        let vertex_bytes = self.buffer_mut(vertices).data.clone();

        self.draws.push(DrawCall {
            index_count,
            shader: self.shader,
            view_projection: self.view_projection,
            bindings: self.bindings.clone(),
            vertex_bytes,
        });
    }
}
