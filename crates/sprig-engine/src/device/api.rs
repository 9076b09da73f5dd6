//! The GPU contract consumed by the asset cache and the batch renderer.
//!
//! Handles are opaque indices handed out by a backend. They are only
//! meaningful to the device that created them.

/// Opaque texture object.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureHandle(u32);

/// Opaque vertex or index buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BufferHandle(u32);

/// Opaque compiled shader program (vertex + fragment stage).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ShaderHandle(u32);

macro_rules! raw_handle {
    ($ty:ident) => {
        impl $ty {
            #[inline]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

raw_handle!(TextureHandle);
raw_handle!(BufferHandle);
raw_handle!(ShaderHandle);

/// Pixel formats the engine uploads. Both are 4 bytes per pixel.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureFormat {
    /// Color images (sRGB encoded).
    Rgba8Srgb,
    /// Linear data such as glyph coverage.
    Rgba8Unorm,
}

impl TextureFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        4
    }
}

/// Description of a texture to create. Rows are bottom-up.
#[derive(Debug, Copy, Clone)]
pub struct TextureDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    /// Initial contents. `None` creates a zero-filled texture.
    pub pixels: Option<&'a [u8]>,
}

impl TextureDesc<'_> {
    /// Asserts the pixel payload matches the declared size.
    ///
    /// A mismatch is a programming error in format negotiation, so this
    /// panics instead of returning an error.
    pub fn validate(&self) {
        assert!(
            self.width > 0 && self.height > 0,
            "texture '{}' has zero size ({}x{})",
            self.label,
            self.width,
            self.height
        );
        if let Some(pixels) = self.pixels {
            let expected =
                self.width as usize * self.height as usize * self.format.bytes_per_pixel();
            assert_eq!(
                pixels.len(),
                expected,
                "texture '{}' upload is {} bytes, expected {} for {}x{} {:?}",
                self.label,
                pixels.len(),
                expected,
                self.width,
                self.height,
                self.format
            );
        }
    }
}

/// Sub-rectangle of a texture in pixels, origin bottom-left.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TextureRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Asserts the region fits in a `size` texture and `data` covers it.
    pub fn validate(&self, size: [u32; 2], format: TextureFormat, data: &[u8]) {
        assert!(
            self.x + self.width <= size[0] && self.y + self.height <= size[1],
            "region {self:?} exceeds texture size {size:?}"
        );
        let expected = self.width as usize * self.height as usize * format.bytes_per_pixel();
        assert_eq!(
            data.len(),
            expected,
            "region upload is {} bytes, expected {expected}",
            data.len()
        );
    }
}

/// Minimal GPU surface the engine needs.
///
/// Implementations panic on contract violations (malformed uploads,
/// unknown handles): those indicate engine bugs, not user data problems.
pub trait GpuDevice {
    /// Number of texture units available to one draw submission.
    fn max_texture_slots(&self) -> u32;

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> TextureHandle;

    /// Overwrites part of an existing texture.
    fn upload_subregion(&mut self, texture: TextureHandle, region: TextureRegion, data: &[u8]);

    fn release_texture(&mut self, texture: TextureHandle);

    /// Allocates a vertex buffer of `capacity` bytes.
    fn create_vertex_buffer(&mut self, capacity: u64) -> BufferHandle;

    fn create_index_buffer(&mut self, indices: &[u32]) -> BufferHandle;

    /// Replaces the start of `buffer` with `data`.
    fn upload(&mut self, buffer: BufferHandle, data: &[u8]);

    fn release_buffer(&mut self, buffer: BufferHandle);

    /// Compiles a program from WGSL sources (`vs_main` / `fs_main`).
    fn create_shader(&mut self, label: &str, vertex_src: &str, fragment_src: &str) -> ShaderHandle;

    fn release_shader(&mut self, shader: ShaderHandle);

    /// Selects the program used by subsequent draws; `None` restores the
    /// built-in batch program.
    fn bind_shader(&mut self, shader: Option<ShaderHandle>);

    /// Column-major view-projection matrix for subsequent draws.
    fn set_view_projection(&mut self, matrix: [[f32; 4]; 4]);

    fn bind_texture(&mut self, texture: TextureHandle, slot: u32);

    /// Draws `index_count` indices from `indices` over `vertices`.
    fn draw_indexed(&mut self, vertices: BufferHandle, indices: BufferHandle, index_count: u32);
}

impl<D: GpuDevice + ?Sized> GpuDevice for &mut D {
    fn max_texture_slots(&self) -> u32 {
        (**self).max_texture_slots()
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> TextureHandle {
        (**self).create_texture(desc)
    }

    fn upload_subregion(&mut self, texture: TextureHandle, region: TextureRegion, data: &[u8]) {
        (**self).upload_subregion(texture, region, data)
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        (**self).release_texture(texture)
    }

    fn create_vertex_buffer(&mut self, capacity: u64) -> BufferHandle {
        (**self).create_vertex_buffer(capacity)
    }

    fn create_index_buffer(&mut self, indices: &[u32]) -> BufferHandle {
        (**self).create_index_buffer(indices)
    }

    fn upload(&mut self, buffer: BufferHandle, data: &[u8]) {
        (**self).upload(buffer, data)
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        (**self).release_buffer(buffer)
    }

    fn create_shader(&mut self, label: &str, vertex_src: &str, fragment_src: &str) -> ShaderHandle {
        (**self).create_shader(label, vertex_src, fragment_src)
    }

    fn release_shader(&mut self, shader: ShaderHandle) {
        (**self).release_shader(shader)
    }

    fn bind_shader(&mut self, shader: Option<ShaderHandle>) {
        (**self).bind_shader(shader)
    }

    fn set_view_projection(&mut self, matrix: [[f32; 4]; 4]) {
        (**self).set_view_projection(matrix)
    }

    fn bind_texture(&mut self, texture: TextureHandle, slot: u32) {
        (**self).bind_texture(texture, slot)
    }

    fn draw_indexed(&mut self, vertices: BufferHandle, indices: BufferHandle, index_count: u32) {
        (**self).draw_indexed(vertices, indices, index_count)
    }
}
