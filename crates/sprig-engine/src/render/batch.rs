//! Batched quad renderer.
//!
//! Quads accumulate CPU-side and are submitted in as few `draw_indexed`
//! calls as possible. A submission happens when:
//! - the vertex buffer holds `max_quads` quads (capacity flush)
//! - a new resource needs a slot and every slot is taken (slot flush)
//! - the shader changes
//! - the batch ends
//!
//! Each distinct resource takes its own slot, keyed by asset id; sprites of
//! one sheet occupy separate slots bound to the same GPU texture. Quads are
//! never dropped.

use glam::{Mat4, Vec2};

use super::vertex::{INDICES_PER_QUAD, QuadVertex, VERTICES_PER_QUAD, quad_indices, quad_vertices};
use crate::asset::{AssetCache, AssetId, Resource, ShaderProgram, WeakHandle};
use crate::coords::{UvRect, rect_transform};
use crate::device::{
    BufferHandle, GpuDevice, ShaderHandle, TextureDesc, TextureFormat, TextureHandle,
};
use crate::paint::Color;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Quads per submission (vertex buffer capacity).
    pub max_quads: u32,
    /// Upper bound on texture slots; the device may offer fewer.
    pub max_texture_slots: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_quads: 10_000,
            max_texture_slots: 32,
        }
    }
}

/// Counters accumulated across batches until [`BatchRenderer::reset_stats`].
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub draw_calls: u32,
    pub quads: u32,
    /// Submissions forced by running out of texture slots.
    pub slot_flushes: u32,
    /// Submissions forced by a full vertex buffer.
    pub capacity_flushes: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FlushCause {
    Capacity,
    Slots,
    Shader,
    End,
}

/// What a slot holds: a resource, or one of the built-in textures.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SlotKey {
    Asset(AssetId),
    White,
    Missing,
}

/// GPU objects owned by the renderer, created on first `begin`.
#[derive(Debug, Copy, Clone)]
struct GpuState {
    vertices: BufferHandle,
    indices: BufferHandle,
    white: TextureHandle,
    missing: TextureHandle,
    max_quads: u32,
    slots: u32,
}

#[derive(Debug)]
pub struct BatchRenderer {
    config: BatchConfig,
    vertices: Vec<QuadVertex>,
    slots: Vec<(SlotKey, TextureHandle)>,
    gpu: Option<GpuState>,
    stats: BatchStats,
}

impl BatchRenderer {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            vertices: Vec::new(),
            slots: Vec::new(),
            gpu: None,
            stats: BatchStats::default(),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn stats(&self) -> BatchStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = BatchStats::default();
    }

    /// Effective slot count, known after the first `begin`.
    pub fn texture_slots(&self) -> Option<u32> {
        self.gpu.map(|g| g.slots)
    }

    /// Starts a batch. Submissions happen through `device`; resources are
    /// resolved through `assets`.
    ///
    /// The renderer binds its GPU objects to the first device it sees.
    pub fn begin<'a, D: GpuDevice + ?Sized>(
        &'a mut self,
        device: &'a mut D,
        assets: &'a AssetCache,
        view_projection: Mat4,
    ) -> Batch<'a, D> {
        let gpu = self.ensure_gpu(device);
        self.vertices.clear();
        self.vertices.reserve(gpu.max_quads as usize * VERTICES_PER_QUAD);
        self.slots.clear();

        device.set_view_projection(view_projection.to_cols_array_2d());
        device.bind_shader(None);

        Batch {
            renderer: self,
            device,
            assets,
            gpu,
            shader: None,
            finished: false,
        }
    }

    /// Releases the buffers and built-in textures created on `device`.
    ///
    /// The next `begin` allocates them again.
    pub fn release<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        let Some(gpu) = self.gpu.take() else {
            return;
        };
        device.release_buffer(gpu.vertices);
        device.release_buffer(gpu.indices);
        device.release_texture(gpu.white);
        device.release_texture(gpu.missing);
        self.vertices.clear();
        self.slots.clear();
        log::debug!("batch renderer released its GPU objects");
    }

    // ── lazy-init helpers ──────────────────────────────────────────────────

    fn ensure_gpu<D: GpuDevice + ?Sized>(&mut self, device: &mut D) -> GpuState {
        if let Some(gpu) = self.gpu {
            return gpu;
        }

        let max_quads = self.config.max_quads.max(1);
        let slots = self
            .config
            .max_texture_slots
            .min(device.max_texture_slots())
            .max(1);
        if slots < self.config.max_texture_slots {
            log::debug!(
                "device offers {} texture slots; batching with {slots}",
                device.max_texture_slots()
            );
        }

        let vertex_bytes =
            max_quads as u64 * VERTICES_PER_QUAD as u64 * std::mem::size_of::<QuadVertex>() as u64;
        let gpu = GpuState {
            vertices: device.create_vertex_buffer(vertex_bytes),
            indices: device.create_index_buffer(&quad_indices(max_quads)),
            white: builtin_texture(device, "sprig white", 1, &[255, 255, 255, 255]),
            missing: builtin_texture(device, "sprig missing", 2, &missing_checker()),
            max_quads,
            slots,
        };
        self.gpu = Some(gpu);
        gpu
    }
}

impl Default for BatchRenderer {
    fn default() -> Self {
        Self::new(BatchConfig::default())
    }
}

fn builtin_texture<D: GpuDevice + ?Sized>(
    device: &mut D,
    label: &str,
    size: u32,
    pixels: &[u8],
) -> TextureHandle {
    device.create_texture(&TextureDesc {
        label,
        width: size,
        height: size,
        format: TextureFormat::Rgba8Srgb,
        pixels: Some(pixels),
    })
}

/// 2×2 magenta/black checker.
fn missing_checker() -> [u8; 16] {
    let m = Color::MAGENTA.to_rgba_u8();
    let k = Color::BLACK.to_rgba_u8();
    let mut out = [0u8; 16];
    for (i, px) in [m, k, k, m].iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(px);
    }
    out
}

/// A batch in progress.
///
/// Holds the renderer mutably, so a second `begin` cannot start until this
/// one ends. Dropping without [`end`](Self::end) still submits.
pub struct Batch<'a, D: GpuDevice + ?Sized> {
    renderer: &'a mut BatchRenderer,
    device: &'a mut D,
    assets: &'a AssetCache,
    gpu: GpuState,
    shader: Option<ShaderHandle>,
    finished: bool,
}

impl<D: GpuDevice + ?Sized> Batch<'_, D> {
    /// Solid quad using the built-in white texture.
    pub fn draw_quad(&mut self, transform: &Mat4, color: Color, tag: i32) {
        let white = (SlotKey::White, self.gpu.white);
        self.push_quad(transform, white, UvRect::FULL, color, tag);
    }

    /// Textured quad for a texture, sprite or font atlas.
    ///
    /// Expired handles, and sprites whose sheet is no longer loaded, draw the
    /// built-in missing texture.
    pub fn draw_texture(
        &mut self,
        transform: &Mat4,
        resource: &WeakHandle<Resource>,
        tint: Color,
        tag: i32,
    ) {
        let missing = (SlotKey::Missing, self.gpu.missing);
        let (texture, uv) = match resource.upgrade() {
            Some(r) => match r.gpu_texture(self.assets) {
                Some(texture) => ((SlotKey::Asset(r.id()), texture), r.uv_rect()),
                None => {
                    log::error!(
                        "{} {} '{}' has no GPU texture (sheet unloaded); drawing missing texture",
                        r.kind(),
                        r.id(),
                        r.name()
                    );
                    (missing, UvRect::FULL)
                }
            },
            None => {
                log::error!("draw with an expired resource handle; drawing missing texture");
                (missing, UvRect::FULL)
            }
        };
        self.push_quad(transform, texture, uv, tint, tag);
    }

    /// Lays out `text` in em units and draws one quad per visible glyph.
    ///
    /// `transform` maps em space (baseline at y = 0, +Y up) to world space.
    /// `\n` moves down by the font's line height. Characters the font lacks
    /// draw as `?` when available and are skipped otherwise.
    pub fn draw_text(
        &mut self,
        transform: &Mat4,
        font: &WeakHandle<Resource>,
        text: &str,
        color: Color,
        tag: i32,
    ) {
        let Some(resource) = font.upgrade() else {
            log::error!("draw_text with an expired font handle");
            return;
        };
        let Some(font) = resource.as_font() else {
            log::error!(
                "draw_text: {} {} '{}' is not a font",
                resource.kind(),
                resource.id(),
                resource.name()
            );
            return;
        };

        let atlas = (SlotKey::Asset(resource.id()), font.atlas());
        let metrics = font.metrics();
        let mut pen = Vec2::ZERO;
        for ch in text.chars() {
            if ch == '\n' {
                pen = Vec2::new(0.0, pen.y - metrics.line_height);
                continue;
            }

            let Some((shown, glyph)) = metrics
                .glyph(ch)
                .map(|g| (ch, g))
                .or_else(|| metrics.glyph('?').map(|g| ('?', g)))
            else {
                continue;
            };

            if glyph.is_visible() {
                if let Some(uv) = font.glyph_uv(shown) {
                    let [l, b, r, t] = glyph.plane_bounds;
                    let local = rect_transform(pen + Vec2::new(l, b), Vec2::new(r - l, t - b), 0.0);
                    self.push_quad(&(*transform * local), atlas, uv, color, tag);
                }
            }
            pen.x += glyph.advance;
        }
    }

    /// Switches the program for subsequent quads; expired handles fall back
    /// to the built-in program.
    pub fn use_shader(&mut self, shader: &WeakHandle<ShaderProgram>) {
        let next = match shader.upgrade() {
            Some(program) => Some(program.gpu()),
            None => {
                log::error!("use_shader with an expired shader handle; using built-in program");
                None
            }
        };
        if next == self.shader {
            return;
        }
        self.flush(FlushCause::Shader);
        self.device.bind_shader(next);
        self.shader = next;
    }

    /// Quads waiting for the next submission.
    pub fn pending_quads(&self) -> usize {
        self.renderer.vertices.len() / VERTICES_PER_QUAD
    }

    /// Submits what is left and restores the default program.
    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.flush(FlushCause::End);
        if self.shader.take().is_some() {
            self.device.bind_shader(None);
        }
    }

    fn push_quad(
        &mut self,
        transform: &Mat4,
        texture: (SlotKey, TextureHandle),
        uv: UvRect,
        color: Color,
        tag: i32,
    ) {
        if self.pending_quads() >= self.gpu.max_quads as usize {
            self.flush(FlushCause::Capacity);
        }
        let slot = self.texture_slot(texture);
        self.renderer
            .vertices
            .extend_from_slice(&quad_vertices(transform, uv, color, slot, tag));
        self.renderer.stats.quads += 1;
    }

    /// Slot already holding `key`, or a fresh one (flushing if none is free).
    fn texture_slot(&mut self, (key, texture): (SlotKey, TextureHandle)) -> u32 {
        if let Some(slot) = self.renderer.slots.iter().position(|(k, _)| *k == key) {
            return slot as u32;
        }
        if self.renderer.slots.len() >= self.gpu.slots as usize {
            self.flush(FlushCause::Slots);
        }
        self.renderer.slots.push((key, texture));
        self.renderer.slots.len() as u32 - 1
    }

    fn flush(&mut self, cause: FlushCause) {
        let renderer = &mut *self.renderer;
        if renderer.vertices.is_empty() {
            renderer.slots.clear();
            return;
        }

        for (slot, (_, texture)) in renderer.slots.iter().enumerate() {
            self.device.bind_texture(*texture, slot as u32);
        }
        self.device
            .upload(self.gpu.vertices, bytemuck::cast_slice(&renderer.vertices));

        let quads = renderer.vertices.len() / VERTICES_PER_QUAD;
        self.device.draw_indexed(
            self.gpu.vertices,
            self.gpu.indices,
            (quads * INDICES_PER_QUAD) as u32,
        );

        let stats = &mut renderer.stats;
        stats.draw_calls += 1;
        match cause {
            FlushCause::Capacity => stats.capacity_flushes += 1,
            FlushCause::Slots => stats.slot_flushes += 1,
            FlushCause::Shader | FlushCause::End => {}
        }
        log::debug!(
            "batch flush ({cause:?}): {quads} quads, {} textures",
            renderer.slots.len()
        );

        renderer.vertices.clear();
        renderer.slots.clear();
    }
}

impl<D: GpuDevice + ?Sized> Drop for Batch<'_, D> {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::Path;

    use super::*;
    use crate::asset::{
        AssetRegistry, FontMetrics, FontSpec, GlyphMetrics, ShaderSpec, SpriteSpec, TextureSpec,
    };
    use crate::device::RecordingDevice;
    use crate::render::BATCH_SHADER_WGSL;

    struct Fixture {
        dir: tempfile::TempDir,
        cache: AssetCache,
        dev: RecordingDevice,
    }

    impl Fixture {
        fn new(device_slots: u32) -> Self {
            let dir = tempfile::tempdir().unwrap();
            image::RgbaImage::from_pixel(16, 16, image::Rgba([200, 100, 50, 255]))
                .save(dir.path().join("tile.png"))
                .unwrap();
            let cache = AssetCache::new(AssetRegistry::new()).with_root(dir.path());
            Self {
                dir,
                cache,
                dev: RecordingDevice::with_texture_slots(device_slots),
            }
        }

        fn root(&self) -> &Path {
            self.dir.path()
        }

        /// `n` textures, each its own GPU object.
        fn textures(&mut self, n: usize) -> Vec<WeakHandle<Resource>> {
            (0..n)
                .map(|i| {
                    let id = self
                        .cache
                        .register_texture(TextureSpec::new(format!("tile{i}"), "tile.png"));
                    self.cache.get(&mut self.dev, id)
                })
                .collect()
        }
    }

    fn at(x: f32) -> Mat4 {
        Mat4::from_translation(glam::Vec3::new(x, 0.0, 0.0))
    }

    fn renderer(max_quads: u32, max_texture_slots: u32) -> BatchRenderer {
        BatchRenderer::new(BatchConfig {
            max_quads,
            max_texture_slots,
        })
    }

    #[test]
    fn few_textures_under_capacity_is_one_submission() {
        let mut fx = Fixture::new(32);
        let textures = fx.textures(3);
        let mut r = BatchRenderer::default();

        let mut batch = r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY);
        for i in 0..100 {
            batch.draw_texture(&at(i as f32), &textures[i % 3], Color::WHITE, i as i32);
        }
        batch.end();

        assert_eq!(fx.dev.draw_count(), 1);
        assert_eq!(fx.dev.total_quads(), 100);
        assert_eq!(r.stats().draw_calls, 1);
    }

    #[test]
    fn full_vertex_buffer_flushes_without_dropping() {
        let mut fx = Fixture::new(32);
        let mut r = renderer(10, 32);

        let mut batch = r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY);
        for i in 0..25 {
            batch.draw_quad(&at(i as f32), Color::WHITE, i);
        }
        batch.end();

        let counts: Vec<u32> = fx.dev.draws().iter().map(|d| d.quad_count()).collect();
        assert_eq!(counts, vec![10, 10, 5]);
        assert_eq!(r.stats().capacity_flushes, 2);
        assert_eq!(r.stats().quads, 25);

        let tags: Vec<i32> = fx
            .dev
            .draws()
            .iter()
            .flat_map(|d| d.vertices())
            .step_by(4)
            .map(|v| v.tag)
            .collect();
        assert_eq!(tags, (0..25).collect::<Vec<_>>());
    }

    #[test]
    fn slot_exhaustion_splits_the_batch() {
        let mut fx = Fixture::new(32);
        let textures = fx.textures(40);
        let mut r = BatchRenderer::default();

        let mut batch = r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY);
        for (i, t) in textures.iter().enumerate() {
            batch.draw_texture(&at(i as f32), t, Color::WHITE, 0);
        }
        batch.end();

        assert_eq!(fx.dev.draw_count(), 2);
        assert_eq!(fx.dev.draws()[0].quad_count(), 32);
        assert_eq!(fx.dev.draws()[1].quad_count(), 8);
        assert_eq!(r.stats().slot_flushes, 1);
    }

    #[test]
    fn thirty_textures_fit_in_one_submission() {
        let mut fx = Fixture::new(32);
        let textures = fx.textures(30);
        let mut r = BatchRenderer::default();

        let mut batch = r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY);
        for i in 0..40 {
            batch.draw_texture(&at(i as f32), &textures[i % 30], Color::WHITE, 0);
        }
        batch.end();

        assert_eq!(fx.dev.draw_count(), 1);
        assert_eq!(fx.dev.total_quads(), 40);
    }

    #[test]
    fn submissions_follow_the_tighter_limit() {
        // D distinct textures drawn once each, K slots, V quads per buffer:
        // ceil(max(D / K, Q / V)) submissions.
        for (d, k, v, expected) in [(8, 4, 100, 2), (8, 4, 3, 3), (6, 2, 6, 3), (5, 8, 2, 3)] {
            let mut fx = Fixture::new(32);
            let textures = fx.textures(d);
            let mut r = renderer(v, k);

            let mut batch = r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY);
            for t in &textures {
                batch.draw_texture(&Mat4::IDENTITY, t, Color::WHITE, 0);
            }
            batch.end();

            assert_eq!(fx.dev.draw_count(), expected, "D={d} K={k} V={v}");
            assert_eq!(fx.dev.total_quads(), d as u32);
        }
    }

    #[test]
    fn device_limits_the_slot_count() {
        let mut fx = Fixture::new(4);
        let textures = fx.textures(5);
        let mut r = BatchRenderer::default();

        let mut batch = r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY);
        for t in &textures {
            batch.draw_texture(&Mat4::IDENTITY, t, Color::WHITE, 0);
        }
        batch.end();

        assert_eq!(r.texture_slots(), Some(4));
        assert_eq!(fx.dev.draw_count(), 2);
    }

    #[test]
    fn sprite_vertices_carry_cell_uvs() {
        let mut fx = Fixture::new(32);
        let tex = fx
            .cache
            .register_texture(TextureSpec::new("sheet", "tile.png").with_grid(4, 4));
        let spr = fx.cache.register_sprite(SpriteSpec::new("cell", tex, [1, 2]));
        let other = fx.cache.register_sprite(SpriteSpec::new("cell2", tex, [3, 3]));
        let sprite = fx.cache.get(&mut fx.dev, spr);
        let sprite2 = fx.cache.get(&mut fx.dev, other);
        let tint = Color::from_straight(1.0, 0.0, 0.0, 0.5);
        let mut r = BatchRenderer::default();

        let mut batch = r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY);
        batch.draw_texture(&Mat4::IDENTITY, &sprite, tint, 42);
        batch.draw_texture(&Mat4::IDENTITY, &sprite2, tint, 43);
        batch.end();

        let draw = &fx.dev.draws()[0];
        let v = draw.vertices();
        assert_eq!(v[0].uv, [0.25, 0.5]);
        assert_eq!(v[2].uv, [0.5, 0.75]);
        assert_eq!(v[0].color, tint.to_array());
        assert_eq!(v[0].tag, 42);
        assert_eq!(v[0].position, [-0.5, -0.5, 0.0]);
        // Each sprite takes its own slot, both bound to the sheet.
        assert!(v[..4].iter().all(|v| v.slot() == 0));
        assert!(v[4..].iter().all(|v| v.slot() == 1));
        let sheet = fx.cache.resource(tex).unwrap().gpu_texture(&fx.cache);
        assert_eq!(draw.texture_at(0), sheet);
        assert_eq!(draw.texture_at(1), sheet);
    }

    #[test]
    fn expired_handle_draws_missing_texture() {
        let mut fx = Fixture::new(32);
        let textures = fx.textures(1);
        let id = textures[0].upgrade().unwrap().id();
        fx.cache.unload(id);
        let mut r = BatchRenderer::default();

        let mut batch = r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY);
        batch.draw_texture(&Mat4::IDENTITY, &textures[0], Color::WHITE, 0);
        batch.draw_texture(&Mat4::IDENTITY, &WeakHandle::empty(), Color::WHITE, 0);
        batch.end();

        let draw = &fx.dev.draws()[0];
        assert_eq!(draw.quad_count(), 2);
        let missing = draw.texture_at(0).unwrap();
        assert_eq!(fx.dev.texture(missing).unwrap().label, "sprig missing");
        assert_eq!(draw.texture_at(1), None);
    }

    #[test]
    fn sprite_reloads_its_unloaded_sheet() {
        let mut fx = Fixture::new(32);
        let tex = fx
            .cache
            .register_texture(TextureSpec::new("sheet", "tile.png").with_grid(2, 2));
        let spr = fx.cache.register_sprite(SpriteSpec::new("cell", tex, [0, 0]));
        let stale = fx.cache.get(&mut fx.dev, spr);
        fx.cache.unload(tex);
        assert!(stale.is_expired());

        let sprite = fx.cache.get(&mut fx.dev, spr);
        let mut r = BatchRenderer::default();
        let mut batch = r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY);
        batch.draw_texture(&Mat4::IDENTITY, &sprite, Color::WHITE, 0);
        batch.end();

        let sheet = fx.cache.resource(tex).unwrap().gpu_texture(&fx.cache);
        let bound = fx.dev.draws()[0].texture_at(0);
        assert_eq!(bound, sheet);
        assert_eq!(fx.dev.texture(bound.unwrap()).unwrap().label, "sheet");
        assert_eq!(fx.dev.draws()[0].vertices()[2].uv, [0.5, 0.5]);
    }

    #[test]
    fn shader_change_flushes_and_end_restores_default() {
        let mut fx = Fixture::new(32);
        std::fs::write(fx.root().join("fx.wgsl"), BATCH_SHADER_WGSL).unwrap();
        let id = fx
            .cache
            .register_shader(ShaderSpec::new("fx", "fx.wgsl", "fx.wgsl"));
        let shader = fx.cache.get_shader(&mut fx.dev, id);
        let gpu = shader.upgrade().unwrap().gpu();
        let mut r = BatchRenderer::default();

        let mut batch = r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY);
        batch.draw_quad(&Mat4::IDENTITY, Color::WHITE, 0);
        batch.draw_quad(&Mat4::IDENTITY, Color::WHITE, 0);
        batch.use_shader(&shader);
        batch.use_shader(&shader);
        batch.draw_quad(&Mat4::IDENTITY, Color::WHITE, 0);
        batch.end();

        let mut batch = r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY);
        batch.draw_quad(&Mat4::IDENTITY, Color::WHITE, 0);
        batch.end();

        let shaders: Vec<_> = fx.dev.draws().iter().map(|d| d.shader).collect();
        assert_eq!(shaders, vec![None, Some(gpu), None]);
    }

    #[test]
    fn dropping_the_guard_submits() {
        let mut fx = Fixture::new(32);
        let mut r = BatchRenderer::default();
        {
            let mut batch = r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY);
            batch.draw_quad(&Mat4::IDENTITY, Color::WHITE, 0);
            assert_eq!(batch.pending_quads(), 1);
        }
        assert_eq!(fx.dev.draw_count(), 1);
    }

    #[test]
    fn release_frees_builtins_and_buffers() {
        let mut fx = Fixture::new(32);
        let mut r = BatchRenderer::default();
        let (textures, buffers) = (fx.dev.live_texture_count(), fx.dev.live_buffer_count());

        r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY)
            .draw_quad(&Mat4::IDENTITY, Color::WHITE, 0);
        assert_eq!(fx.dev.live_texture_count(), textures + 2);
        assert_eq!(fx.dev.live_buffer_count(), buffers + 2);

        r.release(&mut fx.dev);
        assert_eq!(fx.dev.live_texture_count(), textures);
        assert_eq!(fx.dev.live_buffer_count(), buffers);
        assert_eq!(r.texture_slots(), None);

        r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY)
            .draw_quad(&Mat4::IDENTITY, Color::WHITE, 0);
        assert_eq!(fx.dev.draw_count(), 2);
    }

    #[test]
    fn empty_batch_submits_nothing() {
        let mut fx = Fixture::new(32);
        let mut r = BatchRenderer::default();
        r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY).end();
        assert_eq!(fx.dev.draw_count(), 0);
        assert_eq!(r.stats(), BatchStats::default());
    }

    #[test]
    fn view_projection_reaches_the_device() {
        let mut fx = Fixture::new(32);
        let vp = crate::coords::pixel_projection(640, 480);
        let mut r = BatchRenderer::default();

        let mut batch = r.begin(&mut fx.dev, &fx.cache, vp);
        batch.draw_quad(&Mat4::IDENTITY, Color::WHITE, 0);
        batch.end();

        assert_eq!(fx.dev.draws()[0].view_projection, vp.to_cols_array_2d());
    }

    #[test]
    fn stats_accumulate_until_reset() {
        let mut fx = Fixture::new(32);
        let mut r = renderer(2, 32);
        for _ in 0..2 {
            let mut batch = r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY);
            for _ in 0..3 {
                batch.draw_quad(&Mat4::IDENTITY, Color::WHITE, 0);
            }
            batch.end();
        }
        assert_eq!(
            r.stats(),
            BatchStats {
                draw_calls: 4,
                quads: 6,
                slot_flushes: 0,
                capacity_flushes: 2,
            }
        );
        r.reset_stats();
        assert_eq!(r.stats(), BatchStats::default());
    }

    #[test]
    fn text_lays_out_glyphs_on_lines() {
        let mut fx = Fixture::new(32);
        let glyph = |advance: f32, visible: bool, x: f32| GlyphMetrics {
            advance,
            plane_bounds: if visible { [0.0, 0.0, 0.5, 0.5] } else { [0.0; 4] },
            atlas_bounds: if visible { [x, 0.0, x + 8.0, 8.0] } else { [0.0; 4] },
        };
        let mut glyphs = BTreeMap::new();
        glyphs.insert('A' as u32, glyph(0.6, true, 0.0));
        glyphs.insert('?' as u32, glyph(0.5, true, 8.0));
        glyphs.insert(' ' as u32, glyph(0.25, false, 0.0));
        let metrics = FontMetrics {
            em_size: 8.0,
            line_height: 1.5,
            ascender: 0.8,
            descender: -0.2,
            glyphs,
        };
        let id = fx
            .cache
            .register_font(FontSpec::new("mini", "tile.png", [16, 16], metrics));
        let font = fx.cache.get(&mut fx.dev, id);
        let mut r = BatchRenderer::default();

        let mut batch = r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY);
        batch.draw_text(&Mat4::IDENTITY, &font, "A B\nA", Color::WHITE, 9);
        batch.draw_text(&Mat4::IDENTITY, &WeakHandle::empty(), "lost", Color::WHITE, 9);
        batch.end();

        let v = fx.dev.draws()[0].vertices();
        assert_eq!(v.len(), 12);
        // 'A' at the origin.
        assert_eq!(v[0].position, [0.0, 0.0, 0.0]);
        assert_eq!(v[2].uv, [0.5, 0.5]);
        // 'B' falls back to '?', after 'A' and ' '.
        assert_eq!(v[4].position, [0.85, 0.0, 0.0]);
        assert_eq!(v[4].uv, [0.5, 0.0]);
        // Second line.
        assert_eq!(v[8].position, [0.0, -1.5, 0.0]);
        assert!(v.iter().all(|v| v.slot() == 0 && v.tag == 9));
    }

    #[test]
    fn text_with_a_non_font_is_ignored() {
        let mut fx = Fixture::new(32);
        let textures = fx.textures(1);
        let mut r = BatchRenderer::default();

        let mut batch = r.begin(&mut fx.dev, &fx.cache, Mat4::IDENTITY);
        batch.draw_text(&Mat4::IDENTITY, &textures[0], "hi", Color::WHITE, 0);
        batch.end();

        assert_eq!(fx.dev.draw_count(), 0);
    }
}
