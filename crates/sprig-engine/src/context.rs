use std::path::Path;

use glam::Mat4;

use crate::asset::{AssetCache, AssetError, AssetId, AssetRegistry, Resource, ShaderProgram, WeakHandle};
use crate::device::GpuDevice;
use crate::render::{Batch, BatchConfig, BatchRenderer};

/// Owns the device, the asset cache (and through it the registry) and the
/// batch renderer.
///
/// Construct one explicitly and pass it where it is needed; there is no
/// process-wide instance.
pub struct EngineContext<D: GpuDevice> {
    device: D,
    assets: AssetCache,
    renderer: BatchRenderer,
}

impl<D: GpuDevice> EngineContext<D> {
    pub fn new(device: D, assets: AssetCache, config: BatchConfig) -> Self {
        Self {
            device,
            assets,
            renderer: BatchRenderer::new(config),
        }
    }

    /// Loads a registry file; relative asset paths resolve against its directory.
    pub fn from_registry_file(
        device: D,
        path: impl AsRef<Path>,
        config: BatchConfig,
    ) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let registry = AssetRegistry::read_from_file(path)?;
        let root = path.parent().unwrap_or(Path::new(""));
        log::info!(
            "registry {} loaded: {} assets",
            path.display(),
            registry.len()
        );
        Ok(Self::new(device, AssetCache::new(registry).with_root(root), config))
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn assets(&self) -> &AssetCache {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut AssetCache {
        &mut self.assets
    }

    pub fn renderer(&self) -> &BatchRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut BatchRenderer {
        &mut self.renderer
    }

    pub fn get(&mut self, id: AssetId) -> WeakHandle<Resource> {
        self.assets.get(&mut self.device, id)
    }

    pub fn get_shader(&mut self, id: AssetId) -> WeakHandle<ShaderProgram> {
        self.assets.get_shader(&mut self.device, id)
    }

    /// Starts a batch over this context's device and assets.
    pub fn batch(&mut self, view_projection: Mat4) -> Batch<'_, D> {
        self.renderer
            .begin(&mut self.device, &self.assets, view_projection)
    }

    /// Drops every cached asset and releases its GPU objects.
    pub fn unload_all(&mut self) {
        self.assets.clear();
        self.assets.release_retired(&mut self.device);
    }

    /// Tears the context down, handing the device back with every asset and
    /// renderer GPU object released.
    pub fn into_device(mut self) -> D {
        self.unload_all();
        self.renderer.release(&mut self.device);
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{SpriteSpec, TextureSpec};
    use crate::device::RecordingDevice;
    use crate::paint::Color;

    #[test]
    fn registry_file_assets_resolve_next_to_it() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("img")).unwrap();
        image::RgbaImage::from_pixel(8, 8, image::Rgba([1, 2, 3, 255]))
            .save(dir.path().join("img/sheet.png"))
            .unwrap();

        let mut registry = AssetRegistry::new();
        let tex = registry.register_texture(TextureSpec::new("sheet", "img/sheet.png").with_grid(2, 2));
        let spr = registry.register_sprite(SpriteSpec::new("cell", tex, [1, 0]));
        let file = dir.path().join("assets.json");
        registry.write_to_file(&file).unwrap();

        let mut ctx =
            EngineContext::from_registry_file(RecordingDevice::new(), &file, BatchConfig::default())
                .unwrap();
        let sprite = ctx.get(spr);
        assert!(!sprite.upgrade().unwrap().is_placeholder());

        let mut batch = ctx.batch(Mat4::IDENTITY);
        batch.draw_texture(&Mat4::IDENTITY, &sprite, Color::WHITE, 0);
        batch.draw_quad(&Mat4::IDENTITY, Color::BLACK, 1);
        batch.end();

        assert_eq!(ctx.device().draw_count(), 1);
        assert_eq!(ctx.renderer().stats().quads, 2);
    }

    #[test]
    fn missing_registry_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineContext::from_registry_file(
            RecordingDevice::new(),
            dir.path().join("nope.json"),
            BatchConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, AssetError::Io { .. }));
    }

    #[test]
    fn teardown_releases_every_gpu_object() {
        let mut ctx = EngineContext::new(
            RecordingDevice::new(),
            AssetCache::new(AssetRegistry::new()),
            BatchConfig::default(),
        );
        let id = ctx
            .assets_mut()
            .register_texture(TextureSpec::new("gone", "gone.png"));
        let handle = ctx.get(id);
        assert!(!handle.is_expired());

        let mut batch = ctx.batch(Mat4::IDENTITY);
        batch.draw_texture(&Mat4::IDENTITY, &handle, Color::WHITE, 0);
        batch.end();
        assert_eq!(ctx.device().live_buffer_count(), 2);

        let device = ctx.into_device();
        assert!(handle.is_expired());
        assert_eq!(device.live_texture_count(), 0);
        assert_eq!(device.live_buffer_count(), 0);
    }
}
