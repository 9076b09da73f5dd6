//! Lazily materialized, dependency-aware asset cache.
//!
//! The cache owns every loaded resource through an `Rc` and hands out
//! [`WeakHandle`]s. Loading a sprite loads its texture first; loading twice
//! returns the same entry. Entries are only dropped by `unload`, by
//! re-registering their id, or by replacing the registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use glam::Vec2;

use super::resource::{Font, Sprite, Texture};
use super::{
    AssetError, AssetId, AssetKind, AssetRegistry, AssetSpec, FontSpec, Resource, ShaderProgram,
    ShaderSpec, SpriteSpec, TextureSpec, WeakHandle,
};
use crate::coords::UvRect;
use crate::device::{GpuDevice, TextureDesc, TextureFormat, TextureHandle, TextureRegion};
use crate::paint::Color;
use crate::render::BATCH_SHADER_WGSL;

/// A dropped entry waiting for its GPU objects to be released.
#[derive(Debug)]
enum Retired {
    Resource(Rc<Resource>),
    Shader(Rc<ShaderProgram>),
}

impl Retired {
    fn in_use(&self) -> bool {
        match self {
            Retired::Resource(r) => Rc::strong_count(r) > 1,
            Retired::Shader(s) => Rc::strong_count(s) > 1,
        }
    }
}

#[derive(Debug, Default)]
pub struct AssetCache {
    registry: AssetRegistry,
    root: PathBuf,
    resources: HashMap<AssetId, Rc<Resource>>,
    shaders: HashMap<AssetId, Rc<ShaderProgram>>,
    retired: Vec<Retired>,
}

impl AssetCache {
    /// Creates a cache resolving relative asset paths against the working directory.
    pub fn new(registry: AssetRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.set_root(root);
        self
    }

    /// Directory relative spec paths are resolved against.
    pub fn set_root(&mut self, root: impl Into<PathBuf>) {
        self.root = root.into();
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Swaps the registry, dropping every cached entry.
    pub fn replace_registry(&mut self, registry: AssetRegistry) -> AssetRegistry {
        self.clear();
        std::mem::replace(&mut self.registry, registry)
    }

    // ── resources ──────────────────────────────────────────────────────────

    /// Returns a handle to the texture, sprite or font `id`, loading it on
    /// first use.
    ///
    /// Failures are logged and yield an empty handle. Missing or undecodable
    /// files still produce a (placeholder) resource.
    pub fn get<D: GpuDevice + ?Sized>(&mut self, device: &mut D, id: AssetId) -> WeakHandle<Resource> {
        match self.try_get(device, id) {
            Ok(handle) => handle,
            Err(err) => {
                log_failure(&err);
                WeakHandle::empty()
            }
        }
    }

    pub fn try_get<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        id: AssetId,
    ) -> Result<WeakHandle<Resource>, AssetError> {
        self.release_retired(device);
        self.materialize(device, id).map(|rc| WeakHandle::new(&rc))
    }

    /// Strong peek at a loaded entry. Does not load.
    pub fn resource(&self, id: AssetId) -> Option<Rc<Resource>> {
        self.resources.get(&id).cloned()
    }

    fn materialize<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        id: AssetId,
    ) -> Result<Rc<Resource>, AssetError> {
        if let Some(loaded) = self.resources.get(&id) {
            return Ok(Rc::clone(loaded));
        }

        let resource = if let Some(spec) = self.registry.texture(id) {
            Resource::Texture(load_texture(device, &self.root, spec))
        } else if let Some(spec) = self.registry.sprite(id).cloned() {
            Resource::Sprite(self.load_sprite(device, spec)?)
        } else if let Some(spec) = self.registry.font(id) {
            Resource::Font(load_font(device, &self.root, spec))
        } else {
            if self.registry.shader(id).is_some() {
                log::warn!("asset {id} is a shader; request it with get_shader");
            }
            return Err(AssetError::NotFound { id });
        };

        log::debug!("loaded {} {id} '{}'", resource.kind(), resource.name());
        let resource = Rc::new(resource);
        self.resources.insert(id, Rc::clone(&resource));
        Ok(resource)
    }

    fn load_sprite<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        spec: SpriteSpec,
    ) -> Result<Sprite, AssetError> {
        if self.registry.texture(spec.texture).is_none() {
            return Err(AssetError::DependencyNotFound {
                id: spec.id,
                kind: AssetKind::Sprite,
                dependency: spec.texture,
            });
        }

        let parent = self.materialize(device, spec.texture)?;
        let Some(texture) = parent.as_texture() else {
            return Err(AssetError::DependencyNotFound {
                id: spec.id,
                kind: AssetKind::Sprite,
                dependency: spec.texture,
            });
        };

        let grid = texture.cells();
        if spec.cell[0] >= grid[0] || spec.cell[1] >= grid[1] {
            return Err(AssetError::InvalidSprite {
                id: spec.id,
                texture: spec.texture,
                cell: spec.cell,
                grid,
            });
        }

        let cells = Vec2::new(grid[0] as f32, grid[1] as f32);
        let cell_uv = Vec2::ONE / cells;
        let min = Vec2::new(spec.cell[0] as f32, spec.cell[1] as f32) * cell_uv;
        let [w, h] = texture.size();

        let name = if texture.placeholder {
            failed_name(&spec.name)
        } else {
            spec.name
        };

        Ok(Sprite {
            id: spec.id,
            name,
            texture: spec.texture,
            cell: spec.cell,
            uv: UvRect::from_min_size(min, cell_uv),
            pixel_size: Vec2::new(w as f32, h as f32) / cells,
            placeholder: texture.placeholder,
        })
    }

    // ── shaders ────────────────────────────────────────────────────────────

    pub fn get_shader<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        id: AssetId,
    ) -> WeakHandle<ShaderProgram> {
        match self.try_get_shader(device, id) {
            Ok(handle) => handle,
            Err(err) => {
                log_failure(&err);
                WeakHandle::empty()
            }
        }
    }

    /// Compiles the shader `id` on first use. Unreadable or invalid sources
    /// fall back to the built-in batch program.
    pub fn try_get_shader<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        id: AssetId,
    ) -> Result<WeakHandle<ShaderProgram>, AssetError> {
        self.release_retired(device);

        if let Some(loaded) = self.shaders.get(&id) {
            return Ok(WeakHandle::new(loaded));
        }

        let spec = self.registry.shader(id).ok_or(AssetError::NotFound { id })?;
        let program = match read_shader_sources(&self.root, spec) {
            Ok((vs, fs)) => ShaderProgram {
                id,
                name: spec.name.clone(),
                gpu: device.create_shader(&spec.name, &vs, &fs),
                placeholder: false,
            },
            Err(err) => {
                log::error!("{err}");
                let name = failed_name(&spec.name);
                ShaderProgram {
                    id,
                    gpu: device.create_shader(&name, BATCH_SHADER_WGSL, BATCH_SHADER_WGSL),
                    name,
                    placeholder: true,
                }
            }
        };

        log::debug!("compiled shader {id} '{}'", program.name);
        let program = Rc::new(program);
        let handle = WeakHandle::new(&program);
        self.shaders.insert(id, program);
        Ok(handle)
    }

    // ── registration ───────────────────────────────────────────────────────

    /// Registers `spec` and drops any cached entry built from the old one.
    pub fn register(&mut self, spec: impl Into<AssetSpec>) -> AssetId {
        let spec = spec.into();
        let kind = spec.kind();
        let id = self.registry.register(spec);
        self.invalidate(kind, id);
        id
    }

    pub fn register_texture(&mut self, spec: TextureSpec) -> AssetId {
        self.register(spec)
    }

    pub fn register_sprite(&mut self, spec: SpriteSpec) -> AssetId {
        self.register(spec)
    }

    pub fn register_shader(&mut self, spec: ShaderSpec) -> AssetId {
        self.register(spec)
    }

    pub fn register_font(&mut self, spec: FontSpec) -> AssetId {
        self.register(spec)
    }

    fn invalidate(&mut self, kind: AssetKind, id: AssetId) {
        if self.remove_entry(id) {
            log::warn!("{kind} {id} re-registered; cached entry dropped");
        }

        if kind == AssetKind::Texture {
            self.drop_sliced(id);
        }
    }

    /// Drops cached sprites sliced from texture `id`.
    fn drop_sliced(&mut self, id: AssetId) {
        let sliced: Vec<AssetId> = self
            .resources
            .iter()
            .filter(|(_, r)| r.as_sprite().is_some_and(|s| s.texture == id))
            .map(|(sprite, _)| *sprite)
            .collect();
        for sprite in sliced {
            log::debug!("dropping sprite {sprite} sliced from texture {id}");
            self.remove_entry(sprite);
        }
    }

    // ── lifetime ───────────────────────────────────────────────────────────

    /// Drops the cache's reference to `id`. Outstanding handles expire.
    ///
    /// Unloading a texture also unloads the sprites sliced from it, so the
    /// next `get` of such a sprite loads the texture again.
    ///
    /// Returns whether anything was loaded.
    pub fn unload(&mut self, id: AssetId) -> bool {
        let is_texture = self
            .resources
            .get(&id)
            .is_some_and(|r| r.as_texture().is_some());
        let removed = self.remove_entry(id);
        if removed {
            log::debug!("unloaded {id}");
        }
        if is_texture {
            self.drop_sliced(id);
        }
        removed
    }

    /// Drops every cached entry.
    pub fn clear(&mut self) {
        let ids: Vec<AssetId> = self
            .resources
            .keys()
            .chain(self.shaders.keys())
            .copied()
            .collect();
        for id in ids {
            self.remove_entry(id);
        }
    }

    fn remove_entry(&mut self, id: AssetId) -> bool {
        let mut removed = false;
        if let Some(resource) = self.resources.remove(&id) {
            self.retired.push(Retired::Resource(resource));
            removed = true;
        }
        if let Some(shader) = self.shaders.remove(&id) {
            self.retired.push(Retired::Shader(shader));
            removed = true;
        }
        removed
    }

    /// Releases GPU objects of dropped entries nobody borrows anymore.
    ///
    /// Called by every loading entry point; call it directly after unloading
    /// when no further loads are expected.
    pub fn release_retired<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        if self.retired.is_empty() {
            return;
        }

        let (busy, done): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.retired).into_iter().partition(Retired::in_use);
        self.retired = busy;

        for entry in done {
            match entry {
                Retired::Resource(r) => {
                    if let Some(texture) = r.owned_texture() {
                        device.release_texture(texture);
                    }
                }
                Retired::Shader(s) => device.release_shader(s.gpu),
            }
        }
    }

    pub fn is_loaded(&self, id: AssetId) -> bool {
        self.resources.contains_key(&id) || self.shaders.contains_key(&id)
    }

    pub fn loaded_count(&self) -> usize {
        self.resources.len() + self.shaders.len()
    }

    // ── texture updates ────────────────────────────────────────────────────

    /// Replaces the GPU object of loaded texture `id` with a blank one of
    /// `size`. Sprites sliced from it sample the new object on next use.
    ///
    /// # Panics
    ///
    /// If either dimension is zero.
    pub fn resize_texture<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        id: AssetId,
        size: [u32; 2],
    ) -> Result<(), AssetError> {
        let texture = self.loaded_texture(id)?;
        let fresh = device.create_texture(&TextureDesc {
            label: &texture.name,
            width: size[0],
            height: size[1],
            format: TextureFormat::Rgba8Srgb,
            pixels: None,
        });
        let old = texture.gpu.replace(fresh);
        texture.size.set(size);
        device.release_texture(old);
        log::debug!("resized texture {id} to {}x{}", size[0], size[1]);
        Ok(())
    }

    /// Overwrites `region` of loaded texture `id` (rows bottom-up).
    ///
    /// # Panics
    ///
    /// If `pixels` does not cover `region` or the region exceeds the texture.
    pub fn write_texture_region<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        id: AssetId,
        region: TextureRegion,
        pixels: &[u8],
    ) -> Result<(), AssetError> {
        let texture = self.loaded_texture(id)?;
        device.upload_subregion(texture.gpu(), region, pixels);
        Ok(())
    }

    fn loaded_texture(&self, id: AssetId) -> Result<&Texture, AssetError> {
        self.resources
            .get(&id)
            .and_then(|r| r.as_texture())
            .ok_or(AssetError::NotFound { id })
    }
}

// ── loading ───────────────────────────────────────────────────────────────

fn log_failure(err: &AssetError) {
    match err {
        AssetError::NotFound { .. } => log::warn!("{err}"),
        _ => log::error!("{err}"),
    }
}

fn failed_name(name: &str) -> String {
    format!("{name} (failed)")
}

/// Decodes an image and flips it so rows run bottom-up.
fn decode_image(path: &Path) -> Result<image::RgbaImage, image::ImageError> {
    let mut img = image::open(path)?.to_rgba8();
    image::imageops::flip_vertical_in_place(&mut img);
    Ok(img)
}

fn upload_image<D: GpuDevice + ?Sized>(
    device: &mut D,
    label: &str,
    format: TextureFormat,
    img: &image::RgbaImage,
) -> TextureHandle {
    device.create_texture(&TextureDesc {
        label,
        width: img.width(),
        height: img.height(),
        format,
        pixels: Some(img.as_raw()),
    })
}

fn placeholder_texture<D: GpuDevice + ?Sized>(device: &mut D, label: &str) -> TextureHandle {
    let pixel = Color::MAGENTA.to_rgba_u8();
    device.create_texture(&TextureDesc {
        label,
        width: 1,
        height: 1,
        format: TextureFormat::Rgba8Srgb,
        pixels: Some(&pixel),
    })
}

fn load_texture<D: GpuDevice + ?Sized>(device: &mut D, root: &Path, spec: &TextureSpec) -> Texture {
    let path = root.join(&spec.path);
    let (name, gpu, size, placeholder) = match decode_image(&path) {
        Ok(img) => {
            let gpu = upload_image(device, &spec.name, TextureFormat::Rgba8Srgb, &img);
            (spec.name.clone(), gpu, [img.width(), img.height()], false)
        }
        Err(err) => {
            log::error!(
                "{}",
                AssetError::AssetLoad {
                    id: spec.id,
                    kind: AssetKind::Texture,
                    path,
                    reason: err.to_string(),
                }
            );
            let name = failed_name(&spec.name);
            let gpu = placeholder_texture(device, &name);
            (name, gpu, [1, 1], true)
        }
    };

    Texture {
        id: spec.id,
        name,
        gpu: gpu.into(),
        size: size.into(),
        cells: spec.cell_count(),
        placeholder,
    }
}

fn load_font<D: GpuDevice + ?Sized>(device: &mut D, root: &Path, spec: &FontSpec) -> Font {
    let path = root.join(&spec.atlas_path);
    let (name, atlas, atlas_size, placeholder) = match decode_image(&path) {
        Ok(img) => {
            let actual = [img.width(), img.height()];
            if actual != spec.atlas_size {
                log::warn!(
                    "font {} atlas is {}x{}, registry says {}x{}; using the image size",
                    spec.id,
                    actual[0],
                    actual[1],
                    spec.atlas_size[0],
                    spec.atlas_size[1]
                );
            }
            let atlas = upload_image(device, &spec.name, TextureFormat::Rgba8Unorm, &img);
            (spec.name.clone(), atlas, actual, false)
        }
        Err(err) => {
            log::error!(
                "{}",
                AssetError::AssetLoad {
                    id: spec.id,
                    kind: AssetKind::Font,
                    path,
                    reason: err.to_string(),
                }
            );
            let name = failed_name(&spec.name);
            let atlas = placeholder_texture(device, &name);
            (name, atlas, spec.atlas_size, true)
        }
    };

    Font {
        id: spec.id,
        name,
        atlas,
        atlas_size,
        metrics: spec.metrics.clone(),
        placeholder,
    }
}

/// Reads and validates both WGSL stages of `spec`.
fn read_shader_sources(root: &Path, spec: &ShaderSpec) -> Result<(String, String), AssetError> {
    let vs = read_wgsl(root, spec, &spec.vertex_path, "vs_main")?;
    let fs = if spec.fragment_path == spec.vertex_path {
        vs.clone()
    } else {
        read_wgsl(root, spec, &spec.fragment_path, "fs_main")?
    };
    Ok((vs, fs))
}

fn read_wgsl(root: &Path, spec: &ShaderSpec, rel: &Path, entry: &str) -> Result<String, AssetError> {
    let path = root.join(rel);
    let load_error = |reason: String| AssetError::AssetLoad {
        id: spec.id,
        kind: AssetKind::Shader,
        path: path.clone(),
        reason,
    };

    let source = std::fs::read_to_string(&path).map_err(|e| load_error(e.to_string()))?;
    let module = naga::front::wgsl::parse_str(&source)
        .map_err(|e| load_error(e.emit_to_string(&source)))?;
    if !module.entry_points.iter().any(|ep| ep.name == entry) {
        return Err(load_error(format!("missing entry point `{entry}`")));
    }
    Ok(source)
}
