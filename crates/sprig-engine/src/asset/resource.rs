//! GPU-backed resources materialized by the cache.

use std::cell::Cell;

use glam::Vec2;

use super::{AssetCache, AssetId, AssetKind, FontMetrics};
use crate::coords::UvRect;
use crate::device::{ShaderHandle, TextureHandle};

/// A loaded image.
///
/// The GPU object and size sit in cells so that
/// [`AssetCache::resize_texture`] can swap them without invalidating
/// outstanding handles.
#[derive(Debug)]
pub struct Texture {
    pub(super) id: AssetId,
    pub(super) name: String,
    pub(super) gpu: Cell<TextureHandle>,
    pub(super) size: Cell<[u32; 2]>,
    pub(super) cells: [u32; 2],
    pub(super) placeholder: bool,
}

impl Texture {
    #[inline]
    pub fn gpu(&self) -> TextureHandle {
        self.gpu.get()
    }

    #[inline]
    pub fn size(&self) -> [u32; 2] {
        self.size.get()
    }

    /// Sprite grid cell count, `[1, 1]` without a grid.
    #[inline]
    pub fn cells(&self) -> [u32; 2] {
        self.cells
    }
}

/// One cell of a gridded texture.
///
/// Holds the parent's id, not the parent: the GPU texture is looked up
/// through the cache on each access.
#[derive(Debug)]
pub struct Sprite {
    pub(super) id: AssetId,
    pub(super) name: String,
    pub(super) texture: AssetId,
    pub(super) cell: [u32; 2],
    pub(super) uv: UvRect,
    pub(super) pixel_size: Vec2,
    pub(super) placeholder: bool,
}

impl Sprite {
    #[inline]
    pub fn texture(&self) -> AssetId {
        self.texture
    }

    #[inline]
    pub fn cell(&self) -> [u32; 2] {
        self.cell
    }
}

/// A glyph atlas plus its layout metrics.
#[derive(Debug)]
pub struct Font {
    pub(super) id: AssetId,
    pub(super) name: String,
    pub(super) atlas: TextureHandle,
    pub(super) atlas_size: [u32; 2],
    pub(super) metrics: FontMetrics,
    pub(super) placeholder: bool,
}

impl Font {
    #[inline]
    pub fn atlas(&self) -> TextureHandle {
        self.atlas
    }

    #[inline]
    pub fn atlas_size(&self) -> [u32; 2] {
        self.atlas_size
    }

    #[inline]
    pub fn metrics(&self) -> &FontMetrics {
        &self.metrics
    }

    /// UV rectangle of a glyph's atlas bounds.
    pub fn glyph_uv(&self, ch: char) -> Option<UvRect> {
        let g = self.metrics.glyph(ch)?;
        let [l, b, r, t] = g.atlas_bounds;
        Some(UvRect::from_pixels(Vec2::new(l, b), Vec2::new(r, t), self.atlas_size))
    }
}

/// Anything the batch renderer can draw: a texture, a sprite or a font.
#[derive(Debug)]
pub enum Resource {
    Texture(Texture),
    Sprite(Sprite),
    Font(Font),
}

impl Resource {
    pub fn id(&self) -> AssetId {
        match self {
            Resource::Texture(t) => t.id,
            Resource::Sprite(s) => s.id,
            Resource::Font(f) => f.id,
        }
    }

    /// Registry name; placeholders carry a `" (failed)"` suffix.
    pub fn name(&self) -> &str {
        match self {
            Resource::Texture(t) => &t.name,
            Resource::Sprite(s) => &s.name,
            Resource::Font(f) => &f.name,
        }
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            Resource::Texture(_) => AssetKind::Texture,
            Resource::Sprite(_) => AssetKind::Sprite,
            Resource::Font(_) => AssetKind::Font,
        }
    }

    /// Size in texels of the drawn region.
    pub fn pixel_size(&self) -> Vec2 {
        match self {
            Resource::Texture(t) => {
                let [w, h] = t.size();
                Vec2::new(w as f32, h as f32)
            }
            Resource::Sprite(s) => s.pixel_size,
            Resource::Font(f) => Vec2::new(f.atlas_size[0] as f32, f.atlas_size[1] as f32),
        }
    }

    /// Sub-rectangle of the GPU texture this resource samples.
    pub fn uv_rect(&self) -> UvRect {
        match self {
            Resource::Sprite(s) => s.uv,
            Resource::Texture(_) | Resource::Font(_) => UvRect::FULL,
        }
    }

    /// GPU texture to bind, or `None` if a sprite's parent is no longer loaded.
    pub fn gpu_texture(&self, assets: &AssetCache) -> Option<TextureHandle> {
        match self {
            Resource::Texture(t) => Some(t.gpu()),
            Resource::Font(f) => Some(f.atlas),
            Resource::Sprite(s) => match assets.resource(s.texture)?.as_ref() {
                Resource::Texture(parent) => Some(parent.gpu()),
                _ => None,
            },
        }
    }

    pub fn is_placeholder(&self) -> bool {
        match self {
            Resource::Texture(t) => t.placeholder,
            Resource::Sprite(s) => s.placeholder,
            Resource::Font(f) => f.placeholder,
        }
    }

    pub fn as_texture(&self) -> Option<&Texture> {
        match self {
            Resource::Texture(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_sprite(&self) -> Option<&Sprite> {
        match self {
            Resource::Sprite(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_font(&self) -> Option<&Font> {
        match self {
            Resource::Font(f) => Some(f),
            _ => None,
        }
    }

    /// GPU texture this entry owns and must release when dropped.
    pub(super) fn owned_texture(&self) -> Option<TextureHandle> {
        match self {
            Resource::Texture(t) => Some(t.gpu()),
            Resource::Font(f) => Some(f.atlas),
            Resource::Sprite(_) => None,
        }
    }
}

/// A compiled shader program.
#[derive(Debug)]
pub struct ShaderProgram {
    pub(super) id: AssetId,
    pub(super) name: String,
    pub(super) gpu: ShaderHandle,
    pub(super) placeholder: bool,
}

impl ShaderProgram {
    #[inline]
    pub fn id(&self) -> AssetId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn gpu(&self) -> ShaderHandle {
        self.gpu
    }

    /// True when the sources failed to load and the built-in program is used.
    #[inline]
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}
