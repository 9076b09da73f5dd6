//! Declarative asset specifications.
//!
//! Specifications are plain data: a path plus the metadata needed to build the
//! GPU-side resource. They carry no GPU state and round-trip through the
//! registry file unchanged.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::AssetId;

/// The four asset kinds the registry knows about.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AssetKind {
    Texture,
    Sprite,
    Shader,
    Font,
}

impl AssetKind {
    pub const ALL: [AssetKind; 4] = [
        AssetKind::Texture,
        AssetKind::Sprite,
        AssetKind::Shader,
        AssetKind::Font,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Texture => "texture",
            AssetKind::Sprite => "sprite",
            AssetKind::Shader => "shader",
            AssetKind::Font => "font",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── texture ───────────────────────────────────────────────────────────────

/// An image file, optionally divided into a grid of equally sized sprite cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureSpec {
    #[serde(skip)]
    pub id: AssetId,
    pub name: String,
    pub path: PathBuf,
    /// Cell count along x and y.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sprite_grid: Option<[u32; 2]>,
}

impl TextureSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: AssetId::NULL,
            name: name.into(),
            path: path.into(),
            sprite_grid: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: AssetId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn with_grid(mut self, cells_x: u32, cells_y: u32) -> Self {
        self.set_sprite_grid(Some([cells_x, cells_y]));
        self
    }

    pub fn sprite_grid(&self) -> Option<[u32; 2]> {
        self.sprite_grid
    }

    /// Sets the cell count. Zero counts are clamped to one.
    pub fn set_sprite_grid(&mut self, grid: Option<[u32; 2]>) {
        self.sprite_grid = grid.map(|[x, y]| [x.max(1), y.max(1)]);
    }

    /// Cell count, treating a texture without a grid as a single cell.
    pub fn cell_count(&self) -> [u32; 2] {
        self.sprite_grid.unwrap_or([1, 1])
    }

    /// Size of one cell in UV units (`1 / cellCount` per axis).
    ///
    /// Derived from the current cell count on every call.
    pub fn cell_uv_size(&self) -> [f32; 2] {
        let [x, y] = self.cell_count();
        [1.0 / x as f32, 1.0 / y as f32]
    }

    pub fn contains_cell(&self, cell: [u32; 2]) -> bool {
        let [cx, cy] = self.cell_count();
        cell[0] < cx && cell[1] < cy
    }
}

// ── sprite ────────────────────────────────────────────────────────────────

/// One cell of a gridded texture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteSpec {
    #[serde(skip)]
    pub id: AssetId,
    pub name: String,
    pub texture: AssetId,
    pub cell: [u32; 2],
}

impl SpriteSpec {
    pub fn new(name: impl Into<String>, texture: AssetId, cell: [u32; 2]) -> Self {
        Self {
            id: AssetId::NULL,
            name: name.into(),
            texture,
            cell,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: AssetId) -> Self {
        self.id = id;
        self
    }
}

// ── shader ────────────────────────────────────────────────────────────────

/// WGSL sources for the batch pipeline's vertex (`vs_main`) and fragment
/// (`fs_main`) stages. Both paths may name the same file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderSpec {
    #[serde(skip)]
    pub id: AssetId,
    pub name: String,
    pub vertex_path: PathBuf,
    pub fragment_path: PathBuf,
}

impl ShaderSpec {
    pub fn new(
        name: impl Into<String>,
        vertex_path: impl Into<PathBuf>,
        fragment_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: AssetId::NULL,
            name: name.into(),
            vertex_path: vertex_path.into(),
            fragment_path: fragment_path.into(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: AssetId) -> Self {
        self.id = id;
        self
    }
}

// ── font ──────────────────────────────────────────────────────────────────

/// Placement of one glyph.
///
/// - `plane_bounds`: `[left, bottom, right, top]` in em units relative to the
///   pen position on the baseline.
/// - `atlas_bounds`: `[left, bottom, right, top]` in atlas pixels, origin at
///   the bottom-left corner of the atlas.
///
/// Whitespace glyphs have zero-area bounds and only advance the pen.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlyphMetrics {
    pub advance: f32,
    pub plane_bounds: [f32; 4],
    pub atlas_bounds: [f32; 4],
}

impl GlyphMetrics {
    #[inline]
    pub fn is_visible(&self) -> bool {
        let [l, b, r, t] = self.plane_bounds;
        r > l && t > b
    }
}

/// Precomputed font metrics. Vertical values are in em units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontMetrics {
    /// Pixel size the atlas was rasterized at.
    pub em_size: f32,
    pub line_height: f32,
    pub ascender: f32,
    pub descender: f32,
    /// Keyed by Unicode scalar value.
    pub glyphs: BTreeMap<u32, GlyphMetrics>,
}

impl FontMetrics {
    pub fn glyph(&self, ch: char) -> Option<&GlyphMetrics> {
        self.glyphs.get(&(ch as u32))
    }
}

/// A pre-baked glyph atlas image plus its metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    #[serde(skip)]
    pub id: AssetId,
    pub name: String,
    pub atlas_path: PathBuf,
    pub atlas_size: [u32; 2],
    pub metrics: FontMetrics,
}

impl FontSpec {
    pub fn new(
        name: impl Into<String>,
        atlas_path: impl Into<PathBuf>,
        atlas_size: [u32; 2],
        metrics: FontMetrics,
    ) -> Self {
        Self {
            id: AssetId::NULL,
            name: name.into(),
            atlas_path: atlas_path.into(),
            atlas_size,
            metrics,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: AssetId) -> Self {
        self.id = id;
        self
    }
}

// ── sum types ─────────────────────────────────────────────────────────────

/// Owned specification of any kind, accepted by `register`.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetSpec {
    Texture(TextureSpec),
    Sprite(SpriteSpec),
    Shader(ShaderSpec),
    Font(FontSpec),
}

impl AssetSpec {
    pub fn id(&self) -> AssetId {
        match self {
            AssetSpec::Texture(s) => s.id,
            AssetSpec::Sprite(s) => s.id,
            AssetSpec::Shader(s) => s.id,
            AssetSpec::Font(s) => s.id,
        }
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            AssetSpec::Texture(_) => AssetKind::Texture,
            AssetSpec::Sprite(_) => AssetKind::Sprite,
            AssetSpec::Shader(_) => AssetKind::Shader,
            AssetSpec::Font(_) => AssetKind::Font,
        }
    }
}

impl From<TextureSpec> for AssetSpec {
    fn from(spec: TextureSpec) -> Self {
        AssetSpec::Texture(spec)
    }
}

impl From<SpriteSpec> for AssetSpec {
    fn from(spec: SpriteSpec) -> Self {
        AssetSpec::Sprite(spec)
    }
}

impl From<ShaderSpec> for AssetSpec {
    fn from(spec: ShaderSpec) -> Self {
        AssetSpec::Shader(spec)
    }
}

impl From<FontSpec> for AssetSpec {
    fn from(spec: FontSpec) -> Self {
        AssetSpec::Font(spec)
    }
}

/// Borrowed specification returned by `AssetRegistry::lookup`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SpecRef<'a> {
    Texture(&'a TextureSpec),
    Sprite(&'a SpriteSpec),
    Shader(&'a ShaderSpec),
    Font(&'a FontSpec),
}

impl SpecRef<'_> {
    pub fn name(&self) -> &str {
        match self {
            SpecRef::Texture(s) => &s.name,
            SpecRef::Sprite(s) => &s.name,
            SpecRef::Shader(s) => &s.name,
            SpecRef::Font(s) => &s.name,
        }
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            SpecRef::Texture(_) => AssetKind::Texture,
            SpecRef::Sprite(_) => AssetKind::Sprite,
            SpecRef::Shader(_) => AssetKind::Shader,
            SpecRef::Font(_) => AssetKind::Font,
        }
    }

    pub fn to_owned(&self) -> AssetSpec {
        match *self {
            SpecRef::Texture(s) => AssetSpec::Texture(s.clone()),
            SpecRef::Sprite(s) => AssetSpec::Sprite(s.clone()),
            SpecRef::Shader(s) => AssetSpec::Shader(s.clone()),
            SpecRef::Font(s) => AssetSpec::Font(s.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_uv_size_follows_grid() {
        let mut spec = TextureSpec::new("atlas", "atlas.png").with_grid(4, 2);
        assert_eq!(spec.cell_uv_size(), [0.25, 0.5]);

        spec.set_sprite_grid(Some([8, 8]));
        assert_eq!(spec.cell_uv_size(), [0.125, 0.125]);

        spec.set_sprite_grid(None);
        assert_eq!(spec.cell_uv_size(), [1.0, 1.0]);
    }

    #[test]
    fn zero_grid_is_clamped() {
        let spec = TextureSpec::new("atlas", "atlas.png").with_grid(0, 3);
        assert_eq!(spec.sprite_grid(), Some([1, 3]));
    }

    #[test]
    fn contains_cell_is_half_open() {
        let spec = TextureSpec::new("atlas", "atlas.png").with_grid(4, 4);
        assert!(spec.contains_cell([0, 0]));
        assert!(spec.contains_cell([3, 3]));
        assert!(!spec.contains_cell([4, 0]));
        assert!(!spec.contains_cell([0, 4]));
    }

    #[test]
    fn ungridded_texture_is_one_cell() {
        let spec = TextureSpec::new("plain", "plain.png");
        assert!(spec.contains_cell([0, 0]));
        assert!(!spec.contains_cell([1, 0]));
    }

    #[test]
    fn missing_grid_deserializes_to_none() {
        let spec: TextureSpec =
            serde_json::from_str(r#"{ "name": "plain", "path": "plain.png" }"#).unwrap();
        assert_eq!(spec.sprite_grid(), None);
        assert!(spec.id.is_null());
    }

    #[test]
    fn whitespace_glyph_is_invisible() {
        let space = GlyphMetrics { advance: 0.3, ..GlyphMetrics::default() };
        assert!(!space.is_visible());
        let a = GlyphMetrics {
            advance: 0.6,
            plane_bounds: [0.0, 0.0, 0.5, 0.7],
            atlas_bounds: [1.0, 1.0, 17.0, 23.0],
        };
        assert!(a.is_visible());
    }
}
