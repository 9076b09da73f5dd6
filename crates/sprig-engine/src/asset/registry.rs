use std::collections::BTreeMap;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{
    AssetError, AssetId, AssetKind, AssetSpec, FontSpec, ShaderSpec, SpecRef, SpriteSpec,
    TextureSpec,
};

/// Per-kind mapping from [`AssetId`] to specification.
///
/// Pure data: no GPU state, no I/O besides [`read_from_file`](Self::read_from_file)
/// and [`write_to_file`](Self::write_to_file). Registering an id twice
/// overwrites the first entry (with a warning). Entries are never removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetRegistry {
    textures: BTreeMap<AssetId, TextureSpec>,
    sprites: BTreeMap<AssetId, SpriteSpec>,
    shaders: BTreeMap<AssetId, ShaderSpec>,
    fonts: BTreeMap<AssetId, FontSpec>,
}

/// On-disk layout. Ids live in the map keys only.
#[derive(Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    textures: BTreeMap<AssetId, TextureSpec>,
    #[serde(default)]
    sprites: BTreeMap<AssetId, SpriteSpec>,
    #[serde(default)]
    shaders: BTreeMap<AssetId, ShaderSpec>,
    #[serde(default)]
    fonts: BTreeMap<AssetId, FontSpec>,
}

macro_rules! adopt_keys {
    ($map:expr) => {
        $map.into_iter()
            .map(|(id, mut spec)| {
                spec.id = id;
                (id, spec)
            })
            .collect()
    };
}

fn assign_id(id: &mut AssetId) -> AssetId {
    if id.is_null() {
        *id = AssetId::new();
    }
    *id
}

fn insert_logged<S>(map: &mut BTreeMap<AssetId, S>, kind: AssetKind, id: AssetId, spec: S) {
    if map.insert(id, spec).is_some() {
        log::warn!("registry: {kind} {id} was already registered; overwriting");
    }
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── registration ───────────────────────────────────────────────────────

    /// Registers any kind of specification; see the typed variants.
    pub fn register(&mut self, spec: impl Into<AssetSpec>) -> AssetId {
        match spec.into() {
            AssetSpec::Texture(s) => self.register_texture(s),
            AssetSpec::Sprite(s) => self.register_sprite(s),
            AssetSpec::Shader(s) => self.register_shader(s),
            AssetSpec::Font(s) => self.register_font(s),
        }
    }

    /// Inserts or overwrites `spec`; a null id is replaced by a fresh one.
    pub fn register_texture(&mut self, mut spec: TextureSpec) -> AssetId {
        let id = assign_id(&mut spec.id);
        insert_logged(&mut self.textures, AssetKind::Texture, id, spec);
        id
    }

    pub fn register_sprite(&mut self, mut spec: SpriteSpec) -> AssetId {
        let id = assign_id(&mut spec.id);
        insert_logged(&mut self.sprites, AssetKind::Sprite, id, spec);
        id
    }

    pub fn register_shader(&mut self, mut spec: ShaderSpec) -> AssetId {
        let id = assign_id(&mut spec.id);
        insert_logged(&mut self.shaders, AssetKind::Shader, id, spec);
        id
    }

    pub fn register_font(&mut self, mut spec: FontSpec) -> AssetId {
        let id = assign_id(&mut spec.id);
        insert_logged(&mut self.fonts, AssetKind::Font, id, spec);
        id
    }

    // ── lookup ─────────────────────────────────────────────────────────────

    pub fn lookup(&self, kind: AssetKind, id: AssetId) -> Result<SpecRef<'_>, AssetError> {
        let found = match kind {
            AssetKind::Texture => self.textures.get(&id).map(SpecRef::Texture),
            AssetKind::Sprite => self.sprites.get(&id).map(SpecRef::Sprite),
            AssetKind::Shader => self.shaders.get(&id).map(SpecRef::Shader),
            AssetKind::Font => self.fonts.get(&id).map(SpecRef::Font),
        };
        found.ok_or(AssetError::NotFound { id })
    }

    /// First kind that has `id`, searched as texture, sprite, shader, font.
    pub fn kind_of(&self, id: AssetId) -> Option<AssetKind> {
        AssetKind::ALL
            .into_iter()
            .find(|&kind| self.lookup(kind, id).is_ok())
    }

    pub fn texture(&self, id: AssetId) -> Option<&TextureSpec> {
        self.textures.get(&id)
    }

    pub fn sprite(&self, id: AssetId) -> Option<&SpriteSpec> {
        self.sprites.get(&id)
    }

    pub fn shader(&self, id: AssetId) -> Option<&ShaderSpec> {
        self.shaders.get(&id)
    }

    pub fn font(&self, id: AssetId) -> Option<&FontSpec> {
        self.fonts.get(&id)
    }

    pub fn textures(&self) -> impl Iterator<Item = &TextureSpec> {
        self.textures.values()
    }

    pub fn sprites(&self) -> impl Iterator<Item = &SpriteSpec> {
        self.sprites.values()
    }

    pub fn shaders(&self) -> impl Iterator<Item = &ShaderSpec> {
        self.shaders.values()
    }

    pub fn fonts(&self) -> impl Iterator<Item = &FontSpec> {
        self.fonts.values()
    }

    /// Sprites sliced from `texture`.
    pub fn sprites_of(&self, texture: AssetId) -> impl Iterator<Item = &SpriteSpec> {
        self.sprites.values().filter(move |s| s.texture == texture)
    }

    pub fn len(&self) -> usize {
        self.textures.len() + self.sprites.len() + self.shaders.len() + self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── files ──────────────────────────────────────────────────────────────

    /// Reads a registry document.
    ///
    /// Missing collections deserialize as empty.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let file = fs::File::open(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let doc: RegistryDocument =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                if source.is_io() {
                    AssetError::Io {
                        path: path.to_path_buf(),
                        source: source.into(),
                    }
                } else {
                    AssetError::Parse {
                        path: path.to_path_buf(),
                        source,
                    }
                }
            })?;

        let registry = Self {
            textures: adopt_keys!(doc.textures),
            sprites: adopt_keys!(doc.sprites),
            shaders: adopt_keys!(doc.shaders),
            fonts: adopt_keys!(doc.fonts),
        };

        log::debug!(
            "registry: read {} entries from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Writes every mapping to `path` as pretty-printed JSON.
    ///
    /// An existing regular file is first renamed to `<path>.old`. Anything
    /// else at `path` (a directory, a socket, ...) fails with
    /// [`AssetError::InvalidTarget`] and nothing is written.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let path = path.as_ref();
        let io_err = |source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        };

        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => {
                let backup = backup_path(path);
                fs::rename(path, &backup).map_err(io_err)?;
                log::info!("registry: previous {} kept as {}", path.display(), backup.display());
            }
            Ok(_) => {
                return Err(AssetError::InvalidTarget {
                    path: path.to_path_buf(),
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(e)),
        }

        let doc = RegistryDocument {
            textures: self.textures.clone(),
            sprites: self.sprites.clone(),
            shaders: self.shaders.clone(),
            fonts: self.fonts.clone(),
        };

        let file = fs::File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &doc).map_err(|e| io_err(e.into()))?;
        writer.write_all(b"\n").map_err(io_err)?;
        writer.flush().map_err(io_err)?;

        log::debug!("registry: wrote {} entries to {}", self.len(), path.display());
        Ok(())
    }
}

/// `assets.json` → `assets.json.old`.
fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".old");
    PathBuf::from(name)
}
