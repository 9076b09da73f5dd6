//! Asset registry and cache.
//!
//! - [`AssetRegistry`]: declarative specs keyed by [`AssetId`], persisted as JSON
//! - [`AssetCache`]: materializes GPU resources from specs on demand and hands
//!   out [`WeakHandle`]s
//! - [`bake`]: offline glyph atlas generation for font specs

pub mod bake;
mod cache;
mod error;
mod handle;
mod id;
mod registry;
mod resource;
mod spec;

pub use cache::AssetCache;
pub use error::AssetError;
pub use handle::WeakHandle;
pub use id::AssetId;
pub use registry::AssetRegistry;
pub use resource::{Font, Resource, ShaderProgram, Sprite, Texture};
pub use spec::{
    AssetKind, AssetSpec, FontMetrics, FontSpec, GlyphMetrics, ShaderSpec, SpecRef, SpriteSpec,
    TextureSpec,
};
