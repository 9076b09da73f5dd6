//! Sprig engine crate.
//!
//! Batched 2D quad rendering over a dependency-aware asset cache:
//! - `asset`: registry of declarative specs and the cache materializing them
//! - `render`: the batch renderer
//! - `device`: the GPU contract plus wgpu and recording backends

pub mod asset;
pub mod context;
pub mod coords;
pub mod device;
pub mod logging;
pub mod paint;
pub mod render;

pub use context::EngineContext;
