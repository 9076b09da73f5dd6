//! Batched quad rendering.
//!
//! Convention:
//! - quads are the unit square centered on the origin, placed by a `Mat4`
//! - UVs and texture rows have a bottom-left origin
//! - the view-projection matrix is supplied per batch

mod batch;
mod vertex;

pub use batch::{Batch, BatchConfig, BatchRenderer, BatchStats};
pub use vertex::{INDICES_PER_QUAD, QuadVertex, UNIT_QUAD, VERTICES_PER_QUAD, quad_indices};

/// WGSL source of the built-in batch program (`vs_main` / `fs_main`).
pub const BATCH_SHADER_WGSL: &str = include_str!("shaders/batch.wgsl");
