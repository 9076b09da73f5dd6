//! GPU device contract and backends.
//!
//! This module is responsible for:
//! - the [`GpuDevice`] trait consumed by the asset cache and the batch renderer
//! - a headless wgpu backend rendering into an offscreen target
//! - an in-memory recording backend for dry runs and tests

mod api;
mod gpu;
mod init;
mod recording;

pub use api::{
    BufferHandle, GpuDevice, ShaderHandle, TextureDesc, TextureFormat, TextureHandle,
    TextureRegion,
};
pub use gpu::{WGPU_TEXTURE_SLOTS, WgpuDevice};
pub use init::WgpuInit;
pub use recording::{DrawCall, RecordedTexture, RecordingDevice};
