use std::path::PathBuf;

use super::{AssetId, AssetKind};

/// Errors produced by the registry and the cache.
///
/// All of these are recoverable: the cache logs them and keeps the render
/// loop running. Only GPU contract violations (malformed uploads) abort, and
/// those panic in the device layer instead of surfacing here.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// The identifier is absent from every registry mapping the caller searched.
    #[error("asset {id} is not registered")]
    NotFound { id: AssetId },

    /// The asset exists but something it depends on is not registered.
    #[error("{kind} {id} depends on {dependency}, which is not registered")]
    DependencyNotFound {
        id: AssetId,
        kind: AssetKind,
        dependency: AssetId,
    },

    /// The asset's source file is missing or could not be decoded.
    #[error("failed to load {kind} {id} from {}: {reason}", path.display())]
    AssetLoad {
        id: AssetId,
        kind: AssetKind,
        path: PathBuf,
        reason: String,
    },

    /// A sprite names a cell outside of its texture's grid.
    #[error("sprite {id} uses cell {cell:?}, outside the {grid:?} grid of texture {texture}")]
    InvalidSprite {
        id: AssetId,
        texture: AssetId,
        cell: [u32; 2],
        grid: [u32; 2],
    },

    /// The registry file could not be read or written.
    #[error("registry I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The registry file is not a valid registry document.
    #[error("malformed registry file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The write destination exists but is not a regular file.
    #[error("refusing to write registry over {}: not a regular file", path.display())]
    InvalidTarget { path: PathBuf },
}

impl AssetError {
    /// Identifier the error is about, if any.
    pub fn asset_id(&self) -> Option<AssetId> {
        match self {
            AssetError::NotFound { id }
            | AssetError::DependencyNotFound { id, .. }
            | AssetError::AssetLoad { id, .. }
            | AssetError::InvalidSprite { id, .. } => Some(*id),
            AssetError::Io { .. } | AssetError::Parse { .. } | AssetError::InvalidTarget { .. } => {
                None
            }
        }
    }
}
