//! Error types and leveled reporting for tileset loading.

use crate::capability::CapabilityError;
use crate::secfile::SecfileError;
use thiserror::Error;

/// Errors that stop a tileset from loading.
#[derive(Debug, Error)]
pub enum TilesetError {
    #[error("cannot read \"{path}\": {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Secfile(#[from] SecfileError),

    #[error("\"{file}\": {source}")]
    Capability {
        file: String,
        #[source]
        source: CapabilityError,
    },

    #[error("invalid drawing options: {0}")]
    Options(#[from] serde_json::Error),

    #[error("hex tilesets are not supported")]
    HexUnsupported,

    #[error("unknown tileset type \"{0}\"")]
    UnknownType(String),

    #[error("unknown layer \"{0}\" in layer_order")]
    UnknownLayer(String),

    #[error("layer \"{0}\" listed twice in layer_order")]
    DuplicateLayer(String),

    /// A configuration problem reported at fatal level.
    #[error("{0}")]
    Fatal(String),
}

impl TilesetError {
    /// Attach the file name to a capability mismatch.
    pub fn capability(file: &str, source: CapabilityError) -> Self {
        TilesetError::Capability {
            file: file.to_string(),
            source,
        }
    }
}

/// Severity of a tileset configuration problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Verbose,
    Normal,
    Error,
    /// Aborts the load.
    Fatal,
}

/// Report a configuration problem. Fatal problems become errors; the rest
/// are logged and loading continues.
pub fn tileset_error(level: LogLevel, message: impl Into<String>) -> Result<(), TilesetError> {
    let message = message.into();
    match level {
        LogLevel::Verbose => tracing::debug!("{message}"),
        LogLevel::Normal => tracing::info!("{message}"),
        LogLevel::Error => tracing::error!("{message}"),
        LogLevel::Fatal => {
            tracing::error!("{message}");
            return Err(TilesetError::Fatal(message));
        }
    }
    Ok(())
}
