use std::{error, fmt, io, path::PathBuf};

use crate::layer_data::LayerDataFormat;

/// Failure while encoding or decoding a single tile layer payload.
#[derive(Debug)]
pub enum LayerDataError {
    /// The codec only handles the base64 formats; XML and CSV belong to the map reader/writer.
    UnsupportedFormat(LayerDataFormat),
    /// The payload is not valid base64.
    Base64(base64::DecodeError),
    /// zlib/gzip stream could not be produced or inflated.
    Compression(io::Error),
    /// Decoded byte count does not match `width * height * 4`.
    CorruptLayerData {
        /// Bytes the layer dimensions call for
        expected: usize,
        /// Bytes actually produced (capped at `expected + 1` for compressed input)
        actual: usize,
    },
    /// A non-empty GID was found but the mapper holds no tilesets.
    TileButNoTilesets {
        /// Offending GID, flip bits included
        gid: u32,
    },
    /// A GID does not resolve to a tile of any registered tileset.
    InvalidTile {
        /// Offending GID, flip bits included
        gid: u32,
    },
}

impl fmt::Display for LayerDataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerDataError::UnsupportedFormat(format) => {
                write!(f, "layer data format {format:?} is not handled by the binary codec")
            }
            LayerDataError::Base64(err) => write!(f, "invalid base64 layer data: {err}"),
            LayerDataError::Compression(err) => write!(f, "layer data compression failed: {err}"),
            LayerDataError::CorruptLayerData { expected, actual } => write!(
                f,
                "corrupt layer data: expected {expected} bytes, got {actual}"
            ),
            LayerDataError::TileButNoTilesets { gid } => {
                write!(f, "tile {gid} used but no tilesets are defined")
            }
            LayerDataError::InvalidTile { gid } => write!(f, "tile {gid} not found"),
        }
    }
}

impl error::Error for LayerDataError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LayerDataError::Base64(err) => Some(err),
            LayerDataError::Compression(err) => Some(err),
            _ => None,
        }
    }
}

impl From<base64::DecodeError> for LayerDataError {
    fn from(err: base64::DecodeError) -> Self {
        LayerDataError::Base64(err)
    }
}

impl From<io::Error> for LayerDataError {
    fn from(err: io::Error) -> Self {
        LayerDataError::Compression(err)
    }
}

/// Error type for reading and writing whole maps
#[derive(Debug)]
pub enum MapError {
    /// File I/O error
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
    /// JSON parse or serialization error
    Json {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },
    /// Structural problem in the map document
    InvalidMap(String),
    /// A tile layer payload failed to encode or decode
    LayerData {
        /// Layer name
        layer: String,
        /// Codec failure
        source: LayerDataError,
    },
    /// A tile object references a GID no tileset covers
    InvalidObjectGid {
        /// Object layer name
        layer: String,
        /// Object id
        object_id: u32,
        /// Offending GID, flip bits included
        gid: u32,
    },
    /// Custom property with a type we don't understand
    UnsupportedPropertyType {
        /// Property name
        name: String,
        /// Declared type
        kind: String,
    },
    /// Unsupported file or layer data format
    UnsupportedFormat(String),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            MapError::Json { path, source } => {
                write!(f, "JSON error in {}: {}", path.display(), source)
            }
            MapError::InvalidMap(msg) => write!(f, "Invalid map: {}", msg),
            MapError::LayerData { layer, source } => write!(f, "layer '{}': {}", layer, source),
            MapError::InvalidObjectGid {
                layer,
                object_id,
                gid,
            } => write!(
                f,
                "object {} in layer '{}': tile {} not found",
                object_id, layer, gid
            ),
            MapError::UnsupportedPropertyType { name, kind } => {
                write!(f, "Unsupported type '{}' for property '{}'", kind, name)
            }
            MapError::UnsupportedFormat(what) => write!(f, "Unsupported format: {}", what),
        }
    }
}

impl error::Error for MapError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            MapError::Io { source, .. } => Some(source),
            MapError::Json { source, .. } => Some(source),
            MapError::LayerData { source, .. } => Some(source),
            _ => None,
        }
    }
}
