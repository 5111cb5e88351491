//! Tile layer payload codec: cells <-> little-endian GID stream, optionally
//! gzip/zlib compressed, base64 armored.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::cell::Cell;
use crate::compression::{self, CompressionMethod};
use crate::error::LayerDataError;
use crate::gid_mapper::GidMapper;
use crate::layer::TileLayer;

/// How a tile layer's cells are written in a map file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerDataFormat {
    /// One element per tile; not handled by this crate's codecs
    Xml,
    /// Uncompressed GID stream
    Base64,
    /// GID stream, gzip compressed
    Base64Gzip,
    /// GID stream, zlib compressed
    #[default]
    Base64Zlib,
    /// Plain GID numbers
    Csv,
}

impl LayerDataFormat {
    /// Compression applied before base64 encoding.
    pub fn compression(self) -> Option<CompressionMethod> {
        match self {
            LayerDataFormat::Base64Gzip => Some(CompressionMethod::Gzip),
            LayerDataFormat::Base64Zlib => Some(CompressionMethod::Zlib),
            _ => None,
        }
    }

    /// Whether this is one of the base64 GID stream formats this module handles.
    pub fn is_binary(self) -> bool {
        matches!(
            self,
            LayerDataFormat::Base64 | LayerDataFormat::Base64Gzip | LayerDataFormat::Base64Zlib
        )
    }
}

fn check_binary(format: LayerDataFormat) -> Result<(), LayerDataError> {
    if format.is_binary() {
        Ok(())
    } else {
        Err(LayerDataError::UnsupportedFormat(format))
    }
}

/// GIDs of every cell, row by row.
pub fn encode_layer_gids(mapper: &GidMapper, layer: &TileLayer) -> Vec<u32> {
    layer.cells().iter().map(|cell| mapper.cell_to_gid(cell)).collect()
}

/// Encodes `layer` with the default compression level.
pub fn encode_layer_data(
    mapper: &GidMapper,
    layer: &TileLayer,
    format: LayerDataFormat,
) -> Result<String, LayerDataError> {
    encode_layer_data_with(mapper, layer, format, None)
}

/// Encodes `layer`; `level` is the compression level (0-9), ignored for plain
/// [`LayerDataFormat::Base64`].
pub fn encode_layer_data_with(
    mapper: &GidMapper,
    layer: &TileLayer,
    format: LayerDataFormat,
    level: Option<u32>,
) -> Result<String, LayerDataError> {
    check_binary(format)?;

    let mut bytes = Vec::with_capacity(layer.payload_len());
    for gid in encode_layer_gids(mapper, layer) {
        bytes.extend_from_slice(&gid.to_le_bytes());
    }
    debug_assert_eq!(bytes.len() % 4, 0);

    let bytes = match format.compression() {
        Some(method) => compression::compress(&bytes, method, level)?,
        None => bytes,
    };

    Ok(STANDARD.encode(bytes))
}

/// Decodes a base64 payload into `layer`.
///
/// The layer is only written when every cell resolves; on error it is left untouched and,
/// for unresolved tiles, `mapper.invalid_tile()` holds the offending GID.
pub fn decode_layer_data(
    mapper: &GidMapper,
    layer: &mut TileLayer,
    payload: &str,
    format: LayerDataFormat,
) -> Result<(), LayerDataError> {
    check_binary(format)?;

    let raw = STANDARD.decode(payload.trim())?;
    let expected = layer.payload_len();

    let bytes = match format.compression() {
        Some(_) => compression::decompress(&raw, expected)?,
        None => raw,
    };
    if bytes.len() != expected {
        return Err(LayerDataError::CorruptLayerData {
            expected,
            actual: bytes.len(),
        });
    }

    let cells = bytes
        .chunks_exact(4)
        .map(|b| resolve(mapper, u32::from_le_bytes([b[0], b[1], b[2], b[3]])))
        .collect::<Result<Vec<_>, _>>()?;

    log::trace!(
        "decoded {}x{} layer ({} bytes, {:?})",
        layer.width(),
        layer.height(),
        payload.len(),
        format
    );
    layer.replace_cells(cells);
    Ok(())
}

/// Same as [`decode_layer_data`], for GIDs that are already numbers (JSON arrays, CSV).
pub fn decode_layer_gids(
    mapper: &GidMapper,
    layer: &mut TileLayer,
    gids: &[u32],
) -> Result<(), LayerDataError> {
    if gids.len() != layer.cells().len() {
        return Err(LayerDataError::CorruptLayerData {
            expected: layer.payload_len(),
            actual: gids.len().saturating_mul(4),
        });
    }

    let cells = gids
        .iter()
        .map(|&gid| resolve(mapper, gid))
        .collect::<Result<Vec<_>, _>>()?;
    layer.replace_cells(cells);
    Ok(())
}

fn resolve(mapper: &GidMapper, gid: u32) -> Result<Cell, LayerDataError> {
    mapper.gid_to_cell(gid).ok_or_else(|| {
        log::warn!("unresolved tile GID {gid}");
        if mapper.is_empty() {
            LayerDataError::TileButNoTilesets { gid }
        } else {
            LayerDataError::InvalidTile { gid }
        }
    })
}
