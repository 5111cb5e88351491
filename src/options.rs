use serde::Deserialize;

use crate::layer_data::LayerDataFormat;

/// Settings for reading maps.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Decode tileset images found next to the map to learn their current size, so maps
    /// saved against an older, narrower or wider image still resolve to the same tiles.
    pub probe_images: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions { probe_images: true }
    }
}

/// Settings for writing maps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    /// Encoding of tile layer data
    pub layer_format: LayerDataFormat,
    /// 0-9; `None` uses the compressor's default
    pub compression_level: Option<u32>,
}
