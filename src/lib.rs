#![warn(missing_docs)]

//! Tiled map data model with global tile ID mapping and tile layer payload codecs.
//!
//! A [`GidMapper`] turns the 32-bit GIDs stored in map files (top three bits are flip
//! flags) into [`Cell`]s pointing at tiles of shared [`Tileset`]s, and back. The
//! [`layer_data`] functions move whole [`TileLayer`]s between cells and base64 text,
//! optionally gzip or zlib compressed. [`Map::load`] / [`Map::save`] read and write
//! Tiled JSON documents on top of that.

mod cell;
pub mod compression;
mod error;
mod gid_mapper;
mod layer;
pub mod layer_data;
mod loader {
    pub mod json_loader;
}
mod map;
mod options;
mod properties;
mod tileset;
mod writer {
    pub mod json_writer;
}

pub use cell::{
    Cell, TileRef, FLIPPED_ANTI_DIAGONALLY_FLAG, FLIPPED_HORIZONTALLY_FLAG,
    FLIPPED_VERTICALLY_FLAG, FLIP_MASK,
};
pub use error::{LayerDataError, MapError};
pub use gid_mapper::GidMapper;
pub use layer::{ImageLayer, Layer, LayerKind, MapObject, ObjectGroup, ObjectShape, TileLayer};
pub use layer_data::{decode_layer_data, encode_layer_data, LayerDataFormat};
pub use loader::json_loader::{load_map_file, load_map_str};
pub use map::Map;
pub use options::{LoadOptions, SaveOptions};
pub use properties::{Properties, PropertyValue};
pub use tileset::{Corner, Frame, ImageRef, SharedTileset, Tile, Tileset, NO_TERRAIN};
pub use writer::json_writer::{encode_map_to_json, save_map_file};
