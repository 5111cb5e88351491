use std::path::Path;
use std::rc::Rc;

use crate::error::MapError;
use crate::gid_mapper::GidMapper;
use crate::layer::{Layer, LayerKind, ObjectGroup, TileLayer};
use crate::loader::json_loader::load_map_file;
use crate::options::{LoadOptions, SaveOptions};
use crate::properties::Properties;
use crate::tileset::{SharedTileset, Tileset};
use crate::writer::json_writer::save_map_file;

/// A tile map document: shared tilesets plus layers in draw order.
#[derive(Debug, Clone)]
pub struct Map {
    /// In tiles
    pub width: u32,
    /// In tiles
    pub height: u32,
    /// Grid cell width in pixels
    pub tile_width: u32,
    /// Grid cell height in pixels
    pub tile_height: u32,
    /// Custom properties
    pub properties: Properties,
    /// Bottom to top
    pub layers: Vec<Layer>,
    tilesets: Vec<SharedTileset>,
}

impl Map {
    /// An empty map without tilesets or layers.
    pub fn new(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Self {
        Map {
            width,
            height,
            tile_width,
            tile_height,
            properties: Properties::new(),
            layers: Vec::new(),
            tilesets: Vec::new(),
        }
    }

    /// Reads a Tiled JSON map, see [`load_map_file`](crate::load_map_file).
    pub fn load(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Self, MapError> {
        load_map_file(path.as_ref(), options)
    }

    /// Writes the map as Tiled JSON, see [`save_map_file`](crate::save_map_file).
    pub fn save(&self, path: impl AsRef<Path>, options: &SaveOptions) -> Result<(), MapError> {
        save_map_file(self, path.as_ref(), options)
    }

    /// Tilesets in GID order.
    pub fn tilesets(&self) -> &[SharedTileset] {
        &self.tilesets
    }

    /// Appends `tileset` unless this very tileset is already part of the map.
    /// Returns its index.
    pub fn add_tileset(&mut self, tileset: SharedTileset) -> usize {
        match self.tileset_index(&tileset) {
            Some(i) => i,
            None => {
                self.tilesets.push(tileset);
                self.tilesets.len() - 1
            }
        }
    }

    /// Position of `tileset` in [`tilesets`](Self::tilesets).
    pub fn tileset_index(&self, tileset: &Tileset) -> Option<usize> {
        self.tilesets
            .iter()
            .position(|ts| std::ptr::eq(Rc::as_ptr(ts), tileset))
    }

    /// Mapper with first GIDs assigned by tileset order, starting at 1.
    pub fn gid_mapper(&self) -> GidMapper {
        GidMapper::from_tilesets(&self.tilesets)
    }

    /// Adds `layer` on top.
    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// First layer called `name`.
    pub fn layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Tile layers with their shared attributes, bottom to top.
    pub fn tile_layers(&self) -> impl Iterator<Item = (&Layer, &TileLayer)> {
        self.layers.iter().filter_map(|l| match &l.kind {
            LayerKind::Tiles(t) => Some((l, t)),
            _ => None,
        })
    }

    /// Object layers with their shared attributes, bottom to top.
    pub fn object_groups(&self) -> impl Iterator<Item = (&Layer, &ObjectGroup)> {
        self.layers.iter().filter_map(|l| match &l.kind {
            LayerKind::Objects(o) => Some((l, o)),
            _ => None,
        })
    }

    /// Whether any tile layer cell or tile object uses `tileset`.
    pub fn is_tileset_used(&self, tileset: &Tileset) -> bool {
        let uses = |cell: &crate::cell::Cell| {
            cell.tile().is_some_and(|t| t.belongs_to(tileset))
        };
        self.tile_layers()
            .any(|(_, t)| t.cells().iter().any(uses))
            || self
                .object_groups()
                .flat_map(|(_, g)| g.objects.iter())
                .filter_map(|o| o.cell())
                .any(uses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::layer::{MapObject, ObjectShape};

    #[test]
    fn first_gids_follow_tileset_order() {
        let mut map = Map::new(4, 4, 16, 16);
        let a = Rc::new(Tileset::new("a", 16, 16).with_grid(4, 16));
        let b = Rc::new(Tileset::new("b", 16, 16).with_grid(4, 8));
        assert_eq!(map.add_tileset(Rc::clone(&a)), 0);
        assert_eq!(map.add_tileset(Rc::clone(&b)), 1);
        assert_eq!(map.add_tileset(Rc::clone(&a)), 0);

        let mapper = map.gid_mapper();
        assert_eq!(mapper.first_gid(&a), Some(1));
        assert_eq!(mapper.first_gid(&b), Some(17));
    }

    #[test]
    fn tileset_usage_covers_layers_and_objects() {
        let mut map = Map::new(2, 2, 16, 16);
        let a = Rc::new(Tileset::new("a", 16, 16).with_grid(2, 4));
        let b = Rc::new(Tileset::new("b", 16, 16).with_grid(2, 4));
        map.add_tileset(Rc::clone(&a));
        map.add_tileset(Rc::clone(&b));

        let mut tiles = TileLayer::new(2, 2);
        tiles.set_cell(1, 1, Cell::from_tileset(&a, 3));
        map.add_layer(Layer::new("ground", LayerKind::Tiles(tiles)));
        assert!(map.is_tileset_used(&a));
        assert!(!map.is_tileset_used(&b));

        let group = ObjectGroup {
            objects: vec![MapObject::new(1, ObjectShape::Tile(Cell::from_tileset(&b, 0)))],
        };
        map.add_layer(Layer::new("things", LayerKind::Objects(group)));
        assert!(map.is_tileset_used(&b));
        assert_eq!(map.tile_layers().count(), 1);
        assert!(map.layer_by_name("things").is_some());
    }
}
