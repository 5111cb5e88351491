//! Tilesets and their tiles.

use std::rc::Rc;

use macroquad::prelude::IVec2;

use crate::properties::Properties;

/// Tilesets are shared by every map and cell that uses them.
pub type SharedTileset = Rc<Tileset>;

/// Terrain corner value meaning "no terrain".
pub const NO_TERRAIN: u8 = 0xFF;

/// Corners of a tile, in the order their bytes appear in the terrain mask (high byte first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    /// High byte
    TopLeft,
    /// Second byte
    TopRight,
    /// Third byte
    BottomLeft,
    /// Low byte
    BottomRight,
}

impl Corner {
    fn shift(self) -> u32 {
        match self {
            Corner::TopLeft => 24,
            Corner::TopRight => 16,
            Corner::BottomLeft => 8,
            Corner::BottomRight => 0,
        }
    }
}

/// One step of a tile animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Local id of the tile shown, in the same tileset
    pub tile_id: u32,
    /// How long it is shown
    pub duration_ms: u32,
}

/// Image file with the pixel size it had when the document was authored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Path as written in the document
    pub source: String,
    /// In pixels
    pub width: u32,
    /// In pixels
    pub height: u32,
}

/// Per-tile data of a tileset.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    id: u32,
    /// Own image, for image-collection tilesets.
    pub image: Option<ImageRef>,
    /// Frames to cycle through, empty for a still tile.
    pub animation: Vec<Frame>,
    /// One byte per corner, see [`Corner`]; `u32::MAX` for no terrain at all.
    pub terrain: u32,
    /// Relative chance of being picked when painting with random tiles.
    pub probability: f32,
    /// Custom properties.
    pub properties: Properties,
}

impl Tile {
    /// A plain tile: no image, animation or terrain, probability 1.
    pub fn new(id: u32) -> Self {
        Tile {
            id,
            image: None,
            animation: Vec::new(),
            terrain: u32::MAX,
            probability: 1.0,
            properties: Properties::new(),
        }
    }

    /// Local id within its tileset.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Has at least one animation frame.
    pub fn is_animated(&self) -> bool {
        !self.animation.is_empty()
    }

    /// Terrain index at `corner`, `None` when that corner has no terrain.
    pub fn corner_terrain(&self, corner: Corner) -> Option<u8> {
        match ((self.terrain >> corner.shift()) & 0xFF) as u8 {
            NO_TERRAIN => None,
            t => Some(t),
        }
    }

    /// Sets or clears (`None`) the terrain at `corner`.
    pub fn set_corner_terrain(&mut self, corner: Corner, terrain: Option<u8>) {
        let value = terrain.unwrap_or(NO_TERRAIN) as u32;
        let shift = corner.shift();
        self.terrain = (self.terrain & !(0xFF << shift)) | (value << shift);
    }
}

/// An ordered collection of tiles, either sliced from one atlas image or gathered from
/// individual images.
#[derive(Debug, Clone, PartialEq)]
pub struct Tileset {
    name: String,
    tile_width: u32,
    tile_height: u32,
    spacing: u32,
    margin: u32,
    tile_offset: IVec2,
    column_count: u32,
    image: Option<ImageRef>,
    tiles: Vec<Tile>, // sorted by id
    /// Custom properties.
    pub properties: Properties,
}

impl Tileset {
    /// An empty tileset with no image; add tiles or slice an image to fill it.
    pub fn new(name: impl Into<String>, tile_width: u32, tile_height: u32) -> Self {
        Tileset {
            name: name.into(),
            tile_width,
            tile_height,
            spacing: 0,
            margin: 0,
            tile_offset: IVec2::ZERO,
            column_count: 0,
            image: None,
            tiles: Vec::new(),
            properties: Properties::new(),
        }
    }

    /// Pixels between tiles and around the atlas border. Set before slicing an image.
    pub fn with_spacing(mut self, spacing: u32, margin: u32) -> Self {
        self.spacing = spacing;
        self.margin = margin;
        self
    }

    /// Drawing offset applied to every tile.
    pub fn with_tile_offset(mut self, offset: IVec2) -> Self {
        self.tile_offset = offset;
        self
    }

    /// Slices the atlas image into tiles, deriving column count and tile count from
    /// its pixel size. Metadata of tiles that still exist afterwards is kept.
    pub fn with_image(mut self, source: impl Into<String>, width: u32, height: u32) -> Self {
        let columns = self.column_count_for_width(width);
        let rows = self.row_count_for_height(height);
        self.image = Some(ImageRef {
            source: source.into(),
            width,
            height,
        });
        self.with_grid(columns, columns.saturating_mul(rows))
    }

    /// Sets the grid layout directly, for tilesets whose image size is unknown.
    pub fn with_grid(mut self, columns: u32, tile_count: u32) -> Self {
        self.column_count = columns;
        let mut old = std::mem::take(&mut self.tiles).into_iter().peekable();
        self.tiles = (0..tile_count)
            .map(|id| {
                while old.next_if(|t| t.id < id).is_some() {}
                old.next_if(|t| t.id == id).unwrap_or_else(|| Tile::new(id))
            })
            .collect();
        self
    }

    /// Adds or replaces the tile with the same id.
    pub fn add_tile(&mut self, tile: Tile) {
        match self.tiles.binary_search_by_key(&tile.id, |t| t.id) {
            Ok(i) => self.tiles[i] = tile,
            Err(i) => self.tiles.insert(i, tile),
        }
    }

    /// Mutable access to tile `id`.
    pub fn tile_mut(&mut self, id: u32) -> Option<&mut Tile> {
        let i = self.tile_index(id)?;
        Some(&mut self.tiles[i])
    }

    /// Tile `id`, `None` if the tileset has no such tile.
    pub fn tile_at(&self, id: u32) -> Option<&Tile> {
        self.tile_index(id).map(|i| &self.tiles[i])
    }

    fn tile_index(&self, id: u32) -> Option<usize> {
        // dense tilesets store tile `id` at index `id`
        match self.tiles.get(id as usize) {
            Some(t) if t.id == id => Some(id as usize),
            _ => self.tiles.binary_search_by_key(&id, |t| t.id).ok(),
        }
    }

    /// All tiles, ordered by id.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// In pixels.
    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    /// In pixels.
    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Pixels between neighbouring tiles of the atlas.
    pub fn spacing(&self) -> u32 {
        self.spacing
    }

    /// Pixels around the atlas border.
    pub fn margin(&self) -> u32 {
        self.margin
    }

    /// Drawing offset of every tile, in pixels.
    pub fn tile_offset(&self) -> IVec2 {
        self.tile_offset
    }

    /// The atlas image, `None` for collections.
    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    /// Tiles come from individual images instead of one atlas.
    pub fn is_collection(&self) -> bool {
        self.image.is_none()
    }

    /// Number of tiles, which for a collection can be less than [`next_tile_id`](Self::next_tile_id).
    pub fn tile_count(&self) -> u32 {
        self.tiles.len() as u32
    }

    /// One past the highest tile id; the size of the GID range this tileset needs.
    pub fn next_tile_id(&self) -> u32 {
        self.tiles.last().map_or(0, |t| t.id.saturating_add(1))
    }

    /// Columns of the atlas grid, 0 for collections.
    pub fn column_count(&self) -> u32 {
        self.column_count
    }

    /// Columns an atlas image `width` pixels wide is sliced into.
    pub fn column_count_for_width(&self, width: u32) -> u32 {
        if self.tile_width == 0 {
            return 0;
        }
        width.saturating_sub(self.margin).saturating_add(self.spacing)
            / self.tile_width.saturating_add(self.spacing)
    }

    /// Rows an atlas image `height` pixels tall is sliced into.
    pub(crate) fn row_count_for_height(&self, height: u32) -> u32 {
        if self.tile_height == 0 {
            return 0;
        }
        height.saturating_sub(self.margin).saturating_add(self.spacing)
            / self.tile_height.saturating_add(self.spacing)
    }
}
