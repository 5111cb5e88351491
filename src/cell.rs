use std::fmt;
use std::rc::Rc;

use macroquad::prelude::IVec2;

use crate::tileset::{SharedTileset, Tile, Tileset};

/// GID bit 31: mirror along the vertical axis.
pub const FLIPPED_HORIZONTALLY_FLAG: u32 = 0x8000_0000;
/// GID bit 30: mirror along the horizontal axis.
pub const FLIPPED_VERTICALLY_FLAG: u32 = 0x4000_0000;
/// GID bit 29: swap x and y.
pub const FLIPPED_ANTI_DIAGONALLY_FLAG: u32 = 0x2000_0000;
/// All flip bits; the remaining bits of a GID are the tile reference.
pub const FLIP_MASK: u32 =
    FLIPPED_HORIZONTALLY_FLAG | FLIPPED_VERTICALLY_FLAG | FLIPPED_ANTI_DIAGONALLY_FLAG;

/// Non-owning handle to one tile: the shared tileset plus the tile's local id.
#[derive(Clone)]
pub struct TileRef {
    tileset: SharedTileset,
    id: u32,
}

impl TileRef {
    /// Refers to tile `id` of `tileset`. The id is not checked against the tileset.
    pub fn new(tileset: SharedTileset, id: u32) -> Self {
        TileRef { tileset, id }
    }

    /// Local id within the tileset.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The tileset the tile belongs to.
    #[inline]
    pub fn tileset(&self) -> &SharedTileset {
        &self.tileset
    }

    /// Tile data, if the tileset has a tile with this id.
    pub fn tile(&self) -> Option<&Tile> {
        self.tileset.tile_at(self.id)
    }

    /// Drawing offset shared by every tile of the tileset.
    pub fn offset(&self) -> IVec2 {
        self.tileset.tile_offset()
    }

    /// Whether the tile is part of `tileset` (same instance, not equal content).
    #[inline]
    pub fn belongs_to(&self, tileset: &Tileset) -> bool {
        std::ptr::eq(Rc::as_ptr(&self.tileset), tileset)
    }
}

impl PartialEq for TileRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Rc::ptr_eq(&self.tileset, &other.tileset)
    }
}

impl Eq for TileRef {}

impl fmt::Debug for TileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TileRef({:?}#{})", self.tileset.name(), self.id)
    }
}

/// One grid slot of a tile layer: an optional tile and its flip flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    tile: Option<TileRef>,
    /// Mirrored along the vertical axis
    pub flipped_horizontally: bool,
    /// Mirrored along the horizontal axis
    pub flipped_vertically: bool,
    /// x and y swapped, applied before the other two flips
    pub flipped_anti_diagonally: bool,
}

impl Cell {
    /// A cell without a tile, the same as `Cell::default()`.
    pub fn empty() -> Self {
        Cell::default()
    }

    /// An unflipped cell showing `tile`.
    pub fn new(tile: TileRef) -> Self {
        Cell {
            tile: Some(tile),
            ..Cell::default()
        }
    }

    /// Shorthand for `Cell::new(TileRef::new(tileset.clone(), id))`.
    pub fn from_tileset(tileset: &SharedTileset, id: u32) -> Self {
        Cell::new(TileRef::new(Rc::clone(tileset), id))
    }

    /// Sets the horizontal flip.
    pub fn flipped_horizontally(mut self, on: bool) -> Self {
        self.flipped_horizontally = on;
        self
    }

    /// Sets the vertical flip.
    pub fn flipped_vertically(mut self, on: bool) -> Self {
        self.flipped_vertically = on;
        self
    }

    /// Sets the anti-diagonal flip.
    pub fn flipped_anti_diagonally(mut self, on: bool) -> Self {
        self.flipped_anti_diagonally = on;
        self
    }

    /// `true` when the cell has no tile.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tile.is_none()
    }

    /// The tile shown, if any.
    #[inline]
    pub fn tile(&self) -> Option<&TileRef> {
        self.tile.as_ref()
    }

    /// Tileset of the tile shown.
    pub fn tileset(&self) -> Option<&SharedTileset> {
        self.tile.as_ref().map(TileRef::tileset)
    }

    /// Local id of the tile shown.
    pub fn tile_id(&self) -> Option<u32> {
        self.tile.as_ref().map(TileRef::id)
    }

    /// Replaces the tile, keeping the flip flags. Clearing the tile clears the flags too.
    pub fn set_tile(&mut self, tile: Option<TileRef>) {
        if tile.is_none() {
            *self = Cell::empty();
        } else {
            self.tile = tile;
        }
    }

    /// Flip flags packed into the top three GID bits.
    pub fn flip_bits(&self) -> u32 {
        let mut bits = 0;
        if self.flipped_horizontally {
            bits |= FLIPPED_HORIZONTALLY_FLAG;
        }
        if self.flipped_vertically {
            bits |= FLIPPED_VERTICALLY_FLAG;
        }
        if self.flipped_anti_diagonally {
            bits |= FLIPPED_ANTI_DIAGONALLY_FLAG;
        }
        bits
    }

    /// Copies the flip flags out of a raw GID; all other bits are ignored.
    pub fn with_flip_bits(mut self, gid: u32) -> Self {
        self.flipped_horizontally = gid & FLIPPED_HORIZONTALLY_FLAG != 0;
        self.flipped_vertically = gid & FLIPPED_VERTICALLY_FLAG != 0;
        self.flipped_anti_diagonally = gid & FLIPPED_ANTI_DIAGONALLY_FLAG != 0;
        self
    }
}
