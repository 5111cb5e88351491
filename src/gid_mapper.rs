use std::collections::BTreeMap;
use std::rc::Rc;

use crate::cell::{Cell, TileRef, FLIP_MASK};
use crate::tileset::{SharedTileset, Tileset};

/// Maps global tile IDs to (tileset, local id) pairs and back.
///
/// Each registered tileset owns the GID range `[first_gid, first_gid + next_tile_id)`.
/// GID 0 means "no tile" and is never registered. Ranges are expected to be disjoint;
/// a lookup picks the tileset with the greatest `first_gid <= gid`.
#[derive(Debug, Default)]
pub struct GidMapper {
    first_gids: BTreeMap<u32, SharedTileset>,
    original_columns: Vec<(SharedTileset, u32)>,
    invalid_tile: std::cell::Cell<u32>,
}

impl GidMapper {
    /// A mapper with no tilesets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tilesets` in order, the first at GID 1 and each next one right after
    /// the previous range.
    ///
    /// Registration stops at the first tileset whose range would run into the flip bits;
    /// tiles of that tileset and the ones after it then encode as 0.
    pub fn from_tilesets<'a>(tilesets: impl IntoIterator<Item = &'a SharedTileset>) -> Self {
        let mut mapper = Self::new();
        let mut first_gid = 1u32;
        for tileset in tilesets {
            let end = first_gid
                .checked_add(tileset.next_tile_id())
                .filter(|end| end - 1 <= !FLIP_MASK);
            let Some(end) = end else {
                log::warn!(
                    "tileset '{}' does not fit in the GID space, leaving it unregistered",
                    tileset.name()
                );
                break;
            };
            mapper.insert(first_gid, Rc::clone(tileset));
            first_gid = end;
        }
        mapper
    }

    /// Registers `tileset` at `first_gid`, replacing anything registered there before.
    pub fn insert(&mut self, first_gid: u32, tileset: SharedTileset) {
        self.first_gids.insert(first_gid, tileset);
    }

    /// Drops all registrations. Remembered column counts and the last invalid GID stay.
    pub fn clear(&mut self) {
        self.first_gids.clear();
    }

    /// `true` when no tileset is registered.
    pub fn is_empty(&self) -> bool {
        self.first_gids.is_empty()
    }

    /// The last GID that failed to resolve, 0 if none did.
    pub fn invalid_tile(&self) -> u32 {
        self.invalid_tile.get()
    }

    /// Registered tilesets with their first GID, in ascending GID order.
    pub fn tilesets(&self) -> impl Iterator<Item = (u32, &SharedTileset)> {
        self.first_gids.iter().map(|(gid, ts)| (*gid, ts))
    }

    /// Lowest first GID `tileset` is registered at.
    pub fn first_gid(&self, tileset: &Tileset) -> Option<u32> {
        self.first_gids
            .iter()
            .find(|(_, ts)| std::ptr::eq(Rc::as_ptr(ts), tileset))
            .map(|(gid, _)| *gid)
    }

    /// Resolves a raw GID (flip bits included) to a cell.
    ///
    /// Returns `None` when the GID is not covered by any registered tileset or names a
    /// tile the tileset doesn't have; the GID is then kept in [`invalid_tile`](Self::invalid_tile).
    pub fn gid_to_cell(&self, gid: u32) -> Option<Cell> {
        let bare = gid & !FLIP_MASK;

        if bare == 0 {
            // no tile, and no flags on an empty cell
            return Some(Cell::empty());
        }

        let resolved = self
            .first_gids
            .range(..=bare)
            .next_back()
            .and_then(|(first_gid, tileset)| {
                let local = self.correct_local_id(tileset, bare - first_gid)?;
                tileset.tile_at(local)?;
                Some(TileRef::new(Rc::clone(tileset), local))
            });

        match resolved {
            Some(tile) => Some(Cell::new(tile).with_flip_bits(gid)),
            None => {
                self.invalid_tile.set(gid);
                None
            }
        }
    }

    /// Encodes `cell` as a GID with flip bits. Empty cells, tiles of unregistered
    /// tilesets and tiles whose GID would not fit below the flip bits give 0.
    pub fn cell_to_gid(&self, cell: &Cell) -> u32 {
        let Some(tile) = cell.tile() else {
            return 0;
        };

        self.first_gids
            .iter()
            .find(|(_, ts)| Rc::ptr_eq(ts, tile.tileset()))
            .and_then(|(first_gid, _)| first_gid.checked_add(tile.id()))
            .filter(|gid| gid & FLIP_MASK == 0)
            .map_or(0, |gid| gid | cell.flip_bits())
    }

    /// Remembers the atlas width `tileset` had when the map was saved, so GIDs written
    /// against the old column layout land on the same tiles after the image was resized.
    pub fn set_tileset_width(&mut self, tileset: &SharedTileset, width: u32) {
        if tileset.tile_width() == 0 {
            return;
        }
        let columns = tileset.column_count_for_width(width);
        log::debug!(
            "tileset '{}' was authored with {} columns (now {})",
            tileset.name(),
            columns,
            tileset.column_count()
        );
        match self
            .original_columns
            .iter_mut()
            .find(|(ts, _)| Rc::ptr_eq(ts, tileset))
        {
            Some((_, c)) => *c = columns,
            None => self.original_columns.push((Rc::clone(tileset), columns)),
        }
    }

    /// `None` when the remapped id no longer fits in a `u32`.
    fn correct_local_id(&self, tileset: &SharedTileset, local: u32) -> Option<u32> {
        let old_columns = self
            .original_columns
            .iter()
            .find(|(ts, _)| Rc::ptr_eq(ts, tileset))
            .map(|(_, c)| *c);

        match old_columns {
            Some(old) if old > 0 && old != tileset.column_count() => {
                let row = local / old;
                let col = local % old;
                row.checked_mul(tileset.column_count())?.checked_add(col)
            }
            _ => Some(local),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{
        FLIPPED_ANTI_DIAGONALLY_FLAG, FLIPPED_HORIZONTALLY_FLAG, FLIPPED_VERTICALLY_FLAG,
    };
    use crate::tileset::Tile;

    fn grid(name: &str, columns: u32, count: u32) -> SharedTileset {
        Rc::new(Tileset::new(name, 16, 16).with_grid(columns, count))
    }

    fn two_tilesets() -> (GidMapper, SharedTileset, SharedTileset) {
        let a = grid("a", 5, 10);
        let b = grid("b", 5, 5);
        let mapper = GidMapper::from_tilesets([&a, &b]);
        (mapper, a, b)
    }

    #[test]
    fn resolves_range_boundaries() {
        let (mapper, a, b) = two_tilesets();
        assert_eq!(mapper.gid_to_cell(1), Some(Cell::from_tileset(&a, 0)));
        assert_eq!(mapper.gid_to_cell(10), Some(Cell::from_tileset(&a, 9)));
        assert_eq!(mapper.gid_to_cell(11), Some(Cell::from_tileset(&b, 0)));
        assert_eq!(mapper.gid_to_cell(15), Some(Cell::from_tileset(&b, 4)));
        assert_eq!(mapper.first_gid(&b), Some(11));
    }

    #[test]
    fn zero_is_the_empty_cell() {
        let (mapper, ..) = two_tilesets();
        assert_eq!(mapper.cell_to_gid(&Cell::empty()), 0);
        assert_eq!(mapper.gid_to_cell(0), Some(Cell::empty()));
        // flags on a bare zero don't make a tile
        assert_eq!(mapper.gid_to_cell(FLIPPED_HORIZONTALLY_FLAG), Some(Cell::empty()));
        assert_eq!(GidMapper::new().gid_to_cell(0), Some(Cell::empty()));
    }

    #[test]
    fn every_flag_combination_survives() {
        let (mapper, _, b) = two_tilesets();
        for bits in 0..8u32 {
            let cell = Cell::from_tileset(&b, 3)
                .flipped_horizontally(bits & 1 != 0)
                .flipped_vertically(bits & 2 != 0)
                .flipped_anti_diagonally(bits & 4 != 0);
            let gid = mapper.cell_to_gid(&cell);
            assert_eq!(gid & !FLIP_MASK, 14);
            assert_eq!(mapper.gid_to_cell(gid), Some(cell));
        }
        let all = 14
            | FLIPPED_HORIZONTALLY_FLAG
            | FLIPPED_VERTICALLY_FLAG
            | FLIPPED_ANTI_DIAGONALLY_FLAG;
        let cell = mapper.gid_to_cell(all).unwrap();
        assert!(cell.flipped_horizontally);
        assert!(cell.flipped_vertically && cell.flipped_anti_diagonally);
    }

    #[test]
    fn unknown_tileset_encodes_as_zero() {
        let (mapper, ..) = two_tilesets();
        let stray = grid("stray", 1, 1);
        assert_eq!(mapper.cell_to_gid(&Cell::from_tileset(&stray, 0)), 0);
    }

    #[test]
    fn empty_mapper_records_invalid_tile() {
        let mapper = GidMapper::new();
        assert!(mapper.is_empty());
        assert_eq!(mapper.invalid_tile(), 0);
        assert_eq!(mapper.gid_to_cell(5), None);
        assert_eq!(mapper.invalid_tile(), 5);
    }

    #[test]
    fn gid_below_first_range_fails_with_flags_recorded() {
        let mut mapper = GidMapper::new();
        mapper.insert(10, grid("a", 2, 4));
        let gid = 3 | FLIPPED_VERTICALLY_FLAG;
        assert_eq!(mapper.gid_to_cell(gid), None);
        assert_eq!(mapper.invalid_tile(), gid);
    }

    #[test]
    fn gap_between_ranges_is_invalid() {
        let a = grid("a", 5, 10);
        let b = grid("b", 5, 5);
        let mut mapper = GidMapper::new();
        mapper.insert(1, Rc::clone(&a));
        mapper.insert(20, b);
        // 15 falls after a's ten tiles but before b starts
        assert_eq!(mapper.gid_to_cell(15), None);
        assert_eq!(mapper.invalid_tile(), 15);
        assert_eq!(mapper.gid_to_cell(10), Some(Cell::from_tileset(&a, 9)));
    }

    #[test]
    fn reinsert_replaces_and_clear_keeps_invalid_tile() {
        let a = grid("a", 1, 1);
        let b = grid("b", 1, 1);
        let mut mapper = GidMapper::new();
        mapper.insert(1, a);
        mapper.insert(1, Rc::clone(&b));
        assert_eq!(mapper.gid_to_cell(1), Some(Cell::from_tileset(&b, 0)));

        assert_eq!(mapper.gid_to_cell(99), None);
        mapper.clear();
        assert!(mapper.is_empty());
        assert_eq!(mapper.invalid_tile(), 99);
    }

    #[test]
    fn duplicate_registration_encodes_with_lowest_first_gid() {
        let a = grid("a", 2, 4);
        let mut mapper = GidMapper::new();
        mapper.insert(9, Rc::clone(&a));
        mapper.insert(1, Rc::clone(&a));
        assert_eq!(mapper.cell_to_gid(&Cell::from_tileset(&a, 2)), 3);
    }

    #[test]
    fn remaps_ids_after_image_got_wider() {
        // authored at 8 columns, image now has 10
        let ts = Rc::new(Tileset::new("a", 16, 16).with_image("a.png", 160, 32));
        assert_eq!(ts.column_count(), 10);
        let mut mapper = GidMapper::new();
        mapper.insert(1, Rc::clone(&ts));
        mapper.set_tileset_width(&ts, 128);

        let cell = mapper.gid_to_cell(1 + 9).unwrap();
        assert_eq!(cell.tile_id(), Some(11));
        // first row is unaffected
        assert_eq!(mapper.gid_to_cell(1 + 7).unwrap().tile_id(), Some(7));
    }

    #[test]
    fn same_width_leaves_ids_alone() {
        let ts = Rc::new(Tileset::new("a", 16, 16).with_image("a.png", 64, 64));
        let mut mapper = GidMapper::from_tilesets([&ts]);
        mapper.set_tileset_width(&ts, 64);
        assert_eq!(mapper.gid_to_cell(6).unwrap().tile_id(), Some(5));
    }

    #[test]
    fn zero_tile_width_is_ignored() {
        let ts = Rc::new(Tileset::new("a", 0, 16).with_grid(4, 8));
        let mut mapper = GidMapper::from_tilesets([&ts]);
        mapper.set_tileset_width(&ts, 64);
        assert_eq!(mapper.gid_to_cell(6).unwrap().tile_id(), Some(5));
    }

    #[test]
    fn remap_overflow_at_top_of_gid_range_is_invalid() {
        // authored at 1 column, image now has 10
        let ts = Rc::new(Tileset::new("a", 16, 16).with_image("a.png", 160, 16));
        let mut mapper = GidMapper::new();
        mapper.insert(1, Rc::clone(&ts));
        mapper.set_tileset_width(&ts, 16);

        let gid = 0x1FFF_FFFF;
        assert_eq!(mapper.gid_to_cell(gid), None);
        assert_eq!(mapper.invalid_tile(), gid);
        let flipped = gid | FLIPPED_HORIZONTALLY_FLAG;
        assert_eq!(mapper.gid_to_cell(flipped), None);
        assert_eq!(mapper.invalid_tile(), flipped);
    }

    #[test]
    fn gid_past_the_flip_bits_encodes_as_zero() {
        let ts = grid("a", 2, 4);
        let mut mapper = GidMapper::new();
        mapper.insert(u32::MAX, Rc::clone(&ts));
        assert_eq!(mapper.cell_to_gid(&Cell::from_tileset(&ts, 3)), 0);

        mapper.insert(!FLIP_MASK - 1, Rc::clone(&ts));
        assert_eq!(mapper.cell_to_gid(&Cell::from_tileset(&ts, 1)), !FLIP_MASK);
        // one past the last bare GID would set a flip bit
        assert_eq!(mapper.cell_to_gid(&Cell::from_tileset(&ts, 2)), 0);
    }

    #[test]
    fn from_tilesets_stops_before_overflowing_the_gid_space() {
        let mut huge = Tileset::new("huge", 16, 16);
        huge.add_tile(Tile::new(!FLIP_MASK - 1));
        let huge = Rc::new(huge);
        let after = grid("after", 1, 1);

        let mapper = GidMapper::from_tilesets([&huge, &after]);
        assert_eq!(mapper.first_gid(&huge), Some(1));
        assert_eq!(mapper.first_gid(&after), None);
        assert_eq!(
            mapper.cell_to_gid(&Cell::from_tileset(&huge, !FLIP_MASK - 1)),
            !FLIP_MASK
        );
        assert_eq!(mapper.cell_to_gid(&Cell::from_tileset(&after, 0)), 0);
    }
}
