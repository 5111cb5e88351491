//! Layers of a map.

use std::rc::Rc;

use macroquad::prelude::{IVec2, Vec2};

use crate::cell::Cell;
use crate::properties::Properties;
use crate::tileset::SharedTileset;

/// A layer of the map; shared attributes plus the kind-specific content.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Not necessarily unique
    pub name: String,
    /// Hidden layers are kept but not drawn
    pub visible: bool,
    /// 0 to 1
    pub opacity: f32,
    /// Pixel offset for this layer
    pub offset: Vec2,
    /// Custom properties
    pub properties: Properties,
    /// What the layer holds
    pub kind: LayerKind,
}

impl Layer {
    /// A visible, opaque layer without offset.
    pub fn new(name: impl Into<String>, kind: LayerKind) -> Self {
        Layer {
            name: name.into(),
            visible: true,
            opacity: 1.0,
            offset: Vec2::ZERO,
            properties: Properties::new(),
            kind,
        }
    }

    /// The tile grid, if this is a tile layer.
    pub fn as_tile_layer(&self) -> Option<&TileLayer> {
        match &self.kind {
            LayerKind::Tiles(layer) => Some(layer),
            _ => None,
        }
    }

    /// Mutable [`as_tile_layer`](Self::as_tile_layer).
    pub fn as_tile_layer_mut(&mut self) -> Option<&mut TileLayer> {
        match &mut self.kind {
            LayerKind::Tiles(layer) => Some(layer),
            _ => None,
        }
    }

    /// The objects, if this is an object layer.
    pub fn as_object_group(&self) -> Option<&ObjectGroup> {
        match &self.kind {
            LayerKind::Objects(group) => Some(group),
            _ => None,
        }
    }
}

/// Content of a layer.
#[derive(Debug, Clone)]
pub enum LayerKind {
    /// Grid of cells
    Tiles(TileLayer),
    /// Free-placed objects
    Objects(ObjectGroup),
    /// A single image
    Image(ImageLayer),
}

/// A fixed-size grid of cells, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    /// Offset of the grid within the map, in tiles
    pub position: IVec2,
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl TileLayer {
    /// An all-empty layer.
    ///
    /// # Panics
    /// When `width * height` cells are more than a single allocation can hold.
    pub fn new(width: usize, height: usize) -> Self {
        let len = Self::cell_count(width, height)
            .unwrap_or_else(|| panic!("{width}x{height} layer is too large"));
        TileLayer {
            position: IVec2::ZERO,
            width,
            height,
            cells: vec![Cell::empty(); len],
        }
    }

    /// Number of cells of a `width` x `height` layer, `None` when the grid or its encoded
    /// payload would be larger than a single allocation can be.
    pub(crate) fn cell_count(width: usize, height: usize) -> Option<usize> {
        let count = width.checked_mul(height)?;
        let bytes = count.checked_mul(std::mem::size_of::<Cell>().max(4))?;
        (bytes <= isize::MAX as usize).then_some(count)
    }

    /// Size of the layer's uncompressed binary payload.
    pub(crate) fn payload_len(&self) -> usize {
        // cannot overflow, checked in `new`
        self.cells.len() * 4
    }

    /// In cells.
    pub fn width(&self) -> usize {
        self.width
    }

    /// In cells.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether `(x, y)` is inside the grid.
    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    /// # Panics
    /// When `(x, y)` is outside the layer, in every build profile.
    pub fn cell_at(&self, x: usize, y: usize) -> &Cell {
        assert!(self.contains(x, y), "cell ({x}, {y}) outside {}x{} layer", self.width, self.height);
        &self.cells[y * self.width + x]
    }

    /// # Panics
    /// When `(x, y)` is outside the layer, in every build profile.
    pub fn set_cell(&mut self, x: usize, y: usize, cell: Cell) {
        assert!(self.contains(x, y), "cell ({x}, {y}) outside {}x{} layer", self.width, self.height);
        self.cells[y * self.width + x] = cell;
    }

    /// Cell at `(x, y)`, `None` outside the grid.
    pub fn get(&self, x: usize, y: usize) -> Option<&Cell> {
        self.contains(x, y).then(|| &self.cells[y * self.width + x])
    }

    /// Mutable [`get`](Self::get).
    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut Cell> {
        if self.contains(x, y) {
            Some(&mut self.cells[y * self.width + x])
        } else {
            None
        }
    }

    /// All cells, `y` outer and `x` inner.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Swaps in a full grid; `cells.len()` must be `width * height`.
    pub(crate) fn replace_cells(&mut self, cells: Vec<Cell>) {
        debug_assert_eq!(cells.len(), self.cells.len());
        self.cells = cells;
    }

    /// `true` when no cell holds a tile.
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }

    /// Distinct tilesets referenced by the layer, in first-use order.
    pub fn used_tilesets(&self) -> Vec<SharedTileset> {
        let mut used: Vec<SharedTileset> = Vec::new();
        for ts in self.cells.iter().filter_map(Cell::tileset) {
            if !used.iter().any(|u| Rc::ptr_eq(u, ts)) {
                used.push(Rc::clone(ts));
            }
        }
        used
    }
}

/// Content of an object layer.
#[derive(Debug, Clone, Default)]
pub struct ObjectGroup {
    /// In draw order
    pub objects: Vec<MapObject>,
}

/// Geometry of a [`MapObject`]. Point lists are relative to the object position.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectShape {
    /// Spans the object size
    Rectangle,
    /// Just the position
    Point,
    /// Closed outline
    Polygon(Vec<Vec2>),
    /// Open outline
    Polyline(Vec<Vec2>),
    /// Tile object; the cell carries its flip flags.
    Tile(Cell),
}

/// An object of an object layer.
#[derive(Debug, Clone)]
pub struct MapObject {
    /// Unique within the map
    pub id: u32,
    /// Free-form name
    pub name: String,
    /// User-defined class, written as `type`
    pub class_name: String,
    /// In pixels
    pub position: Vec2,
    /// In pixels
    pub size: Vec2,
    /// Clockwise, in degrees
    pub rotation: f32,
    /// Hidden objects are kept but not drawn
    pub visible: bool,
    /// Geometry
    pub shape: ObjectShape,
    /// Custom properties
    pub properties: Properties,
}

impl MapObject {
    /// An unnamed, visible object at the origin.
    pub fn new(id: u32, shape: ObjectShape) -> Self {
        MapObject {
            id,
            name: String::new(),
            class_name: String::new(),
            position: Vec2::ZERO,
            size: Vec2::ZERO,
            rotation: 0.0,
            visible: true,
            shape,
            properties: Properties::new(),
        }
    }

    /// The tile of a tile object.
    pub fn cell(&self) -> Option<&Cell> {
        match &self.shape {
            ObjectShape::Tile(cell) => Some(cell),
            _ => None,
        }
    }
}

/// Content of an image layer.
#[derive(Debug, Clone, Default)]
pub struct ImageLayer {
    /// Path as written in the document
    pub image: String,
    /// `#rrggbb`, when set
    pub transparent_color: Option<String>,
}
