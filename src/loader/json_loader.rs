// src/loader/json_loader.rs
use crate::cell::FLIP_MASK;
use crate::error::{LayerDataError, MapError};
use crate::gid_mapper::GidMapper;
use crate::layer::{ImageLayer, Layer, LayerKind, MapObject, ObjectGroup, ObjectShape, TileLayer};
use crate::layer_data::{decode_layer_data, decode_layer_gids, LayerDataFormat};
use crate::map::Map;
use crate::options::LoadOptions;
use crate::properties::{Properties, PropertyValue};
use crate::tileset::{Frame, ImageRef, Tile, Tileset};
use macroquad::prelude::{ivec2, vec2, IVec2};
use macroquad::texture::Image;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonLayerData {
    Gids(Vec<u32>),
    Encoded(String),
}

#[derive(Deserialize)]
struct JsonLayer {
    #[serde(default)]
    data: Option<JsonLayerData>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    compression: Option<String>,
    #[serde(default)]
    x: i32,
    #[serde(default)]
    y: i32,
    #[serde(default)]
    width: usize,
    #[serde(default)]
    height: usize,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default = "one")]
    opacity: f32,
    #[serde(default)]
    offsetx: f32,
    #[serde(default)]
    offsety: f32,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>, // "tilelayer" when missing
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(default)]
    objects: Vec<JsonObject>,
    #[serde(default)]
    image: String,
    #[serde(default)]
    transparentcolor: Option<String>,
}

fn default_true() -> bool {
    true
}
fn one() -> f32 {
    1.0
}

#[derive(Deserialize)]
struct JsonMap {
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    tilewidth: u32,
    tileheight: u32,
    #[serde(default)]
    infinite: bool,
    layers: Vec<JsonLayer>,
    #[serde(default)]
    tilesets: Vec<JsonValue>, // embedded tileset or {"firstgid", "source"}
    #[serde(default)]
    properties: Vec<JsonProperty>,
}

#[derive(Deserialize)]
struct JsonTilesetRef {
    firstgid: u32,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Deserialize)]
struct JsonTileset {
    #[serde(default)]
    name: String,
    tilewidth: u32,
    tileheight: u32,
    #[serde(default)]
    tilecount: u32,
    #[serde(default)]
    columns: u32,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    imagewidth: u32,
    #[serde(default)]
    imageheight: u32,
    #[serde(default)]
    spacing: u32,
    #[serde(default)]
    margin: u32,
    #[serde(default)]
    tileoffset: Option<JsonOffset>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(default)]
    tiles: Vec<JsonTile>,
}

#[derive(Deserialize)]
struct JsonOffset {
    x: i32,
    y: i32,
}

#[derive(Deserialize)]
struct JsonProperty {
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    value: JsonValue,
}

#[derive(Deserialize)]
struct JsonObject {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    class: String,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default)]
    point: bool,
    #[serde(default)]
    polygon: Vec<JsonObjectPoint>,
    #[serde(default)]
    polyline: Vec<JsonObjectPoint>,
    #[serde(default)]
    gid: Option<u32>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
}

#[derive(Deserialize)]
struct JsonObjectPoint {
    x: f32,
    y: f32,
}

#[derive(Deserialize)]
struct JsonTile {
    id: u32,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    imagewidth: u32,
    #[serde(default)]
    imageheight: u32,
    #[serde(default)]
    animation: Vec<JsonFrame>,
    #[serde(default)]
    terrain: Option<[i32; 4]>,
    #[serde(default)]
    probability: Option<f32>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
}

#[derive(Deserialize)]
struct JsonFrame {
    tileid: u32,
    duration: u32,
}

fn json_property_to_ir(prop: JsonProperty) -> Result<Option<(String, PropertyValue)>, MapError> {
    let JsonProperty { name, kind, value } = prop;

    let parsed = match kind.as_deref() {
        Some("bool") => value.as_bool().map(PropertyValue::Bool),
        Some("int") | Some("object") => value.as_i64().map(PropertyValue::I64),
        Some("float") => value.as_f64().map(|n| PropertyValue::F32(n as f32)),
        Some("string") | Some("file") | Some("color") | Some("class") => {
            value.as_str().map(|s| PropertyValue::String(s.to_owned()))
        }
        Some(other) => {
            return Err(MapError::UnsupportedPropertyType {
                name,
                kind: other.to_owned(),
            });
        }
        None => {
            if let Some(v) = value.as_bool() {
                Some(PropertyValue::Bool(v))
            } else if let Some(v) = value.as_i64() {
                Some(PropertyValue::I64(v))
            } else if let Some(v) = value.as_f64() {
                Some(PropertyValue::F32(v as f32))
            } else {
                value.as_str().map(|s| PropertyValue::String(s.to_owned()))
            }
        }
    };

    Ok(parsed.map(|value| (name, value)))
}

fn properties_from_json(props: Vec<JsonProperty>) -> Result<Properties, MapError> {
    let mut out = Properties::new();
    for p in props {
        if let Some((name, value)) = json_property_to_ir(p)? {
            out.insert(name, value);
        }
    }
    Ok(out)
}

fn object_from_json(obj: JsonObject, layer: &str, mapper: &GidMapper) -> Result<MapObject, MapError> {
    let shape = if let Some(gid) = obj.gid {
        let cell = match gid & !FLIP_MASK {
            0 => None,
            _ => mapper.gid_to_cell(gid),
        };
        ObjectShape::Tile(cell.ok_or_else(|| MapError::InvalidObjectGid {
            layer: layer.to_owned(),
            object_id: obj.id,
            gid,
        })?)
    } else if obj.point {
        ObjectShape::Point
    } else if !obj.polygon.is_empty() {
        ObjectShape::Polygon(obj.polygon.into_iter().map(|p| vec2(p.x, p.y)).collect())
    } else if !obj.polyline.is_empty() {
        ObjectShape::Polyline(obj.polyline.into_iter().map(|p| vec2(p.x, p.y)).collect())
    } else {
        ObjectShape::Rectangle
    };

    let class_name = if !obj.class.is_empty() {
        obj.class
    } else {
        obj.kind
    };

    Ok(MapObject {
        id: obj.id,
        name: obj.name,
        class_name,
        position: vec2(obj.x, obj.y),
        size: vec2(obj.width, obj.height),
        rotation: obj.rotation,
        visible: obj.visible,
        shape,
        properties: properties_from_json(obj.properties)?,
    })
}

/// Current pixel size of an image on disk, if it can be read and decoded.
fn probe_image_size(path: &Path) -> Option<(u32, u32)> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::debug!("not probing {}: {}", path.display(), err);
            return None;
        }
    };
    match Image::from_file_with_format(&bytes, None) {
        Ok(img) => Some((img.width as u32, img.height as u32)),
        Err(err) => {
            log::debug!("could not decode {}: {:?}", path.display(), err);
            None
        }
    }
}

fn terrain_mask(corners: [i32; 4]) -> u32 {
    corners.iter().fold(0, |mask, &c| {
        let corner = u8::try_from(c).unwrap_or(crate::tileset::NO_TERRAIN);
        (mask << 8) | corner as u32
    })
}

/// Builds a tileset; also returns the image width recorded in the file when it differs
/// from the image on disk.
fn tileset_from_json(
    j: JsonTileset,
    image_dir: &Path,
    image_prefix: &Path,
    options: &LoadOptions,
) -> Result<(Tileset, Option<u32>), MapError> {
    let offset = j.tileoffset.map_or(IVec2::ZERO, |o| ivec2(o.x, o.y));
    let mut ts = Tileset::new(j.name, j.tilewidth, j.tileheight)
        .with_spacing(j.spacing, j.margin)
        .with_tile_offset(offset);
    let mut authored_width = None;

    if let Some(image) = &j.image {
        let source = relative_to(image_prefix, image);
        let actual = if options.probe_images {
            probe_image_size(&image_dir.join(image))
        } else {
            None
        };
        if let Some((w, _)) = actual {
            if j.imagewidth != 0 && j.imagewidth != w {
                authored_width = Some(j.imagewidth);
            }
        }
        let authored =
            (j.imagewidth > 0 && j.imageheight > 0).then_some((j.imagewidth, j.imageheight));
        ts = match actual.or(authored) {
            Some((w, h)) => {
                let count = u64::from(ts.column_count_for_width(w))
                    * u64::from(ts.row_count_for_height(h));
                check_tile_count(&ts, count)?;
                ts.with_image(source, w, h)
            }
            None => {
                check_tile_count(&ts, j.tilecount.into())?;
                ts.with_image(source, 0, 0).with_grid(j.columns, j.tilecount)
            }
        };
    } else if j.columns > 0 && j.tilecount > 0 {
        // grid without an atlas image; collections come with `columns: 0`
        check_tile_count(&ts, j.tilecount.into())?;
        ts = ts.with_grid(j.columns, j.tilecount);
    }

    ts.properties = properties_from_json(j.properties)?;

    for jt in j.tiles {
        if jt.id >= MAX_TILE_COUNT {
            return Err(MapError::InvalidMap(format!(
                "tileset '{}': tile id {} does not fit in a GID",
                ts.name(),
                jt.id
            )));
        }
        if ts.tile_at(jt.id).is_none() {
            ts.add_tile(Tile::new(jt.id));
        }
        let Some(tile) = ts.tile_mut(jt.id) else {
            continue;
        };
        tile.image = jt.image.map(|source| ImageRef {
            source: relative_to(image_prefix, &source),
            width: jt.imagewidth,
            height: jt.imageheight,
        });
        tile.animation = jt
            .animation
            .into_iter()
            .map(|f| Frame {
                tile_id: f.tileid,
                duration_ms: f.duration,
            })
            .collect();
        if let Some(corners) = jt.terrain {
            tile.terrain = terrain_mask(corners);
        }
        if let Some(p) = jt.probability {
            tile.probability = p;
        }
        tile.properties = properties_from_json(jt.properties)?;
    }

    Ok((ts, authored_width))
}

/// Tile ids must stay below the flip bits once the tileset's first GID (at least 1) is
/// added.
const MAX_TILE_COUNT: u32 = !FLIP_MASK;

fn check_tile_count(ts: &Tileset, count: u64) -> Result<(), MapError> {
    if count > u64::from(MAX_TILE_COUNT) {
        return Err(MapError::InvalidMap(format!(
            "tileset '{}' has {} tiles, more than GIDs can address",
            ts.name(),
            count
        )));
    }
    Ok(())
}

fn relative_to(prefix: &Path, file: &str) -> String {
    if prefix.as_os_str().is_empty() {
        file.to_owned()
    } else {
        prefix.join(file).to_string_lossy().into_owned()
    }
}

fn layer_format(encoding: Option<&str>, compression: Option<&str>) -> Result<LayerDataFormat, MapError> {
    match (encoding.unwrap_or("csv"), compression.unwrap_or("")) {
        ("base64", "") => Ok(LayerDataFormat::Base64),
        ("base64", "zlib") => Ok(LayerDataFormat::Base64Zlib),
        ("base64", "gzip") => Ok(LayerDataFormat::Base64Gzip),
        ("base64", other) => Err(MapError::UnsupportedFormat(format!(
            "layer compression '{other}'"
        ))),
        (other, _) => Err(MapError::UnsupportedFormat(format!(
            "layer encoding '{other}' for string data"
        ))),
    }
}

fn tile_layer_from_json(l: &JsonLayer, mapper: &GidMapper) -> Result<TileLayer, MapError> {
    let Some(count) = TileLayer::cell_count(l.width, l.height) else {
        return Err(MapError::InvalidMap(format!(
            "tile layer '{}' is too large ({}x{})",
            l.name, l.width, l.height
        )));
    };
    if let Some(JsonLayerData::Gids(gids)) = &l.data {
        // don't allocate a grid the data can't fill
        if gids.len() != count {
            return Err(MapError::LayerData {
                layer: l.name.clone(),
                source: LayerDataError::CorruptLayerData {
                    expected: count * 4,
                    actual: gids.len().saturating_mul(4),
                },
            });
        }
    }

    let mut tiles = TileLayer::new(l.width, l.height);
    tiles.position = ivec2(l.x, l.y);

    let result = match &l.data {
        Some(JsonLayerData::Gids(gids)) => decode_layer_gids(mapper, &mut tiles, gids),
        Some(JsonLayerData::Encoded(text)) => {
            let format = layer_format(l.encoding.as_deref(), l.compression.as_deref())?;
            decode_layer_data(mapper, &mut tiles, text, format)
        }
        None if count == 0 => Ok(()),
        None => {
            return Err(MapError::InvalidMap(format!(
                "tile layer '{}' has no data",
                l.name
            )))
        }
    };
    result.map_err(|source| MapError::LayerData {
        layer: l.name.clone(),
        source,
    })?;
    Ok(tiles)
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, MapError> {
    let txt = std::fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&txt).map_err(|source| MapError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a Tiled JSON map and every external tileset it references.
pub fn load_map_file(path: &Path, options: &LoadOptions) -> Result<Map, MapError> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return Err(MapError::UnsupportedFormat(path.display().to_string()));
    }

    let j: JsonMap = read_json(path)?;
    let map_dir = path
        .parent()
        .map(|d| d.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./"));

    map_from_json(j, path, &map_dir, options)
}

/// Reads a Tiled JSON map from a string; relative tileset and image paths resolve
/// against `base_dir`.
pub fn load_map_str(json: &str, base_dir: &Path, options: &LoadOptions) -> Result<Map, MapError> {
    let origin = base_dir.join("<string>");
    let j: JsonMap = serde_json::from_str(json).map_err(|source| MapError::Json {
        path: origin.clone(),
        source,
    })?;
    map_from_json(j, &origin, base_dir, options)
}

fn map_from_json(
    j: JsonMap,
    origin: &Path,
    map_dir: &Path,
    options: &LoadOptions,
) -> Result<Map, MapError> {
    if j.infinite {
        return Err(MapError::UnsupportedFormat("infinite (chunked) maps".into()));
    }

    let mut map = Map::new(j.width, j.height, j.tilewidth, j.tileheight);
    map.properties = properties_from_json(j.properties)?;

    // Tilesets, registered by their first GID
    let mut entries = Vec::with_capacity(j.tilesets.len());
    for value in j.tilesets {
        let r = JsonTilesetRef::deserialize(&value).map_err(|source| MapError::Json {
            path: origin.to_path_buf(),
            source,
        })?;
        if r.firstgid == 0 {
            return Err(MapError::InvalidMap("tileset with firstgid 0".into()));
        }
        entries.push((r, value));
    }
    entries.sort_by_key(|(r, _)| r.firstgid);

    let mut mapper = GidMapper::new();
    for (r, value) in entries {
        let (tileset, authored_width) = match &r.source {
            Some(source) => {
                if !source.ends_with(".json") {
                    return Err(MapError::UnsupportedFormat(format!(
                        "External tileset must be JSON: {}",
                        source
                    )));
                }
                let ts_path = map_dir.join(source);
                let ext: JsonTileset = read_json(&ts_path)?;
                let ts_dir = ts_path.parent().unwrap_or(map_dir).to_path_buf();
                let prefix = Path::new(source).parent().unwrap_or(Path::new(""));
                tileset_from_json(ext, &ts_dir, prefix, options)?
            }
            None => {
                let embedded = JsonTileset::deserialize(value).map_err(|source| MapError::Json {
                    path: origin.to_path_buf(),
                    source,
                })?;
                tileset_from_json(embedded, map_dir, Path::new(""), options)?
            }
        };

        let tileset = Rc::new(tileset);
        mapper.insert(r.firstgid, Rc::clone(&tileset));
        if let Some(width) = authored_width {
            mapper.set_tileset_width(&tileset, width);
        }
        map.add_tileset(tileset);
    }

    // Layers
    for l in j.layers {
        let kind = match l.kind.as_deref().unwrap_or("tilelayer") {
            "tilelayer" => LayerKind::Tiles(tile_layer_from_json(&l, &mapper)?),
            "objectgroup" => LayerKind::Objects(ObjectGroup {
                objects: l
                    .objects
                    .into_iter()
                    .map(|obj| object_from_json(obj, &l.name, &mapper))
                    .collect::<Result<Vec<_>, _>>()?,
            }),
            "imagelayer" => LayerKind::Image(ImageLayer {
                image: l.image,
                transparent_color: l.transparentcolor,
            }),
            other => {
                log::warn!("skipping layer '{}' of unsupported type '{}'", l.name, other);
                continue;
            }
        };
        map.add_layer(Layer {
            name: l.name,
            visible: l.visible,
            opacity: l.opacity,
            offset: vec2(l.offsetx, l.offsety),
            properties: properties_from_json(l.properties)?,
            kind,
        });
    }

    Ok(map)
}
