// src/writer/json_writer.rs
use crate::cell::Cell;
use crate::error::MapError;
use crate::gid_mapper::GidMapper;
use crate::layer::{Layer, LayerKind, MapObject, ObjectShape, TileLayer};
use crate::layer_data::{encode_layer_data_with, encode_layer_gids, LayerDataFormat};
use crate::map::Map;
use crate::options::SaveOptions;
use crate::properties::{Properties, PropertyValue};
use crate::tileset::{Tile, Tileset, NO_TERRAIN};
use macroquad::prelude::Vec2;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

const FORMAT_VERSION: &str = "1.10";

#[derive(Serialize)]
struct OutMap {
    #[serde(rename = "type")]
    kind: &'static str,
    version: &'static str,
    orientation: &'static str,
    renderorder: &'static str,
    width: u32,
    height: u32,
    tilewidth: u32,
    tileheight: u32,
    infinite: bool,
    nextlayerid: u32,
    nextobjectid: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<OutProperty>,
    tilesets: Vec<OutTileset>,
    layers: Vec<OutLayer>,
}

#[derive(Serialize)]
struct OutProperty {
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    value: JsonValue,
}

#[derive(Serialize)]
#[serde(untagged)]
enum OutLayerData {
    Gids(Vec<u32>),
    Encoded(String),
}

#[derive(Serialize, Default)]
struct OutLayer {
    id: u32,
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    visible: bool,
    opacity: f32,
    x: i32,
    y: i32,
    #[serde(skip_serializing_if = "is_zero")]
    offsetx: f32,
    #[serde(skip_serializing_if = "is_zero")]
    offsety: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compression: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<OutLayerData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    draworder: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    objects: Option<Vec<OutObject>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transparentcolor: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<OutProperty>,
}

fn is_zero(v: &f32) -> bool {
    *v == 0.0
}

#[derive(Serialize)]
struct OutPoint {
    x: f32,
    y: f32,
}

#[derive(Serialize)]
struct OutObject {
    id: u32,
    name: String,
    #[serde(rename = "type")]
    class: String,
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    rotation: f32,
    visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    gid: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    point: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    polygon: Option<Vec<OutPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    polyline: Option<Vec<OutPoint>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<OutProperty>,
}

#[derive(Serialize)]
struct OutOffset {
    x: i32,
    y: i32,
}

#[derive(Serialize)]
struct OutTileset {
    firstgid: u32,
    name: String,
    tilewidth: u32,
    tileheight: u32,
    tilecount: u32,
    columns: u32,
    spacing: u32,
    margin: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    imagewidth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    imageheight: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tileoffset: Option<OutOffset>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tiles: Vec<OutTile>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<OutProperty>,
}

#[derive(Serialize)]
struct OutFrame {
    tileid: u32,
    duration: u32,
}

#[derive(Serialize)]
struct OutTile {
    id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    imagewidth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    imageheight: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    animation: Vec<OutFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    terrain: Option<[i32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    probability: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<OutProperty>,
}

fn properties_to_json(props: &Properties) -> Vec<OutProperty> {
    props
        .iter()
        .map(|(name, value)| OutProperty {
            name: name.to_owned(),
            kind: value.type_name(),
            value: match value {
                PropertyValue::Bool(v) => JsonValue::from(*v),
                PropertyValue::I64(v) => JsonValue::from(*v),
                PropertyValue::F32(v) => JsonValue::from(*v as f64),
                PropertyValue::String(v) => JsonValue::from(v.as_str()),
            },
        })
        .collect()
}

fn points(points: &[Vec2]) -> Vec<OutPoint> {
    points.iter().map(|p| OutPoint { x: p.x, y: p.y }).collect()
}

fn terrain_corners(mask: u32) -> Option<[i32; 4]> {
    if mask == u32::MAX {
        return None;
    }
    let corner = |shift: u32| match ((mask >> shift) & 0xFF) as u8 {
        NO_TERRAIN => -1,
        t => t as i32,
    };
    Some([corner(24), corner(16), corner(8), corner(0)])
}

/// `None` for a tile with nothing to record, unless `keep_plain` asks for every tile.
fn tile_to_json(tile: &Tile, keep_plain: bool) -> Option<OutTile> {
    let out = OutTile {
        id: tile.id(),
        image: tile.image.as_ref().map(|i| i.source.clone()),
        imagewidth: tile.image.as_ref().map(|i| i.width),
        imageheight: tile.image.as_ref().map(|i| i.height),
        animation: tile
            .animation
            .iter()
            .map(|f| OutFrame {
                tileid: f.tile_id,
                duration: f.duration_ms,
            })
            .collect(),
        terrain: terrain_corners(tile.terrain),
        probability: (tile.probability != 1.0).then_some(tile.probability),
        properties: properties_to_json(&tile.properties),
    };

    let is_plain = out.image.is_none()
        && out.animation.is_empty()
        && out.terrain.is_none()
        && out.probability.is_none()
        && out.properties.is_empty();
    (keep_plain || !is_plain).then_some(out)
}

fn tileset_to_json(ts: &Tileset, first_gid: u32) -> OutTileset {
    let offset = ts.tile_offset();
    // collections have no grid to rebuild their tiles from
    let list_all = ts.image().is_none() && ts.column_count() == 0;
    OutTileset {
        firstgid: first_gid,
        name: ts.name().to_owned(),
        tilewidth: ts.tile_width(),
        tileheight: ts.tile_height(),
        tilecount: ts.tile_count(),
        columns: ts.column_count(),
        spacing: ts.spacing(),
        margin: ts.margin(),
        image: ts.image().map(|i| i.source.clone()),
        imagewidth: ts.image().map(|i| i.width),
        imageheight: ts.image().map(|i| i.height),
        tileoffset: (offset != macroquad::prelude::IVec2::ZERO).then_some(OutOffset {
            x: offset.x,
            y: offset.y,
        }),
        tiles: ts.tiles().iter().filter_map(|t| tile_to_json(t, list_all)).collect(),
        properties: properties_to_json(&ts.properties),
    }
}

fn unregistered(what: String, cell: &Cell) -> MapError {
    let name = cell.tileset().map(|ts| ts.name().to_owned()).unwrap_or_default();
    MapError::InvalidMap(format!(
        "{what} uses a tile of tileset '{name}' that has no GID in this map"
    ))
}

fn object_to_json(obj: &MapObject, layer: &str, mapper: &GidMapper) -> Result<OutObject, MapError> {
    let gid = match obj.cell() {
        Some(cell) => match mapper.cell_to_gid(cell) {
            0 if !cell.is_empty() => {
                return Err(unregistered(format!("object {} in layer '{layer}'", obj.id), cell))
            }
            gid => Some(gid),
        },
        None => None,
    };

    Ok(OutObject {
        id: obj.id,
        name: obj.name.clone(),
        class: obj.class_name.clone(),
        x: obj.position.x,
        y: obj.position.y,
        width: obj.size.x,
        height: obj.size.y,
        rotation: obj.rotation,
        visible: obj.visible,
        gid,
        point: matches!(obj.shape, ObjectShape::Point),
        polygon: match &obj.shape {
            ObjectShape::Polygon(p) => Some(points(p)),
            _ => None,
        },
        polyline: match &obj.shape {
            ObjectShape::Polyline(p) => Some(points(p)),
            _ => None,
        },
        properties: properties_to_json(&obj.properties),
    })
}

fn tile_data_to_json(
    name: &str,
    tiles: &TileLayer,
    mapper: &GidMapper,
    options: &SaveOptions,
) -> Result<(OutLayerData, Option<&'static str>, Option<&'static str>), MapError> {
    if let Some(cell) = tiles
        .cells()
        .iter()
        .find(|c| !c.is_empty() && mapper.cell_to_gid(c) == 0)
    {
        return Err(unregistered(format!("layer '{name}'"), cell));
    }

    let format = options.layer_format;
    match format {
        LayerDataFormat::Csv => Ok((OutLayerData::Gids(encode_layer_gids(mapper, tiles)), None, None)),
        LayerDataFormat::Xml => Err(MapError::UnsupportedFormat(
            "XML layer data in a JSON map".into(),
        )),
        _ => {
            let text = encode_layer_data_with(mapper, tiles, format, options.compression_level)
                .map_err(|source| MapError::LayerData {
                    layer: name.to_owned(),
                    source,
                })?;
            let compression = match format {
                LayerDataFormat::Base64Zlib => Some("zlib"),
                LayerDataFormat::Base64Gzip => Some("gzip"),
                _ => None,
            };
            Ok((OutLayerData::Encoded(text), Some("base64"), compression))
        }
    }
}

fn layer_to_json(
    id: u32,
    layer: &Layer,
    mapper: &GidMapper,
    options: &SaveOptions,
) -> Result<OutLayer, MapError> {
    let mut out = OutLayer {
        id,
        name: layer.name.clone(),
        visible: layer.visible,
        opacity: layer.opacity,
        offsetx: layer.offset.x,
        offsety: layer.offset.y,
        properties: properties_to_json(&layer.properties),
        ..OutLayer::default()
    };

    match &layer.kind {
        LayerKind::Tiles(tiles) => {
            let (data, encoding, compression) =
                tile_data_to_json(&layer.name, tiles, mapper, options)?;
            out.kind = "tilelayer";
            out.x = tiles.position.x;
            out.y = tiles.position.y;
            out.width = Some(tiles.width());
            out.height = Some(tiles.height());
            out.data = Some(data);
            out.encoding = encoding;
            out.compression = compression;
        }
        LayerKind::Objects(group) => {
            out.kind = "objectgroup";
            out.draworder = Some("topdown");
            out.objects = Some(
                group
                    .objects
                    .iter()
                    .map(|o| object_to_json(o, &layer.name, mapper))
                    .collect::<Result<Vec<_>, _>>()?,
            );
        }
        LayerKind::Image(image) => {
            out.kind = "imagelayer";
            out.image = Some(image.image.clone());
            out.transparentcolor = image.transparent_color.clone();
        }
    }
    Ok(out)
}

/// Serializes `map` as Tiled JSON with all tilesets embedded. First GIDs are reassigned
/// from tileset order.
pub fn encode_map_to_json(map: &Map, options: &SaveOptions) -> Result<String, MapError> {
    let mapper = map.gid_mapper();

    let tilesets = mapper
        .tilesets()
        .map(|(first_gid, ts)| tileset_to_json(ts, first_gid))
        .collect();

    let layers = map
        .layers
        .iter()
        .zip(1..)
        .map(|(layer, id)| layer_to_json(id, layer, &mapper, options))
        .collect::<Result<Vec<_>, _>>()?;

    let next_object_id = match map
        .object_groups()
        .flat_map(|(_, g)| g.objects.iter().map(|o| o.id))
        .max()
    {
        None => 1,
        Some(id) => id.checked_add(1).ok_or_else(|| {
            MapError::InvalidMap(format!("object id {id} leaves no id for the next object"))
        })?,
    };

    let out = OutMap {
        kind: "map",
        version: FORMAT_VERSION,
        orientation: "orthogonal",
        renderorder: "right-down",
        width: map.width,
        height: map.height,
        tilewidth: map.tile_width,
        tileheight: map.tile_height,
        infinite: false,
        nextlayerid: map.layers.len() as u32 + 1,
        nextobjectid: next_object_id,
        properties: properties_to_json(&map.properties),
        tilesets,
        layers,
    };

    serde_json::to_string_pretty(&out).map_err(|source| MapError::Json {
        path: PathBuf::from("<string>"),
        source,
    })
}

/// Writes `map` to `path` as Tiled JSON. Only `.json` paths are accepted.
pub fn save_map_file(map: &Map, path: &Path, options: &SaveOptions) -> Result<(), MapError> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return Err(MapError::UnsupportedFormat(path.display().to_string()));
    }
    let text = encode_map_to_json(map, options)?;
    std::fs::write(path, text).map_err(|source| MapError::Io {
        path: path.to_path_buf(),
        source,
    })
}
