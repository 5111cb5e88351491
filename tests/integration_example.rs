// tests/integration_example.rs

use std::path::Path;
use std::rc::Rc;

use tiled_gid_codec::{
    decode_layer_data, encode_layer_data, encode_map_to_json, load_map_str, Cell, GidMapper,
    ImageRef, Layer, LayerDataFormat, LayerKind, LoadOptions, Map, MapObject, ObjectGroup,
    ObjectShape, SaveOptions, Tile, TileLayer, Tileset,
};

fn terrain_and_props() -> (Rc<Tileset>, Rc<Tileset>) {
    let terrain = Rc::new(Tileset::new("terrain", 16, 16).with_image("terrain.png", 64, 64));
    let props = Rc::new(Tileset::new("props", 16, 16).with_image("props.png", 64, 32));
    (terrain, props)
}

#[test]
fn two_tileset_layer_survives_zlib_round_trip() {
    let (terrain, props) = terrain_and_props();
    assert_eq!((terrain.tile_count(), props.tile_count()), (16, 8));

    let mut mapper = GidMapper::new();
    mapper.insert(1, Rc::clone(&terrain));
    mapper.insert(17, Rc::clone(&props));

    let mut layer = TileLayer::new(2, 2);
    for (i, gid) in [5u32, 20 | tiled_gid_codec::FLIPPED_HORIZONTALLY_FLAG, 0, 17]
        .into_iter()
        .enumerate()
    {
        let cell = mapper.gid_to_cell(gid).expect("gid resolves");
        layer.set_cell(i % 2, i / 2, cell);
    }

    let payload = encode_layer_data(&mapper, &layer, LayerDataFormat::Base64Zlib).unwrap();
    let mut decoded = TileLayer::new(2, 2);
    decode_layer_data(&mapper, &mut decoded, &payload, LayerDataFormat::Base64Zlib).unwrap();

    assert_eq!(decoded.cell_at(0, 0), &Cell::from_tileset(&terrain, 4));
    assert_eq!(
        decoded.cell_at(1, 0),
        &Cell::from_tileset(&props, 3).flipped_horizontally(true)
    );
    assert!(decoded.cell_at(0, 1).is_empty());
    assert_eq!(decoded.cell_at(1, 1), &Cell::from_tileset(&props, 0));
    assert_eq!(decoded, layer);
}

#[test]
fn map_saved_as_json_loads_back_identically() -> anyhow::Result<()> {
    let (terrain, props) = terrain_and_props();
    let mut map = Map::new(3, 2, 16, 16);
    map.add_tileset(Rc::clone(&terrain));
    map.add_tileset(Rc::clone(&props));

    let mut ground = TileLayer::new(3, 2);
    ground.set_cell(0, 0, Cell::from_tileset(&terrain, 15).flipped_anti_diagonally(true));
    ground.set_cell(2, 1, Cell::from_tileset(&props, 7).flipped_vertically(true));
    map.add_layer(Layer::new("ground", LayerKind::Tiles(ground)));

    let mut chest = MapObject::new(4, ObjectShape::Tile(Cell::from_tileset(&props, 2)));
    chest.name = "chest".into();
    map.add_layer(Layer::new(
        "things",
        LayerKind::Objects(ObjectGroup {
            objects: vec![chest],
        }),
    ));

    for format in [
        LayerDataFormat::Csv,
        LayerDataFormat::Base64,
        LayerDataFormat::Base64Gzip,
        LayerDataFormat::Base64Zlib,
    ] {
        let options = SaveOptions {
            layer_format: format,
            compression_level: Some(9),
        };
        let text = encode_map_to_json(&map, &options)?;
        let loaded = load_map_str(&text, Path::new("."), &LoadOptions { probe_images: false })?;

        assert_eq!(loaded.tilesets().len(), 2);
        let terrain2 = &loaded.tilesets()[0];
        let props2 = &loaded.tilesets()[1];
        assert_eq!(terrain2.name(), "terrain");

        let (_, tiles) = loaded.tile_layers().next().expect("tile layer");
        assert_eq!(
            tiles.cell_at(0, 0),
            &Cell::from_tileset(terrain2, 15).flipped_anti_diagonally(true),
            "{format:?}"
        );
        assert_eq!(
            tiles.cell_at(2, 1),
            &Cell::from_tileset(props2, 7).flipped_vertically(true)
        );
        assert_eq!(tiles.cells().iter().filter(|c| !c.is_empty()).count(), 2);

        let (_, group) = loaded.object_groups().next().expect("object layer");
        assert_eq!(group.objects[0].name, "chest");
        assert_eq!(group.objects[0].cell(), Some(&Cell::from_tileset(props2, 2)));
    }
    Ok(())
}

#[test]
fn map_gid_mapper_matches_json_first_gids() -> anyhow::Result<()> {
    let (terrain, props) = terrain_and_props();
    let mut map = Map::new(1, 1, 16, 16);
    map.add_tileset(terrain);
    map.add_tileset(props);

    let text = encode_map_to_json(&map, &SaveOptions::default())?;
    let json: serde_json::Value = serde_json::from_str(&text)?;
    assert_eq!(json["tilesets"][0]["firstgid"], 1);
    assert_eq!(json["tilesets"][1]["firstgid"], 17);
    Ok(())
}

#[test]
fn every_tileset_kind_survives_save_and_load() -> anyhow::Result<()> {
    let atlas = Rc::new(Tileset::new("atlas", 16, 16).with_image("atlas.png", 64, 64));
    let grid = Rc::new(Tileset::new("grid", 16, 16).with_grid(4, 16));
    let mut props = Tileset::new("props", 32, 32);
    props.add_tile(Tile::new(2));
    let mut barrel = Tile::new(7);
    barrel.image = barrel_image();
    props.add_tile(barrel);
    let props = Rc::new(props);

    let mut map = Map::new(3, 2, 16, 16);
    for ts in [&atlas, &grid, &props] {
        map.add_tileset(Rc::clone(ts));
    }
    let mut layer = TileLayer::new(3, 2);
    layer.set_cell(0, 0, Cell::from_tileset(&atlas, 15));
    layer.set_cell(1, 0, Cell::from_tileset(&grid, 5).flipped_vertically(true));
    layer.set_cell(2, 0, Cell::from_tileset(&props, 2));
    layer.set_cell(0, 1, Cell::from_tileset(&props, 7).flipped_horizontally(true));
    map.add_layer(Layer::new("ground", LayerKind::Tiles(layer)));

    for format in [LayerDataFormat::Csv, LayerDataFormat::Base64Zlib] {
        let options = SaveOptions {
            layer_format: format,
            compression_level: None,
        };
        let text = encode_map_to_json(&map, &options)?;
        let loaded = load_map_str(&text, Path::new("."), &LoadOptions { probe_images: false })?;

        let [atlas2, grid2, props2] = loaded.tilesets() else {
            panic!("expected three tilesets, got {}", loaded.tilesets().len());
        };
        assert_eq!((atlas2.column_count(), atlas2.tile_count()), (4, 16));
        assert_eq!((grid2.column_count(), grid2.tile_count()), (4, 16));
        assert!(grid2.image().is_none());
        assert!(props2.is_collection());
        assert_eq!(props2.tiles().iter().map(Tile::id).collect::<Vec<_>>(), [2, 7]);
        assert_eq!(props2.tile_at(7).and_then(|t| t.image.clone()), barrel_image());

        let (_, tiles) = loaded.tile_layers().next().expect("tile layer");
        assert_eq!(tiles.cell_at(0, 0), &Cell::from_tileset(atlas2, 15), "{format:?}");
        assert_eq!(
            tiles.cell_at(1, 0),
            &Cell::from_tileset(grid2, 5).flipped_vertically(true)
        );
        assert_eq!(tiles.cell_at(2, 0), &Cell::from_tileset(props2, 2));
        assert_eq!(
            tiles.cell_at(0, 1),
            &Cell::from_tileset(props2, 7).flipped_horizontally(true)
        );
        assert!(tiles.cell_at(2, 1).is_empty());
    }
    Ok(())
}

fn barrel_image() -> Option<ImageRef> {
    Some(ImageRef {
        source: "barrel.png".into(),
        width: 32,
        height: 48,
    })
}
