use std::path::Path;

use stylemap::layer::Value;
use stylemap::stylemap_types::geo::Crs;
use stylemap::{load_map, Map, Rect};

fn demo_map() -> Map {
    let mut map = Map::new(800, 600).unwrap();
    load_map(
        &mut map,
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../demo/osm.xml"),
    )
    .unwrap();
    map
}

#[test]
fn demo_style_loads() {
    let map = demo_map();

    assert_eq!(map.srs(), &Crs::WGS84);
    assert_eq!(map.buffer_size(), 32);

    let layers: Vec<_> = map.layers().iter().map(|l| l.name()).collect();
    assert_eq!(layers, ["landuse", "water", "roads", "buildings", "places"]);

    for layer in map.layers() {
        assert!(layer.envelope().is_some(), "layer {} is empty", layer.name());
        for style in layer.styles() {
            assert!(map.style(style).is_some(), "style {style} is not defined");
        }
    }
}

#[test]
fn demo_data_covers_default_extent() {
    let mut map = demo_map();
    map.zoom_all().unwrap();

    let data_extent = map.current_extent().unwrap();
    assert!(data_extent.intersects(&Rect::new(10.0, 47.5, 11.1, 48.1)));
}

#[test]
fn places_from_csv() {
    let map = demo_map();
    let places = map.layers().iter().find(|l| l.name() == "places").unwrap();

    let features = places
        .datasource()
        .features(&Rect::new(10.6, 47.87, 10.63, 47.89));
    assert_eq!(features.len(), 1);
    assert_eq!(features[0].get("name"), &Value::from("Kaufbeuren"));
    assert_eq!(features[0].get("population"), &Value::Number(45000.0));
}
