//! GeoJSON datasource.

use std::path::Path;

use geojson::{GeoJson, LineStringType, PolygonType, Position};
use stylemap_types::{Contour, Geometry, Point2d, Polygon};

use crate::error::MapError;
use crate::layer::datasource::MemoryDatasource;
use crate::layer::feature::{Feature, Value};

/// Reads a GeoJSON file into a memory datasource.
pub fn load_file(path: &Path) -> Result<MemoryDatasource, MapError> {
    let json = std::fs::read_to_string(path).map_err(|err| MapError::io(path, err))?;
    load_str(&json)
}

/// Decodes a GeoJSON document. A single geometry or feature is treated as a collection of one.
/// Features without geometry are skipped, geometry collections are split into separate
/// features sharing the same attributes.
pub fn load_str(json: &str) -> Result<MemoryDatasource, MapError> {
    let geojson = json.parse::<GeoJson>()?;
    let source_features = match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![geojson::Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    let mut features = vec![];
    for source in source_features {
        let Some(geometry) = source.geometry else {
            continue;
        };

        let properties: std::collections::HashMap<String, Value> = source
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, Value::from(value)))
            .collect();

        for geometry in convert_geometry(geometry.value)? {
            let id = features.len() as u64 + 1;
            features.push(Feature {
                id,
                geometry,
                properties: properties.clone(),
            });
        }
    }

    Ok(MemoryDatasource::new(features))
}

fn convert_geometry(value: geojson::Value) -> Result<Vec<Geometry>, MapError> {
    Ok(match value {
        geojson::Value::Point(p) => vec![Geometry::Point(convert_position(&p)?)],
        geojson::Value::MultiPoint(points) => vec![Geometry::MultiPoint(
            points
                .iter()
                .map(convert_position)
                .collect::<Result<_, _>>()?,
        )],
        geojson::Value::LineString(line) => vec![Geometry::LineString(convert_contour(&line)?)],
        geojson::Value::MultiLineString(lines) => vec![Geometry::MultiLineString(
            lines
                .iter()
                .map(convert_contour)
                .collect::<Result<_, _>>()?,
        )],
        geojson::Value::Polygon(polygon) => vec![Geometry::Polygon(convert_polygon(&polygon)?)],
        geojson::Value::MultiPolygon(polygons) => vec![Geometry::MultiPolygon(
            polygons
                .iter()
                .map(convert_polygon)
                .collect::<Result<_, _>>()?,
        )],
        geojson::Value::GeometryCollection(geometries) => {
            let mut result = vec![];
            for geometry in geometries {
                result.extend(convert_geometry(geometry.value)?);
            }
            result
        }
    })
}

fn convert_position(position: &Position) -> Result<Point2d, MapError> {
    match position.as_slice() {
        [x, y, ..] => Ok(Point2d::new(*x, *y)),
        _ => Err(MapError::Datasource(format!(
            "GeoJSON position must have at least two coordinates, got {position:?}"
        ))),
    }
}

fn convert_contour(line: &LineStringType) -> Result<Contour, MapError> {
    Ok(Contour::new(
        line.iter()
            .map(convert_position)
            .collect::<Result<_, _>>()?,
    ))
}

fn convert_polygon(polygon: &PolygonType) -> Result<Polygon, MapError> {
    let mut rings = polygon.iter().map(convert_contour);
    let outer = rings.next().transpose()?.ok_or_else(|| {
        MapError::Datasource("GeoJSON polygon must have an exterior ring".to_string())
    })?;

    Ok(Polygon::new(outer, rings.collect::<Result<_, _>>()?))
}
