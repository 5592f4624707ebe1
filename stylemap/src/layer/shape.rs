//! ESRI shapefile datasource.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use shapefile::dbase::FieldValue;
use shapefile::{PolygonRing, Shape};
use stylemap_types::{Contour, Geometry, Point2d, Polygon};

use crate::error::MapError;
use crate::layer::datasource::MemoryDatasource;
use crate::layer::feature::{Feature, Value};

/// Reads a shapefile and its `.dbf` attribute table into a memory datasource.
///
/// The `.shp` extension may be omitted. Null shapes and multipatches are skipped, measures and
/// elevations of `M` and `Z` shapes are dropped.
pub fn load_file(path: &Path) -> Result<MemoryDatasource, MapError> {
    let path = shp_path(path);
    std::fs::metadata(&path).map_err(|err| MapError::io(&path, err))?;

    let mut reader = shapefile::Reader::from_path(&path)?;
    let mut features = vec![];
    let mut skipped = 0;
    for shape_record in reader.iter_shapes_and_records() {
        let (shape, record) = shape_record?;
        let Some(geometry) = convert_shape(&shape) else {
            skipped += 1;
            continue;
        };

        let properties = HashMap::<String, FieldValue>::from(record)
            .into_iter()
            .map(|(name, value)| (name.trim().to_string(), convert_value(value)))
            .collect();

        features.push(Feature {
            id: features.len() as u64 + 1,
            geometry,
            properties,
        });
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} shapes without supported geometry in {path:?}");
    }

    Ok(MemoryDatasource::new(features))
}

fn shp_path(path: &Path) -> PathBuf {
    match path.extension() {
        Some(_) => path.to_path_buf(),
        None => path.with_extension("shp"),
    }
}

trait PlanarPoint {
    fn planar(&self) -> Point2d;
}

impl PlanarPoint for shapefile::Point {
    fn planar(&self) -> Point2d {
        Point2d::new(self.x, self.y)
    }
}

impl PlanarPoint for shapefile::PointM {
    fn planar(&self) -> Point2d {
        Point2d::new(self.x, self.y)
    }
}

impl PlanarPoint for shapefile::PointZ {
    fn planar(&self) -> Point2d {
        Point2d::new(self.x, self.y)
    }
}

fn convert_shape(shape: &Shape) -> Option<Geometry> {
    Some(match shape {
        Shape::Point(point) => Geometry::Point(point.planar()),
        Shape::PointM(point) => Geometry::Point(point.planar()),
        Shape::PointZ(point) => Geometry::Point(point.planar()),
        Shape::Multipoint(points) => multi_point(points.points()),
        Shape::MultipointM(points) => multi_point(points.points()),
        Shape::MultipointZ(points) => multi_point(points.points()),
        Shape::Polyline(line) => lines(line.parts()),
        Shape::PolylineM(line) => lines(line.parts()),
        Shape::PolylineZ(line) => lines(line.parts()),
        Shape::Polygon(polygon) => polygons(polygon.rings())?,
        Shape::PolygonM(polygon) => polygons(polygon.rings())?,
        Shape::PolygonZ(polygon) => polygons(polygon.rings())?,
        Shape::Multipatch(_) | Shape::NullShape => return None,
    })
}

fn contour<P: PlanarPoint>(points: &[P]) -> Contour {
    Contour::new(points.iter().map(PlanarPoint::planar).collect())
}

fn multi_point<P: PlanarPoint>(points: &[P]) -> Geometry {
    Geometry::MultiPoint(points.iter().map(PlanarPoint::planar).collect())
}

fn lines<P: PlanarPoint>(parts: &[Vec<P>]) -> Geometry {
    match parts {
        [single] => Geometry::LineString(contour(single)),
        parts => Geometry::MultiLineString(parts.iter().map(|part| contour(part)).collect()),
    }
}

/// Every outer ring starts a new polygon, inner rings are holes of the preceding outer ring.
fn polygons<P: PlanarPoint>(rings: &[PolygonRing<P>]) -> Option<Geometry> {
    let mut polygons: Vec<Polygon> = vec![];
    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => polygons.push(Polygon::new(contour(points), vec![])),
            PolygonRing::Inner(points) => match polygons.last_mut() {
                Some(polygon) => polygon.inner_contours.push(contour(points)),
                None => log::warn!("Skipping shapefile polygon hole without outer ring"),
            },
        }
    }

    match polygons.len() {
        0 => None,
        1 => polygons.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(polygons)),
    }
}

fn convert_value(value: FieldValue) -> Value {
    match value {
        FieldValue::Character(Some(text)) => Value::String(text.trim_end().to_string()),
        FieldValue::Memo(text) => Value::String(text),
        FieldValue::Numeric(Some(number)) => Value::Number(number),
        FieldValue::Float(Some(number)) => Value::Number(number as f64),
        FieldValue::Double(number) | FieldValue::Currency(number) => Value::Number(number),
        FieldValue::Integer(number) => Value::Number(number as f64),
        FieldValue::Logical(Some(flag)) => Value::Bool(flag),
        _ => Value::Null,
    }
}
