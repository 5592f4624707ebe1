//! CSV datasource: one point feature per row.

use std::io::Read;
use std::path::Path;

use stylemap_types::{Geometry, Point2d};

use crate::error::MapError;
use crate::layer::datasource::MemoryDatasource;
use crate::layer::feature::{Feature, Value};

const LON_COLUMNS: [&str; 4] = ["lon", "lng", "longitude", "x"];
const LAT_COLUMNS: [&str; 3] = ["lat", "latitude", "y"];

/// Reads a CSV file into a memory datasource. See [`load_reader`].
pub fn load_file(
    path: &Path,
    lon_column: Option<&str>,
    lat_column: Option<&str>,
) -> Result<MemoryDatasource, MapError> {
    let file = std::fs::File::open(path).map_err(|err| MapError::io(path, err))?;
    load_reader(file, lon_column, lat_column)
}

/// Decodes CSV data with a header row.
///
/// Coordinates are taken from the given columns or, if not given, from the first column named
/// `lon`, `lng`, `longitude` or `x` and `lat`, `latitude` or `y` (case-insensitive). All other
/// columns become feature attributes. Rows with invalid coordinates are skipped with a warning.
pub fn load_reader(
    reader: impl Read,
    lon_column: Option<&str>,
    lat_column: Option<&str>,
) -> Result<MemoryDatasource, MapError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers()?.clone();

    let lon_index = find_column(&headers, lon_column, &LON_COLUMNS)?;
    let lat_index = find_column(&headers, lat_column, &LAT_COLUMNS)?;

    let mut features = vec![];
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let coordinate = |index: usize| record.get(index).and_then(|v| v.parse::<f64>().ok());
        let (Some(x), Some(y)) = (coordinate(lon_index), coordinate(lat_index)) else {
            log::warn!("Skipping CSV row {} with invalid coordinates", row + 1);
            continue;
        };

        let mut feature = Feature::new(features.len() as u64 + 1, Geometry::Point(Point2d::new(x, y)));
        for (index, (name, value)) in headers.iter().zip(record.iter()).enumerate() {
            if index != lon_index && index != lat_index {
                feature.properties.insert(name.to_string(), Value::infer(value));
            }
        }

        features.push(feature);
    }

    Ok(MemoryDatasource::new(features))
}

fn find_column(
    headers: &csv::StringRecord,
    explicit: Option<&str>,
    candidates: &[&str],
) -> Result<usize, MapError> {
    let position = match explicit {
        Some(name) => headers.iter().position(|h| h == name),
        None => headers
            .iter()
            .position(|h| candidates.iter().any(|c| h.eq_ignore_ascii_case(c))),
    };

    position.ok_or_else(|| {
        MapError::Datasource(format!(
            "CSV file has no coordinate column (looked for {})",
            explicit.map_or_else(|| candidates.join(", "), str::to_string)
        ))
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use stylemap_types::Rect;

    use super::*;
    use crate::layer::datasource::Datasource;

    #[test]
    fn load_points() {
        let data = "name, Lat, Longitude, population\n\
                    Munich, 48.137, 11.575, 1500000\n\
                    Broken, north, 10.0, 1\n\
                    Innsbruck, 47.269, 11.404, 130000\n";
        let datasource = load_reader(data.as_bytes(), None, None).unwrap();

        assert_eq!(datasource.len(), 2);
        assert_eq!(
            datasource.envelope(),
            Some(Rect::new(11.404, 47.269, 11.575, 48.137))
        );

        let features = datasource.features(&Rect::new(11.5, 48.0, 12.0, 48.5));
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].get("name"), &Value::from("Munich"));
        assert_eq!(features[0].get("population"), &Value::Number(1_500_000.0));
        assert_eq!(features[0].get("Lat"), &Value::Null);
    }

    #[test]
    fn explicit_columns() {
        let data = "a,b\n1,2\n";
        let datasource = load_reader(data.as_bytes(), Some("b"), Some("a")).unwrap();
        assert_eq!(datasource.envelope(), Some(Rect::new(2.0, 1.0, 2.0, 1.0)));
    }

    #[test]
    fn missing_coordinate_columns() {
        let data = "name,value\nfoo,1\n";
        assert_matches!(
            load_reader(data.as_bytes(), None, None),
            Err(MapError::Datasource(_))
        );
    }
}
