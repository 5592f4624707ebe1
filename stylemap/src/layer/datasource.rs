use std::collections::HashMap;
use std::path::{Path, PathBuf};

use stylemap_types::Rect;

use crate::error::MapError;
use crate::layer::feature::Feature;
use crate::layer::{csv, geojson, shape};

/// Source of the features displayed by a layer.
pub trait Datasource: std::fmt::Debug + Send + Sync {
    /// Bounding rectangle of all features, in the layer coordinate system. `None` if the
    /// datasource is empty.
    fn envelope(&self) -> Option<Rect>;

    /// Features whose bounding rectangle intersects `bbox`.
    fn features(&self, bbox: &Rect) -> Vec<&Feature>;
}

/// Datasource that keeps all its features in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatasource {
    features: Vec<(Option<Rect>, Feature)>,
    envelope: Option<Rect>,
}

impl MemoryDatasource {
    /// Creates a new datasource with the given features.
    pub fn new(features: Vec<Feature>) -> Self {
        let features: Vec<_> = features
            .into_iter()
            .map(|f| (f.geometry.bounding_rect(), f))
            .collect();
        let envelope = Rect::merge_all(features.iter().filter_map(|(bbox, _)| *bbox));

        Self { features, envelope }
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if there are no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Datasource for MemoryDatasource {
    fn envelope(&self) -> Option<Rect> {
        self.envelope
    }

    fn features(&self, bbox: &Rect) -> Vec<&Feature> {
        self.features
            .iter()
            .filter(|(feature_bbox, _)| feature_bbox.is_some_and(|b| b.intersects(bbox)))
            .map(|(_, feature)| feature)
            .collect()
    }
}

/// `<Parameter>` entries of a `<Datasource>` element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasourceParams {
    params: HashMap<String, String>,
}

impl DatasourceParams {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.insert(name.into(), value.into());
    }

    /// Value of a parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    fn require(&self, name: &str) -> Result<&str, MapError> {
        self.get(name).ok_or_else(|| {
            MapError::Datasource(format!("required parameter '{name}' is missing"))
        })
    }

    /// Resolves the `file` parameter against the `base` parameter or, if it is not set, against
    /// `base_dir`.
    pub fn file_path(&self, base_dir: &Path) -> Result<PathBuf, MapError> {
        let file = Path::new(self.require("file")?);
        if file.is_absolute() {
            return Ok(file.to_path_buf());
        }

        let base = match self.get("base") {
            Some(base) => base_dir.join(base),
            None => base_dir.to_path_buf(),
        };

        Ok(base.join(file))
    }
}

/// Creates a datasource from its parameters.
///
/// Supported types are `geojson`, `csv` and `shape`. Relative file paths are resolved against
/// `base_dir`, which normally is the directory of the style file.
pub fn create_datasource(
    params: &DatasourceParams,
    base_dir: &Path,
) -> Result<Box<dyn Datasource>, MapError> {
    let datasource_type = params.require("type")?;
    let path = params.file_path(base_dir)?;

    let datasource = match datasource_type {
        "geojson" => geojson::load_file(&path)?,
        "csv" => csv::load_file(&path, params.get("lon"), params.get("lat"))?,
        "shape" => shape::load_file(&path)?,
        other => {
            return Err(MapError::Datasource(format!(
                "unsupported datasource type '{other}'"
            )))
        }
    };

    log::debug!(
        "Loaded {} features from {} datasource {path:?}",
        datasource.len(),
        datasource_type
    );

    Ok(Box::new(datasource))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use stylemap_types::{Geometry, Point2d};

    use super::*;

    fn point_feature(id: u64, x: f64, y: f64) -> Feature {
        Feature::new(id, Geometry::Point(Point2d::new(x, y)))
    }

    #[test]
    fn memory_datasource_query() {
        let datasource = MemoryDatasource::new(vec![
            point_feature(1, 0.0, 0.0),
            point_feature(2, 10.0, 10.0),
            point_feature(3, 5.0, 5.0),
        ]);

        assert_eq!(datasource.envelope(), Some(Rect::new(0.0, 0.0, 10.0, 10.0)));

        let ids: Vec<_> = datasource
            .features(&Rect::new(4.0, 4.0, 11.0, 11.0))
            .iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, [2, 3]);
    }

    #[test]
    fn empty_datasource_has_no_envelope() {
        let datasource = MemoryDatasource::new(vec![]);
        assert!(datasource.is_empty());
        assert_eq!(datasource.envelope(), None);
    }

    #[test]
    fn file_path_resolution() {
        let mut params = DatasourceParams::new();
        params.insert("file", "roads.geojson");
        assert_eq!(
            params.file_path(Path::new("styles")).unwrap(),
            PathBuf::from("styles/roads.geojson")
        );

        params.insert("base", "data");
        assert_eq!(
            params.file_path(Path::new("styles")).unwrap(),
            PathBuf::from("styles/data/roads.geojson")
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut params = DatasourceParams::new();
        params.insert("type", "postgis");
        params.insert("file", "whatever");

        assert_matches!(
            create_datasource(&params, Path::new(".")),
            Err(MapError::Datasource(_))
        );
    }

    #[test]
    fn missing_type_is_rejected() {
        let params = DatasourceParams::new();
        assert_matches!(
            create_datasource(&params, Path::new(".")),
            Err(MapError::Datasource(message)) if message.contains("'type'")
        );
    }
}
