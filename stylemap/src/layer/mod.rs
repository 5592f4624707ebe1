//! Map layers and the datasources providing their features.

mod csv;
mod datasource;
mod feature;
mod geojson;
mod shape;

pub use datasource::{create_datasource, Datasource, DatasourceParams, MemoryDatasource};
pub use feature::{Feature, Value};

use stylemap_types::geo::Crs;
use stylemap_types::Rect;

/// Functions reading datasource files directly.
pub mod loaders {
    pub use super::csv::{load_file as load_csv_file, load_reader as load_csv_reader};
    pub use super::geojson::{load_file as load_geojson_file, load_str as load_geojson_str};
    pub use super::shape::load_file as load_shape_file;
}

/// Named set of features drawn with one or more styles.
#[derive(Debug)]
pub struct Layer {
    name: String,
    srs: Crs,
    styles: Vec<String>,
    datasource: Box<dyn Datasource>,
    active: bool,
}

impl Layer {
    /// Creates an active layer without styles.
    pub fn new(name: impl Into<String>, srs: Crs, datasource: impl Datasource + 'static) -> Self {
        Self::with_boxed_datasource(name, srs, Box::new(datasource))
    }

    /// Creates a layer from a boxed datasource.
    pub fn with_boxed_datasource(
        name: impl Into<String>,
        srs: Crs,
        datasource: Box<dyn Datasource>,
    ) -> Self {
        Self {
            name: name.into(),
            srs,
            styles: vec![],
            datasource,
            active: true,
        }
    }

    /// Appends a style name to the list of styles the layer is drawn with.
    pub fn add_style(&mut self, style_name: impl Into<String>) {
        self.styles.push(style_name.into());
    }

    /// Builder-style version of [`Layer::add_style`].
    pub fn with_style(mut self, style_name: impl Into<String>) -> Self {
        self.add_style(style_name);
        self
    }

    /// Name of the layer.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Coordinate system of the layer features.
    pub fn srs(&self) -> &Crs {
        &self.srs
    }

    /// Names of the styles used to draw the layer, in drawing order.
    pub fn styles(&self) -> &[String] {
        &self.styles
    }

    /// Datasource of the layer.
    pub fn datasource(&self) -> &dyn Datasource {
        self.datasource.as_ref()
    }

    /// Inactive layers are not rendered.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Enables or disables the layer.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Extent of the layer features in the layer coordinate system.
    pub fn envelope(&self) -> Option<Rect> {
        self.datasource.envelope()
    }
}
