//! Error types used by the crate.

use std::path::PathBuf;

use image::ImageError;
use stylemap_types::error::TypesError;
use stylemap_types::Rect;
use thiserror::Error;

/// Stylemap error type.
#[derive(Debug, Error)]
pub enum MapError {
    /// Error reading/writing a file.
    #[error("failed to access file {path:?}: {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Style document is not well-formed XML.
    #[error("invalid style XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Style document is well-formed but has invalid content.
    #[error("invalid style: {0}")]
    StyleParse(String),
    /// Rule filter expression cannot be parsed.
    #[error("invalid filter expression '{expression}': {reason}")]
    Filter {
        /// Expression text.
        expression: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Datasource cannot be created or read.
    #[error("datasource error: {0}")]
    Datasource(String),
    /// GeoJSON document cannot be decoded.
    #[error("failed to decode GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),
    /// CSV document cannot be decoded.
    #[error("failed to decode CSV: {0}")]
    Csv(#[from] csv::Error),
    /// Shapefile or its attribute table cannot be decoded.
    #[error("failed to read shapefile: {0}")]
    Shapefile(#[from] shapefile::Error),
    /// Coordinate system error.
    #[error(transparent)]
    Crs(#[from] TypesError),
    /// Canvas size is invalid.
    #[error("invalid canvas size {width}x{height}")]
    InvalidSize {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// Extent has zero area or non-finite coordinates.
    #[error("invalid map extent {0:?}")]
    InvalidExtent(Rect),
    /// Rendering was requested before the visible extent of the map was set.
    #[error("map extent is not set")]
    ExtentNotSet,
    /// Output file extension does not correspond to a supported image format.
    #[error("unsupported output image format: {0}")]
    UnsupportedFormat(String),
    /// Image cannot be decoded or encoded.
    #[error("image error: {0}")]
    Image(#[from] ImageError),
}

impl MapError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
