//! The render pipeline: create a map canvas, load its style, set the visible extent and write
//! the rendered image, timing each phase.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stylemap_types::Rect;
use thiserror::Error;

use crate::color::Color;
use crate::error::MapError;
use crate::map::Map;
use crate::render::render_to_file;
use crate::style::load_map;
use crate::timing::Timings;

/// Label of the canvas creation and style loading phase.
pub const LOAD_STYLE_LABEL: &str = "load style";
/// Label of the background and extent setup phase.
pub const SET_EXTENT_LABEL: &str = "set extent";
/// Label of the rendering and image writing phase.
pub const RENDER_LABEL: &str = "render";
/// Label of the sum of all phases in the report.
pub const TOTAL_LABEL: &str = "total";

/// Inputs of the pipeline. Fields missing from a JSON config file take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Style XML file.
    pub style_path: PathBuf,
    /// Output image file. The extension selects the format.
    pub output_path: PathBuf,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Visible extent in the map SRS, as `[x_min, y_min, x_max, y_max]`.
    pub bbox: Rect,
    /// Background color, overriding the one set by the style.
    pub background: Color,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            style_path: PathBuf::from("osm.xml"),
            output_path: PathBuf::from("mymap.png"),
            width: 800,
            height: 600,
            bbox: Rect::new(10.0, 47.5, 11.1, 48.1),
            background: Color::WHITE,
        }
    }
}

impl RenderConfig {
    /// Reads the configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| PipelineError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&json).map_err(|source| PipelineError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Failure of a pipeline phase.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration file cannot be read.
    #[error("failed to read config file {path:?}")]
    ConfigRead {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Configuration file is not valid.
    #[error("invalid config file {path:?}")]
    ConfigParse {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
    /// Map canvas cannot be created.
    #[error("failed to create map canvas")]
    Canvas(#[source] MapError),
    /// Style file cannot be loaded.
    #[error("failed to load style {path:?}")]
    StyleLoad {
        /// Style file.
        path: PathBuf,
        /// Underlying error.
        source: MapError,
    },
    /// Extent cannot be applied.
    #[error("failed to set map extent")]
    Extent(#[source] MapError),
    /// Map cannot be rendered or the image cannot be written.
    #[error("failed to render map to {path:?}")]
    Render {
        /// Output file.
        path: PathBuf,
        /// Underlying error.
        source: MapError,
    },
}

/// Runs the pipeline and returns the duration of each phase.
///
/// Phases run in a fixed order and the first failure stops the pipeline. A failed render may
/// leave no output file or a partially written one.
pub fn run(config: &RenderConfig) -> Result<Timings, PipelineError> {
    let mut timings = Timings::new();

    let mut map = timings.time(LOAD_STYLE_LABEL, || {
        let mut map = Map::new(config.width, config.height).map_err(PipelineError::Canvas)?;
        load_map(&mut map, &config.style_path).map_err(|source| PipelineError::StyleLoad {
            path: config.style_path.clone(),
            source,
        })?;

        Ok::<_, PipelineError>(map)
    })?;

    timings.time(SET_EXTENT_LABEL, || {
        map.set_background(config.background);
        map.zoom_to_box(config.bbox).map_err(PipelineError::Extent)
    })?;

    timings.time(RENDER_LABEL, || {
        render_to_file(&map, &config.output_path).map_err(|source| PipelineError::Render {
            path: config.output_path.clone(),
            source,
        })
    })?;

    Ok(timings)
}

/// Writes the timing report: one `label = duration` line per phase in the order the phases ran,
/// followed by the [`TOTAL_LABEL`] line.
pub fn write_report(timings: &Timings, out: &mut impl Write) -> std::io::Result<()> {
    write!(out, "{timings}")?;
    writeln!(out, "{TOTAL_LABEL} = {:?}", timings.total())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn default_config() {
        let config = RenderConfig::default();
        assert_eq!(config.width, 800);
        assert_eq!(config.height, 600);
        assert_eq!(config.bbox, Rect::new(10.0, 47.5, 11.1, 48.1));
        assert_eq!(config.style_path, Path::new("osm.xml"));
        assert_eq!(config.output_path, Path::new("mymap.png"));
        assert_eq!(config.background, Color::WHITE);
    }

    #[test]
    fn partial_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "output_path": "out.jpg", "bbox": [0, 0, 1, 1], "background": "steelblue" }"#,
        )
        .unwrap();

        let config = RenderConfig::from_json_file(&path).unwrap();
        assert_eq!(config.output_path, Path::new("out.jpg"));
        assert_eq!(config.bbox, Rect::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(config.background, Color::rgba(70, 130, 180, 255));
        assert_eq!(config.width, 800);
    }

    #[test]
    fn bad_config_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            RenderConfig::from_json_file(dir.path().join("missing.json")),
            Err(PipelineError::ConfigRead { .. })
        );

        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "widht": 10 }"#).unwrap();
        assert_matches!(
            RenderConfig::from_json_file(&path),
            Err(PipelineError::ConfigParse { .. })
        );
    }

    #[test]
    fn report_ends_with_total() {
        let mut timings = Timings::new();
        timings.record(LOAD_STYLE_LABEL, std::time::Duration::from_millis(2));
        timings.record(RENDER_LABEL, std::time::Duration::from_millis(5));

        let mut report = vec![];
        write_report(&timings, &mut report).unwrap();
        assert_eq!(
            String::from_utf8(report).unwrap(),
            "load style = 2ms\nrender = 5ms\ntotal = 7ms\n"
        );
    }

    #[test]
    fn zero_size_is_a_canvas_error() {
        let config = RenderConfig {
            width: 0,
            ..Default::default()
        };
        assert_matches!(
            run(&config),
            Err(PipelineError::Canvas(MapError::InvalidSize { .. }))
        );
    }

    #[test]
    fn error_sources_are_chained() {
        let config = RenderConfig {
            style_path: PathBuf::from("does/not/exist.xml"),
            ..Default::default()
        };
        let error = run(&config).unwrap_err();
        let source = std::error::Error::source(&error).unwrap();
        assert!(source.to_string().contains("exist.xml"), "{source}");
    }
}
