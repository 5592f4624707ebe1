//! Stylemap renders maps described by Mapnik-style XML documents into PNG or JPEG images.
//!
//! # Quick start
//!
//! ```no_run
//! use stylemap::{load_map, render_to_file, Color, Map, Rect};
//!
//! let mut map = Map::new(800, 600)?;
//! load_map(&mut map, "osm.xml")?;
//! map.set_background(Color::WHITE);
//! map.zoom_to_box(Rect::new(10.0, 47.5, 11.1, 48.1))?;
//! render_to_file(&map, "mymap.png")?;
//! # Ok::<(), stylemap::error::MapError>(())
//! ```
//!
//! The same sequence with timing of every phase is available as [`pipeline::run`], which is
//! what the `render-map` binary calls.
//!
//! # Main components
//!
//! * [`Map`] is the canvas: output size, background, named styles, ordered layers and the
//!   visible extent.
//! * [`layer`]s read their features from a [`Datasource`](layer::Datasource) (GeoJSON, CSV or
//!   shapefiles) and list the styles they are drawn with.
//! * [`style`]s are sets of rules. A rule selects features with a [`Filter`](style::Filter)
//!   expression and a scale range, and draws them with symbolizers.
//! * The [`render`] module rasterizes the map on the CPU and encodes the image.

pub mod color;
pub mod error;
pub mod layer;
pub mod map;
pub mod pipeline;
pub mod render;
pub mod style;
pub mod timing;
pub mod view;

pub use color::Color;
pub use layer::Layer;
pub use map::{AspectFixMode, Map};
pub use render::{render_to_file, Renderer};
pub use style::{load_map, load_map_string, FeatureTypeStyle, Rule, Symbolizer};
pub use stylemap_types;
pub use stylemap_types::geo::Crs;
pub use stylemap_types::Rect;
pub use view::MapView;
