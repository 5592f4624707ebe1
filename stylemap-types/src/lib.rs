//! Geometry primitives shared by the `stylemap` crates: points, sizes, rectangles, feature
//! geometries and the coordinate systems they are expressed in.

pub mod error;
pub mod geo;
pub mod geometry;
pub mod rect;
pub mod size;

pub use geometry::{Contour, Geometry, Polygon};
pub use rect::Rect;
pub use size::Size;

/// 2d point with `f64` coordinates. For geographic coordinates `x` is longitude and `y` is
/// latitude, both in degrees.
pub type Point2d = nalgebra::Point2<f64>;
