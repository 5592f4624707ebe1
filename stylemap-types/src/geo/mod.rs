//! Coordinate reference systems and conversion between them (see [`Projection`]).

mod crs;
mod datum;
mod projection;

pub use crs::{Crs, ProjectionType};
pub use datum::Datum;
pub use projection::{IdentityProjection, InvertedProjection, Projection, WebMercator};
