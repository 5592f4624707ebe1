use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypesError;
use crate::geo::datum::Datum;
use crate::geo::projection::{IdentityProjection, InvertedProjection, Projection, WebMercator};

/// Coordinate reference system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs {
    datum: Datum,
    projection_type: ProjectionType,
}

/// Kind of projection used by a [`Crs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ProjectionType {
    /// Geographic coordinates in degrees, without projection.
    None,
    /// Spherical mercator.
    WebMercator,
}

impl Crs {
    /// Longitude/latitude on WGS84 (EPSG:4326).
    pub const WGS84: Crs = Crs {
        datum: Datum::WGS84,
        projection_type: ProjectionType::None,
    };

    /// Web mercator (EPSG:3857).
    pub const EPSG3857: Crs = Crs {
        datum: Datum::WGS84,
        projection_type: ProjectionType::WebMercator,
    };

    /// Datum of the coordinate system.
    pub fn datum(&self) -> Datum {
        self.datum
    }

    /// Projection kind.
    pub fn projection_type(&self) -> ProjectionType {
        self.projection_type
    }

    /// Number of meters in one unit of the coordinate system (at the equator for geographic
    /// systems).
    pub fn meters_per_unit(&self) -> f64 {
        match self.projection_type {
            ProjectionType::None => self.datum.meters_per_degree(),
            ProjectionType::WebMercator => 1.0,
        }
    }

    /// Returns a projection converting coordinates in `self` into coordinates in `target`.
    pub fn transform_to(&self, target: &Crs) -> Result<Box<dyn Projection>, TypesError> {
        if self.datum != target.datum {
            return Err(TypesError::NoProjection {
                from: self.to_string(),
                to: target.to_string(),
            });
        }

        let projection: Box<dyn Projection> = match (self.projection_type, target.projection_type) {
            (a, b) if a == b => Box::new(IdentityProjection),
            (ProjectionType::None, ProjectionType::WebMercator) => {
                Box::new(WebMercator::new(self.datum))
            }
            (ProjectionType::WebMercator, ProjectionType::None) => Box::new(
                InvertedProjection::new(Box::new(WebMercator::new(self.datum))),
            ),
            _ => {
                return Err(TypesError::NoProjection {
                    from: self.to_string(),
                    to: target.to_string(),
                })
            }
        };

        Ok(projection)
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::WGS84
    }
}

impl Display for Crs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.projection_type {
            ProjectionType::None => write!(f, "EPSG:4326"),
            ProjectionType::WebMercator => write!(f, "EPSG:3857"),
        }
    }
}

impl FromStr for Crs {
    type Err = TypesError;

    /// Parses `EPSG:<code>` identifiers (case-insensitive) and proj4 definitions with
    /// `+proj=longlat` or `+proj=merc`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let code = normalized
            .strip_prefix("epsg:")
            .or_else(|| normalized.strip_prefix("+init=epsg:"));

        match code {
            Some("4326") => return Ok(Crs::WGS84),
            Some("3857") | Some("900913") | Some("3785") => return Ok(Crs::EPSG3857),
            Some(_) => return Err(TypesError::UnsupportedCrs(s.to_string())),
            None => {}
        }

        let has_param = |param: &str| normalized.split_whitespace().any(|p| p == param);

        if has_param("+proj=longlat") || has_param("+proj=latlong") {
            Ok(Crs::WGS84)
        } else if has_param("+proj=merc") {
            Ok(Crs::EPSG3857)
        } else {
            Err(TypesError::UnsupportedCrs(s.to_string()))
        }
    }
}

impl TryFrom<String> for Crs {
    type Error = TypesError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point2d;
    use approx::assert_abs_diff_eq;

    #[test]
    fn parse_epsg_codes() {
        assert_eq!("epsg:4326".parse::<Crs>().unwrap(), Crs::WGS84);
        assert_eq!("EPSG:3857".parse::<Crs>().unwrap(), Crs::EPSG3857);
        assert_eq!("+init=epsg:900913".parse::<Crs>().unwrap(), Crs::EPSG3857);
        assert_eq!(
            "EPSG:2154".parse::<Crs>(),
            Err(TypesError::UnsupportedCrs("EPSG:2154".into()))
        );
    }

    #[test]
    fn parse_proj4() {
        assert_eq!(
            "+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs"
                .parse::<Crs>()
                .unwrap(),
            Crs::WGS84
        );
        assert_eq!(
            "+proj=merc +a=6378137 +b=6378137 +lat_ts=0.0 +lon_0=0.0 +x_0=0.0 +y_0=0 +k=1.0 +units=m +nadgrids=@null +no_defs"
                .parse::<Crs>()
                .unwrap(),
            Crs::EPSG3857
        );
        assert!("+proj=lcc".parse::<Crs>().is_err());
    }

    #[test]
    fn transform_between_systems() {
        let point = Point2d::new(10.5, 47.8);
        let to_mercator = Crs::WGS84.transform_to(&Crs::EPSG3857).unwrap();
        let back = Crs::EPSG3857.transform_to(&Crs::WGS84).unwrap();

        let projected = to_mercator.project(&point).unwrap();
        assert!(projected.x > 1_000_000.0);
        assert_abs_diff_eq!(back.project(&projected).unwrap(), point, epsilon = 1e-9);

        let identity = Crs::WGS84.transform_to(&Crs::WGS84).unwrap();
        assert_eq!(identity.project(&point), Some(point));
    }

    #[test]
    fn meters_per_unit() {
        assert_eq!(Crs::EPSG3857.meters_per_unit(), 1.0);
        assert_abs_diff_eq!(Crs::WGS84.meters_per_unit(), 111_319.490_793, epsilon = 1e-3);
    }
}
