use crate::geo::Datum;
use crate::Point2d;

/// Conversion of points from one coordinate system into another.
pub trait Projection: Send + Sync {
    /// Projects a point. Returns `None` if the point is outside of the projection domain.
    fn project(&self, input: &Point2d) -> Option<Point2d>;
    /// Inverse conversion.
    fn unproject(&self, input: &Point2d) -> Option<Point2d>;
}

/// Projection that returns its input unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityProjection;

impl Projection for IdentityProjection {
    fn project(&self, input: &Point2d) -> Option<Point2d> {
        Some(*input)
    }

    fn unproject(&self, input: &Point2d) -> Option<Point2d> {
        Some(*input)
    }
}

/// Swaps `project` and `unproject` of the wrapped projection.
pub struct InvertedProjection<P: ?Sized> {
    inner: Box<P>,
}

impl<P: Projection + ?Sized> InvertedProjection<P> {
    /// Wraps the projection.
    pub fn new(inner: Box<P>) -> Self {
        Self { inner }
    }
}

impl<P: Projection + ?Sized> Projection for InvertedProjection<P> {
    fn project(&self, input: &Point2d) -> Option<Point2d> {
        self.inner.unproject(input)
    }

    fn unproject(&self, input: &Point2d) -> Option<Point2d> {
        self.inner.project(input)
    }
}

/// Spherical mercator projection (EPSG:3857) of longitude/latitude degrees into meters.
#[derive(Debug, Copy, Clone)]
pub struct WebMercator {
    datum: Datum,
}

impl WebMercator {
    /// Latitude limit of the projection, in degrees.
    pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

    /// Creates a projection on the given datum.
    pub fn new(datum: Datum) -> Self {
        Self { datum }
    }
}

impl Default for WebMercator {
    fn default() -> Self {
        Self::new(Datum::WGS84)
    }
}

impl Projection for WebMercator {
    fn project(&self, input: &Point2d) -> Option<Point2d> {
        let lat = input
            .y
            .clamp(-Self::MAX_LATITUDE, Self::MAX_LATITUDE)
            .to_radians();
        let x = self.datum.semimajor() * input.x.to_radians();
        let y = self.datum.semimajor() * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();

        if x.is_finite() && y.is_finite() {
            Some(Point2d::new(x, y))
        } else {
            None
        }
    }

    fn unproject(&self, input: &Point2d) -> Option<Point2d> {
        let lon = input.x / self.datum.semimajor();
        let lat = 2.0 * (input.y / self.datum.semimajor()).exp().atan() - std::f64::consts::FRAC_PI_2;

        if lon.is_finite() && lat.is_finite() {
            Some(Point2d::new(lon.to_degrees(), lat.to_degrees()))
        } else {
            None
        }
    }
}
