//! Feature geometries.

use serde::{Deserialize, Serialize};

use crate::geo::Projection;
use crate::{Point2d, Rect};

/// Sequence of points connected by straight segments.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Contour {
    points: Vec<Point2d>,
}

impl Contour {
    /// Creates a new contour.
    pub fn new(points: Vec<Point2d>) -> Self {
        Self { points }
    }

    /// Points of the contour.
    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the contour has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Segments of the contour as pairs of consecutive points.
    pub fn segments(&self) -> impl Iterator<Item = (Point2d, Point2d)> + '_ {
        self.points.windows(2).map(|pair| (pair[0], pair[1]))
    }

    /// Returns a new contour with each point projected. Returns `None` if any of the points
    /// cannot be projected.
    pub fn project(&self, projection: &(impl Projection + ?Sized)) -> Option<Self> {
        Some(Self {
            points: self
                .points
                .iter()
                .map(|p| projection.project(p))
                .collect::<Option<Vec<_>>>()?,
        })
    }

    /// Bounding rectangle of the contour.
    pub fn bounding_rect(&self) -> Option<Rect> {
        Rect::from_points(self.points.iter())
    }

    /// Area of the contour treated as a closed ring together with its first moments, as
    /// `(area, moment_x, moment_y)`. The centroid of the ring is `moment / area`. The sign of the
    /// area depends on the orientation of the ring.
    fn area_moments(&self) -> (f64, f64, f64) {
        let Some(first) = self.points.first() else {
            return (0.0, 0.0, 0.0);
        };

        let closing = self.points.last().map(|last| (*last, *first));
        self.segments()
            .chain(closing)
            .fold((0.0, 0.0, 0.0), |(area, mx, my), (a, b)| {
                let cross = a.x * b.y - b.x * a.y;
                (
                    area + cross / 2.0,
                    mx + (a.x + b.x) * cross / 6.0,
                    my + (a.y + b.y) * cross / 6.0,
                )
            })
    }
}

/// Polygon with optional holes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    /// Outer boundary.
    pub outer_contour: Contour,
    /// Holes.
    pub inner_contours: Vec<Contour>,
}

impl Polygon {
    /// Creates a new polygon.
    pub fn new(outer_contour: Contour, inner_contours: Vec<Contour>) -> Self {
        Self {
            outer_contour,
            inner_contours,
        }
    }

    /// Iterates over the outer contour and then over the holes.
    pub fn iter_contours(&self) -> impl Iterator<Item = &Contour> {
        std::iter::once(&self.outer_contour).chain(self.inner_contours.iter())
    }

    /// Projects all the contours of the polygon.
    pub fn project(&self, projection: &(impl Projection + ?Sized)) -> Option<Self> {
        Some(Self {
            outer_contour: self.outer_contour.project(projection)?,
            inner_contours: self
                .inner_contours
                .iter()
                .map(|c| c.project(projection))
                .collect::<Option<Vec<_>>>()?,
        })
    }

    /// Bounding rectangle of the outer contour.
    pub fn bounding_rect(&self) -> Option<Rect> {
        self.outer_contour.bounding_rect()
    }

    /// Area-weighted centroid of the polygon, holes subtracted. Degenerate polygons without area
    /// fall back to the center of their bounding rectangle.
    pub fn centroid(&self) -> Option<Point2d> {
        let (mut area, mut mx, mut my) = (0.0, 0.0, 0.0);
        for (index, contour) in self.iter_contours().enumerate() {
            let (ring_area, ring_mx, ring_my) = contour.area_moments();
            // Ring orientation is not trusted: the outer ring adds, holes subtract.
            let weight = if index == 0 { 1.0 } else { -1.0 };
            let sign = weight * ring_area.signum();
            area += ring_area * sign;
            mx += ring_mx * sign;
            my += ring_my * sign;
        }

        if area.abs() <= f64::EPSILON {
            return self.bounding_rect().map(|rect| rect.center());
        }

        Some(Point2d::new(mx / area, my / area))
    }
}

/// Geometry of a map feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    /// Single point.
    Point(Point2d),
    /// Set of points.
    MultiPoint(Vec<Point2d>),
    /// Line.
    LineString(Contour),
    /// Set of lines.
    MultiLineString(Vec<Contour>),
    /// Polygon.
    Polygon(Polygon),
    /// Set of polygons.
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    /// Bounding rectangle of the geometry. Returns `None` for empty geometries.
    pub fn bounding_rect(&self) -> Option<Rect> {
        match self {
            Geometry::Point(p) => Some(Rect::new(p.x, p.y, p.x, p.y)),
            Geometry::MultiPoint(points) => Rect::from_points(points.iter()),
            Geometry::LineString(contour) => contour.bounding_rect(),
            Geometry::MultiLineString(contours) => {
                Rect::merge_all(contours.iter().filter_map(Contour::bounding_rect))
            }
            Geometry::Polygon(polygon) => polygon.bounding_rect(),
            Geometry::MultiPolygon(polygons) => {
                Rect::merge_all(polygons.iter().filter_map(Polygon::bounding_rect))
            }
        }
    }

    /// Projects the geometry into another coordinate system.
    pub fn project(&self, projection: &(impl Projection + ?Sized)) -> Option<Geometry> {
        Some(match self {
            Geometry::Point(p) => Geometry::Point(projection.project(p)?),
            Geometry::MultiPoint(points) => Geometry::MultiPoint(
                points
                    .iter()
                    .map(|p| projection.project(p))
                    .collect::<Option<Vec<_>>>()?,
            ),
            Geometry::LineString(contour) => Geometry::LineString(contour.project(projection)?),
            Geometry::MultiLineString(contours) => Geometry::MultiLineString(
                contours
                    .iter()
                    .map(|c| c.project(projection))
                    .collect::<Option<Vec<_>>>()?,
            ),
            Geometry::Polygon(polygon) => Geometry::Polygon(polygon.project(projection)?),
            Geometry::MultiPolygon(polygons) => Geometry::MultiPolygon(
                polygons
                    .iter()
                    .map(|p| p.project(projection))
                    .collect::<Option<Vec<_>>>()?,
            ),
        })
    }

    /// Polygons of the geometry. Empty for point and line geometries.
    pub fn polygons(&self) -> &[Polygon] {
        match self {
            Geometry::Polygon(polygon) => std::slice::from_ref(polygon),
            Geometry::MultiPolygon(polygons) => polygons,
            _ => &[],
        }
    }

    /// Line contours of the geometry. Polygons are represented by their rings.
    pub fn contours(&self) -> Vec<&Contour> {
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => vec![],
            Geometry::LineString(contour) => vec![contour],
            Geometry::MultiLineString(contours) => contours.iter().collect(),
            Geometry::Polygon(polygon) => polygon.iter_contours().collect(),
            Geometry::MultiPolygon(polygons) => {
                polygons.iter().flat_map(|p| p.iter_contours()).collect()
            }
        }
    }

    /// Points at which markers of the geometry are placed: the points themselves for point
    /// geometries, the middle vertex of lines and the centroid of polygons.
    pub fn marker_positions(&self) -> Vec<Point2d> {
        match self {
            Geometry::Point(p) => vec![*p],
            Geometry::MultiPoint(points) => points.clone(),
            Geometry::LineString(contour) => middle_point(contour).into_iter().collect(),
            Geometry::MultiLineString(contours) => contours.iter().filter_map(middle_point).collect(),
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => self
                .polygons()
                .iter()
                .filter_map(Polygon::centroid)
                .collect(),
        }
    }
}

fn middle_point(contour: &Contour) -> Option<Point2d> {
    contour.points().get(contour.len() / 2).copied()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::geo::IdentityProjection;

    fn square() -> Polygon {
        Polygon::new(
            Contour::new(vec![
                Point2d::new(0.0, 0.0),
                Point2d::new(4.0, 0.0),
                Point2d::new(4.0, 2.0),
                Point2d::new(0.0, 2.0),
                Point2d::new(0.0, 0.0),
            ]),
            vec![],
        )
    }

    #[test]
    fn bounding_rect_of_multi_polygon() {
        let mut other = square();
        other.outer_contour = Contour::new(vec![Point2d::new(10.0, 10.0), Point2d::new(11.0, 12.0)]);
        let geometry = Geometry::MultiPolygon(vec![square(), other]);
        assert_eq!(geometry.bounding_rect(), Some(Rect::new(0.0, 0.0, 11.0, 12.0)));
    }

    #[test]
    fn empty_line_has_no_bounding_rect() {
        assert_eq!(Geometry::LineString(Contour::default()).bounding_rect(), None);
    }

    #[test]
    fn marker_positions() {
        assert_eq!(
            Geometry::Polygon(square()).marker_positions(),
            vec![Point2d::new(2.0, 1.0)]
        );
        let line = Contour::new(vec![
            Point2d::new(0.0, 0.0),
            Point2d::new(1.0, 1.0),
            Point2d::new(2.0, 0.0),
        ]);
        assert_eq!(
            Geometry::LineString(line).marker_positions(),
            vec![Point2d::new(1.0, 1.0)]
        );
    }

    #[test]
    fn centroid_of_concave_polygon() {
        let l_shape = Polygon::new(
            Contour::new(vec![
                Point2d::new(0.0, 0.0),
                Point2d::new(4.0, 0.0),
                Point2d::new(4.0, 1.0),
                Point2d::new(1.0, 1.0),
                Point2d::new(1.0, 4.0),
                Point2d::new(0.0, 4.0),
            ]),
            vec![],
        );

        let expected = Point2d::new(9.5 / 7.0, 9.5 / 7.0);
        let l_shape_centroid = l_shape.centroid().unwrap();
        assert_abs_diff_eq!(l_shape_centroid, expected, epsilon = 1e-9);
        assert_eq!(Geometry::Polygon(l_shape).marker_positions(), vec![l_shape_centroid]);
    }

    #[test]
    fn centroid_subtracts_holes() {
        let outer = Contour::new(vec![
            Point2d::new(0.0, 0.0),
            Point2d::new(4.0, 0.0),
            Point2d::new(4.0, 4.0),
            Point2d::new(0.0, 4.0),
        ]);
        // Clockwise hole in the lower left quarter.
        let hole = Contour::new(vec![
            Point2d::new(0.0, 0.0),
            Point2d::new(0.0, 2.0),
            Point2d::new(2.0, 2.0),
            Point2d::new(2.0, 0.0),
        ]);
        let polygon = Polygon::new(outer, vec![hole]);

        let expected = Point2d::new(7.0 / 3.0, 7.0 / 3.0);
        assert_abs_diff_eq!(polygon.centroid().unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn centroid_of_flat_polygon_is_bbox_center() {
        let flat = Polygon::new(
            Contour::new(vec![Point2d::new(0.0, 1.0), Point2d::new(4.0, 1.0)]),
            vec![],
        );
        assert_eq!(flat.centroid(), Some(Point2d::new(2.0, 1.0)));
        assert_eq!(Polygon::default().centroid(), None);
    }

    #[test]
    fn identity_projection_keeps_geometry() {
        let geometry = Geometry::Polygon(square());
        assert_eq!(geometry.project(&IdentityProjection), Some(geometry.clone()));
    }
}
