//! Axis-aligned rectangles.

use serde::{Deserialize, Serialize};

use crate::Point2d;

/// Axis-aligned rectangle, used both as a bounding box of geometries and as the visible extent
/// of a map.
///
/// The constructor normalizes the corners, so `x_min <= x_max` and `y_min <= y_max` always hold.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Rect {
    x_min: f64,
    y_min: f64,
    x_max: f64,
    y_max: f64,
}

impl From<[f64; 4]> for Rect {
    fn from(value: [f64; 4]) -> Self {
        Self::new(value[0], value[1], value[2], value[3])
    }
}

impl From<Rect> for [f64; 4] {
    fn from(value: Rect) -> Self {
        [value.x_min, value.y_min, value.x_max, value.y_max]
    }
}

impl Rect {
    /// Creates a new rectangle from two corners.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x_min: x1.min(x2),
            y_min: y1.min(y2),
            x_max: x1.max(x2),
            y_max: y1.max(y2),
        }
    }

    /// Minimum x.
    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    /// Maximum x.
    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    /// Minimum y.
    pub fn y_min(&self) -> f64 {
        self.y_min
    }

    /// Maximum y.
    pub fn y_max(&self) -> f64 {
        self.y_max
    }

    /// Width of the rectangle.
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Height of the rectangle.
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Center point.
    pub fn center(&self) -> Point2d {
        Point2d::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// Returns true if all the coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x_min.is_finite()
            && self.y_min.is_finite()
            && self.x_max.is_finite()
            && self.y_max.is_finite()
    }

    /// Smallest rectangle containing both `self` and `other`.
    pub fn merge(&self, other: Self) -> Self {
        Self {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    /// Returns true if the rectangles have at least one common point.
    pub fn intersects(&self, other: &Self) -> bool {
        self.x_min <= other.x_max
            && self.x_max >= other.x_min
            && self.y_min <= other.y_max
            && self.y_max >= other.y_min
    }

    /// Grows the rectangle by `amount` in every direction.
    pub fn expand(&self, amount: f64) -> Self {
        Self {
            x_min: self.x_min - amount,
            y_min: self.y_min - amount,
            x_max: self.x_max + amount,
            y_max: self.y_max + amount,
        }
    }

    /// Enlarges the shorter side of the rectangle around its center so that
    /// `width / height == aspect`.
    pub fn grow_to_aspect(&self, aspect: f64) -> Self {
        let center = self.center();
        let (width, height) = if self.width() / self.height() > aspect {
            (self.width(), self.width() / aspect)
        } else {
            (self.height() * aspect, self.height())
        };

        Self::around(center, width, height)
    }

    /// Shrinks the longer side of the rectangle around its center so that
    /// `width / height == aspect`.
    pub fn shrink_to_aspect(&self, aspect: f64) -> Self {
        let center = self.center();
        let (width, height) = if self.width() / self.height() > aspect {
            (self.height() * aspect, self.height())
        } else {
            (self.width(), self.width() / aspect)
        };

        Self::around(center, width, height)
    }

    fn around(center: Point2d, width: f64, height: f64) -> Self {
        Self {
            x_min: center.x - width / 2.0,
            x_max: center.x + width / 2.0,
            y_min: center.y - height / 2.0,
            y_max: center.y + height / 2.0,
        }
    }

    /// Bounding rectangle of a set of points. Returns `None` if the iterator is empty.
    pub fn from_points<'a>(mut points: impl Iterator<Item = &'a Point2d>) -> Option<Self> {
        let first = points.next()?;
        let mut rect = Self {
            x_min: first.x,
            y_min: first.y,
            x_max: first.x,
            y_max: first.y,
        };

        for p in points {
            rect.x_min = rect.x_min.min(p.x);
            rect.y_min = rect.y_min.min(p.y);
            rect.x_max = rect.x_max.max(p.x);
            rect.y_max = rect.y_max.max(p.y);
        }

        Some(rect)
    }

    /// Smallest rectangle containing all the given ones. Returns `None` if the iterator is empty.
    pub fn merge_all(rects: impl IntoIterator<Item = Rect>) -> Option<Self> {
        rects.into_iter().reduce(|acc, rect| acc.merge(rect))
    }

    /// Corners of the rectangle, counter-clockwise starting from the minimum corner.
    pub fn into_quadrangle(self) -> [Point2d; 4] {
        [
            Point2d::new(self.x_min, self.y_min),
            Point2d::new(self.x_max, self.y_min),
            Point2d::new(self.x_max, self.y_max),
            Point2d::new(self.x_min, self.y_max),
        ]
    }
}
