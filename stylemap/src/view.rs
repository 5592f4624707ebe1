//! Conversion between map coordinates and image pixels.

use nalgebra::{Matrix3, Vector2};
use stylemap_types::{Point2d, Rect, Size};

/// Describes which part of the map is displayed and how map coordinates relate to the pixels of
/// the output image.
///
/// Pixel coordinates start at the top-left corner of the image with `y` pointing down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    position: Point2d,
    resolution: f64,
    size: Size,
}

impl MapView {
    /// Creates a view of the given size that displays `extent`.
    ///
    /// The resolution is chosen so that the whole extent fits into the view.
    pub fn from_extent(extent: &Rect, size: Size) -> Self {
        let resolution = (extent.width() / size.width()).max(extent.height() / size.height());
        Self {
            position: extent.center(),
            resolution,
            size,
        }
    }

    /// Map coordinates of the view center.
    pub fn position(&self) -> Point2d {
        self.position
    }

    /// Map units per pixel.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Size of the view in pixels.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Area of the map covered by the view.
    pub fn get_bbox(&self) -> Rect {
        Rect::new(
            self.position.x - self.size.half_width() * self.resolution,
            self.position.y - self.size.half_height() * self.resolution,
            self.position.x + self.size.half_width() * self.resolution,
            self.position.y + self.size.half_height() * self.resolution,
        )
    }

    fn map_to_screen_transform(&self) -> Matrix3<f64> {
        let to_center = Matrix3::new_translation(&Vector2::new(-self.position.x, -self.position.y));
        let scale = Matrix3::new_nonuniform_scaling(&Vector2::new(
            1.0 / self.resolution,
            -1.0 / self.resolution,
        ));
        let to_corner =
            Matrix3::new_translation(&Vector2::new(self.size.half_width(), self.size.half_height()));

        to_corner * scale * to_center
    }

    /// Converts map coordinates into pixel coordinates.
    pub fn map_to_screen(&self, point: &Point2d) -> Point2d {
        self.map_to_screen_transform().transform_point(point)
    }

    /// Converts pixel coordinates into map coordinates.
    pub fn screen_to_map(&self, px_position: &Point2d) -> Point2d {
        let x = self.position.x + (px_position.x - self.size.half_width()) * self.resolution;
        let y = self.position.y + (self.size.half_height() - px_position.y) * self.resolution;
        Point2d::new(x, y)
    }
}
