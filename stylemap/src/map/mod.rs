//! The [`Map`] canvas: output size, background, styles, layers and the displayed extent.

use std::collections::BTreeMap;

use stylemap_types::geo::Crs;
use stylemap_types::{Rect, Size};

use crate::color::Color;
use crate::error::MapError;
use crate::layer::Layer;
use crate::style::FeatureTypeStyle;
use crate::view::MapView;

/// Size of a pixel in meters as defined by the OGC SLD specification (0.28 mm).
pub const STANDARDIZED_PIXEL_SIZE: f64 = 0.00028;

/// How a requested extent is adjusted when its aspect ratio differs from the one of the map.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AspectFixMode {
    /// Enlarges the shorter side of the extent around its center.
    #[default]
    GrowBbox,
    /// Shrinks the longer side of the extent around its center.
    ShrinkBbox,
    /// Keeps the extent as requested. The rendered image still keeps a uniform scale, so the
    /// whole extent is visible and the image shows more than was requested along one axis.
    Respect,
}

/// Map canvas: output size, background, styles, layers and the visible extent.
#[derive(Debug)]
pub struct Map {
    width: u32,
    height: u32,
    background: Option<Color>,
    srs: Crs,
    buffer_size: u32,
    aspect_fix_mode: AspectFixMode,
    styles: BTreeMap<String, FeatureTypeStyle>,
    layers: Vec<Layer>,
    extent: Option<Rect>,
}

impl Map {
    /// Creates an empty map of the given size in pixels.
    ///
    /// The map uses WGS84 coordinates until another SRS is set.
    pub fn new(width: u32, height: u32) -> Result<Self, MapError> {
        if width == 0 || height == 0 {
            return Err(MapError::InvalidSize { width, height });
        }

        Ok(Self {
            width,
            height,
            background: None,
            srs: Crs::WGS84,
            buffer_size: 0,
            aspect_fix_mode: AspectFixMode::default(),
            styles: BTreeMap::new(),
            layers: vec![],
            extent: None,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Size in pixels.
    pub fn size(&self) -> Size<u32> {
        Size::new(self.width, self.height)
    }

    /// Sets the color the image is filled with before drawing layers.
    pub fn set_background(&mut self, color: Color) {
        self.background = Some(color);
    }

    /// Background color. `None` leaves the image transparent.
    pub fn background(&self) -> Option<Color> {
        self.background
    }

    /// Coordinate system of the map. Layer features are projected into it.
    pub fn srs(&self) -> &Crs {
        &self.srs
    }

    /// Sets the coordinate system of the map.
    ///
    /// The current extent is kept as is, so it must be set again if it was given in the units
    /// of the previous system.
    pub fn set_srs(&mut self, srs: Crs) {
        self.srs = srs;
    }

    /// Number of pixels around the image where features are still queried, so that symbols of
    /// features lying just outside of the image are drawn at its edges.
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Sets the buffer size in pixels.
    pub fn set_buffer_size(&mut self, buffer_size: u32) {
        self.buffer_size = buffer_size;
    }

    /// Aspect ratio correction applied by [`Map::zoom_to_box`].
    pub fn aspect_fix_mode(&self) -> AspectFixMode {
        self.aspect_fix_mode
    }

    /// Sets the aspect ratio correction. Applies to the following calls of [`Map::zoom_to_box`].
    pub fn set_aspect_fix_mode(&mut self, mode: AspectFixMode) {
        self.aspect_fix_mode = mode;
    }

    /// Adds a named style, replacing the style with the same name if there is one.
    pub fn add_style(&mut self, name: impl Into<String>, style: FeatureTypeStyle) {
        let name = name.into();
        if self.styles.insert(name.clone(), style).is_some() {
            log::debug!("Style '{name}' replaced");
        }
    }

    /// Style with the given name.
    pub fn style(&self, name: &str) -> Option<&FeatureTypeStyle> {
        self.styles.get(name)
    }

    /// All styles, ordered by name.
    pub fn styles(&self) -> impl Iterator<Item = (&str, &FeatureTypeStyle)> {
        self.styles.iter().map(|(name, style)| (name.as_str(), style))
    }

    /// Adds a layer on top of the existing ones.
    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Layers in drawing order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Mutable access to the layers.
    pub fn layers_mut(&mut self) -> &mut Vec<Layer> {
        &mut self.layers
    }

    /// Sets the visible extent in the map coordinate system.
    ///
    /// The extent is adjusted to the aspect ratio of the map according to the
    /// [`AspectFixMode`].
    pub fn zoom_to_box(&mut self, bbox: Rect) -> Result<(), MapError> {
        if !bbox.is_finite() || bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return Err(MapError::InvalidExtent(bbox));
        }

        let aspect = self.size().cast::<f64>().aspect();
        let extent = match self.aspect_fix_mode {
            AspectFixMode::GrowBbox => bbox.grow_to_aspect(aspect),
            AspectFixMode::ShrinkBbox => bbox.shrink_to_aspect(aspect),
            AspectFixMode::Respect => bbox,
        };

        log::debug!("Map extent set to {extent:?} (requested {bbox:?})");
        self.extent = Some(extent);

        Ok(())
    }

    /// Zooms to the combined envelope of all active layers, projected to the map SRS.
    ///
    /// Does nothing if no layer has features.
    pub fn zoom_all(&mut self) -> Result<(), MapError> {
        let mut envelopes = vec![];
        for layer in self.layers.iter().filter(|l| l.is_active()) {
            let Some(envelope) = layer.envelope() else {
                continue;
            };

            let projection = layer.srs().transform_to(&self.srs)?;
            let corners: Vec<_> = envelope
                .into_quadrangle()
                .iter()
                .filter_map(|p| projection.project(p))
                .collect();
            envelopes.extend(Rect::from_points(corners.iter()));
        }

        match Rect::merge_all(envelopes) {
            Some(extent) => {
                // A single point or a straight line still needs a visible area.
                let extent = if extent.width() <= 0.0 || extent.height() <= 0.0 {
                    extent.expand(extent.width().max(extent.height()).max(1.0) / 2.0)
                } else {
                    extent
                };
                self.zoom_to_box(extent)
            }
            None => {
                log::warn!("zoom_all called on a map without features");
                Ok(())
            }
        }
    }

    /// Visible extent, if set.
    pub fn current_extent(&self) -> Option<Rect> {
        self.extent
    }

    /// Map units per pixel, if the extent is set.
    pub fn scale(&self) -> Option<f64> {
        self.view().map(|view| view.resolution())
    }

    /// Scale denominator of the map (for example `25000` for 1:25000), if the extent is set.
    ///
    /// Uses the standardized 0.28 mm pixel. Degrees are converted to meters along the equator.
    pub fn scale_denominator(&self) -> Option<f64> {
        self.scale()
            .map(|scale| scale * self.srs.meters_per_unit() / STANDARDIZED_PIXEL_SIZE)
    }

    /// Transformation between map coordinates and image pixels for the current extent.
    pub fn view(&self) -> Option<MapView> {
        self.extent
            .map(|extent| MapView::from_extent(&extent, self.size().cast()))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;
    use stylemap_types::{Geometry, Point2d};

    use super::*;
    use crate::layer::{Feature, MemoryDatasource};

    #[test]
    fn zero_size_is_rejected() {
        assert_matches!(
            Map::new(0, 600),
            Err(MapError::InvalidSize {
                width: 0,
                height: 600
            })
        );
    }

    #[test]
    fn zoom_to_box_grows_to_aspect() {
        let mut map = Map::new(800, 600).unwrap();
        assert_eq!(map.current_extent(), None);

        map.zoom_to_box(Rect::new(10.0, 47.5, 11.1, 48.1)).unwrap();
        let extent = map.current_extent().unwrap();

        assert_abs_diff_eq!(extent.width(), 1.1, epsilon = 1e-9);
        assert_abs_diff_eq!(extent.height(), 0.825, epsilon = 1e-9);
        assert_abs_diff_eq!(extent.center(), Point2d::new(10.55, 47.8), epsilon = 1e-9);
        assert_abs_diff_eq!(map.scale().unwrap(), 1.1 / 800.0, epsilon = 1e-12);
    }

    #[test]
    fn zoom_to_box_shrink_and_respect() {
        let mut map = Map::new(800, 600).unwrap();
        map.set_aspect_fix_mode(AspectFixMode::ShrinkBbox);
        map.zoom_to_box(Rect::new(0.0, 0.0, 8.0, 8.0)).unwrap();
        assert_eq!(map.current_extent(), Some(Rect::new(0.0, 1.0, 8.0, 7.0)));

        map.set_aspect_fix_mode(AspectFixMode::Respect);
        map.zoom_to_box(Rect::new(0.0, 0.0, 8.0, 8.0)).unwrap();
        assert_eq!(map.current_extent(), Some(Rect::new(0.0, 0.0, 8.0, 8.0)));
        assert_abs_diff_eq!(map.scale().unwrap(), 8.0 / 600.0);
    }

    #[test]
    fn degenerate_box_is_rejected() {
        let mut map = Map::new(800, 600).unwrap();
        assert_matches!(
            map.zoom_to_box(Rect::new(1.0, 1.0, 1.0, 2.0)),
            Err(MapError::InvalidExtent(_))
        );
        assert_matches!(
            map.zoom_to_box(Rect::new(0.0, 0.0, f64::NAN, 1.0)),
            Err(MapError::InvalidExtent(_))
        );
        assert_eq!(map.current_extent(), None);
    }

    #[test]
    fn scale_denominator_in_degrees_and_meters() {
        let mut map = Map::new(1000, 1000).unwrap();
        map.zoom_to_box(Rect::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        // One degree at the equator is ~111.3 km, over 1000 pixels of 0.28 mm.
        assert_abs_diff_eq!(
            map.scale_denominator().unwrap(),
            397_569.6,
            epsilon = 1.0
        );

        map.set_srs(Crs::EPSG3857);
        map.zoom_to_box(Rect::new(0.0, 0.0, 280.0, 280.0)).unwrap();
        assert_abs_diff_eq!(map.scale_denominator().unwrap(), 1000.0, epsilon = 1e-6);
    }

    #[test]
    fn zoom_all_uses_layer_envelopes() {
        let mut map = Map::new(100, 100).unwrap();
        map.zoom_all().unwrap();
        assert_eq!(map.current_extent(), None);

        let datasource = MemoryDatasource::new(vec![
            Feature::new(1, Geometry::Point(Point2d::new(10.0, 47.0))),
            Feature::new(2, Geometry::Point(Point2d::new(12.0, 49.0))),
        ]);
        map.add_layer(Layer::new("points", Crs::WGS84, datasource));
        map.zoom_all().unwrap();

        assert_eq!(map.current_extent(), Some(Rect::new(10.0, 47.0, 12.0, 49.0)));
    }

    #[test]
    fn styles_are_replaced_by_name() {
        let mut map = Map::new(100, 100).unwrap();
        map.add_style("roads", FeatureTypeStyle::new());

        let mut transparent = FeatureTypeStyle::new();
        transparent.set_opacity(0.5);
        map.add_style("roads", transparent);

        assert_eq!(map.styles().count(), 1);
        assert_eq!(map.style("roads").map(FeatureTypeStyle::opacity), Some(0.5));
        assert!(map.style("water").is_none());
    }
}
