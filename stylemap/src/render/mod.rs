//! CPU renderer drawing a [`Map`] into a `tiny-skia` pixmap.

mod output;
mod paint;

pub use output::{output_format, pixmap_to_image, render_to_file};

use stylemap_types::geo::Projection;
use stylemap_types::{Geometry, Point2d, Rect};
use tiny_skia::{Pixmap, PixmapPaint, Transform};

use crate::error::MapError;
use crate::layer::{Feature, Layer};
use crate::map::Map;
use crate::render::paint::CollisionDetector;
use crate::style::{FeatureTypeStyle, Symbolizer};
use crate::view::MapView;

/// Projects coordinates of a layer into image pixels.
struct ScreenProjection {
    to_map: Box<dyn Projection>,
    view: MapView,
}

impl Projection for ScreenProjection {
    fn project(&self, point: &Point2d) -> Option<Point2d> {
        self.to_map
            .project(point)
            .map(|p| self.view.map_to_screen(&p))
    }

    fn unproject(&self, point: &Point2d) -> Option<Point2d> {
        self.to_map.unproject(&self.view.screen_to_map(point))
    }
}

/// Renders a map with a configured extent.
#[derive(Debug)]
pub struct Renderer<'a> {
    map: &'a Map,
    view: MapView,
    scale_denominator: f64,
}

impl<'a> Renderer<'a> {
    /// Creates a renderer for the map.
    ///
    /// Fails with [`MapError::ExtentNotSet`] if the extent of the map has not been set.
    pub fn new(map: &'a Map) -> Result<Self, MapError> {
        if map.width() == 0 || map.height() == 0 {
            return Err(MapError::InvalidSize {
                width: map.width(),
                height: map.height(),
            });
        }

        let view = map.view().ok_or(MapError::ExtentNotSet)?;
        let scale_denominator = map.scale_denominator().ok_or(MapError::ExtentNotSet)?;

        Ok(Self {
            map,
            view,
            scale_denominator,
        })
    }

    /// View used to convert map coordinates into pixels.
    pub fn view(&self) -> &MapView {
        &self.view
    }

    /// Draws the background and then all active layers in order.
    pub fn render(&self) -> Result<Pixmap, MapError> {
        let mut pixmap = self.new_pixmap()?;
        if let Some(background) = self.map.background() {
            pixmap.fill(tiny_skia::Color::from_rgba8(
                background.r(),
                background.g(),
                background.b(),
                background.a(),
            ));
        }

        log::debug!(
            "Rendering {}x{} map at scale 1:{:.0}",
            self.map.width(),
            self.map.height(),
            self.scale_denominator
        );

        let mut detector = CollisionDetector::default();
        for layer in self.map.layers() {
            if !layer.is_active() {
                log::debug!("Layer '{}' is inactive", layer.name());
                continue;
            }

            self.render_layer(&mut pixmap, layer, &mut detector)?;
        }

        Ok(pixmap)
    }

    fn new_pixmap(&self) -> Result<Pixmap, MapError> {
        Pixmap::new(self.map.width(), self.map.height()).ok_or(MapError::InvalidSize {
            width: self.map.width(),
            height: self.map.height(),
        })
    }

    /// Area of the map (in map SRS) for which features are requested.
    fn query_bbox(&self) -> Rect {
        let buffer = self.map.buffer_size() as f64 * self.view.resolution();
        self.view.get_bbox().expand(buffer)
    }

    fn render_layer(
        &self,
        pixmap: &mut Pixmap,
        layer: &Layer,
        detector: &mut CollisionDetector,
    ) -> Result<(), MapError> {
        let to_layer = self.map.srs().transform_to(layer.srs())?;
        let corners: Vec<_> = self
            .query_bbox()
            .into_quadrangle()
            .iter()
            .filter_map(|p| to_layer.project(p))
            .collect();
        let Some(layer_bbox) = Rect::from_points(corners.iter()) else {
            return Ok(());
        };

        let to_screen = ScreenProjection {
            to_map: layer.srs().transform_to(self.map.srs())?,
            view: self.view,
        };
        let features: Vec<(&Feature, Geometry)> = layer
            .datasource()
            .features(&layer_bbox)
            .into_iter()
            .filter_map(|feature| {
                feature
                    .geometry
                    .project(&to_screen)
                    .map(|geometry| (feature, geometry))
            })
            .collect();

        log::debug!(
            "Layer '{}': {} features in view",
            layer.name(),
            features.len()
        );

        for style_name in layer.styles() {
            let Some(style) = self.map.style(style_name) else {
                log::warn!(
                    "Layer '{}' references unknown style '{style_name}'",
                    layer.name()
                );
                continue;
            };

            if style.opacity() < 1.0 {
                let mut offscreen = self.new_pixmap()?;
                self.render_style(&mut offscreen, style, &features, detector);
                pixmap.draw_pixmap(
                    0,
                    0,
                    offscreen.as_ref(),
                    &PixmapPaint {
                        opacity: style.opacity(),
                        ..Default::default()
                    },
                    Transform::identity(),
                    None,
                );
            } else {
                self.render_style(pixmap, style, &features, detector);
            }
        }

        Ok(())
    }

    fn render_style(
        &self,
        pixmap: &mut Pixmap,
        style: &FeatureTypeStyle,
        features: &[(&Feature, Geometry)],
        detector: &mut CollisionDetector,
    ) {
        for (feature, geometry) in features {
            for rule in style.matching_rules(feature, self.scale_denominator) {
                for symbolizer in &rule.symbolizers {
                    draw_symbolizer(pixmap, symbolizer, feature, geometry, detector);
                }
            }
        }
    }
}

/// Draws one feature. `geometry` is the feature geometry already projected into pixels.
fn draw_symbolizer(
    pixmap: &mut Pixmap,
    symbolizer: &Symbolizer,
    feature: &Feature,
    geometry: &Geometry,
    detector: &mut CollisionDetector,
) {
    match symbolizer {
        Symbolizer::Polygon(polygon) => paint::fill_polygons(pixmap, geometry.polygons(), polygon),
        Symbolizer::Line(line) => {
            let closed = matches!(geometry, Geometry::Polygon(_) | Geometry::MultiPolygon(_));
            paint::stroke_lines(pixmap, &geometry.contours(), closed, line);
        }
        Symbolizer::Markers(markers) => {
            paint::draw_markers(pixmap, &geometry.marker_positions(), markers, detector)
        }
        Symbolizer::Point(point) => {
            paint::draw_points(pixmap, &geometry.marker_positions(), point, detector)
        }
        Symbolizer::PolygonPattern(pattern) => {
            paint::fill_pattern(pixmap, geometry.polygons(), pattern)
        }
        Symbolizer::Building(building) => {
            let height = building.height.evaluate_f64(feature);
            paint::draw_buildings(pixmap, geometry.polygons(), building, height)
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use stylemap_types::geo::Crs;
    use stylemap_types::{Contour, Polygon};

    use super::*;
    use crate::color::Color;
    use crate::layer::MemoryDatasource;
    use crate::style::{BuildingSymbolizer, Filter, LineSymbolizer, PolygonSymbolizer, Rule};

    fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> [u8; 4] {
        let color = pixmap.pixel(x, y).unwrap().demultiply();
        [color.red(), color.green(), color.blue(), color.alpha()]
    }

    fn square(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Geometry {
        Geometry::Polygon(Polygon::new(
            Contour::new(vec![
                Point2d::new(x_min, y_min),
                Point2d::new(x_max, y_min),
                Point2d::new(x_max, y_max),
                Point2d::new(x_min, y_max),
            ]),
            vec![],
        ))
    }

    fn fill_style(color: Color) -> FeatureTypeStyle {
        FeatureTypeStyle::new().with_rule(Rule::new(vec![Symbolizer::Polygon(
            PolygonSymbolizer {
                fill: color,
                fill_opacity: 1.0,
            },
        )]))
    }

    fn test_map() -> Map {
        let mut map = Map::new(100, 100).unwrap();
        map.set_background(Color::WHITE);
        map.add_style("fill", fill_style(Color::RED));

        let datasource = MemoryDatasource::new(vec![Feature::new(1, square(0.0, 0.0, 5.0, 10.0))]);
        map.add_layer(Layer::new("left", Crs::WGS84, datasource).with_style("fill"));
        map.zoom_to_box(Rect::new(0.0, 0.0, 10.0, 10.0)).unwrap();
        map
    }

    #[test]
    fn extent_is_required() {
        let map = Map::new(10, 10).unwrap();
        assert_matches!(Renderer::new(&map), Err(MapError::ExtentNotSet));
    }

    #[test]
    fn background_and_polygon() {
        let map = test_map();
        let pixmap = Renderer::new(&map).unwrap().render().unwrap();

        assert_eq!(pixmap.width(), 100);
        assert_eq!(pixel(&pixmap, 25, 50), [255, 0, 0, 255]);
        assert_eq!(pixel(&pixmap, 75, 50), [255, 255, 255, 255]);
    }

    #[test]
    fn transparent_background_by_default() {
        let mut map = Map::new(10, 10).unwrap();
        map.zoom_to_box(Rect::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        let pixmap = Renderer::new(&map).unwrap().render().unwrap();
        assert_eq!(pixel(&pixmap, 5, 5), [0, 0, 0, 0]);
    }

    #[test]
    fn style_opacity_is_composited() {
        let mut map = test_map();
        let mut style = fill_style(Color::BLACK);
        style.set_opacity(0.5);
        map.add_style("fill", style);

        let pixmap = Renderer::new(&map).unwrap().render().unwrap();
        let [r, g, b, a] = pixel(&pixmap, 25, 50);
        assert!((127..=128).contains(&r), "{r}");
        assert_eq!((r, g, b, a), (r, r, r, 255));
    }

    #[test]
    fn inactive_layers_and_unknown_styles_are_skipped() {
        let mut map = test_map();
        map.layers_mut()[0].set_active(false);
        let pixmap = Renderer::new(&map).unwrap().render().unwrap();
        assert_eq!(pixel(&pixmap, 25, 50), [255, 255, 255, 255]);

        let mut map = test_map();
        let datasource = MemoryDatasource::new(vec![Feature::new(1, square(5.0, 0.0, 10.0, 10.0))]);
        map.add_layer(Layer::new("right", Crs::WGS84, datasource).with_style("missing"));
        let pixmap = Renderer::new(&map).unwrap().render().unwrap();
        assert_eq!(pixel(&pixmap, 75, 50), [255, 255, 255, 255]);
    }

    #[test]
    fn building_height_comes_from_attributes() {
        let mut map = Map::new(100, 100).unwrap();
        map.add_style(
            "buildings",
            FeatureTypeStyle::new().with_rule(Rule::new(vec![Symbolizer::Building(
                BuildingSymbolizer {
                    fill: Color::RED,
                    height: Filter::parse("[height]").unwrap(),
                    ..Default::default()
                },
            )])),
        );

        // Two equal footprints, only the right one is tall.
        let datasource = MemoryDatasource::new(vec![
            Feature::new(1, square(10.0, 10.0, 30.0, 30.0)).with_property("height", 0.0),
            Feature::new(2, square(60.0, 10.0, 80.0, 30.0)).with_property("height", "20"),
        ]);
        map.add_layer(Layer::new("buildings", Crs::WGS84, datasource).with_style("buildings"));
        map.zoom_to_box(Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();

        let pixmap = Renderer::new(&map).unwrap().render().unwrap();
        // Footprints span rows 70..90 of the image.
        assert_eq!(pixel(&pixmap, 20, 80), [255, 0, 0, 255]);
        assert_eq!(pixel(&pixmap, 20, 60), [0, 0, 0, 0]);
        // The tall roof is raised by 20 pixels.
        assert_eq!(pixel(&pixmap, 70, 55), [255, 0, 0, 255]);
    }

    #[test]
    fn layers_are_reprojected() {
        let mut map = Map::new(100, 100).unwrap();
        map.set_srs(Crs::EPSG3857);
        map.add_style(
            "line",
            FeatureTypeStyle::new().with_rule(Rule::new(vec![Symbolizer::Line(LineSymbolizer {
                stroke_width: 10.0,
                ..Default::default()
            })])),
        );

        // Meridian 10E in degrees, drawn on a mercator map.
        let line = Geometry::LineString(Contour::new(vec![
            Point2d::new(10.0, 47.0),
            Point2d::new(10.0, 49.0),
        ]));
        let datasource = MemoryDatasource::new(vec![Feature::new(1, line)]);
        map.add_layer(Layer::new("meridian", Crs::WGS84, datasource).with_style("line"));

        let x = 1_113_194.9;
        map.zoom_to_box(Rect::new(x - 50_000.0, 6_000_000.0, x + 50_000.0, 6_100_000.0))
            .unwrap();

        let pixmap = Renderer::new(&map).unwrap().render().unwrap();
        assert_eq!(pixel(&pixmap, 50, 50), [0, 0, 0, 255]);
        assert_eq!(pixel(&pixmap, 20, 50), [0, 0, 0, 0]);
    }
}
