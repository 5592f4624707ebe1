//! Rasterization of symbolizers with `tiny-skia`. All geometries here are already in pixel
//! coordinates.

use stylemap_types::{Contour, Point2d, Polygon, Rect};
use tiny_skia::{
    FillRule, FilterQuality, Paint, Path, PathBuilder, Pattern, Pixmap, PixmapPaint, SpreadMode,
    Stroke, StrokeDash, Transform,
};

use crate::color::Color;
use crate::style::{
    BuildingSymbolizer, LineCap, LineJoin, LineSymbolizer, MarkersSymbolizer, PointSymbolizer,
    PolygonPatternSymbolizer, PolygonSymbolizer,
};

/// Share of the fill color used for building walls.
const WALL_SHADE: f32 = 0.8;

/// Side of the square drawn by point symbolizers without an image.
const DEFAULT_POINT_SIZE: f32 = 4.0;

/// Screen areas taken by markers and point images drawn so far.
#[derive(Debug, Default)]
pub(crate) struct CollisionDetector {
    placed: Vec<Rect>,
}

impl CollisionDetector {
    /// Decides whether a symbol covering `area` is drawn. Without `allow_overlap` the symbol is
    /// rejected if it overlaps a taken area. Drawn symbols take their area unless
    /// `ignore_placement` is set.
    fn try_place(&mut self, area: Rect, allow_overlap: bool, ignore_placement: bool) -> bool {
        if !allow_overlap && self.placed.iter().any(|placed| placed.intersects(&area)) {
            return false;
        }

        if !ignore_placement {
            self.placed.push(area);
        }
        true
    }
}

fn paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r(), color.g(), color.b(), color.a());
    paint.anti_alias = true;
    paint
}

fn add_contour(builder: &mut PathBuilder, points: &[Point2d], close: bool) {
    let mut points = points.iter();
    let Some(first) = points.next() else {
        return;
    };

    builder.move_to(first.x as f32, first.y as f32);
    for point in points {
        builder.line_to(point.x as f32, point.y as f32);
    }

    if close {
        builder.close();
    }
}

fn polygons_path(polygons: &[Polygon]) -> Option<Path> {
    let mut builder = PathBuilder::new();
    for contour in polygons.iter().flat_map(Polygon::iter_contours) {
        add_contour(&mut builder, contour.points(), true);
    }

    builder.finish()
}

/// Fills polygons. Inner contours are cut out with the even-odd rule.
pub(crate) fn fill_polygons(pixmap: &mut Pixmap, polygons: &[Polygon], symbolizer: &PolygonSymbolizer) {
    let color = symbolizer.fill.with_opacity(symbolizer.fill_opacity);
    if color.is_transparent() {
        return;
    }

    if let Some(path) = polygons_path(polygons) {
        pixmap.fill_path(
            &path,
            &paint(color),
            FillRule::EvenOdd,
            Transform::identity(),
            None,
        );
    }
}

fn to_skia_join(join: LineJoin) -> tiny_skia::LineJoin {
    match join {
        LineJoin::Miter => tiny_skia::LineJoin::Miter,
        LineJoin::Round => tiny_skia::LineJoin::Round,
        LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
    }
}

fn to_skia_cap(cap: LineCap) -> tiny_skia::LineCap {
    match cap {
        LineCap::Butt => tiny_skia::LineCap::Butt,
        LineCap::Round => tiny_skia::LineCap::Round,
        LineCap::Square => tiny_skia::LineCap::Square,
    }
}

fn dash(dasharray: &[f32]) -> Option<StrokeDash> {
    if dasharray.is_empty() {
        return None;
    }

    // An odd number of values is repeated to get dash and gap pairs.
    let mut dashes = dasharray.to_vec();
    if dashes.len() % 2 == 1 {
        dashes.extend_from_slice(dasharray);
    }

    StrokeDash::new(dashes, 0.0)
}

/// Moves every vertex by `offset` pixels along the averaged normal of the adjacent segments.
/// Positive offsets move the line to the left of its direction.
pub(crate) fn offset_points(points: &[Point2d], offset: f64) -> Vec<Point2d> {
    if offset == 0.0 || points.len() < 2 {
        return points.to_vec();
    }

    let normal = |a: &Point2d, b: &Point2d| {
        let direction = b - a;
        let length = direction.norm();
        if length == 0.0 {
            None
        } else {
            Some(nalgebra::Vector2::new(direction.y, -direction.x) / length)
        }
    };

    (0..points.len())
        .map(|i| {
            let before = i.checked_sub(1).and_then(|prev| normal(&points[prev], &points[i]));
            let after = points.get(i + 1).and_then(|next| normal(&points[i], next));
            let shift = match (before, after) {
                (Some(a), Some(b)) => {
                    let sum = a + b;
                    if sum.norm() == 0.0 {
                        a
                    } else {
                        sum.normalize()
                    }
                }
                (Some(n), None) | (None, Some(n)) => n,
                (None, None) => nalgebra::Vector2::zeros(),
            };

            points[i] + shift * offset
        })
        .collect()
}

/// Strokes lines (and polygon outlines, which are closed).
pub(crate) fn stroke_lines(
    pixmap: &mut Pixmap,
    lines: &[&Contour],
    closed: bool,
    symbolizer: &LineSymbolizer,
) {
    let color = symbolizer.stroke.with_opacity(symbolizer.stroke_opacity);
    if color.is_transparent() || symbolizer.stroke_width <= 0.0 {
        return;
    }

    let mut builder = PathBuilder::new();
    for line in lines {
        let points = offset_points(line.points(), symbolizer.offset as f64);
        add_contour(&mut builder, &points, closed);
    }

    let Some(path) = builder.finish() else {
        return;
    };

    let stroke = Stroke {
        width: symbolizer.stroke_width,
        line_cap: to_skia_cap(symbolizer.line_cap),
        line_join: to_skia_join(symbolizer.line_join),
        dash: dash(&symbolizer.dasharray),
        ..Default::default()
    };

    pixmap.stroke_path(&path, &paint(color), &stroke, Transform::identity(), None);
}

/// Draws circle markers centered at the given positions.
pub(crate) fn draw_markers(
    pixmap: &mut Pixmap,
    positions: &[Point2d],
    symbolizer: &MarkersSymbolizer,
    detector: &mut CollisionDetector,
) {
    let radius = symbolizer.width / 2.0;
    if radius <= 0.0 {
        return;
    }

    let fill = paint(symbolizer.fill.with_opacity(symbolizer.opacity));
    let outline = paint(symbolizer.stroke.with_opacity(symbolizer.opacity));
    let stroke = Stroke {
        width: symbolizer.stroke_width,
        ..Default::default()
    };

    let extent = radius as f64 + symbolizer.stroke_width as f64 / 2.0;
    for position in positions {
        let area = Rect::new(
            position.x - extent,
            position.y - extent,
            position.x + extent,
            position.y + extent,
        );
        if !detector.try_place(area, symbolizer.allow_overlap, false) {
            continue;
        }

        let Some(circle) = PathBuilder::from_circle(position.x as f32, position.y as f32, radius)
        else {
            continue;
        };

        pixmap.fill_path(&circle, &fill, FillRule::Winding, Transform::identity(), None);
        if symbolizer.stroke_width > 0.0 {
            pixmap.stroke_path(&circle, &outline, &stroke, Transform::identity(), None);
        }
    }
}

/// Fills polygons with the symbolizer image repeated from the top-left corner of the image.
pub(crate) fn fill_pattern(
    pixmap: &mut Pixmap,
    polygons: &[Polygon],
    symbolizer: &PolygonPatternSymbolizer,
) {
    if symbolizer.opacity <= 0.0 {
        return;
    }

    let Some(path) = polygons_path(polygons) else {
        return;
    };

    let paint = Paint {
        shader: Pattern::new(
            symbolizer.file.pixmap().as_ref(),
            SpreadMode::Repeat,
            FilterQuality::Nearest,
            symbolizer.opacity,
            Transform::identity(),
        ),
        anti_alias: true,
        ..Default::default()
    };
    pixmap.fill_path(&path, &paint, FillRule::EvenOdd, Transform::identity(), None);
}

/// Draws the symbolizer image centered at the given positions. Without an image a black square
/// is drawn instead.
pub(crate) fn draw_points(
    pixmap: &mut Pixmap,
    positions: &[Point2d],
    symbolizer: &PointSymbolizer,
    detector: &mut CollisionDetector,
) {
    let (width, height) = match &symbolizer.file {
        Some(image) => (image.width() as f32, image.height() as f32),
        None => (DEFAULT_POINT_SIZE, DEFAULT_POINT_SIZE),
    };

    for position in positions {
        let left = (position.x as f32 - width / 2.0).round();
        let top = (position.y as f32 - height / 2.0).round();
        let area = Rect::new(
            left as f64,
            top as f64,
            (left + width) as f64,
            (top + height) as f64,
        );
        if !detector.try_place(area, symbolizer.allow_overlap, symbolizer.ignore_placement) {
            continue;
        }

        match &symbolizer.file {
            Some(image) => pixmap.draw_pixmap(
                left as i32,
                top as i32,
                image.pixmap().as_ref(),
                &PixmapPaint {
                    opacity: symbolizer.opacity,
                    ..Default::default()
                },
                Transform::identity(),
                None,
            ),
            None => {
                if let Some(square) = tiny_skia::Rect::from_xywh(left, top, width, height) {
                    let black = paint(Color::BLACK.with_opacity(symbolizer.opacity));
                    pixmap.fill_rect(square, &black, Transform::identity(), None);
                }
            }
        }
    }
}

/// Draws polygons as extruded buildings: walls from every edge of the outer contour, in a darker
/// shade of the fill color, topped by the footprint raised by `height` pixels.
pub(crate) fn draw_buildings(
    pixmap: &mut Pixmap,
    polygons: &[Polygon],
    symbolizer: &BuildingSymbolizer,
    height: f64,
) {
    let roof_color = symbolizer.fill.with_opacity(symbolizer.fill_opacity);
    if roof_color.is_transparent() {
        return;
    }

    let wall_paint = paint(roof_color.darken(WALL_SHADE));
    let roof_paint = paint(roof_color);

    for polygon in polygons {
        // Walls further up the image are behind the ones below them.
        let points = polygon.outer_contour.points();
        let mut walls: Vec<_> = polygon.outer_contour.segments().collect();
        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            if first != last {
                walls.push((*last, *first));
            }
        }
        walls.sort_by(|(a0, a1), (b0, b1)| a0.y.max(a1.y).total_cmp(&b0.y.max(b1.y)));

        let mut builder = PathBuilder::new();
        for (from, to) in walls {
            let raised_from = Point2d::new(from.x, from.y - height);
            let raised_to = Point2d::new(to.x, to.y - height);
            add_contour(&mut builder, &[from, to, raised_to, raised_from], true);
        }

        if let Some(path) = builder.finish() {
            pixmap.fill_path(
                &path,
                &wall_paint,
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }

        let mut roof = PathBuilder::new();
        for contour in polygon.iter_contours() {
            let raised: Vec<_> = contour
                .points()
                .iter()
                .map(|p| Point2d::new(p.x, p.y - height))
                .collect();
            add_contour(&mut roof, &raised, true);
        }

        if let Some(path) = roof.finish() {
            pixmap.fill_path(
                &path,
                &roof_paint,
                FillRule::EvenOdd,
                Transform::identity(),
                None,
            );
        }
    }
}
