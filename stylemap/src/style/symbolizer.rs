//! Symbolizers describe how the features matched by a rule are drawn.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::style::filter::Filter;
use crate::style::symbol::SymbolImage;

/// Drawing instruction of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Symbolizer {
    /// Fills polygon interiors.
    Polygon(PolygonSymbolizer),
    /// Strokes lines and polygon outlines.
    Line(LineSymbolizer),
    /// Draws a marker at every point, or at the middle of lines and polygons.
    Markers(MarkersSymbolizer),
    /// Draws an image at every point, or at the middle of lines and polygons.
    Point(PointSymbolizer),
    /// Fills polygon interiors with a repeated image.
    PolygonPattern(PolygonPatternSymbolizer),
    /// Draws polygons as extruded buildings.
    Building(BuildingSymbolizer),
}

/// Polygon fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolygonSymbolizer {
    /// Fill color.
    pub fill: Color,
    /// Opacity multiplied into the fill color alpha.
    pub fill_opacity: f32,
}

impl Default for PolygonSymbolizer {
    fn default() -> Self {
        Self {
            fill: Color::GRAY,
            fill_opacity: 1.0,
        }
    }
}

/// The way line segments are connected to each other.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineJoin {
    /// Sharp corner.
    #[default]
    Miter,
    /// Rounded corner.
    Round,
    /// Cut-off corner.
    Bevel,
}

/// The way line ends are drawn.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineCap {
    /// Line ends exactly at its end point.
    #[default]
    Butt,
    /// Half-circle around the end point.
    Round,
    /// Half-square around the end point.
    Square,
}

impl LineJoin {
    /// Parses `stroke-linejoin` value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "miter" | "miter_revert" => Some(Self::Miter),
            "round" => Some(Self::Round),
            "bevel" => Some(Self::Bevel),
            _ => None,
        }
    }
}

impl LineCap {
    /// Parses `stroke-linecap` value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "butt" => Some(Self::Butt),
            "round" => Some(Self::Round),
            "square" => Some(Self::Square),
            _ => None,
        }
    }
}

/// Line stroke. All sizes are in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSymbolizer {
    /// Stroke color.
    pub stroke: Color,
    /// Stroke width.
    pub stroke_width: f32,
    /// Opacity multiplied into the stroke color alpha.
    pub stroke_opacity: f32,
    /// Segment joins.
    pub line_join: LineJoin,
    /// Line ends.
    pub line_cap: LineCap,
    /// Alternating dash and gap lengths. Empty for solid lines.
    pub dasharray: Vec<f32>,
    /// Perpendicular offset of the line, positive to the left of the line direction.
    pub offset: f32,
}

impl Default for LineSymbolizer {
    fn default() -> Self {
        Self {
            stroke: Color::BLACK,
            stroke_width: 1.0,
            stroke_opacity: 1.0,
            line_join: LineJoin::default(),
            line_cap: LineCap::default(),
            dasharray: vec![],
            offset: 0.0,
        }
    }
}

impl LineSymbolizer {
    /// Parses a dash array like `"5,2"` or `"5 2 1 2"`.
    ///
    /// Returns `None` if any of the values is not a positive number or the list is empty.
    pub fn parse_dasharray(value: &str) -> Option<Vec<f32>> {
        let dashes = value
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<f32>().ok().filter(|v| *v >= 0.0))
            .collect::<Option<Vec<_>>>()?;

        if dashes.is_empty() || dashes.iter().all(|v| *v == 0.0) {
            return None;
        }

        Some(dashes)
    }
}

/// Circle marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkersSymbolizer {
    /// Fill color of the circle.
    pub fill: Color,
    /// Outline color.
    pub stroke: Color,
    /// Outline width in pixels. Zero disables the outline.
    pub stroke_width: f32,
    /// Diameter in pixels.
    pub width: f32,
    /// Opacity of the whole marker.
    pub opacity: f32,
    /// If false, markers overlapping an already drawn marker are skipped.
    pub allow_overlap: bool,
}

impl Default for MarkersSymbolizer {
    fn default() -> Self {
        Self {
            fill: Color::BLUE,
            stroke: Color::BLACK,
            stroke_width: 0.5,
            width: 10.0,
            opacity: 1.0,
            allow_overlap: false,
        }
    }
}

/// Image placed at feature positions, sharing the collision space with markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointSymbolizer {
    /// Image centered at the position. Without an image a small black square is drawn.
    pub file: Option<SymbolImage>,
    /// Opacity of the image.
    pub opacity: f32,
    /// If true, the image is drawn even if it overlaps already placed symbols.
    pub allow_overlap: bool,
    /// If true, the image does not take space, so later symbols may overlap it.
    pub ignore_placement: bool,
}

impl Default for PointSymbolizer {
    fn default() -> Self {
        Self {
            file: None,
            opacity: 1.0,
            allow_overlap: false,
            ignore_placement: false,
        }
    }
}

/// Polygon fill with an image repeated over the whole map, so that neighbouring polygons share
/// the same pattern grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonPatternSymbolizer {
    /// Pattern tile.
    pub file: SymbolImage,
    /// Opacity of the pattern.
    #[serde(default = "full_opacity")]
    pub opacity: f32,
}

fn full_opacity() -> f32 {
    1.0
}

/// Pseudo-3d building drawn from a footprint polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingSymbolizer {
    /// Roof color. Walls are drawn with a darker shade of it.
    pub fill: Color,
    /// Opacity multiplied into the fill color alpha.
    pub fill_opacity: f32,
    /// Height of the building in pixels, usually an attribute like `[height]`.
    pub height: Filter,
}

impl Default for BuildingSymbolizer {
    fn default() -> Self {
        Self {
            fill: Color::GRAY,
            fill_opacity: 1.0,
            height: Filter::number(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dasharray() {
        assert_eq!(
            LineSymbolizer::parse_dasharray("5,2"),
            Some(vec![5.0, 2.0])
        );
        assert_eq!(
            LineSymbolizer::parse_dasharray(" 4 2, 1 2 "),
            Some(vec![4.0, 2.0, 1.0, 2.0])
        );
        assert_eq!(LineSymbolizer::parse_dasharray(""), None);
        assert_eq!(LineSymbolizer::parse_dasharray("0,0"), None);
        assert_eq!(LineSymbolizer::parse_dasharray("5,-1"), None);
        assert_eq!(LineSymbolizer::parse_dasharray("5,a"), None);
    }

    #[test]
    fn line_style_names() {
        assert_eq!(LineJoin::from_name("round"), Some(LineJoin::Round));
        assert_eq!(LineJoin::from_name("miter_revert"), Some(LineJoin::Miter));
        assert_eq!(LineCap::from_name("square"), Some(LineCap::Square));
        assert_eq!(LineCap::from_name("pointy"), None);
    }

    #[test]
    fn deserialize_building_height() {
        let symbolizer: Symbolizer =
            serde_json::from_str(r#"{ "type": "building", "height": "[levels]" }"#).unwrap();
        assert_eq!(
            symbolizer,
            Symbolizer::Building(BuildingSymbolizer {
                height: Filter::parse("[levels]").unwrap(),
                ..Default::default()
            })
        );
    }

    #[test]
    fn deserialize_with_defaults() {
        let symbolizer: Symbolizer =
            serde_json::from_str(r##"{ "type": "line", "stroke": "#ff0000", "stroke_width": 2 }"##)
                .unwrap();
        assert_eq!(
            symbolizer,
            Symbolizer::Line(LineSymbolizer {
                stroke: Color::RED,
                stroke_width: 2.0,
                ..Default::default()
            })
        );
    }
}
