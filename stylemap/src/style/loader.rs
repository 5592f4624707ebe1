//! Reads map styles and layers from Mapnik-style XML documents.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use stylemap_types::geo::Crs;

use crate::color::Color;
use crate::error::MapError;
use crate::layer::{create_datasource, DatasourceParams, Layer};
use crate::map::Map;
use crate::style::filter::Filter;
use crate::style::symbol::SymbolImage;
use crate::style::symbolizer::{
    BuildingSymbolizer, LineCap, LineJoin, LineSymbolizer, MarkersSymbolizer, PointSymbolizer,
    PolygonPatternSymbolizer, PolygonSymbolizer, Symbolizer,
};
use crate::style::{FeatureTypeStyle, FilterMode, Rule};

/// Loads styles and layers from the XML file at `path` into the map.
///
/// Relative datasource and image files are resolved against the directory of the style file.
pub fn load_map(map: &mut Map, path: impl AsRef<Path>) -> Result<(), MapError> {
    let path = path.as_ref();
    let xml = std::fs::read_to_string(path).map_err(|err| MapError::io(path, err))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));

    log::debug!("Loading map style from {path:?}");
    load_map_string(map, &xml, base_dir)
}

/// Loads styles and layers from an XML string into the map.
///
/// Map level attributes (background color, SRS, buffer size) replace the current values of the
/// map. Styles with the same name as already loaded ones replace them. Layers are appended.
pub fn load_map_string(map: &mut Map, xml: &str, base_dir: &Path) -> Result<(), MapError> {
    let root = parse_document(xml)?;
    if root.name != "Map" {
        return Err(MapError::StyleParse(format!(
            "root element must be <Map>, found <{}>",
            root.name
        )));
    }

    let params = Params::from_attributes(&root);
    if let Some(color) = params.color("background-color")?.or(params.color("bgcolor")?) {
        map.set_background(color);
    }
    if let Some(srs) = params.get("srs") {
        map.set_srs(Crs::from_str(srs)?);
    }
    if let Some(buffer_size) = params.parse::<u32>("buffer-size")? {
        map.set_buffer_size(buffer_size);
    }

    for element in &root.children {
        match element.name.as_str() {
            "Style" => {
                let (name, style) = parse_style(element, base_dir)?;
                map.add_style(name, style);
            }
            "Layer" => {
                let layer = parse_layer(element, map.srs(), base_dir)?;
                map.add_layer(layer);
            }
            other => log::warn!("Skipping unsupported element <{other}> in <Map>"),
        }
    }

    log::info!(
        "Loaded {} styles and {} layers",
        map.styles().count(),
        map.layers().len()
    );

    Ok(())
}

fn parse_style(element: &Element, base_dir: &Path) -> Result<(String, FeatureTypeStyle), MapError> {
    let params = Params::from_attributes(element);
    let name = params.require("name")?.to_string();

    let mut style = FeatureTypeStyle::new();
    if let Some(opacity) = params.parse::<f32>("opacity")? {
        style.set_opacity(opacity);
    }
    match params.get("filter-mode") {
        None | Some("all") => {}
        Some("first") => style.set_filter_mode(FilterMode::First),
        Some(other) => return Err(params.invalid("filter-mode", other)),
    }

    for child in &element.children {
        match child.name.as_str() {
            "Rule" => style.add_rule(parse_rule(child, base_dir)?),
            other => log::warn!("Skipping unsupported element <{other}> in style '{name}'"),
        }
    }

    Ok((name, style))
}

fn parse_rule(element: &Element, base_dir: &Path) -> Result<Rule, MapError> {
    let mut rule = Rule {
        name: element.attributes.get("name").cloned(),
        ..Default::default()
    };

    for child in &element.children {
        match child.name.as_str() {
            "Name" => rule.name = Some(child.text.clone()),
            "Filter" => rule.filter = Some(Filter::parse(&child.text)?),
            "ElseFilter" => rule.else_filter = true,
            "MinScaleDenominator" => rule.min_scale = Some(parse_text(child)?),
            "MaxScaleDenominator" => rule.max_scale = Some(parse_text(child)?),
            "PolygonSymbolizer" => rule.symbolizers.push(parse_polygon(child)?),
            "LineSymbolizer" => rule.symbolizers.push(parse_line(child)?),
            "MarkersSymbolizer" => rule.symbolizers.push(parse_markers(child)?),
            "PointSymbolizer" => rule.symbolizers.push(parse_point(child, base_dir)?),
            "PolygonPatternSymbolizer" => {
                rule.symbolizers.push(parse_polygon_pattern(child, base_dir)?)
            }
            "BuildingSymbolizer" => rule.symbolizers.push(parse_building(child)?),
            other => log::warn!("Skipping unsupported element <{other}> in <Rule>"),
        }
    }

    Ok(rule)
}

fn parse_polygon(element: &Element) -> Result<Symbolizer, MapError> {
    let params = Params::from_symbolizer(element);
    let default = PolygonSymbolizer::default();

    Ok(Symbolizer::Polygon(PolygonSymbolizer {
        fill: params.color("fill")?.unwrap_or(default.fill),
        fill_opacity: params.parse("fill-opacity")?.unwrap_or(default.fill_opacity),
    }))
}

fn parse_line(element: &Element) -> Result<Symbolizer, MapError> {
    let params = Params::from_symbolizer(element);
    let default = LineSymbolizer::default();

    let line_join = match params.get("stroke-linejoin") {
        Some(value) => {
            LineJoin::from_name(value).ok_or_else(|| params.invalid("stroke-linejoin", value))?
        }
        None => default.line_join,
    };
    let line_cap = match params.get("stroke-linecap") {
        Some(value) => {
            LineCap::from_name(value).ok_or_else(|| params.invalid("stroke-linecap", value))?
        }
        None => default.line_cap,
    };
    let dasharray = match params.get("stroke-dasharray") {
        Some(value) => LineSymbolizer::parse_dasharray(value)
            .ok_or_else(|| params.invalid("stroke-dasharray", value))?,
        None => default.dasharray,
    };

    Ok(Symbolizer::Line(LineSymbolizer {
        stroke: params.color("stroke")?.unwrap_or(default.stroke),
        stroke_width: params.parse("stroke-width")?.unwrap_or(default.stroke_width),
        stroke_opacity: params
            .parse("stroke-opacity")?
            .unwrap_or(default.stroke_opacity),
        line_join,
        line_cap,
        dasharray,
        offset: params.parse("offset")?.unwrap_or(default.offset),
    }))
}

fn parse_markers(element: &Element) -> Result<Symbolizer, MapError> {
    let params = Params::from_symbolizer(element);
    let default = MarkersSymbolizer::default();

    Ok(Symbolizer::Markers(MarkersSymbolizer {
        fill: params.color("fill")?.unwrap_or(default.fill),
        stroke: params.color("stroke")?.unwrap_or(default.stroke),
        stroke_width: params.parse("stroke-width")?.unwrap_or(default.stroke_width),
        width: params.parse("width")?.unwrap_or(default.width),
        opacity: params.parse("opacity")?.unwrap_or(default.opacity),
        allow_overlap: params
            .bool("allow-overlap")?
            .unwrap_or(default.allow_overlap),
    }))
}

fn parse_point(element: &Element, base_dir: &Path) -> Result<Symbolizer, MapError> {
    let params = Params::from_symbolizer(element);
    let default = PointSymbolizer::default();

    Ok(Symbolizer::Point(PointSymbolizer {
        file: params.image("file", base_dir)?,
        opacity: params.parse("opacity")?.unwrap_or(default.opacity),
        allow_overlap: params
            .bool("allow-overlap")?
            .unwrap_or(default.allow_overlap),
        ignore_placement: params
            .bool("ignore-placement")?
            .unwrap_or(default.ignore_placement),
    }))
}

fn parse_polygon_pattern(element: &Element, base_dir: &Path) -> Result<Symbolizer, MapError> {
    let params = Params::from_symbolizer(element);
    let file = params.require("file")?;

    Ok(Symbolizer::PolygonPattern(PolygonPatternSymbolizer {
        file: SymbolImage::load(base_dir.join(file.trim()))?,
        opacity: params.parse("opacity")?.unwrap_or(1.0),
    }))
}

fn parse_building(element: &Element) -> Result<Symbolizer, MapError> {
    let params = Params::from_symbolizer(element);
    let default = BuildingSymbolizer::default();

    Ok(Symbolizer::Building(BuildingSymbolizer {
        fill: params.color("fill")?.unwrap_or(default.fill),
        fill_opacity: params.parse("fill-opacity")?.unwrap_or(default.fill_opacity),
        height: params
            .get("height")
            .map(Filter::parse)
            .transpose()?
            .unwrap_or(default.height),
    }))
}

fn parse_layer(element: &Element, default_srs: &Crs, base_dir: &Path) -> Result<Layer, MapError> {
    let params = Params::from_attributes(element);
    let name = params.require("name")?;
    let srs = match params.get("srs") {
        Some(srs) => Crs::from_str(srs)?,
        None => default_srs.clone(),
    };
    let active = match params.get("status") {
        None | Some("on") => true,
        Some("off") => false,
        Some(other) => return Err(params.invalid("status", other)),
    };

    let mut style_names = vec![];
    let mut datasource = None;
    for child in &element.children {
        match child.name.as_str() {
            "StyleName" => style_names.push(child.text.clone()),
            "Datasource" => {
                let mut datasource_params = DatasourceParams::new();
                for parameter in child.children.iter().filter(|c| c.name == "Parameter") {
                    let param_name = Params::from_attributes(parameter).require("name")?.to_string();
                    datasource_params.insert(param_name, parameter.text.clone());
                }

                datasource = Some(create_datasource(&datasource_params, base_dir)?);
            }
            other => log::warn!("Skipping unsupported element <{other}> in layer '{name}'"),
        }
    }

    let datasource = datasource
        .ok_or_else(|| MapError::StyleParse(format!("layer '{name}' has no <Datasource>")))?;

    let mut layer = Layer::with_boxed_datasource(name, srs, datasource);
    for style_name in style_names {
        layer.add_style(style_name);
    }
    layer.set_active(active);

    Ok(layer)
}

fn parse_text<T: FromStr>(element: &Element) -> Result<T, MapError> {
    element.text.trim().parse().map_err(|_| {
        MapError::StyleParse(format!(
            "invalid value '{}' of <{}>",
            element.text, element.name
        ))
    })
}

/// Attributes (and `<CssParameter>` values) of an element.
struct Params<'a> {
    element: &'a str,
    values: HashMap<&'a str, &'a str>,
}

impl<'a> Params<'a> {
    fn from_attributes(element: &'a Element) -> Self {
        Self {
            element: &element.name,
            values: element
                .attributes
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect(),
        }
    }

    /// Symbolizer parameters can be given as attributes or as legacy `<CssParameter>` children.
    fn from_symbolizer(element: &'a Element) -> Self {
        let mut params = Self::from_attributes(element);
        for child in &element.children {
            if child.name != "CssParameter" {
                log::warn!("Skipping unsupported element <{}> in <{}>", child.name, element.name);
                continue;
            }

            match child.attributes.get("name") {
                Some(name) => {
                    params.values.insert(name.as_str(), child.text.as_str());
                }
                None => log::warn!("<CssParameter> without name in <{}>", element.name),
            }
        }

        params
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.values.get(key).copied()
    }

    fn require(&self, key: &str) -> Result<&'a str, MapError> {
        self.get(key).ok_or_else(|| {
            MapError::StyleParse(format!(
                "<{}> is missing required attribute '{key}'",
                self.element
            ))
        })
    }

    fn invalid(&self, key: &str, value: &str) -> MapError {
        MapError::StyleParse(format!(
            "invalid value '{value}' of '{key}' in <{}>",
            self.element
        ))
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, MapError> {
        self.get(key)
            .map(|value| value.trim().parse().map_err(|_| self.invalid(key, value)))
            .transpose()
    }

    fn color(&self, key: &str) -> Result<Option<Color>, MapError> {
        self.get(key)
            .map(|value| Color::from_str(value.trim()).map_err(|_| self.invalid(key, value)))
            .transpose()
    }

    /// Loads the image named by the parameter. Relative paths are resolved against `base_dir`.
    fn image(&self, key: &str, base_dir: &Path) -> Result<Option<SymbolImage>, MapError> {
        self.get(key)
            .map(|file| SymbolImage::load(base_dir.join(file.trim())))
            .transpose()
    }

    fn bool(&self, key: &str) -> Result<Option<bool>, MapError> {
        self.get(key)
            .map(|value| match value.trim() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(self.invalid(key, value)),
            })
            .transpose()
    }
}

/// Generic XML element tree, built before interpreting the document.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: HashMap<String, String>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn from_start(start: &BytesStart) -> Result<Self, MapError> {
        let mut attributes = HashMap::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            attributes.insert(key, attribute.unescape_value()?.into_owned());
        }

        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            ..Default::default()
        })
    }
}

fn parse_document(xml: &str) -> Result<Element, MapError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = vec![];
    let mut root = None;

    loop {
        let finished = match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                stack.push(Element::from_start(&start)?);
                None
            }
            Event::Empty(start) => Some(Element::from_start(&start)?),
            Event::End(_) => stack.pop(),
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape()?);
                }
                None
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
                None
            }
            Event::Eof => break,
            _ => None,
        };

        if let Some(element) = finished {
            match stack.last_mut() {
                Some(parent) => parent.children.push(element),
                None if root.is_none() => root = Some(element),
                None => {
                    return Err(MapError::StyleParse(
                        "document has more than one root element".into(),
                    ))
                }
            }
        }

        buf.clear();
    }

    if let Some(unclosed) = stack.last() {
        return Err(MapError::StyleParse(format!(
            "element <{}> is not closed",
            unclosed.name
        )));
    }

    root.ok_or_else(|| MapError::StyleParse("document is empty".into()))
}
