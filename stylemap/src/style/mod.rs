//! Named styles made of rules that select features and draw them with symbolizers.

mod filter;
mod loader;
mod symbol;
mod symbolizer;

pub use filter::{Filter, GEOMETRY_TYPE_ATTRIBUTE};
pub use loader::{load_map, load_map_string};
pub use symbol::SymbolImage;
pub use symbolizer::{
    BuildingSymbolizer, LineCap, LineJoin, LineSymbolizer, MarkersSymbolizer,
    PointSymbolizer, PolygonPatternSymbolizer, PolygonSymbolizer, Symbolizer,
};

use crate::layer::Feature;

/// Which of the matching rules are applied to a feature.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Every matching rule is applied.
    #[default]
    All,
    /// Only the first matching rule is applied.
    First,
}

/// Set of rules applied together to the features of a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTypeStyle {
    rules: Vec<Rule>,
    opacity: f32,
    filter_mode: FilterMode,
}

impl Default for FeatureTypeStyle {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureTypeStyle {
    /// Creates an empty opaque style.
    pub fn new() -> Self {
        Self {
            rules: vec![],
            opacity: 1.0,
            filter_mode: FilterMode::All,
        }
    }

    /// Appends a rule.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Builder-style version of [`FeatureTypeStyle::add_rule`].
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.add_rule(rule);
        self
    }

    /// Rules of the style in the order they are applied.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Opacity the whole style is composited with.
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Sets the opacity, clamped into `0..=1`.
    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    /// Rule selection mode.
    pub fn filter_mode(&self) -> FilterMode {
        self.filter_mode
    }

    /// Sets the rule selection mode.
    pub fn set_filter_mode(&mut self, filter_mode: FilterMode) {
        self.filter_mode = filter_mode;
    }

    /// Rules that apply to `feature` at the given scale, in application order.
    ///
    /// Rules with a filter (or without one and not marked as else-rules) are tried first. Else-rules
    /// are used only when none of the regular rules active at this scale matched.
    pub fn matching_rules<'a>(
        &'a self,
        feature: &'a Feature,
        scale_denominator: f64,
    ) -> impl Iterator<Item = &'a Rule> + 'a {
        let active = move || {
            self.rules
                .iter()
                .filter(move |rule| rule.is_active(scale_denominator))
        };

        let mut regular: Vec<&Rule> = active()
            .filter(|rule| !rule.else_filter && rule.matches(feature))
            .collect();
        if self.filter_mode == FilterMode::First {
            regular.truncate(1);
        }

        let else_rules: Vec<&Rule> = if regular.is_empty() {
            active().filter(|rule| rule.else_filter).collect()
        } else {
            vec![]
        };

        regular.into_iter().chain(else_rules)
    }
}

/// Selects features by attribute filter and scale range, and lists the symbolizers to draw
/// them with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rule {
    /// Optional name, used only for diagnostics.
    pub name: Option<String>,
    /// Filter the features must satisfy. `None` matches every feature.
    pub filter: Option<Filter>,
    /// Else-rules are applied only to features no regular rule matched.
    pub else_filter: bool,
    /// Lower bound of the scale range (inclusive).
    pub min_scale: Option<f64>,
    /// Upper bound of the scale range (exclusive).
    pub max_scale: Option<f64>,
    /// Drawing instructions, in drawing order.
    pub symbolizers: Vec<Symbolizer>,
}

impl Rule {
    /// Creates a rule matching everything with the given symbolizers.
    pub fn new(symbolizers: Vec<Symbolizer>) -> Self {
        Self {
            symbolizers,
            ..Default::default()
        }
    }

    /// Sets the filter of the rule.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Returns true if the rule applies at the given scale denominator.
    pub fn is_active(&self, scale_denominator: f64) -> bool {
        self.min_scale.map_or(true, |min| scale_denominator >= min)
            && self.max_scale.map_or(true, |max| scale_denominator < max)
    }

    /// Returns true if the feature passes the filter of the rule.
    pub fn matches(&self, feature: &Feature) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |filter| filter.matches(feature))
    }
}
