use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use stylemap_types::Geometry;

/// Attribute value of a feature.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Missing or null value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Any number.
    Number(f64),
    /// Text.
    String(String),
}

impl Value {
    /// Numeric representation of the value, if it has one. Strings are parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Null => None,
            Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            Value::Number(v) => Some(*v),
            Value::String(v) => v.trim().parse().ok(),
        }
    }

    /// Truthiness of the value when used as a filter condition.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(v) => *v,
            Value::Number(v) => *v != 0.0,
            Value::String(v) => !v.is_empty(),
        }
    }

    /// Parses a textual attribute (as found in CSV files) into the most specific value type.
    pub fn infer(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Value::Null
        } else if let Ok(number) = trimmed.parse::<f64>() {
            Value::Number(number)
        } else if trimmed.eq_ignore_ascii_case("true") {
            Value::Bool(true)
        } else if trimmed.eq_ignore_ascii_case("false") {
            Value::Bool(false)
        } else {
            Value::String(text.to_string())
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Number(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(v) => Value::Bool(v),
            serde_json::Value::Number(v) => v.as_f64().map(Value::Number).unwrap_or_default(),
            serde_json::Value::String(v) => Value::String(v),
            other => Value::String(other.to_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

/// Geographic object with attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Identifier of the feature inside its datasource.
    pub id: u64,
    /// Geometry in the coordinate system of the layer.
    pub geometry: Geometry,
    /// Attributes.
    pub properties: HashMap<String, Value>,
}

impl Feature {
    /// Creates a feature without attributes.
    pub fn new(id: u64, geometry: Geometry) -> Self {
        Self {
            id,
            geometry,
            properties: HashMap::new(),
        }
    }

    /// Adds an attribute to the feature.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Value of an attribute. Missing attributes are [`Value::Null`].
    pub fn get(&self, name: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        self.properties.get(name).unwrap_or(NULL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_values() {
        assert_eq!(Value::infer("12.5"), Value::Number(12.5));
        assert_eq!(Value::infer("TRUE"), Value::Bool(true));
        assert_eq!(Value::infer(""), Value::Null);
        assert_eq!(Value::infer("Munich"), Value::String("Munich".into()));
    }

    #[test]
    fn json_values() {
        assert_eq!(Value::from(serde_json::json!(3)), Value::Number(3.0));
        assert_eq!(Value::from(serde_json::json!(null)), Value::Null);
        assert_eq!(
            Value::from(serde_json::json!([1, 2])),
            Value::String("[1,2]".into())
        );
    }

    #[test]
    fn missing_property_is_null() {
        let feature = Feature::new(1, Geometry::Point(stylemap_types::Point2d::new(0.0, 0.0)))
            .with_property("name", "river");
        assert_eq!(feature.get("name"), &Value::from("river"));
        assert_eq!(feature.get("other"), &Value::Null);
    }
}
