//! Rule filter expressions, such as `[highway] = 'primary' and not ([tunnel] = 'yes')`.

use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};

use regex::Regex;
use serde::{Deserialize, Serialize};
use stylemap_types::Geometry;

use crate::error::MapError;
use crate::layer::{Feature, Value};

/// Name of the pseudo-attribute holding the geometry type of a feature.
pub const GEOMETRY_TYPE_ATTRIBUTE: &str = "mapnik::geometry_type";

/// Parsed expression. Used both as a rule filter and as a feature dependent symbolizer value,
/// such as the height of a building.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Filter {
    source: String,
    expression: Expression,
}

impl Debug for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Filter({:?})", self.source)
    }
}

impl PartialEq for Filter {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl TryFrom<String> for Filter {
    type Error = MapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Filter> for String {
    fn from(val: Filter) -> Self {
        val.source
    }
}

impl Filter {
    /// Expression evaluating to the given number for every feature.
    pub fn number(value: f64) -> Self {
        Self {
            source: value.to_string(),
            expression: Expression::Literal(Value::Number(value)),
        }
    }

    /// Parses an expression.
    pub fn parse(source: &str) -> Result<Self, MapError> {
        let tokens = tokenize(source).map_err(|reason| MapError::Filter {
            expression: source.to_string(),
            reason,
        })?;
        let mut parser = Parser { tokens, position: 0 };
        let expression = parser.parse().map_err(|reason| MapError::Filter {
            expression: source.to_string(),
            reason,
        })?;

        Ok(Self {
            source: source.trim().to_string(),
            expression,
        })
    }

    /// Original text of the expression.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the expression for the feature.
    pub fn evaluate(&self, feature: &Feature) -> Value {
        self.expression.evaluate(feature)
    }

    /// Returns true if the feature satisfies the filter.
    pub fn matches(&self, feature: &Feature) -> bool {
        self.evaluate(feature).is_truthy()
    }

    /// Evaluates the expression as a number. Values without a numeric representation are 0.
    pub fn evaluate_f64(&self, feature: &Feature) -> f64 {
        self.evaluate(feature).as_f64().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone)]
enum Expression {
    Literal(Value),
    Attribute(String),
    Not(Box<Expression>),
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Match {
        operand: Box<Expression>,
        pattern: Regex,
    },
}

impl Expression {
    fn evaluate(&self, feature: &Feature) -> Value {
        match self {
            Expression::Literal(value) => value.clone(),
            Expression::Attribute(name) if name == GEOMETRY_TYPE_ATTRIBUTE => {
                Value::Number(geometry_type_code(&feature.geometry))
            }
            Expression::Attribute(name) => feature.get(name).clone(),
            Expression::Not(inner) => Value::Bool(!inner.evaluate(feature).is_truthy()),
            Expression::Binary { op, left, right } => {
                let left = left.evaluate(feature);
                match op {
                    BinaryOp::And => {
                        Value::Bool(left.is_truthy() && right.evaluate(feature).is_truthy())
                    }
                    BinaryOp::Or => {
                        Value::Bool(left.is_truthy() || right.evaluate(feature).is_truthy())
                    }
                    _ => Value::Bool(compare(*op, &left, &right.evaluate(feature))),
                }
            }
            Expression::Match { operand, pattern } => {
                Value::Bool(pattern.is_match(&operand.evaluate(feature).to_string()))
            }
        }
    }
}

fn geometry_type_code(geometry: &Geometry) -> f64 {
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => 1.0,
        Geometry::LineString(_) | Geometry::MultiLineString(_) => 2.0,
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) => 3.0,
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    let ordering = match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(_), _) | (_, Value::Number(_)) | (Value::Bool(_), _) => {
            match (left.as_f64(), right.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => Some(left.to_string().cmp(&right.to_string())),
            }
        }
        (Value::String(_), Value::Bool(_)) => left
            .as_f64()
            .zip(right.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b)),
    };

    match (op, ordering) {
        (BinaryOp::Neq, None) => true,
        (_, None) => false,
        (BinaryOp::Eq, Some(o)) => o == Ordering::Equal,
        (BinaryOp::Neq, Some(o)) => o != Ordering::Equal,
        (BinaryOp::Lt, Some(o)) => o == Ordering::Less,
        (BinaryOp::Le, Some(o)) => o != Ordering::Greater,
        (BinaryOp::Gt, Some(o)) => o == Ordering::Greater,
        (BinaryOp::Ge, Some(o)) => o != Ordering::Less,
        (BinaryOp::And | BinaryOp::Or, Some(_)) => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Attribute(String),
    String(String),
    Number(f64),
    Ident(String),
    Op(BinaryOp),
    Not,
    Minus,
    Dot,
    LParen,
    RParen,
}

/// Length of the number literal at the start of `chars`: digits with an optional fraction and an
/// optional exponent, which may be signed.
fn number_len(chars: &[char]) -> usize {
    let digits = |from: usize| {
        chars[from..]
            .iter()
            .position(|c| !(c.is_ascii_digit() || *c == '.'))
            .map_or(chars.len(), |len| from + len)
    };

    let mantissa = digits(0);
    if !matches!(chars.get(mantissa), Some('e' | 'E')) {
        return mantissa;
    }

    let mut exponent = mantissa + 1;
    if matches!(chars.get(exponent), Some('+' | '-')) {
        exponent += 1;
    }

    digits(exponent)
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = vec![];
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '[' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&c| c == ']')
                    .ok_or("unterminated attribute name")?;
                let name: String = chars[i + 1..i + 1 + end].iter().collect();
                tokens.push(Token::Attribute(name.trim().to_string()));
                i += end + 2;
            }
            '\'' | '"' => {
                let mut value = String::new();
                let mut j = i + 1;
                loop {
                    match chars.get(j) {
                        None => return Err("unterminated string literal".into()),
                        Some('\\') => {
                            let escaped = chars.get(j + 1).ok_or("unterminated string literal")?;
                            value.push(*escaped);
                            j += 2;
                        }
                        Some(&ch) if ch == c => break,
                        Some(&ch) => {
                            value.push(ch);
                            j += 1;
                        }
                    }
                }
                tokens.push(Token::String(value));
                i = j + 1;
            }
            '0'..='9' => {
                let len = number_len(&chars[i..]);
                let text: String = chars[i..i + len].iter().collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{text}'"))?;
                tokens.push(Token::Number(number));
                i += len;
            }
            c if c.is_alphabetic() || c == '_' => {
                let len = chars[i..]
                    .iter()
                    .position(|c| !(c.is_alphanumeric() || *c == '_'))
                    .unwrap_or(chars.len() - i);
                let word: String = chars[i..i + len].iter().collect();
                tokens.push(match word.to_ascii_lowercase().as_str() {
                    "and" => Token::Op(BinaryOp::And),
                    "or" => Token::Op(BinaryOp::Or),
                    "not" => Token::Not,
                    "eq" => Token::Op(BinaryOp::Eq),
                    "neq" => Token::Op(BinaryOp::Neq),
                    "lt" => Token::Op(BinaryOp::Lt),
                    "le" => Token::Op(BinaryOp::Le),
                    "gt" => Token::Op(BinaryOp::Gt),
                    "ge" => Token::Op(BinaryOp::Ge),
                    _ => Token::Ident(word),
                });
                i += len;
            }
            '=' => {
                tokens.push(Token::Op(BinaryOp::Eq));
                i += if next == Some('=') { 2 } else { 1 };
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op(BinaryOp::Neq));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' => {
                let (op, len) = match next {
                    Some('=') => (BinaryOp::Le, 2),
                    Some('>') => (BinaryOp::Neq, 2),
                    _ => (BinaryOp::Lt, 1),
                };
                tokens.push(Token::Op(op));
                i += len;
            }
            '>' => {
                let (op, len) = match next {
                    Some('=') => (BinaryOp::Ge, 2),
                    _ => (BinaryOp::Gt, 1),
                };
                tokens.push(Token::Op(op));
                i += len;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::Op(BinaryOp::And));
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Op(BinaryOp::Or));
                i += 2;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn parse(&mut self) -> Result<Expression, String> {
        if self.tokens.is_empty() {
            return Err("expression is empty".into());
        }

        let expression = self.parse_or()?;
        match self.peek() {
            None => Ok(expression),
            Some(token) => Err(format!("unexpected token {token:?}")),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        self.position += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected {expected:?}, found {token:?}")),
            None => Err(format!("expected {expected:?}, found end of expression")),
        }
    }

    fn parse_or(&mut self) -> Result<Expression, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Op(BinaryOp::Or)) {
            self.position += 1;
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression, String> {
        let mut left = self.parse_not()?;
        while self.peek() == Some(&Token::Op(BinaryOp::And)) {
            self.position += 1;
            let right = self.parse_not()?;
            left = binary(BinaryOp::And, left, right);
        }

        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expression, String> {
        if self.peek() == Some(&Token::Not) {
            self.position += 1;
            return Ok(Expression::Not(Box::new(self.parse_not()?)));
        }

        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expression, String> {
        let left = self.parse_primary()?;
        match self.peek() {
            Some(Token::Op(op)) if !matches!(op, BinaryOp::And | BinaryOp::Or) => {
                let op = *op;
                self.position += 1;
                let right = self.parse_primary()?;
                Ok(binary(op, left, right))
            }
            _ => Ok(left),
        }
    }

    fn parse_primary(&mut self) -> Result<Expression, String> {
        let expression = match self.next() {
            Some(Token::Attribute(name)) => Expression::Attribute(name),
            Some(Token::String(value)) => Expression::Literal(Value::String(value)),
            Some(Token::Number(value)) => Expression::Literal(Value::Number(value)),
            Some(Token::Minus) => match self.next() {
                Some(Token::Number(value)) => Expression::Literal(Value::Number(-value)),
                _ => return Err("'-' must be followed by a number".into()),
            },
            Some(Token::Ident(word)) => Expression::Literal(keyword_value(&word)?),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                inner
            }
            Some(token) => return Err(format!("unexpected token {token:?}")),
            None => return Err("unexpected end of expression".into()),
        };

        if self.peek() == Some(&Token::Dot) {
            self.position += 1;
            match self.next() {
                Some(Token::Ident(method)) if method == "match" => {}
                other => return Err(format!("unknown method {other:?}")),
            }
            self.expect(Token::LParen)?;
            let Some(Token::String(pattern)) = self.next() else {
                return Err("match() expects a string pattern".into());
            };
            self.expect(Token::RParen)?;

            let pattern = Regex::new(&format!("^(?:{pattern})$"))
                .map_err(|err| format!("invalid regular expression: {err}"))?;
            return Ok(Expression::Match {
                operand: Box::new(expression),
                pattern,
            });
        }

        Ok(expression)
    }
}

fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn keyword_value(word: &str) -> Result<Value, String> {
    Ok(match word.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        "point" => Value::Number(1.0),
        "linestring" => Value::Number(2.0),
        "polygon" => Value::Number(3.0),
        _ => return Err(format!("unknown keyword '{word}'")),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use stylemap_types::{Contour, Point2d};

    use super::*;

    fn road(highway: &str, lanes: f64) -> Feature {
        Feature::new(
            1,
            Geometry::LineString(Contour::new(vec![
                Point2d::new(0.0, 0.0),
                Point2d::new(1.0, 1.0),
            ])),
        )
        .with_property("highway", highway)
        .with_property("lanes", lanes)
    }

    fn matches(expression: &str, feature: &Feature) -> bool {
        Filter::parse(expression).unwrap().matches(feature)
    }

    #[test]
    fn equality() {
        let feature = road("primary", 2.0);
        assert!(matches("[highway] = 'primary'", &feature));
        assert!(matches("[highway]=\"primary\"", &feature));
        assert!(!matches("[highway] = 'secondary'", &feature));
        assert!(matches("[highway] != 'secondary'", &feature));
        assert!(matches("[highway] <> 'secondary'", &feature));
        assert!(matches("[lanes] = 2", &feature));
        assert!(matches("[lanes] = '2'", &feature));
    }

    #[test]
    fn numeric_comparison() {
        let feature = road("primary", 2.0);
        assert!(matches("[lanes] > 1", &feature));
        assert!(matches("[lanes] >= 2", &feature));
        assert!(!matches("[lanes] < 2", &feature));
        assert!(matches("[lanes] <= 2.5", &feature));
        assert!(matches("[lanes] > -1", &feature));
        assert!(matches("[lanes] > 1.5e-3", &feature));
        assert!(matches("[lanes] = 2E+0", &feature));
        assert!(matches("[lanes] < 1e1", &feature));
        assert!(Filter::parse("[lanes] > 1e-").is_err());
    }

    #[test]
    fn logic_operators() {
        let feature = road("primary", 2.0);
        assert!(matches(
            "[highway] = 'primary' and [lanes] = 2 or [highway] = 'none'",
            &feature
        ));
        assert!(matches("not ([highway] = 'motorway')", &feature));
        assert!(matches("![missing]", &feature));
        assert!(matches("[highway] = 'trunk' || ([lanes] > 1 && [lanes] < 3)", &feature));
        assert!(!matches("[highway] = 'trunk' or [lanes] > 3", &feature));
    }

    #[test]
    fn missing_attribute() {
        let feature = road("primary", 2.0);
        assert!(!matches("[name] = 'Main street'", &feature));
        assert!(matches("[name] != 'Main street'", &feature));
        assert!(matches("[name] = null", &feature));
        assert!(!matches("[name] > 1", &feature));
    }

    #[test]
    fn regex_match() {
        let feature = road("primary_link", 1.0);
        assert!(matches("[highway].match('.*_link')", &feature));
        assert!(!matches("[highway].match('primary')", &feature));
    }

    #[test]
    fn geometry_type() {
        let feature = road("primary", 2.0);
        assert!(matches("[mapnik::geometry_type] = linestring", &feature));
        assert!(!matches("[mapnik::geometry_type] = polygon", &feature));
    }

    #[test]
    fn parse_errors() {
        assert_matches!(Filter::parse(""), Err(MapError::Filter { .. }));
        assert_matches!(Filter::parse("[highway = 'x'"), Err(MapError::Filter { .. }));
        assert_matches!(Filter::parse("[highway] = 'x"), Err(MapError::Filter { .. }));
        assert_matches!(Filter::parse("([a] = 1"), Err(MapError::Filter { .. }));
        assert_matches!(Filter::parse("[a] = 1 [b]"), Err(MapError::Filter { .. }));
        assert_matches!(Filter::parse("[a] = bogus"), Err(MapError::Filter { .. }));
        assert_matches!(Filter::parse("[a] # 1"), Err(MapError::Filter { reason, .. }) if reason.contains('#'));
    }

    #[test]
    fn numeric_values() {
        let feature = road("primary", 2.0).with_property("height", "12.5");
        assert_eq!(Filter::parse("[lanes]").unwrap().evaluate_f64(&feature), 2.0);
        assert_eq!(Filter::parse("[height]").unwrap().evaluate_f64(&feature), 12.5);
        assert_eq!(Filter::parse("[missing]").unwrap().evaluate_f64(&feature), 0.0);
        assert_eq!(Filter::parse("[highway]").unwrap().evaluate_f64(&feature), 0.0);
        assert_eq!(Filter::number(-3.0).evaluate_f64(&feature), -3.0);
    }

    #[test]
    fn serialized_as_source() {
        let filter: Filter = serde_json::from_str(r#""[lanes] > 1""#).unwrap();
        assert!(filter.matches(&road("primary", 2.0)));
        assert_eq!(serde_json::to_string(&filter).unwrap(), r#""[lanes] > 1""#);

        let json = serde_json::to_string(&Filter::number(-2.5)).unwrap();
        let number: Filter = serde_json::from_str(&json).unwrap();
        assert_eq!(number, Filter::number(-2.5));
        assert!(serde_json::from_str::<Filter>(r#""[lanes] >""#).is_err());
    }
}
