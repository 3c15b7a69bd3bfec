//! Typed parameter conversion.
//!
//! Every command declares an ordered list of converters; each converter is
//! a pure function from one raw parameter string to one [`Value`] or a
//! taxonomy error. Numeric converters additionally accept a closed set of
//! case-insensitive symbolic keywords — `MINimum`, `MAXimum`, `DEFault`
//! and (for floats) `NAN` — plus caller-defined keyword aliases declared
//! SCPI-style and matched by both their long and short forms.

use std::collections::HashMap;

use crate::error::ScpiError;
use crate::pattern::stem_forms;

/// A converted parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// An on/off flag.
    Bool(bool),
    /// An uninterpreted string.
    Str(String),
}

/// The ordered, typed parameter list handed to a command handler.
#[derive(Debug, Clone, Default)]
pub struct Args(Vec<Value>);

impl Args {
    /// Wrap an ordered list of converted values.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no parameters were supplied.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The integer at `ix`.
    pub fn int(&self, ix: usize) -> Result<i64, ScpiError> {
        match self.0.get(ix) {
            Some(Value::Int(v)) => Ok(*v),
            _ => Err(ScpiError::DataType),
        }
    }

    /// The float at `ix`; integers widen.
    pub fn float(&self, ix: usize) -> Result<f64, ScpiError> {
        match self.0.get(ix) {
            Some(Value::Float(v)) => Ok(*v),
            Some(Value::Int(v)) => Ok(*v as f64),
            _ => Err(ScpiError::DataType),
        }
    }

    /// The flag at `ix`.
    pub fn boolean(&self, ix: usize) -> Result<bool, ScpiError> {
        match self.0.get(ix) {
            Some(Value::Bool(v)) => Ok(*v),
            _ => Err(ScpiError::DataType),
        }
    }

    /// The string at `ix`.
    pub fn text(&self, ix: usize) -> Result<&str, ScpiError> {
        match self.0.get(ix) {
            Some(Value::Str(v)) => Ok(v),
            _ => Err(ScpiError::DataType),
        }
    }
}

/// A declared parameter converter.
#[derive(Debug, Clone)]
pub enum Converter {
    /// Pass the raw string through unchanged.
    Str,
    /// On/off literal words to `true`/`false`.
    Boolean,
    /// On/off literal words to `100.0`/`0.0`, anything else parsed as a float.
    OnOffFloat,
    /// Integer with optional bounds, default and keyword aliases.
    Int(IntSpec),
    /// Float with optional bounds, default, NaN binding and keyword aliases.
    Float(FloatSpec),
    /// Declared labels mapped to arbitrary bound values.
    Enum(EnumSpec),
}

impl Converter {
    /// Convert one raw parameter string.
    pub fn convert(&self, raw: &str) -> Result<Value, ScpiError> {
        let trimmed = raw.trim();
        match self {
            Self::Str => Ok(Value::Str(raw.to_string())),
            Self::Boolean => match trimmed.to_ascii_uppercase().as_str() {
                "1" | "ON" | "YES" | "TRUE" => Ok(Value::Bool(true)),
                "0" | "OFF" | "NO" | "FALSE" => Ok(Value::Bool(false)),
                _ => Err(ScpiError::DataType),
            },
            Self::OnOffFloat => {
                let upper = trimmed.to_ascii_uppercase();
                match upper.as_str() {
                    "ON" | "YES" | "TRUE" | "DEF" | "DEFAULT" => Ok(Value::Float(100.0)),
                    "OFF" | "NO" | "FALSE" => Ok(Value::Float(0.0)),
                    _ => upper
                        .parse()
                        .map(Value::Float)
                        .map_err(|_| ScpiError::DataType),
                }
            }
            Self::Int(spec) => spec.convert(trimmed),
            Self::Float(spec) => spec.convert(trimmed),
            Self::Enum(spec) => spec.convert(trimmed),
        }
    }
}

/// Builder for an integer converter.
#[derive(Debug, Clone, Default)]
pub struct IntSpec {
    min: Option<i64>,
    max: Option<i64>,
    default: Option<i64>,
    keywords: HashMap<String, i64>,
}

impl IntSpec {
    /// An unconstrained integer converter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value bound to `MINimum` and enforced as the lower bound.
    pub fn min(mut self, value: i64) -> Self {
        self.min = Some(value);
        self
    }

    /// Value bound to `MAXimum` and enforced as the upper bound.
    pub fn max(mut self, value: i64) -> Self {
        self.max = Some(value);
        self
    }

    /// Value bound to `DEFault`.
    pub fn default_value(mut self, value: i64) -> Self {
        self.default = Some(value);
        self
    }

    /// Bind an extra SCPI-style keyword (matched long and short form).
    pub fn keyword(mut self, pattern: &str, value: i64) -> Self {
        let (long, short) = stem_forms(pattern);
        self.keywords.insert(short, value);
        self.keywords.insert(long, value);
        self
    }

    /// Finish the builder.
    pub fn build(self) -> Converter {
        Converter::Int(self)
    }

    fn convert(&self, raw: &str) -> Result<Value, ScpiError> {
        let upper = raw.to_ascii_uppercase();
        if let Some(value) = self.lookup(&upper) {
            return Ok(Value::Int(value));
        }
        let parsed: i64 = upper.parse().map_err(|_| ScpiError::DataType)?;
        if self.min.is_some_and(|min| parsed < min) || self.max.is_some_and(|max| parsed > max) {
            return Err(ScpiError::OutOfRange);
        }
        Ok(Value::Int(parsed))
    }

    fn lookup(&self, upper: &str) -> Option<i64> {
        match upper {
            "MIN" | "MINIMUM" => self.min,
            "MAX" | "MAXIMUM" => self.max,
            "DEF" | "DEFAULT" => self.default,
            _ => self.keywords.get(upper).copied(),
        }
    }
}

/// Builder for a float converter.
#[derive(Debug, Clone, Default)]
pub struct FloatSpec {
    min: Option<f64>,
    max: Option<f64>,
    default: Option<f64>,
    nan: Option<f64>,
    keywords: HashMap<String, f64>,
}

impl FloatSpec {
    /// An unconstrained float converter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value bound to `MINimum` and enforced as the lower bound.
    pub fn min(mut self, value: f64) -> Self {
        self.min = Some(value);
        self
    }

    /// Value bound to `MAXimum` and enforced as the upper bound.
    pub fn max(mut self, value: f64) -> Self {
        self.max = Some(value);
        self
    }

    /// Value bound to `DEFault`.
    pub fn default_value(mut self, value: f64) -> Self {
        self.default = Some(value);
        self
    }

    /// Value bound to the `NAN` keyword.
    pub fn nan(mut self, value: f64) -> Self {
        self.nan = Some(value);
        self
    }

    /// Bind an extra SCPI-style keyword (matched long and short form).
    pub fn keyword(mut self, pattern: &str, value: f64) -> Self {
        let (long, short) = stem_forms(pattern);
        self.keywords.insert(short, value);
        self.keywords.insert(long, value);
        self
    }

    /// Finish the builder.
    pub fn build(self) -> Converter {
        Converter::Float(self)
    }

    fn convert(&self, raw: &str) -> Result<Value, ScpiError> {
        let upper = raw.to_ascii_uppercase();
        if let Some(value) = self.lookup(&upper) {
            return Ok(Value::Float(value));
        }
        let parsed: f64 = upper.parse().map_err(|_| ScpiError::DataType)?;
        if self.min.is_some_and(|min| parsed < min) || self.max.is_some_and(|max| parsed > max) {
            return Err(ScpiError::OutOfRange);
        }
        Ok(Value::Float(parsed))
    }

    fn lookup(&self, upper: &str) -> Option<f64> {
        match upper {
            "MIN" | "MINIMUM" => self.min,
            "MAX" | "MAXIMUM" => self.max,
            "DEF" | "DEFAULT" => self.default,
            "NAN" => self.nan,
            _ => self.keywords.get(upper).copied(),
        }
    }
}

/// Builder for an enumerated converter.
#[derive(Debug, Clone, Default)]
pub struct EnumSpec {
    mapping: HashMap<String, Value>,
}

impl EnumSpec {
    /// An empty enumeration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels bound positionally to `0, 1, 2, ...`.
    pub fn positional<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut spec = Self::new();
        for (ix, label) in labels.into_iter().enumerate() {
            spec = spec.label(label, Value::Int(ix as i64));
        }
        spec
    }

    /// Bind a SCPI-style label (matched long and short form) to a value.
    pub fn label(mut self, pattern: &str, value: Value) -> Self {
        let (long, short) = stem_forms(pattern);
        self.mapping.insert(short, value.clone());
        self.mapping.insert(long, value);
        self
    }

    /// Finish the builder.
    pub fn build(self) -> Converter {
        Converter::Enum(self)
    }

    fn convert(&self, raw: &str) -> Result<Value, ScpiError> {
        self.mapping
            .get(&raw.to_ascii_uppercase())
            .cloned()
            .ok_or(ScpiError::DataType)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_words() {
        for raw in ["1", "on", "YES", "True"] {
            assert_eq!(Converter::Boolean.convert(raw), Ok(Value::Bool(true)));
        }
        for raw in ["0", "off", "No", "FALSE"] {
            assert_eq!(Converter::Boolean.convert(raw), Ok(Value::Bool(false)));
        }
        assert_eq!(Converter::Boolean.convert("maybe"), Err(ScpiError::DataType));
    }

    #[test]
    fn on_off_float() {
        assert_eq!(Converter::OnOffFloat.convert("ON"), Ok(Value::Float(100.0)));
        assert_eq!(Converter::OnOffFloat.convert("default"), Ok(Value::Float(100.0)));
        assert_eq!(Converter::OnOffFloat.convert("off"), Ok(Value::Float(0.0)));
        assert_eq!(Converter::OnOffFloat.convert("37.5"), Ok(Value::Float(37.5)));
        assert_eq!(Converter::OnOffFloat.convert("dim"), Err(ScpiError::DataType));
    }

    #[test]
    fn float_bounds_and_keywords() {
        let conv = FloatSpec::new().min(0.0).max(f64::INFINITY).build();
        assert_eq!(conv.convert("0.5"), Ok(Value::Float(0.5)));
        assert_eq!(conv.convert("MIN"), Ok(Value::Float(0.0)));
        assert_eq!(conv.convert("minimum"), Ok(Value::Float(0.0)));
        assert_eq!(conv.convert("-1"), Err(ScpiError::OutOfRange));
        assert_eq!(conv.convert("purple"), Err(ScpiError::DataType));
    }

    #[test]
    fn float_unset_keyword_is_a_type_error() {
        let conv = FloatSpec::new().min(1.0).build();
        assert_eq!(conv.convert("MAX"), Err(ScpiError::DataType));
        assert_eq!(conv.convert("DEF"), Err(ScpiError::DataType));
    }

    #[test]
    fn float_custom_keyword_matches_both_forms() {
        let conv = FloatSpec::new().min(1e-5).max(1.5e-3).keyword("OFF", 0.0).build();
        // Keyword lookup short-circuits the bounds check.
        assert_eq!(conv.convert("OFF"), Ok(Value::Float(0.0)));
        let conv = FloatSpec::new().keyword("COLour", 7.0).build();
        assert_eq!(conv.convert("COL"), Ok(Value::Float(7.0)));
        assert_eq!(conv.convert("colour"), Ok(Value::Float(7.0)));
        assert_eq!(conv.convert("COLO"), Err(ScpiError::DataType));
    }

    #[test]
    fn float_nan_keyword() {
        let conv = FloatSpec::new().nan(-9.91e37).build();
        assert_eq!(conv.convert("NAN"), Ok(Value::Float(-9.91e37)));
        // Without a binding, NAN falls through to the float parser.
        let conv = FloatSpec::new().build();
        match conv.convert("NAN") {
            Ok(Value::Float(v)) => assert!(v.is_nan()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn int_bounds_and_default() {
        let conv = IntSpec::new().min(10).max(1_000_000).default_value(10_000).build();
        assert_eq!(conv.convert("440"), Ok(Value::Int(440)));
        assert_eq!(conv.convert("DEF"), Ok(Value::Int(10_000)));
        assert_eq!(conv.convert("MAXIMUM"), Ok(Value::Int(1_000_000)));
        assert_eq!(conv.convert("9"), Err(ScpiError::OutOfRange));
        assert_eq!(conv.convert("2000001"), Err(ScpiError::OutOfRange));
        assert_eq!(conv.convert("4.5"), Err(ScpiError::DataType));
    }

    #[test]
    fn enum_labels() {
        let conv = EnumSpec::new()
            .label("FieLD", Value::Str("field".into()))
            .label("VOLTage", Value::Str("volt".into()))
            .build();
        assert_eq!(conv.convert("FLD"), Ok(Value::Str("field".into())));
        assert_eq!(conv.convert("field"), Ok(Value::Str("field".into())));
        assert_eq!(conv.convert("VOLT"), Ok(Value::Str("volt".into())));
        assert_eq!(conv.convert("AMPS"), Err(ScpiError::DataType));
    }

    #[test]
    fn enum_positional() {
        let conv = EnumSpec::positional(["SLOW", "FAST"]).build();
        assert_eq!(conv.convert("slow"), Ok(Value::Int(0)));
        assert_eq!(conv.convert("FAST"), Ok(Value::Int(1)));
    }

    #[test]
    fn args_accessors() {
        let args = Args::new(vec![Value::Int(3), Value::Float(0.5), Value::Str("hi".into())]);
        assert_eq!(args.int(0), Ok(3));
        assert_eq!(args.float(0), Ok(3.0));
        assert_eq!(args.float(1), Ok(0.5));
        assert_eq!(args.text(2), Ok("hi"));
        assert_eq!(args.boolean(0), Err(ScpiError::DataType));
        assert_eq!(args.int(9), Err(ScpiError::DataType));
    }
}
