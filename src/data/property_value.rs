use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::AspectPropertyValue;

/// Property dictionary of one element (or of one nested record).
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// A string holding JavaScript to be executed by the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JavaScript(String);

impl JavaScript {
    pub fn new(source: impl Into<String>) -> Self {
        Self(source.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JavaScript {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for JavaScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value contributed by an element.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    JavaScript(JavaScript),
    List(Vec<PropertyValue>),
    /// A list of nested complex records, each with its own properties.
    Records(Vec<PropertyMap>),
    /// A value that may not be known for this request.
    Aspect(Box<AspectPropertyValue<PropertyValue>>),
}

impl PropertyValue {
    /// Wrap `value` as a known aspect value.
    pub fn aspect(value: impl Into<PropertyValue>) -> Self {
        PropertyValue::Aspect(Box::new(AspectPropertyValue::with_value(value.into())))
    }

    /// An aspect value that is not known, with the reason.
    pub fn no_value(reason: impl Into<String>) -> Self {
        PropertyValue::Aspect(Box::new(AspectPropertyValue::no_value(reason)))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    /// Name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Integer(_) => "integer",
            PropertyValue::Float(_) => "float",
            PropertyValue::String(_) => "string",
            PropertyValue::JavaScript(_) => "javascript",
            PropertyValue::List(_) => "list",
            PropertyValue::Records(_) => "records",
            PropertyValue::Aspect(_) => "aspect",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            PropertyValue::JavaScript(js) => Some(js.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Integer(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Integer(v as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<JavaScript> for PropertyValue {
    fn from(v: JavaScript) -> Self {
        PropertyValue::JavaScript(v)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(v: Vec<PropertyValue>) -> Self {
        PropertyValue::List(v)
    }
}

impl From<Vec<PropertyMap>> for PropertyValue {
    fn from(v: Vec<PropertyMap>) -> Self {
        PropertyValue::Records(v)
    }
}

impl From<AspectPropertyValue<PropertyValue>> for PropertyValue {
    fn from(v: AspectPropertyValue<PropertyValue>) -> Self {
        PropertyValue::Aspect(Box::new(v))
    }
}

impl<T: Into<PropertyValue>> From<Option<T>> for PropertyValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(PropertyValue::Null)
    }
}
