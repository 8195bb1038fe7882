//! Conversion of [`PropertyValue`]s to JSON.
//!
//! A [`ValueSerializer`] holds an immutable list of converters. Each value is
//! offered to the converters in order; the first that handles it wins, and
//! values nobody handles fall back to a built-in mapping for plain scalars
//! and lists.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::data::PropertyValue;
use crate::error::ErrorContext;
use crate::{Error, Result};

pub trait ValueConverter: Send + Sync {
    fn name(&self) -> &str;

    /// Convert `value`, or return `None` to let later converters try.
    fn convert(&self, value: &PropertyValue, serializer: &ValueSerializer) -> Option<Result<Value>>;
}

/// Unwraps aspect values: the inner value when known, `null` otherwise.
#[derive(Debug, Default)]
pub struct AspectValueConverter;

impl ValueConverter for AspectValueConverter {
    fn name(&self) -> &str {
        "aspect"
    }

    fn convert(&self, value: &PropertyValue, serializer: &ValueSerializer) -> Option<Result<Value>> {
        match value {
            PropertyValue::Aspect(aspect) => Some(match aspect.as_option() {
                Some(inner) => serializer.to_value(inner),
                None => Ok(Value::Null),
            }),
            _ => None,
        }
    }
}

/// Writes JavaScript-marked strings as plain JSON strings.
#[derive(Debug, Default)]
pub struct JavaScriptConverter;

impl ValueConverter for JavaScriptConverter {
    fn name(&self) -> &str {
        "javascript"
    }

    fn convert(&self, value: &PropertyValue, _serializer: &ValueSerializer) -> Option<Result<Value>> {
        match value {
            PropertyValue::JavaScript(js) => Some(Ok(Value::String(js.as_str().to_string()))),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct ValueSerializer {
    converters: Vec<Arc<dyn ValueConverter>>,
}

impl ValueSerializer {
    pub fn new(converters: Vec<Arc<dyn ValueConverter>>) -> Self {
        Self { converters }
    }

    pub fn converter_names(&self) -> Vec<&str> {
        self.converters.iter().map(|c| c.name()).collect()
    }

    pub fn to_value(&self, value: &PropertyValue) -> Result<Value> {
        for converter in &self.converters {
            if let Some(converted) = converter.convert(value, self) {
                return converted;
            }
        }
        self.fallback(value)
    }

    fn fallback(&self, value: &PropertyValue) -> Result<Value> {
        match value {
            PropertyValue::Null => Ok(Value::Null),
            PropertyValue::Bool(b) => Ok(Value::Bool(*b)),
            PropertyValue::Integer(i) => Ok(Value::from(*i)),
            PropertyValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| unsupported(value, format!("{} is not a finite number", f))),
            PropertyValue::String(s) => Ok(Value::String(s.clone())),
            PropertyValue::List(items) => items
                .iter()
                .map(|item| self.to_value(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            PropertyValue::Records(records) => records
                .iter()
                .map(|record| {
                    record
                        .iter()
                        .map(|(k, v)| -> Result<(String, Value)> {
                            Ok((k.to_lowercase(), self.to_value(v)?))
                        })
                        .collect::<Result<Map<String, Value>>>()
                        .map(Value::Object)
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            PropertyValue::JavaScript(_) | PropertyValue::Aspect(_) => {
                Err(unsupported(value, "no converter registered".to_string()))
            }
        }
    }
}

impl Default for ValueSerializer {
    fn default() -> Self {
        Self::new(default_converters())
    }
}

pub fn default_converters() -> Vec<Arc<dyn ValueConverter>> {
    vec![Arc::new(AspectValueConverter), Arc::new(JavaScriptConverter)]
}

fn unsupported(value: &PropertyValue, reason: String) -> Error {
    Error::runtime_with_context(
        format!("Cannot serialize {} value", value.kind_name()),
        ErrorContext::new()
            .with_details(reason)
            .with_source("json_builder"),
    )
}
