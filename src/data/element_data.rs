//! Results produced by one element for one request.

use std::any::Any;
use std::sync::Arc;

use super::{PropertyMap, PropertyValue};

/// Why a property lookup failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyErrorKind {
    /// No element declares the property.
    PropertyMissing,
    /// The pipeline's data is inconsistent, e.g. two elements declare the property.
    PipelineData,
    /// The property holds a different kind of value than requested.
    InvalidCast,
    /// The owning element has not stored results for this request.
    KeyNotFound,
    /// A lazily loaded value did not arrive in time.
    Timeout,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct PropertyError {
    pub kind: PropertyErrorKind,
    pub message: String,
}

impl PropertyError {
    pub fn new(kind: PropertyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of a property lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyStatus {
    Available(PropertyValue),
    /// The property exists but has no value for this request.
    NoValue(String),
    NotPresent,
    Errored(PropertyError),
}

/// One element's results.
///
/// Stored in flow data as `Arc<dyn ElementData>`, so all element results can
/// be enumerated through the trait and downcast to their concrete type.
pub trait ElementData: Any + Send + Sync {
    /// Key of the element that produced this data.
    fn element_data_key(&self) -> &str;

    /// All properties as a dictionary.
    fn as_dictionary(&self) -> PropertyMap;

    /// Look up a single property. Names are matched case-insensitively.
    fn try_get_property(&self, name: &str) -> PropertyStatus {
        lookup(&self.as_dictionary(), name)
    }

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

fn lookup(properties: &PropertyMap, name: &str) -> PropertyStatus {
    let found = properties
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value);
    match found {
        None => PropertyStatus::NotPresent,
        Some(PropertyValue::Aspect(aspect)) => match aspect.as_option() {
            Some(value) => PropertyStatus::Available(value.clone()),
            None => PropertyStatus::NoValue(aspect.no_value_message().to_string()),
        },
        Some(value) => PropertyStatus::Available(value.clone()),
    }
}

/// Element data backed by a plain property dictionary.
#[derive(Debug, Clone, Default)]
pub struct DictionaryElementData {
    element_data_key: String,
    properties: PropertyMap,
}

impl DictionaryElementData {
    pub fn new(element_data_key: impl Into<String>) -> Self {
        Self {
            element_data_key: element_data_key.into(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }
}

impl ElementData for DictionaryElementData {
    fn element_data_key(&self) -> &str {
        &self.element_data_key
    }

    fn as_dictionary(&self) -> PropertyMap {
        self.properties.clone()
    }

    fn try_get_property(&self, name: &str) -> PropertyStatus {
        lookup(&self.properties, name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
