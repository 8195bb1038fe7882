//! A property value that may not be known.
//!
//! Engines return [`AspectPropertyValue`] for properties they could not
//! determine for a request. The no-value message explains why, and is what
//! callers see when they read the value anyway.

use std::hash::{Hash, Hasher};

use super::DataError;

pub const DEFAULT_NO_VALUE_MESSAGE: &str = "The property value has not been set.";

/// A value of type `T` that may be absent.
///
/// A value explicitly set to "nothing" is expressed with `T = Option<U>`
/// (or [`PropertyValue::Null`](super::PropertyValue::Null)) and still counts
/// as a value.
#[derive(Debug, Clone)]
pub struct AspectPropertyValue<T> {
    value: Option<T>,
    no_value_message: String,
}

impl<T> AspectPropertyValue<T> {
    /// An instance without a value and with the default message.
    pub fn new() -> Self {
        Self {
            value: None,
            no_value_message: DEFAULT_NO_VALUE_MESSAGE.to_string(),
        }
    }

    pub fn with_value(value: T) -> Self {
        Self {
            value: Some(value),
            no_value_message: DEFAULT_NO_VALUE_MESSAGE.to_string(),
        }
    }

    /// An instance without a value that reports `message` when read.
    pub fn no_value(message: impl Into<String>) -> Self {
        Self {
            value: None,
            no_value_message: message.into(),
        }
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Result<&T, DataError> {
        self.value
            .as_ref()
            .ok_or_else(|| DataError::NoValue(self.no_value_message.clone()))
    }

    pub fn into_value(self) -> Result<T, DataError> {
        self.value.ok_or(DataError::NoValue(self.no_value_message))
    }

    /// Set the value. Previous values are overwritten.
    pub fn set_value(&mut self, value: T) {
        self.value = Some(value);
    }

    pub fn no_value_message(&self) -> &str {
        &self.no_value_message
    }

    pub fn set_no_value_message(&mut self, message: impl Into<String>) {
        self.no_value_message = message.into();
    }

    pub fn as_option(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

impl<T> Default for AspectPropertyValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<T> for AspectPropertyValue<T> {
    fn from(value: T) -> Self {
        Self::with_value(value)
    }
}

// The no-value message does not take part in equality.
impl<T: PartialEq> PartialEq for AspectPropertyValue<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for AspectPropertyValue<T> {}

impl<T: Hash> Hash for AspectPropertyValue<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}
