//! Typed storage for element results.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`typed_map`] | Name-keyed heterogeneous store with type-checked lookups |
//! | [`aspect_value`] | [`AspectPropertyValue`], a value that may not be known yet |
//! | [`property_value`] | [`PropertyValue`], the tagged value contributed by elements |
//! | [`element_data`] | [`ElementData`], one element's results for one request |
//! | [`metadata`] | Property metadata declared by elements |

pub mod aspect_value;
pub mod element_data;
pub mod metadata;
pub mod property_value;
pub mod typed_map;

pub use aspect_value::{AspectPropertyValue, DEFAULT_NO_VALUE_MESSAGE};
pub use element_data::{DictionaryElementData, ElementData, PropertyError, PropertyErrorKind, PropertyStatus};
pub use metadata::{ElementPropertyMetaData, ValueKind};
pub use property_value::{JavaScript, PropertyMap, PropertyValue};
pub use typed_map::{ConcurrentTypedKeyMap, LocalTypedKeyMap, TypedKey, TypedKeyMap};

/// Errors raised when reading typed data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    #[error("No data stored under key '{0}'")]
    KeyNotFound(String),

    #[error("Data stored under key '{key}' is a '{stored}', not a '{requested}'")]
    TypeMismatch {
        key: String,
        stored: String,
        requested: String,
    },

    #[error("No data of type '{0}' is stored")]
    TypeNotFound(String),

    #[error("{count} entries of type '{requested}' are stored, expected exactly one")]
    Ambiguous { requested: String, count: usize },

    #[error("{0}")]
    NoValue(String),
}
