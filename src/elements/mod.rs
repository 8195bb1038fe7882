//! Built-in flow elements.
//!
//! | Element | Key | Description |
//! |---------|-----|-------------|
//! | [`SequenceElement`] | `sequence` | Session id and round-trip counter |
//! | [`JsonBuilderElement`] | `json-builder` | Merges element results into JSON |
//! | [`JavaScriptBuilderElement`] | `javascriptbuilderelement` | Client-side script around the JSON |

pub mod javascript_builder;
pub mod json_builder;
pub mod sequence;

pub use javascript_builder::{JavaScriptBuilderConfig, JavaScriptBuilderData, JavaScriptBuilderElement};
pub use json_builder::{JsonBuilderData, JsonBuilderElement, ValueConverter, ValueSerializer};
pub use sequence::{sequence_number, SequenceElement};
