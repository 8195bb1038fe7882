//! # fiftyone-pipeline
//!
//! 证据驱动的数据流水线：把各元素的属性结果合并为 JSON，并生成驱动客户端细化循环的 JavaScript。
//!
//! Evidence-to-property pipeline core. Request evidence flows through a chain
//! of elements, each contributing typed property results; the results are
//! merged into one JSON document and wrapped in a client-side script that
//! gathers more evidence in the browser and posts it back for refinement.
//!
//! ## Overview
//!
//! - **Typed results**: elements store [`ElementData`] on the per-request
//!   [`FlowData`]; values are [`PropertyValue`]s, optionally wrapped as
//!   [`AspectPropertyValue`]s that carry a reason when no value is known.
//! - **JSON materialization**: [`JsonBuilderElement`] flattens every element's
//!   results, annotates delayed JavaScript properties and their evidence
//!   sources, and caps JavaScript refinement by sequence number.
//! - **Client script**: [`JavaScriptBuilderElement`] renders a template around
//!   the JSON with session, capability and callback details.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fiftyone_pipeline::{
//!     JavaScriptBuilderConfig, JavaScriptBuilderData, JavaScriptBuilderElement,
//!     JsonBuilderElement, PipelineBuilder, SequenceElement,
//! };
//!
//! #[tokio::main]
//! async fn main() -> fiftyone_pipeline::Result<()> {
//!     let pipeline = PipelineBuilder::new()
//!         .add_element(Arc::new(SequenceElement::new()))
//!         .add_element(Arc::new(JsonBuilderElement::new()))
//!         .add_element(Arc::new(JavaScriptBuilderElement::new(
//!             JavaScriptBuilderConfig::default().with_endpoint("/json"),
//!         )?))
//!         .build()?;
//!
//!     let data = pipeline.create_flow_data();
//!     data.add_evidence("header.host", "localhost");
//!     data.process().await?;
//!
//!     let script = data.get_as::<JavaScriptBuilderData>("javascriptbuilderelement")?;
//!     println!("{}", script.javascript());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`pipeline`] | Elements, pipelines and per-request flow data |
//! | [`data`] | Typed result storage and property values |
//! | [`evidence`] | Request evidence and evidence key filters |
//! | [`elements`] | Sequence, JSON builder and JavaScript builder elements |
//! | [`config`] | Pipelines built from YAML or JSON options |
//! | [`utils`] | Template rendering and JavaScript minification |
//! | [`constants`] | Evidence keys, element keys and limits |

pub mod config;
pub mod constants;
pub mod data;
pub mod elements;
pub mod evidence;
pub mod pipeline;
pub mod utils;

// Re-export main types for convenience
pub use config::{ElementOptions, ElementRegistry, PipelineOptions};
pub use data::{
    AspectPropertyValue, DictionaryElementData, ElementData, ElementPropertyMetaData,
    PropertyStatus, PropertyValue, ValueKind,
};
pub use elements::{
    JavaScriptBuilderConfig, JavaScriptBuilderData, JavaScriptBuilderElement, JsonBuilderData,
    JsonBuilderElement, SequenceElement,
};
pub use evidence::Evidence;
pub use pipeline::{FlowData, FlowElement, FlowError, Pipeline, PipelineBuilder, PipelineError};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
