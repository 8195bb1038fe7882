//! Pipeline configuration files.
//!
//! ```yaml
//! suppress_process_exceptions: false
//! elements:
//!   - builder_name: SequenceElement
//!   - sub_elements:
//!       - builder_name: MyEngineBuilder
//!   - builder_name: JsonBuilderElement
//!   - builder_name: JavaScriptBuilderElement
//!     build_parameters:
//!       endpoint: /json
//!       object_name: fod
//! ```
//!
//! Builder names are matched case-insensitively, with or without a trailing
//! `Builder`. An entry with `sub_elements` becomes a stage whose elements run
//! concurrently. Field names also accept the PascalCase spelling
//! (`BuilderName`, `BuildParameters`, `SubElements`).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::elements::{
    JavaScriptBuilderConfig, JavaScriptBuilderElement, JsonBuilderElement, SequenceElement,
};
use crate::error::ErrorContext;
use crate::pipeline::{FlowElement, Pipeline, PipelineBuilder};
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    #[serde(alias = "SuppressProcessExceptions")]
    pub suppress_process_exceptions: bool,
    #[serde(alias = "Elements")]
    pub elements: Vec<ElementOptions>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementOptions {
    #[serde(alias = "BuilderName")]
    pub builder_name: String,
    #[serde(alias = "BuildParameters")]
    pub build_parameters: Map<String, Value>,
    #[serde(alias = "SubElements")]
    pub sub_elements: Vec<ElementOptions>,
}

impl ElementOptions {
    pub fn new(builder_name: impl Into<String>) -> Self {
        Self {
            builder_name: builder_name.into(),
            ..Self::default()
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.build_parameters.insert(name.into(), value.into());
        self
    }
}

impl PipelineOptions {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load options from a `.json`, `.yaml` or `.yml` file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::configuration_with_context(
                format!("Cannot read pipeline options: {}", e),
                ErrorContext::new()
                    .with_field_path(path.to_string_lossy())
                    .with_source("pipeline_options"),
            )
        })?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Build a pipeline using the built-in elements.
    pub fn build(&self) -> Result<Pipeline> {
        self.build_with(&ElementRegistry::default())
    }

    /// Build a pipeline, resolving builder names through `registry`.
    pub fn build_with(&self, registry: &ElementRegistry) -> Result<Pipeline> {
        let mut builder =
            PipelineBuilder::new().suppress_process_exceptions(self.suppress_process_exceptions);
        for (index, options) in self.elements.iter().enumerate() {
            if options.sub_elements.is_empty() {
                builder = builder.add_element(registry.create(options, index)?);
                continue;
            }
            if !options.builder_name.is_empty() {
                warn!(
                    builder_name = %options.builder_name,
                    "builder name ignored on an entry with sub_elements"
                );
            }
            let elements = options
                .sub_elements
                .iter()
                .map(|sub| {
                    if sub.sub_elements.is_empty() {
                        registry.create(sub, index)
                    } else {
                        Err(configuration_error(
                            "Parallel stages cannot be nested",
                            index,
                            &sub.builder_name,
                        ))
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            builder = builder.add_parallel_elements(elements);
        }
        Ok(builder.build()?)
    }
}

type ElementFactory = dyn Fn(&Map<String, Value>) -> Result<Arc<dyn FlowElement>> + Send + Sync;

/// Builder name → element factory.
pub struct ElementRegistry {
    factories: HashMap<String, Arc<ElementFactory>>,
}

impl ElementRegistry {
    /// A registry without any builders.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register `factory` under `builder_name`, replacing any earlier one.
    pub fn register<F>(&mut self, builder_name: &str, factory: F) -> &mut Self
    where
        F: Fn(&Map<String, Value>) -> Result<Arc<dyn FlowElement>> + Send + Sync + 'static,
    {
        self.factories
            .insert(normalize_builder_name(builder_name), Arc::new(factory));
        self
    }

    pub fn contains(&self, builder_name: &str) -> bool {
        self.factories
            .contains_key(&normalize_builder_name(builder_name))
    }

    fn create(&self, options: &ElementOptions, index: usize) -> Result<Arc<dyn FlowElement>> {
        let factory = self
            .factories
            .get(&normalize_builder_name(&options.builder_name))
            .ok_or_else(|| {
                configuration_error("Unknown element builder", index, &options.builder_name)
            })?;
        debug!(builder_name = %options.builder_name, "creating element");
        factory(&options.build_parameters)
    }
}

impl Default for ElementRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register("SequenceElement", |params| {
                ignore_parameters("SequenceElement", params);
                Ok(Arc::new(SequenceElement::new()) as Arc<dyn FlowElement>)
            })
            .register("JsonBuilderElement", |params| {
                ignore_parameters("JsonBuilderElement", params);
                Ok(Arc::new(JsonBuilderElement::new()) as Arc<dyn FlowElement>)
            })
            .register("JavaScriptBuilderElement", |params| {
                let config: JavaScriptBuilderConfig =
                    serde_json::from_value(Value::Object(params.clone())).map_err(|e| {
                        Error::configuration_with_context(
                            "Invalid JavaScriptBuilderElement parameters",
                            ErrorContext::new()
                                .with_details(e.to_string())
                                .with_source("pipeline_options"),
                        )
                    })?;
                Ok(Arc::new(JavaScriptBuilderElement::new(config)?) as Arc<dyn FlowElement>)
            });
        registry
    }
}

/// Lower-case and drop a trailing `builder`.
fn normalize_builder_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    match lower.strip_suffix("builder") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => lower,
    }
}

fn ignore_parameters(builder: &str, params: &Map<String, Value>) {
    if !params.is_empty() {
        warn!(
            builder,
            parameters = ?params.keys().collect::<Vec<_>>(),
            "element takes no build parameters"
        );
    }
}

fn configuration_error(message: &str, index: usize, builder_name: &str) -> Error {
    Error::configuration_with_context(
        format!("{} '{}'", message, builder_name),
        ErrorContext::new()
            .with_field_path(format!("elements[{}]", index))
            .with_source("pipeline_options"),
    )
}
