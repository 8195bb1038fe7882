//! JSON builder: merges the results of all elements into one JSON document.
//!
//! ## Document shape
//!
//! ```text
//! {
//!   "device": {
//!     "ismobile": true,
//!     "hardwarename": null,
//!     "hardwarenamenullreason": "No matched profile.",
//!     "screenjs": "...",
//!     "screenjsdelayexecution": true,
//!     "screenwidth": 0,
//!     "screenwidthevidenceproperties": ["device.screenjs"]
//!   },
//!   "javascriptProperties": ["device.screenjs"],
//!   "errors": ["..."]
//! }
//! ```
//!
//! Every key is lower-cased except `javascriptProperties`, which the client
//! script looks up by exact name. JavaScript properties are only listed while
//! the sequence number is below [`MAX_JAVASCRIPT_ITERATIONS`], which bounds
//! the number of client/server round-trips.

pub mod converters;
pub mod registry;

pub use converters::{AspectValueConverter, JavaScriptConverter, ValueConverter, ValueSerializer};
pub use registry::{PipelineConfig, PropertyMetadataRegistry};

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::constants::{
    CLOUD_RESPONSE_ELEMENT_KEY, DELAY_EXECUTION_SUFFIX, ERRORS_KEY, EVIDENCE_PROPERTIES_SUFFIX,
    EVIDENCE_SEPARATOR, EVIDENCE_SEQUENCE, JAVASCRIPT_BUILDER_ELEMENT_KEY,
    JAVASCRIPT_PROPERTIES_KEY, JSON_BUILDER_ELEMENT_KEY, MAX_JAVASCRIPT_ITERATIONS,
    NULL_REASON_SUFFIX, SET_HEADERS_ELEMENT_KEY,
};
use crate::data::{ElementData, ElementPropertyMetaData, PropertyMap, PropertyValue, ValueKind};
use crate::elements::sequence::sequence_number;
use crate::evidence::{EvidenceKeyFilter, EvidenceKeyFilterWhitelist};
use crate::pipeline::{FlowData, FlowElement, FlowError, PipelineError};
use crate::Result;

/// Elements whose results never appear in the document.
const EXCLUDED_ELEMENTS: [&str; 4] = [
    CLOUD_RESPONSE_ELEMENT_KEY,
    JSON_BUILDER_ELEMENT_KEY,
    JAVASCRIPT_BUILDER_ELEMENT_KEY,
    SET_HEADERS_ELEMENT_KEY,
];

/// Results of the JSON builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonBuilderData {
    json: String,
}

impl JsonBuilderData {
    pub fn new(json: impl Into<String>) -> Self {
        Self { json: json.into() }
    }

    /// An empty document.
    pub fn empty() -> Self {
        Self::new("{}")
    }

    pub fn json(&self) -> &str {
        &self.json
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.json)?)
    }
}

impl ElementData for JsonBuilderData {
    fn element_data_key(&self) -> &str {
        JSON_BUILDER_ELEMENT_KEY
    }

    fn as_dictionary(&self) -> PropertyMap {
        let mut map = PropertyMap::new();
        map.insert("json".to_string(), PropertyValue::String(self.json.clone()));
        map
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub struct JsonBuilderElement {
    serializer: ValueSerializer,
    registry: PropertyMetadataRegistry,
    excluded: HashSet<String>,
    filter: Arc<EvidenceKeyFilterWhitelist>,
}

impl JsonBuilderElement {
    pub fn new() -> Self {
        Self::with_converters(converters::default_converters())
    }

    /// Use `converters` instead of the default aspect and JavaScript converters.
    pub fn with_converters(converters: Vec<Arc<dyn ValueConverter>>) -> Self {
        let mut excluded: HashSet<String> = EXCLUDED_ELEMENTS.iter().map(|k| k.to_string()).collect();
        excluded.insert(JSON_BUILDER_ELEMENT_KEY.to_string());
        Self {
            serializer: ValueSerializer::new(converters),
            registry: PropertyMetadataRegistry::new(),
            excluded,
            filter: Arc::new(EvidenceKeyFilterWhitelist::new([EVIDENCE_SEQUENCE])),
        }
    }

    pub fn registry(&self) -> &PropertyMetadataRegistry {
        &self.registry
    }

    /// Build the document for `data`.
    ///
    /// Fails if the sequence number evidence is missing.
    pub fn build_json(&self, data: &FlowData) -> Result<String> {
        let sequence = required_sequence(data)?;
        self.build_json_for_sequence(data, sequence)
    }

    /// Element values without the delay-execution and evidence meta
    /// properties, and without `javascriptProperties` or `errors`.
    pub fn to_json_value(&self, data: &FlowData) -> Result<Value> {
        let config = self.registry.get_or_build(data.pipeline());
        let document = self.element_values(data, &config, false)?;
        Ok(resolve_keys(Value::Object(document)))
    }

    /// Serialize a document with the lower-casing key resolver.
    ///
    /// Errors propagate to the caller.
    pub fn serialize(document: &Value) -> Result<String> {
        Ok(serde_json::to_string_pretty(&resolve_keys(document.clone()))?)
    }

    fn build_json_for_sequence(&self, data: &FlowData, sequence: u32) -> Result<String> {
        let config = self.registry.get_or_build(data.pipeline());
        let mut document = self.element_values(data, &config, true)?;

        if sequence < MAX_JAVASCRIPT_ITERATIONS {
            let javascript = javascript_properties(data, &document);
            if !javascript.is_empty() {
                document.insert(JAVASCRIPT_PROPERTIES_KEY.to_string(), json!(javascript));
            }
        } else {
            debug!(sequence, "javascript iteration limit reached");
        }

        let errors = data.errors();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(|e| e.message.clone()).collect();
            document.insert(ERRORS_KEY.to_string(), json!(messages));
        }

        Self::serialize(&Value::Object(document))
    }

    fn element_values(
        &self,
        data: &FlowData,
        config: &PipelineConfig,
        include_meta_data: bool,
    ) -> Result<Map<String, Value>> {
        let mut document = Map::new();
        for element_data in data.element_data() {
            let key = element_data.element_data_key().to_lowercase();
            if self.excluded.contains(&key) || document.contains_key(&key) {
                continue;
            }
            let values = self.flatten(&element_data.as_dictionary(), &key, config, include_meta_data)?;
            document.insert(key, Value::Object(values));
        }
        Ok(document)
    }

    fn flatten(
        &self,
        properties: &PropertyMap,
        data_path: &str,
        config: &PipelineConfig,
        include_meta_data: bool,
    ) -> Result<Map<String, Value>> {
        let mut values = Map::new();
        for (name, value) in properties {
            let name = name.to_lowercase();
            let complete_name = format!("{}{}{}", data_path, EVIDENCE_SEPARATOR, name);

            let value = match value {
                PropertyValue::Aspect(aspect) => match aspect.as_option() {
                    Some(inner) => inner,
                    None => {
                        values.insert(name.clone(), Value::Null);
                        values.insert(
                            format!("{}{}", name, NULL_REASON_SUFFIX),
                            Value::String(aspect.no_value_message().to_string()),
                        );
                        continue;
                    }
                },
                other => other,
            };

            let json_value = match value {
                PropertyValue::Records(records) => Value::Array(
                    records
                        .iter()
                        .map(|record| {
                            self.flatten(record, &complete_name, config, include_meta_data)
                                .map(Value::Object)
                        })
                        .collect::<Result<Vec<_>>>()?,
                ),
                other => self.serializer.to_value(other)?,
            };
            values.insert(name.clone(), json_value);

            if include_meta_data {
                if config.delayed_execution_properties.contains(&complete_name) {
                    values.insert(format!("{}{}", name, DELAY_EXECUTION_SUFFIX), Value::Bool(true));
                }
                if let Some(evidence) = config.delayed_evidence_properties.get(&complete_name) {
                    values.insert(format!("{}{}", name, EVIDENCE_PROPERTIES_SUFFIX), json!(evidence));
                }
            }
        }
        Ok(values)
    }
}

impl Default for JsonBuilderElement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FlowElement for JsonBuilderElement {
    fn element_data_key(&self) -> &str {
        JSON_BUILDER_ELEMENT_KEY
    }

    fn properties(&self) -> Vec<ElementPropertyMetaData> {
        vec![ElementPropertyMetaData::new("json", JSON_BUILDER_ELEMENT_KEY, ValueKind::String)
            .with_category("JSON")
            .with_description("All element results as a JSON document.")]
    }

    fn evidence_key_filter(&self) -> Arc<dyn EvidenceKeyFilter> {
        self.filter.clone()
    }

    async fn process(&self, data: &FlowData) -> Result<()> {
        let sequence = required_sequence(data)?;
        let json = match self.build_json_for_sequence(data, sequence) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to build JSON document");
                data.add_error(FlowError::new(JSON_BUILDER_ELEMENT_KEY, &e));
                JsonBuilderData::empty().json
            }
        };
        data.add_element_data(Arc::new(JsonBuilderData::new(json)));
        Ok(())
    }
}

fn required_sequence(data: &FlowData) -> Result<u32> {
    sequence_number(data)?.ok_or_else(|| {
        PipelineError::MissingEvidence {
            key: EVIDENCE_SEQUENCE.to_string(),
            hint: None,
        }
        .with_hint("Add a SequenceElement to the pipeline before the JsonBuilderElement")
        .into()
    })
}

/// Complete names of the JavaScript properties present in the document.
fn javascript_properties(data: &FlowData, document: &Map<String, Value>) -> Vec<String> {
    let pipeline = data.pipeline();
    let mut names = Vec::new();
    for (element_key, values) in document {
        if let Value::Object(values) = values {
            for property in values.keys() {
                let is_javascript = pipeline
                    .property_metadata(element_key, property)
                    .map(ElementPropertyMetaData::is_javascript)
                    .unwrap_or(false);
                if is_javascript {
                    names.push(format!("{}{}{}", element_key, EVIDENCE_SEPARATOR, property));
                }
            }
        }
    }
    names
}

/// Lower-case every object key except [`JAVASCRIPT_PROPERTIES_KEY`].
fn resolve_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let key = if k == JAVASCRIPT_PROPERTIES_KEY {
                        k
                    } else {
                        k.to_lowercase()
                    };
                    (key, resolve_keys(v))
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(resolve_keys).collect()),
        other => other,
    }
}
