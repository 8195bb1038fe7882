//! Per-pipeline cache of the property metadata the JSON builder needs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::constants::EVIDENCE_SEPARATOR;
use crate::data::ElementPropertyMetaData;
use crate::pipeline::Pipeline;

/// Delayed-execution metadata for one pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Complete names of JavaScript properties that only run on request.
    pub delayed_execution_properties: BTreeSet<String>,
    /// Complete property name → delayed JavaScript properties that supply
    /// evidence for it.
    pub delayed_evidence_properties: BTreeMap<String, Vec<String>>,
}

impl PipelineConfig {
    /// Walk the metadata of every element of `pipeline`.
    pub fn build(pipeline: &Pipeline) -> Self {
        let mut config = PipelineConfig::default();

        for (element_key, properties) in pipeline.element_available_properties() {
            let properties: Vec<&ElementPropertyMetaData> = properties.values().collect();
            add_delayed_execution(&properties, element_key, &mut config.delayed_execution_properties);
        }
        for (element_key, properties) in pipeline.element_available_properties() {
            let properties: Vec<&ElementPropertyMetaData> = properties.values().collect();
            add_evidence_properties(
                &properties,
                element_key,
                &config.delayed_execution_properties,
                &mut config.delayed_evidence_properties,
            );
        }
        config
    }
}

fn complete_name(data_path: &str, name: &str) -> String {
    format!("{}{}{}", data_path, EVIDENCE_SEPARATOR, name).to_lowercase()
}

fn add_delayed_execution(
    properties: &[&ElementPropertyMetaData],
    data_path: &str,
    delayed: &mut BTreeSet<String>,
) {
    for property in properties {
        let name = complete_name(data_path, &property.name);
        if property.is_javascript() && property.delay_execution {
            delayed.insert(name.clone());
        }
        let items: Vec<&ElementPropertyMetaData> = property.item_properties.iter().collect();
        add_delayed_execution(&items, &name, delayed);
    }
}

fn add_evidence_properties(
    properties: &[&ElementPropertyMetaData],
    data_path: &str,
    delayed: &BTreeSet<String>,
    evidence: &mut BTreeMap<String, Vec<String>>,
) {
    for property in properties {
        let name = complete_name(data_path, &property.name);
        let sources: Vec<String> = property
            .evidence_properties
            .iter()
            .map(|e| complete_name(&property.element_data_key, e))
            .filter(|e| delayed.contains(e))
            .collect();
        if !sources.is_empty() {
            evidence.insert(name.clone(), sources);
        }
        let items: Vec<&ElementPropertyMetaData> = property.item_properties.iter().collect();
        add_evidence_properties(&items, &name, delayed, evidence);
    }
}

/// Cache of [`PipelineConfig`] keyed by pipeline identity.
///
/// Entries are never invalidated; pipeline metadata does not change once the
/// pipeline is built.
#[derive(Debug, Default)]
pub struct PropertyMetadataRegistry {
    entries: RwLock<HashMap<u64, Arc<PipelineConfig>>>,
}

impl PropertyMetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the entry for `pipeline`, building it on first use.
    ///
    /// Two threads may both build on a miss; the first insert wins and both
    /// get that entry.
    pub fn get_or_build(&self, pipeline: &Pipeline) -> Arc<PipelineConfig> {
        if let Some(config) = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&pipeline.id())
        {
            return config.clone();
        }

        let built = Arc::new(PipelineConfig::build(pipeline));
        debug!(
            pipeline_id = pipeline.id(),
            delayed = built.delayed_execution_properties.len(),
            "property metadata registered"
        );
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(pipeline.id())
            .or_insert(built)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ValueKind;
    use crate::evidence::{EvidenceKeyFilter, EvidenceKeyFilterWhitelist};
    use crate::pipeline::{FlowData, FlowElement, PipelineBuilder};

    struct MetadataOnly {
        key: String,
        properties: Vec<ElementPropertyMetaData>,
    }

    #[async_trait::async_trait]
    impl FlowElement for MetadataOnly {
        fn element_data_key(&self) -> &str {
            &self.key
        }
        fn properties(&self) -> Vec<ElementPropertyMetaData> {
            self.properties.clone()
        }
        fn evidence_key_filter(&self) -> Arc<dyn EvidenceKeyFilter> {
            Arc::new(EvidenceKeyFilterWhitelist::default())
        }
        async fn process(&self, _data: &FlowData) -> crate::Result<()> {
            Ok(())
        }
    }

    fn pipeline(properties: Vec<ElementPropertyMetaData>) -> Pipeline {
        PipelineBuilder::new()
            .add_element(Arc::new(MetadataOnly {
                key: "Test".into(),
                properties,
            }))
            .build()
            .unwrap()
    }

    #[test]
    fn test_delayed_properties_and_evidence() {
        let pipeline = pipeline(vec![
            ElementPropertyMetaData::new("JsProperty", "test", ValueKind::JavaScript)
                .with_delay_execution(true),
            ElementPropertyMetaData::new("OtherJs", "test", ValueKind::JavaScript),
            ElementPropertyMetaData::new("Property", "test", ValueKind::String)
                .with_evidence_properties(["JsProperty", "OtherJs"]),
        ]);
        let config = PipelineConfig::build(&pipeline);
        assert_eq!(
            config.delayed_execution_properties.iter().collect::<Vec<_>>(),
            vec!["test.jsproperty"]
        );
        assert_eq!(
            config.delayed_evidence_properties.get("test.property"),
            Some(&vec!["test.jsproperty".to_string()])
        );
    }

    #[test]
    fn test_nested_item_properties() {
        let pipeline = pipeline(vec![ElementPropertyMetaData::new(
            "Profiles",
            "test",
            ValueKind::Records,
        )
        .with_item_properties(vec![
            ElementPropertyMetaData::new("Script", "test", ValueKind::JavaScript)
                .with_delay_execution(true),
            ElementPropertyMetaData::new("Value", "test", ValueKind::String)
                .with_evidence_properties(["Profiles.Script"]),
        ])]);
        let config = PipelineConfig::build(&pipeline);
        assert!(config
            .delayed_execution_properties
            .contains("test.profiles.script"));
        assert_eq!(
            config.delayed_evidence_properties.get("test.profiles.value"),
            Some(&vec!["test.profiles.script".to_string()])
        );
    }

    #[test]
    fn test_no_delayed_sources_no_entry() {
        let pipeline = pipeline(vec![
            ElementPropertyMetaData::new("JsProperty", "test", ValueKind::JavaScript),
            ElementPropertyMetaData::new("Property", "test", ValueKind::String)
                .with_evidence_properties(["JsProperty"]),
        ]);
        let config = PipelineConfig::build(&pipeline);
        assert!(config.delayed_execution_properties.is_empty());
        assert!(config.delayed_evidence_properties.is_empty());
    }

    #[test]
    fn test_registry_caches_per_pipeline() {
        let registry = PropertyMetadataRegistry::new();
        let first = pipeline(Vec::new());
        let second = pipeline(Vec::new());

        let a = registry.get_or_build(&first);
        let b = registry.get_or_build(&first.clone());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);

        registry.get_or_build(&second);
        assert_eq!(registry.len(), 2);
    }
}
