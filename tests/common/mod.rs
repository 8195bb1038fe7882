//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use fiftyone_pipeline::data::{JavaScript, PropertyMap};
use fiftyone_pipeline::evidence::{EvidenceKeyFilter, EvidenceKeyFilterWhitelist};
use fiftyone_pipeline::{
    DictionaryElementData, ElementPropertyMetaData, FlowData, FlowElement, PropertyValue,
    ValueKind,
};

pub const ENGINE_KEY: &str = "device";

/// Stand-in for a detection engine with one property of each shape the JSON
/// builder cares about.
pub struct TestEngine {
    pub screen_width: PropertyValue,
    /// Whether `ScreenJs` waits for the client to opt in.
    pub delayed: bool,
    pub fail: bool,
}

impl Default for TestEngine {
    fn default() -> Self {
        Self {
            screen_width: PropertyValue::Integer(1080),
            delayed: true,
            fail: false,
        }
    }
}

#[async_trait::async_trait]
impl FlowElement for TestEngine {
    fn element_data_key(&self) -> &str {
        ENGINE_KEY
    }

    fn properties(&self) -> Vec<ElementPropertyMetaData> {
        vec![
            ElementPropertyMetaData::new("IsMobile", ENGINE_KEY, ValueKind::Bool),
            ElementPropertyMetaData::new("HardwareName", ENGINE_KEY, ValueKind::String),
            ElementPropertyMetaData::new("TitleJs", ENGINE_KEY, ValueKind::JavaScript),
            ElementPropertyMetaData::new("ScreenJs", ENGINE_KEY, ValueKind::JavaScript)
                .with_delay_execution(self.delayed),
            ElementPropertyMetaData::new("ScreenWidth", ENGINE_KEY, ValueKind::Integer)
                .with_evidence_properties(["ScreenJs"]),
            ElementPropertyMetaData::new("Profiles", ENGINE_KEY, ValueKind::Records)
                .with_item_properties(vec![ElementPropertyMetaData::new(
                    "Name",
                    ENGINE_KEY,
                    ValueKind::String,
                )]),
        ]
    }

    fn evidence_key_filter(&self) -> Arc<dyn EvidenceKeyFilter> {
        Arc::new(EvidenceKeyFilterWhitelist::new(["header.user-agent"]))
    }

    async fn process(&self, data: &FlowData) -> fiftyone_pipeline::Result<()> {
        if self.fail {
            return Err(fiftyone_pipeline::PipelineError::Execution {
                element: ENGINE_KEY.to_string(),
                reason: "engine unavailable".to_string(),
                hint: None,
            }
            .into());
        }
        let mut profile = PropertyMap::new();
        profile.insert("Name".to_string(), PropertyValue::aspect("Phone"));
        data.add_element_data(Arc::new(
            DictionaryElementData::new(ENGINE_KEY)
                .with_property("IsMobile", PropertyValue::aspect(true))
                .with_property("HardwareName", PropertyValue::no_value("No matching profile."))
                .with_property(
                    "TitleJs",
                    PropertyValue::aspect(JavaScript::new("document.title = 'detected';")),
                )
                .with_property(
                    "ScreenJs",
                    JavaScript::new("window.screenWidth = screen.width;"),
                )
                .with_property("ScreenWidth", self.screen_width.clone())
                .with_property("Profiles", vec![profile]),
        ));
        Ok(())
    }
}
