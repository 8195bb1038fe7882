mod common;

use std::sync::Arc;

use common::{TestEngine, ENGINE_KEY};
use fiftyone_pipeline::constants::{EVIDENCE_SEQUENCE, JSON_BUILDER_ELEMENT_KEY, MAX_JAVASCRIPT_ITERATIONS};
use fiftyone_pipeline::evidence::{EvidenceKeyFilter, EvidenceKeyFilterWhitelist};
use fiftyone_pipeline::{
    DictionaryElementData, ElementPropertyMetaData, Error, FlowData, FlowElement, JsonBuilderData,
    JsonBuilderElement, Pipeline, PipelineBuilder, PipelineError, PropertyValue, SequenceElement,
    ValueKind,
};
use serde_json::{json, Value};

fn pipeline_with(engine: TestEngine, suppress: bool) -> (Pipeline, Arc<JsonBuilderElement>) {
    let builder = Arc::new(JsonBuilderElement::new());
    let pipeline = PipelineBuilder::new()
        .add_element(Arc::new(SequenceElement::new()))
        .add_element(Arc::new(engine))
        .add_element(builder.clone())
        .suppress_process_exceptions(suppress)
        .build()
        .unwrap();
    (pipeline, builder)
}

async fn json_for(pipeline: &Pipeline) -> Value {
    let data = pipeline.create_flow_data();
    data.process().await.unwrap();
    data.get_as::<JsonBuilderData>(JSON_BUILDER_ELEMENT_KEY)
        .unwrap()
        .to_value()
        .unwrap()
}

fn assert_keys_lowercase(value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                if key != "javascriptProperties" {
                    assert_eq!(key, &key.to_lowercase(), "key '{}' is not lower case", key);
                }
                assert_keys_lowercase(inner);
            }
        }
        Value::Array(items) => items.iter().for_each(assert_keys_lowercase),
        _ => {}
    }
}

#[tokio::test]
async fn test_document_shape() {
    let (pipeline, _) = pipeline_with(TestEngine::default(), false);
    let json = json_for(&pipeline).await;

    assert_eq!(
        json,
        json!({
            "device": {
                "hardwarename": null,
                "hardwarenamenullreason": "No matching profile.",
                "ismobile": true,
                "profiles": [{"name": "Phone"}],
                "screenjs": "window.screenWidth = screen.width;",
                "screenjsdelayexecution": true,
                "screenwidth": 1080,
                "screenwidthevidenceproperties": ["device.screenjs"],
                "titlejs": "document.title = 'detected';"
            },
            "javascriptProperties": ["device.screenjs", "device.titlejs"]
        })
    );
    assert_keys_lowercase(&json);
}

#[tokio::test]
async fn test_top_level_keys() {
    let (pipeline, _) = pipeline_with(TestEngine::default(), false);
    let json = json_for(&pipeline).await;
    let allowed = [ENGINE_KEY, "javascriptProperties", "errors"];
    for key in json.as_object().unwrap().keys() {
        assert!(allowed.contains(&key.as_str()), "unexpected key {}", key);
    }
}

#[tokio::test]
async fn test_build_is_idempotent() {
    let (pipeline, builder) = pipeline_with(TestEngine::default(), false);
    let data = pipeline.create_flow_data();
    data.process().await.unwrap();

    let first = builder.build_json(&data).unwrap();
    let second = builder.build_json(&data).unwrap();
    assert_eq!(first, second);
    assert!(serde_json::from_str::<Value>(&first).is_ok());
    assert_eq!(builder.registry().len(), 1);
}

#[tokio::test]
async fn test_javascript_properties_capped_by_sequence() {
    let builder = Arc::new(JsonBuilderElement::new());
    let pipeline = PipelineBuilder::new()
        .add_element(Arc::new(TestEngine::default()))
        .add_element(builder as Arc<dyn FlowElement>)
        .build()
        .unwrap();

    for sequence in 0..MAX_JAVASCRIPT_ITERATIONS + 3 {
        let data = pipeline.create_flow_data();
        data.add_evidence(EVIDENCE_SEQUENCE, sequence.to_string());
        data.process().await.unwrap();
        let json = data
            .get_as::<JsonBuilderData>(JSON_BUILDER_ELEMENT_KEY)
            .unwrap()
            .to_value()
            .unwrap();
        let properties = json.get("javascriptProperties");
        if sequence < MAX_JAVASCRIPT_ITERATIONS {
            assert!(
                properties.and_then(Value::as_array).map(|a| !a.is_empty()).unwrap_or(false),
                "sequence {} should list JavaScript properties",
                sequence
            );
        } else {
            assert!(properties.is_none(), "sequence {} should not list JavaScript properties", sequence);
        }
    }
}

#[tokio::test]
async fn test_delayed_evidence_for_unknown_value() {
    let (pipeline, _) = pipeline_with(
        TestEngine {
            screen_width: PropertyValue::Null,
            ..TestEngine::default()
        },
        false,
    );
    let json = json_for(&pipeline).await;
    let device = &json["device"];
    assert_eq!(device["screenwidth"], Value::Null);
    assert_eq!(device["screenwidthevidenceproperties"], json!(["device.screenjs"]));
    assert_eq!(device["screenjsdelayexecution"], json!(true));
}

#[tokio::test]
async fn test_no_meta_keys_without_delayed_execution() {
    let (pipeline, _) = pipeline_with(
        TestEngine {
            delayed: false,
            ..TestEngine::default()
        },
        false,
    );
    let json = json_for(&pipeline).await;
    let device = json[ENGINE_KEY].as_object().unwrap();
    assert_eq!(device["screenwidth"], json!(1080));
    assert!(!device.contains_key("screenjsdelayexecution"));
    assert!(!device.contains_key("screenwidthevidenceproperties"));
    assert!(!json.to_string().contains("delayexecution"));
}

/// Stores results under keys the JSON document leaves out, next to one it keeps.
struct ResponseWriter;

#[async_trait::async_trait]
impl FlowElement for ResponseWriter {
    fn element_data_key(&self) -> &str {
        "location"
    }

    fn properties(&self) -> Vec<ElementPropertyMetaData> {
        vec![ElementPropertyMetaData::new("Town", "location", ValueKind::String)]
    }

    fn evidence_key_filter(&self) -> Arc<dyn EvidenceKeyFilter> {
        Arc::new(EvidenceKeyFilterWhitelist::default())
    }

    async fn process(&self, data: &FlowData) -> fiftyone_pipeline::Result<()> {
        data.add_element_data(Arc::new(
            DictionaryElementData::new("location").with_property("Town", "Reading"),
        ));
        for key in ["Set-Headers", "cloud-response", "JavaScriptBuilderElement"] {
            data.add_element_data(Arc::new(
                DictionaryElementData::new(key).with_property("Payload", "hidden"),
            ));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_excluded_elements_left_out() {
    let pipeline = PipelineBuilder::new()
        .add_element(Arc::new(SequenceElement::new()))
        .add_element(Arc::new(ResponseWriter))
        .add_element(Arc::new(JsonBuilderElement::new()))
        .build()
        .unwrap();
    let json = json_for(&pipeline).await;

    assert_eq!(json["location"]["town"], json!("Reading"));
    let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["location"]);
    assert!(!json.to_string().contains("hidden"));
}

#[tokio::test]
async fn test_missing_sequence_is_fatal() {
    let pipeline = PipelineBuilder::new()
        .add_element(Arc::new(TestEngine::default()))
        .add_element(Arc::new(JsonBuilderElement::new()))
        .build()
        .unwrap();
    let data = pipeline.create_flow_data();
    let err = data.process().await.unwrap_err();
    assert!(err.to_string().contains(EVIDENCE_SEQUENCE));
    assert!(data.get_element_data(JSON_BUILDER_ELEMENT_KEY).is_none());

    let builder = JsonBuilderElement::new();
    assert!(matches!(
        builder.build_json(&data),
        Err(Error::Pipeline(PipelineError::MissingEvidence { .. }))
    ));
}

#[tokio::test]
async fn test_errors_listed_in_document() {
    let (pipeline, _) = pipeline_with(
        TestEngine {
            fail: true,
            ..TestEngine::default()
        },
        true,
    );
    let json = json_for(&pipeline).await;
    let errors = json["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().contains("engine unavailable"));
    assert!(json.get(ENGINE_KEY).is_none());
    assert!(json.get("javascriptProperties").is_none());
}

#[tokio::test]
async fn test_serialization_failure_is_captured() {
    let (pipeline, _) = pipeline_with(
        TestEngine {
            screen_width: PropertyValue::Float(f64::INFINITY),
            ..TestEngine::default()
        },
        true,
    );
    let data = pipeline.create_flow_data();
    data.process().await.unwrap();

    let result = data.get_as::<JsonBuilderData>(JSON_BUILDER_ELEMENT_KEY).unwrap();
    assert_eq!(result.json(), "{}");
    let errors = data.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].element_key, JSON_BUILDER_ELEMENT_KEY);
}

#[tokio::test]
async fn test_plain_values_without_meta_data() {
    let (pipeline, builder) = pipeline_with(TestEngine::default(), false);
    let data = pipeline.create_flow_data();
    data.process().await.unwrap();

    let value = builder.to_json_value(&data).unwrap();
    let device = value[ENGINE_KEY].as_object().unwrap();
    assert!(device.contains_key("screenjs"));
    assert!(device.contains_key("hardwarenamenullreason"));
    assert!(!device.contains_key("screenjsdelayexecution"));
    assert!(!device.contains_key("screenwidthevidenceproperties"));
    assert!(value.get("javascriptProperties").is_none());
}

#[test]
fn test_low_level_serialize() {
    let text = JsonBuilderElement::serialize(&json!({
        "Device": {"IsMobile": true},
        "javascriptProperties": ["device.screenjs"]
    }))
    .unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["device"]["ismobile"], json!(true));
    assert_eq!(value["javascriptProperties"], json!(["device.screenjs"]));
}
