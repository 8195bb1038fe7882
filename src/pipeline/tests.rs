#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use tokio::sync::Barrier;

    use crate::data::{
        DictionaryElementData, ElementPropertyMetaData, PropertyErrorKind, PropertyStatus,
        PropertyValue, ValueKind,
    };
    use crate::evidence::{EvidenceKeyFilter, EvidenceKeyFilterWhitelist};
    use crate::pipeline::{FlowData, FlowElement, PipelineBuilder, PipelineError};
    use crate::{Error, Result};

    /// Element that records its key when it runs and stores fixed properties.
    struct Recorder {
        key: String,
        properties: Vec<(String, PropertyValue)>,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
        stop: bool,
        barrier: Option<Arc<Barrier>>,
    }

    impl Recorder {
        fn new(key: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                key: key.to_string(),
                properties: Vec::new(),
                log: log.clone(),
                fail: false,
                stop: false,
                barrier: None,
            }
        }

        fn with_property(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
            self.properties.push((name.to_string(), value.into()));
            self
        }
    }

    #[async_trait::async_trait]
    impl FlowElement for Recorder {
        fn element_data_key(&self) -> &str {
            &self.key
        }

        fn properties(&self) -> Vec<ElementPropertyMetaData> {
            self.properties
                .iter()
                .map(|(name, _)| ElementPropertyMetaData::new(name.clone(), self.key.clone(), ValueKind::String))
                .collect()
        }

        fn evidence_key_filter(&self) -> Arc<dyn EvidenceKeyFilter> {
            Arc::new(EvidenceKeyFilterWhitelist::new([format!("query.{}", self.key)]))
        }

        async fn process(&self, data: &FlowData) -> Result<()> {
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            self.log.lock().unwrap().push(self.key.clone());
            if self.stop {
                data.stop();
            }
            if self.fail {
                return Err(PipelineError::Execution {
                    element: self.key.clone(),
                    reason: "boom".to_string(),
                    hint: None,
                }
                .into());
            }
            let mut result = DictionaryElementData::new(self.key.clone());
            for (name, value) in &self.properties {
                result.insert(name.clone(), value.clone());
            }
            data.add_element_data(Arc::new(result));
            Ok(())
        }
    }

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        let err = PipelineBuilder::new().build().unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let log = log();
        let err = PipelineBuilder::new()
            .add_element(Arc::new(Recorder::new("a", &log)))
            .add_element(Arc::new(Recorder::new("A", &log)))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("'a'"));
    }

    #[test]
    fn test_pipeline_metadata_and_filter() {
        let log = log();
        let pipeline = PipelineBuilder::new()
            .add_element(Arc::new(Recorder::new("Device", &log).with_property("IsMobile", true)))
            .add_element(Arc::new(Recorder::new("location", &log)))
            .build()
            .unwrap();

        assert!(pipeline.property_metadata("device", "ismobile").is_some());
        assert!(pipeline.property_metadata("DEVICE", "IsMobile").is_some());
        assert!(pipeline.property_metadata("location", "ismobile").is_none());
        assert!(pipeline.evidence_key_filter().include("query.device"));
        assert!(pipeline.evidence_key_filter().include("Query.Location"));
        assert!(!pipeline.evidence_key_filter().include("query.other"));

        let clone = pipeline.clone();
        assert_eq!(clone.id(), pipeline.id());
        let other = PipelineBuilder::new()
            .add_element(Arc::new(Recorder::new("x", &log)))
            .build()
            .unwrap();
        assert_ne!(other.id(), pipeline.id());
    }

    #[tokio::test]
    async fn test_elements_run_in_order() {
        let log = log();
        let pipeline = PipelineBuilder::new()
            .add_element(Arc::new(Recorder::new("first", &log)))
            .add_element(Arc::new(Recorder::new("second", &log)))
            .add_element(Arc::new(Recorder::new("third", &log)))
            .build()
            .unwrap();
        let data = pipeline.create_flow_data();
        data.process().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);

        let keys: Vec<String> = data
            .element_data()
            .iter()
            .map(|d| d.element_data_key().to_string())
            .collect();
        assert_eq!(keys, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_parallel_stage_runs_concurrently() {
        let log = log();
        let barrier = Arc::new(Barrier::new(2));
        let mut left = Recorder::new("left", &log);
        left.barrier = Some(barrier.clone());
        let mut right = Recorder::new("right", &log);
        right.barrier = Some(barrier);

        let pipeline = PipelineBuilder::new()
            .add_parallel_elements(vec![
                Arc::new(left) as Arc<dyn FlowElement>,
                Arc::new(right) as Arc<dyn FlowElement>,
            ])
            .add_element(Arc::new(Recorder::new("after", &log)))
            .build()
            .unwrap();
        let data = pipeline.create_flow_data();

        // Each element waits for the other, so sequential execution would hang.
        tokio::time::timeout(Duration::from_secs(5), data.process())
            .await
            .expect("parallel stage did not complete")
            .unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[2], "after");
        assert!(data.get_element_data("left").is_some());
        assert!(data.get_element_data("right").is_some());
    }

    #[tokio::test]
    async fn test_errors_recorded_and_processing_continues() {
        let log = log();
        let mut failing = Recorder::new("failing", &log);
        failing.fail = true;
        let pipeline = PipelineBuilder::new()
            .add_element(Arc::new(failing))
            .add_element(Arc::new(Recorder::new("next", &log)))
            .build()
            .unwrap();
        let data = pipeline.create_flow_data();

        let err = data.process().await.unwrap_err();
        match err {
            Error::Pipeline(PipelineError::Process { errors }) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].starts_with("failing: "));
                assert!(errors[0].contains("boom"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(*log.lock().unwrap(), vec!["failing", "next"]);
        assert_eq!(data.errors()[0].element_key, "failing");
    }

    #[tokio::test]
    async fn test_suppressed_errors_stay_on_flow_data() {
        let log = log();
        let mut failing = Recorder::new("failing", &log);
        failing.fail = true;
        let pipeline = PipelineBuilder::new()
            .add_element(Arc::new(failing))
            .suppress_process_exceptions(true)
            .build()
            .unwrap();
        let data = pipeline.create_flow_data();
        data.process().await.unwrap();
        assert!(data.has_errors());
    }

    #[tokio::test]
    async fn test_stop_skips_remaining_stages() {
        let log = log();
        let mut stopper = Recorder::new("stopper", &log);
        stopper.stop = true;
        let pipeline = PipelineBuilder::new()
            .add_element(Arc::new(stopper))
            .add_element(Arc::new(Recorder::new("skipped", &log)))
            .build()
            .unwrap();
        let data = pipeline.create_flow_data();
        data.process().await.unwrap();
        assert!(data.is_stopped());
        assert_eq!(*log.lock().unwrap(), vec!["stopper"]);
    }

    #[tokio::test]
    async fn test_process_twice_rejected() {
        let log = log();
        let pipeline = PipelineBuilder::new()
            .add_element(Arc::new(Recorder::new("a", &log)))
            .build()
            .unwrap();
        let data = pipeline.create_flow_data();
        data.process().await.unwrap();
        let err = data.process().await.unwrap_err();
        assert!(matches!(err, Error::Pipeline(PipelineError::AlreadyProcessed)));
    }

    #[tokio::test]
    async fn test_try_get_property_statuses() {
        let log = log();
        let pipeline = PipelineBuilder::new()
            .add_element(Arc::new(
                Recorder::new("device", &log)
                    .with_property("IsMobile", PropertyValue::aspect(true))
                    .with_property("HardwareName", PropertyValue::no_value("No match"))
                    .with_property("Shared", "d"),
            ))
            .add_element(Arc::new(Recorder::new("location", &log).with_property("Shared", "l")))
            .add_element(Arc::new(Recorder::new("late", &log).with_property("Country", "uk")))
            .build()
            .unwrap();
        let data = pipeline.create_flow_data();

        assert!(matches!(
            data.try_get_property("country"),
            PropertyStatus::Errored(e) if e.kind == PropertyErrorKind::KeyNotFound
        ));

        data.process().await.unwrap();

        assert_eq!(
            data.try_get_property("ismobile"),
            PropertyStatus::Available(PropertyValue::Bool(true))
        );
        assert_eq!(
            data.try_get_property("HardwareName"),
            PropertyStatus::NoValue("No match".to_string())
        );
        assert_eq!(data.try_get_property("unknown"), PropertyStatus::NotPresent);
        assert!(matches!(
            data.try_get_property("shared"),
            PropertyStatus::Errored(e) if e.kind == PropertyErrorKind::PipelineData
        ));
    }

    #[tokio::test]
    async fn test_get_as_type_mismatch() {
        let log = log();
        let pipeline = PipelineBuilder::new()
            .add_element(Arc::new(Recorder::new("device", &log)))
            .build()
            .unwrap();
        let data = pipeline.create_flow_data();
        data.process().await.unwrap();

        assert!(data.get_as::<DictionaryElementData>("DEVICE").is_ok());
        let err = data
            .get_as::<crate::elements::JsonBuilderData>("device")
            .unwrap_err();
        assert!(matches!(err, Error::Data(_)));
        assert!(matches!(
            data.get_as::<DictionaryElementData>("missing"),
            Err(Error::Data(crate::data::DataError::KeyNotFound(_)))
        ));
    }
}
