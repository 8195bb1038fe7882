//! Per-request state shared by all elements of a pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::data::{
    ConcurrentTypedKeyMap, DataError, ElementData, PropertyError, PropertyErrorKind,
    PropertyStatus, TypedKey, TypedKeyMap,
};
use crate::evidence::Evidence;
use crate::pipeline::{Pipeline, PipelineError};
use crate::Result;

/// An error recorded while an element processed a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowError {
    pub element_key: String,
    pub message: String,
}

impl FlowError {
    pub fn new(element_key: impl Into<String>, error: &dyn std::fmt::Display) -> Self {
        Self {
            element_key: element_key.into(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for FlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.element_key, self.message)
    }
}

/// Evidence, element results and errors for one request.
///
/// Element results are stored in a [`ConcurrentTypedKeyMap`] as
/// `Arc<dyn ElementData>` under their lower-cased element key.
pub struct FlowData {
    pipeline: Pipeline,
    evidence: Evidence,
    data: ConcurrentTypedKeyMap,
    errors: RwLock<Vec<FlowError>>,
    stopped: AtomicBool,
    processed: AtomicBool,
}

impl FlowData {
    pub(crate) fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            evidence: Evidence::new(),
            data: ConcurrentTypedKeyMap::new(),
            errors: RwLock::new(Vec::new()),
            stopped: AtomicBool::new(false),
            processed: AtomicBool::new(false),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn evidence(&self) -> &Evidence {
        &self.evidence
    }

    pub fn add_evidence(&self, key: impl AsRef<str>, value: impl Into<String>) -> &Self {
        self.evidence.add(key, value);
        self
    }

    pub fn add_evidence_from<I, K, V>(&self, values: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (k, v) in values {
            self.evidence.add(k, v);
        }
        self
    }

    pub fn get_evidence(&self, key: &str) -> Option<String> {
        self.evidence.try_get(key)
    }

    /// Run the pipeline. A flow data can only be processed once.
    pub async fn process(&self) -> Result<()> {
        if self.processed.swap(true, Ordering::SeqCst) {
            return Err(PipelineError::AlreadyProcessed.into());
        }
        let pipeline = self.pipeline.clone();
        pipeline.process(self).await
    }

    /// Store an element's results, replacing earlier results for the same key.
    pub fn add_element_data(&self, data: Arc<dyn ElementData>) {
        let key = TypedKey::<Arc<dyn ElementData>>::new(data.element_data_key().to_lowercase());
        self.data.add(&key, data);
    }

    pub fn get_element_data(&self, element_key: &str) -> Option<Arc<dyn ElementData>> {
        let key = TypedKey::<Arc<dyn ElementData>>::new(element_key.to_lowercase());
        self.data.try_get(&key).map(|d| d.as_ref().clone())
    }

    /// Results of `element_key` as their concrete type.
    pub fn get_as<T: ElementData>(&self, element_key: &str) -> Result<Arc<T>> {
        let data = self
            .get_element_data(element_key)
            .ok_or_else(|| DataError::KeyNotFound(element_key.to_lowercase()))?;
        let stored = data.element_data_key().to_string();
        data.into_any().downcast::<T>().map_err(|_| {
            crate::Error::from(DataError::TypeMismatch {
                key: element_key.to_lowercase(),
                stored: format!("element data of '{}'", stored),
                requested: std::any::type_name::<T>().to_string(),
            })
        })
    }

    /// All element results in the order they were stored.
    pub fn element_data(&self) -> Vec<Arc<dyn ElementData>> {
        self.data
            .keys()
            .into_iter()
            .filter_map(|name| self.get_element_data(&name))
            .collect()
    }

    /// The underlying typed store.
    pub fn store(&self) -> &ConcurrentTypedKeyMap {
        &self.data
    }

    /// Look up a property by name across all elements.
    ///
    /// The owning element is found from the pipeline's property metadata.
    pub fn try_get_property(&self, name: &str) -> PropertyStatus {
        let lower = name.to_lowercase();
        let owners: Vec<&String> = self
            .pipeline
            .element_available_properties()
            .iter()
            .filter(|(_, props)| props.contains_key(&lower))
            .map(|(key, _)| key)
            .collect();

        match owners.as_slice() {
            [] => PropertyStatus::NotPresent,
            [owner] => match self.get_element_data(owner) {
                Some(data) => data.try_get_property(name),
                None => PropertyStatus::Errored(PropertyError::new(
                    PropertyErrorKind::KeyNotFound,
                    format!("No results stored for element '{}'", owner),
                )),
            },
            many => PropertyStatus::Errored(PropertyError::new(
                PropertyErrorKind::PipelineData,
                format!(
                    "Property '{}' is available in more than one element: {}",
                    name,
                    many.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
                ),
            )),
        }
    }

    pub fn add_error(&self, error: FlowError) {
        self.errors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(error);
    }

    pub fn errors(&self) -> Vec<FlowError> {
        self.errors.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.read().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    /// Ask the pipeline not to run any further stages for this request.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for FlowData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowData")
            .field("pipeline", &self.pipeline)
            .field("evidence", &self.evidence)
            .field("elements", &self.data.keys())
            .field("errors", &self.errors())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
