//! 流水线模块：按顺序（或并行阶段）执行 flow element，并汇总每个元素的结果。
//!
//! # Pipeline Layer
//!
//! A [`Pipeline`] is an ordered chain of [`FlowElement`]s. Each request gets a
//! [`FlowData`] holding its evidence; processing runs every element against it
//! and each element stores its results on the flow data.
//!
//! ## Stages
//!
//! ```text
//! Evidence → Sequence → [Engines (parallel)] → JSON builder → JavaScript builder
//!               │               │                   │                 │
//!          session-id,     element data        merged JSON      client script
//!           sequence
//! ```
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`FlowElement`] | Trait implemented by every processing element |
//! | [`PipelineBuilder`] | Builder for constructing pipelines |
//! | [`Pipeline`] | Immutable, shareable chain of elements |
//! | [`FlowData`] | Per-request evidence, results and errors |
//!
//! ## Error Handling
//!
//! An element that fails does not stop the pipeline. Its error is recorded on
//! the flow data (where later elements, such as the JSON builder, can report
//! it) and processing carries on. Once all stages have run, recorded errors
//! are returned as [`PipelineError::Process`] unless the pipeline was built
//! with `suppress_process_exceptions`.

pub mod flow_data;

#[cfg(test)]
mod tests;

pub use flow_data::{FlowData, FlowError};

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::data::ElementPropertyMetaData;
use crate::evidence::{EvidenceKeyFilter, EvidenceKeyFilterAggregator};
use crate::Result;

/// A unit of processing that reads evidence and earlier results and stores
/// its own results on the flow data.
#[async_trait::async_trait]
pub trait FlowElement: Send + Sync {
    /// Key under which this element's results are stored.
    fn element_data_key(&self) -> &str;

    /// Metadata for the properties this element populates.
    fn properties(&self) -> Vec<ElementPropertyMetaData> {
        Vec::new()
    }

    /// Evidence keys this element reads.
    fn evidence_key_filter(&self) -> Arc<dyn EvidenceKeyFilter>;

    async fn process(&self, data: &FlowData) -> Result<()>;
}

/// Pipeline error types
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing required evidence: {key}{}", .hint.as_ref().map(|h| format!("\nHint: {}", h)).unwrap_or_default())]
    MissingEvidence { key: String, hint: Option<String> },

    #[error("Invalid evidence value '{value}' for {key}: {reason}")]
    InvalidEvidence {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Element execution failed: {element} - {reason}{}", .hint.as_ref().map(|h| format!("\nHint: {}", h)).unwrap_or_default())]
    Execution {
        element: String,
        reason: String,
        hint: Option<String>,
    },

    #[error("{} error(s) occurred during processing: {}", .errors.len(), .errors.join("; "))]
    Process { errors: Vec<String> },

    #[error("Flow data has already been processed")]
    AlreadyProcessed,
}

impl PipelineError {
    /// Attach an actionable hint to the error
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        let hint_val = Some(hint.into());
        match self {
            PipelineError::MissingEvidence { ref mut hint, .. } => *hint = hint_val,
            PipelineError::Execution { ref mut hint, .. } => *hint = hint_val,
            _ => (),
        }
        self
    }
}

/// Elements run together in one step of the pipeline.
#[derive(Clone)]
enum Stage {
    Single(Arc<dyn FlowElement>),
    /// Elements that do not depend on each other and run concurrently.
    Parallel(Vec<Arc<dyn FlowElement>>),
}

impl Stage {
    fn elements(&self) -> Vec<&Arc<dyn FlowElement>> {
        match self {
            Stage::Single(e) => vec![e],
            Stage::Parallel(es) => es.iter().collect(),
        }
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    stages: Vec<Stage>,
    suppress_process_exceptions: bool,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            suppress_process_exceptions: false,
        }
    }

    pub fn add_element(mut self, element: Arc<dyn FlowElement>) -> Self {
        self.stages.push(Stage::Single(element));
        self
    }

    /// Add elements that run concurrently with each other.
    pub fn add_parallel_elements(mut self, mut elements: Vec<Arc<dyn FlowElement>>) -> Self {
        if elements.len() > 1 {
            self.stages.push(Stage::Parallel(elements));
        } else if let Some(element) = elements.pop() {
            self.stages.push(Stage::Single(element));
        }
        self
    }

    /// Keep errors recorded on the flow data instead of returning them from
    /// processing. Also lets elements degrade instead of failing on
    /// unexpected errors.
    pub fn suppress_process_exceptions(mut self, suppress: bool) -> Self {
        self.suppress_process_exceptions = suppress;
        self
    }

    pub fn build(self) -> std::result::Result<Pipeline, PipelineError> {
        if self.stages.is_empty() {
            return Err(PipelineError::Configuration(
                "A pipeline requires at least one element".to_string(),
            ));
        }

        let mut available_properties: BTreeMap<String, BTreeMap<String, ElementPropertyMetaData>> =
            BTreeMap::new();
        let mut evidence_filter = EvidenceKeyFilterAggregator::new();
        for element in self.stages.iter().flat_map(Stage::elements) {
            let key = element.element_data_key().to_lowercase();
            if available_properties.contains_key(&key) {
                return Err(PipelineError::Configuration(format!(
                    "Element key '{}' is used by more than one element",
                    key
                )));
            }
            let properties = element
                .properties()
                .into_iter()
                .map(|p| (p.name.to_lowercase(), p))
                .collect();
            available_properties.insert(key, properties);
            evidence_filter.add_filter(element.evidence_key_filter());
        }

        let id = NEXT_PIPELINE_ID.fetch_add(1, Ordering::Relaxed);
        debug!(pipeline_id = id, stages = self.stages.len(), "pipeline built");

        Ok(Pipeline {
            inner: Arc::new(PipelineInner {
                id,
                stages: self.stages,
                suppress_process_exceptions: self.suppress_process_exceptions,
                available_properties,
                evidence_filter,
            }),
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

static NEXT_PIPELINE_ID: AtomicU64 = AtomicU64::new(1);

struct PipelineInner {
    id: u64,
    stages: Vec<Stage>,
    suppress_process_exceptions: bool,
    available_properties: BTreeMap<String, BTreeMap<String, ElementPropertyMetaData>>,
    evidence_filter: EvidenceKeyFilterAggregator,
}

/// An immutable chain of elements. Cloning is cheap and clones share
/// identity.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

impl Pipeline {
    /// Identity of this pipeline, unique within the process.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn suppress_process_exceptions(&self) -> bool {
        self.inner.suppress_process_exceptions
    }

    /// All elements, in processing order.
    pub fn elements(&self) -> Vec<Arc<dyn FlowElement>> {
        self.inner
            .stages
            .iter()
            .flat_map(Stage::elements)
            .cloned()
            .collect()
    }

    /// Lower-cased element key → lower-cased property name → metadata.
    pub fn element_available_properties(
        &self,
    ) -> &BTreeMap<String, BTreeMap<String, ElementPropertyMetaData>> {
        &self.inner.available_properties
    }

    /// Metadata for `element_key.property_name`, matched case-insensitively.
    pub fn property_metadata(&self, element_key: &str, property: &str) -> Option<&ElementPropertyMetaData> {
        self.inner
            .available_properties
            .get(&element_key.to_lowercase())
            .and_then(|props| props.get(&property.to_lowercase()))
    }

    /// Union of the evidence filters of all elements.
    pub fn evidence_key_filter(&self) -> &dyn EvidenceKeyFilter {
        &self.inner.evidence_filter
    }

    pub fn create_flow_data(&self) -> FlowData {
        FlowData::new(self.clone())
    }

    /// Run every stage against `data`.
    pub async fn process(&self, data: &FlowData) -> Result<()> {
        for stage in &self.inner.stages {
            if data.is_stopped() {
                debug!(pipeline_id = self.id(), "processing stopped early");
                break;
            }
            match stage {
                Stage::Single(element) => run_element(element.as_ref(), data).await,
                Stage::Parallel(elements) => {
                    futures::future::join_all(
                        elements.iter().map(|e| run_element(e.as_ref(), data)),
                    )
                    .await;
                }
            }
        }

        let errors = data.errors();
        if !errors.is_empty() && !self.inner.suppress_process_exceptions {
            return Err(PipelineError::Process {
                errors: errors.iter().map(ToString::to_string).collect(),
            }
            .into());
        }
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.inner.id)
            .field("elements", &self.inner.available_properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

async fn run_element(element: &dyn FlowElement, data: &FlowData) {
    if let Err(e) = element.process(data).await {
        warn!(element = element.element_data_key(), error = %e, "element failed");
        data.add_error(FlowError::new(element.element_data_key(), &e));
    }
}
