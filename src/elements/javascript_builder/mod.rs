//! JavaScript builder: renders the client-side script that carries the JSON
//! document to the browser and drives the refinement loop.
//!
//! The script runs the JavaScript properties listed in the document, posts the
//! evidence they produce to the callback URL and receives refined JSON, until
//! the server stops listing JavaScript properties.

pub mod callback;
pub mod config;

pub use callback::{callback_url, join_host_endpoint, query_parameters};
pub use config::{is_valid_object_name, JavaScriptBuilderConfig};

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::constants::{
    DEFAULT_PROTOCOL, DELAY_EXECUTION_SUFFIX, EVIDENCE_ENABLE_COOKIES, EVIDENCE_HOST_KEY,
    EVIDENCE_OBJECT_NAME, EVIDENCE_PROTOCOL, EVIDENCE_QUERY_PREFIX, EVIDENCE_SEPARATOR,
    EVIDENCE_SESSIONID, FETCH_PROPERTY, JAVASCRIPT_BUILDER_ELEMENT_KEY, JSON_BUILDER_ELEMENT_KEY,
    PROMISE_PROPERTY,
};
use crate::data::{
    ElementData, ElementPropertyMetaData, PropertyError, PropertyErrorKind, PropertyMap,
    PropertyStatus, PropertyValue, ValueKind,
};
use crate::elements::json_builder::JsonBuilderData;
use crate::elements::sequence::sequence_number;
use crate::error::ErrorContext;
use crate::evidence::{EvidenceKeyFilter, EvidenceKeyFilterWhitelist};
use crate::pipeline::{FlowData, FlowElement};
use crate::utils::{Minifier, Template, TemplateContext, WhitespaceMinifier};
use crate::{Error, Result};

/// Script template bundled with the crate.
pub const DEFAULT_TEMPLATE: &str = include_str!("../../../assets/javascript_resource.mustache");

/// Results of the JavaScript builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaScriptBuilderData {
    javascript: String,
}

impl JavaScriptBuilderData {
    pub fn new(javascript: impl Into<String>) -> Self {
        Self {
            javascript: javascript.into(),
        }
    }

    pub fn javascript(&self) -> &str {
        &self.javascript
    }
}

impl ElementData for JavaScriptBuilderData {
    fn element_data_key(&self) -> &str {
        JAVASCRIPT_BUILDER_ELEMENT_KEY
    }

    fn as_dictionary(&self) -> PropertyMap {
        let mut map = PropertyMap::new();
        map.insert(
            "javascript".to_string(),
            PropertyValue::String(self.javascript.clone()),
        );
        map
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Accepts all query evidence plus the host and protocol headers.
struct ScriptEvidenceFilter {
    headers: EvidenceKeyFilterWhitelist,
    query_prefix: String,
}

impl EvidenceKeyFilter for ScriptEvidenceFilter {
    fn include(&self, key: &str) -> bool {
        key.to_lowercase().starts_with(&self.query_prefix) || self.headers.include(key)
    }

    fn order(&self, key: &str) -> Option<i32> {
        if key.to_lowercase().starts_with(&self.query_prefix) {
            Some(0)
        } else {
            self.headers.order(key)
        }
    }
}

struct RenderedScript {
    script: String,
    minify_failed: bool,
}

pub struct JavaScriptBuilderElement {
    config: JavaScriptBuilderConfig,
    template: Template,
    minifier: Arc<dyn Minifier>,
    filter: Arc<ScriptEvidenceFilter>,
    promise_disabled: AtomicBool,
    fetch_disabled: AtomicBool,
    url_error_logged: AtomicBool,
    minify_failed: AtomicBool,
}

impl JavaScriptBuilderElement {
    /// Validate `config` and parse the template.
    pub fn new(config: JavaScriptBuilderConfig) -> Result<Self> {
        config.validate()?;
        let template = Template::parse(config.template.as_deref().unwrap_or(DEFAULT_TEMPLATE))?;
        Ok(Self {
            config,
            template,
            minifier: Arc::new(WhitespaceMinifier),
            filter: Arc::new(ScriptEvidenceFilter {
                headers: EvidenceKeyFilterWhitelist::new([EVIDENCE_HOST_KEY, EVIDENCE_PROTOCOL]),
                query_prefix: format!("{}{}", EVIDENCE_QUERY_PREFIX, EVIDENCE_SEPARATOR),
            }),
            promise_disabled: AtomicBool::new(false),
            fetch_disabled: AtomicBool::new(false),
            url_error_logged: AtomicBool::new(false),
            minify_failed: AtomicBool::new(false),
        })
    }

    pub fn with_minifier(mut self, minifier: Arc<dyn Minifier>) -> Self {
        self.minifier = minifier;
        self
    }

    pub fn config(&self) -> &JavaScriptBuilderConfig {
        &self.config
    }

    /// Render the script for `data` from a JSON document built elsewhere.
    ///
    /// Nothing is stored on `data` and its stop flag is left alone.
    pub fn render_fallback(&self, data: &FlowData, json: &JsonBuilderData) -> Result<JavaScriptBuilderData> {
        Ok(JavaScriptBuilderData::new(self.render(data, json.json())?))
    }

    /// Render the script for `data` around the JSON document `json`.
    pub fn render(&self, data: &FlowData, json: &str) -> Result<String> {
        self.render_script(data, json).map(|rendered| rendered.script)
    }

    fn render_script(&self, data: &FlowData, json: &str) -> Result<RenderedScript> {
        let session_id = data.get_evidence(EVIDENCE_SESSIONID).unwrap_or_default();
        let sequence = sequence_number(data)?.unwrap_or(1);
        let supports_promises = self.probe(data, PROMISE_PROPERTY, &self.promise_disabled, |v| {
            v.as_str().map(|s| s == "Full")
        })?;
        let supports_fetch = self.probe(data, FETCH_PROPERTY, &self.fetch_disabled, PropertyValue::as_bool)?;

        let url = self.resolve_url(data);
        let parameters = query_parameters(&data.evidence().with_prefix(EVIDENCE_QUERY_PREFIX))?;

        let object_name = match data.get_evidence(EVIDENCE_OBJECT_NAME).filter(|n| !n.is_empty()) {
            Some(name) if is_valid_object_name(&name)? => name,
            Some(name) => {
                debug!(object_name = %name, "ignoring object name override that is not an identifier");
                self.config.object_name.clone()
            }
            None => self.config.object_name.clone(),
        };
        let enable_cookies = data
            .get_evidence(EVIDENCE_ENABLE_COOKIES)
            .and_then(|v| v.trim().to_lowercase().parse::<bool>().ok())
            .unwrap_or(self.config.enable_cookies);

        // Request-supplied strings are embedded as JSON string literals.
        let url = url.map(|u| serde_json::to_string(&u)).transpose()?;
        let mut context = TemplateContext::new();
        context
            .set("_objName", object_name)
            .set("_jsonObject", json)
            .set("_sessionId", serde_json::to_string(&session_id)?)
            .set("_sequence", sequence.to_string())
            .set("_supportsPromises", supports_promises)
            .set("_supportsFetch", supports_fetch)
            .set("_updateEnabled", url.is_some())
            .set("_url", url.unwrap_or_default())
            .set("_parameters", parameters)
            .set("_enableCookies", enable_cookies)
            .set("_hasDelayedProperties", json.contains(DELAY_EXECUTION_SUFFIX));
        let script = self.template.render(&context);

        if !self.config.minify {
            return Ok(RenderedScript { script, minify_failed: false });
        }
        match self.minifier.minify(&script) {
            Ok(minified) => {
                self.minify_failed.store(false, Ordering::Relaxed);
                Ok(RenderedScript {
                    script: minified,
                    minify_failed: false,
                })
            }
            Err(e) => {
                if !self.minify_failed.swap(true, Ordering::Relaxed) {
                    warn!(error = %e, "minification failed, using the unminified script");
                }
                Ok(RenderedScript {
                    script,
                    minify_failed: true,
                })
            }
        }
    }

    /// Read a capability flag from another element's results.
    ///
    /// Lookups that show the pipeline cannot provide the property disable the
    /// probe for the lifetime of this element.
    fn probe(
        &self,
        data: &FlowData,
        property: &str,
        disabled: &AtomicBool,
        read: impl Fn(&PropertyValue) -> Option<bool>,
    ) -> Result<bool> {
        if disabled.load(Ordering::Relaxed) {
            return Ok(false);
        }
        let error = match data.try_get_property(property) {
            PropertyStatus::Available(value) => match read(&value) {
                Some(flag) => return Ok(flag),
                None => PropertyError::new(
                    PropertyErrorKind::InvalidCast,
                    format!("'{}' holds a {} value", property, value.kind_name()),
                ),
            },
            PropertyStatus::NoValue(_) => return Ok(false),
            PropertyStatus::NotPresent => PropertyError::new(
                PropertyErrorKind::PropertyMissing,
                format!("No element provides '{}'", property),
            ),
            PropertyStatus::Errored(e) => e,
        };

        match error.kind {
            PropertyErrorKind::PropertyMissing
            | PropertyErrorKind::PipelineData
            | PropertyErrorKind::InvalidCast
            | PropertyErrorKind::KeyNotFound => {
                disabled.store(true, Ordering::Relaxed);
                debug!(property, error = %error, "capability probe disabled");
                Ok(false)
            }
            _ if data.pipeline().suppress_process_exceptions() => {
                warn!(property, error = %error, "capability probe failed");
                Ok(false)
            }
            _ => Err(Error::runtime_with_context(
                format!("Failed to read capability property '{}'", property),
                ErrorContext::new()
                    .with_field_path(property)
                    .with_details(error.to_string())
                    .with_source("javascript_builder"),
            )),
        }
    }

    fn resolve_url(&self, data: &FlowData) -> Option<String> {
        let protocol = self
            .config
            .protocol
            .clone()
            .or_else(|| data.get_evidence(EVIDENCE_PROTOCOL))
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PROTOCOL.to_string())
            .to_lowercase();
        let host = self
            .config
            .host
            .clone()
            .or_else(|| data.get_evidence(EVIDENCE_HOST_KEY))
            .filter(|h| !h.is_empty())?;
        if self.config.endpoint.is_empty() {
            return None;
        }

        match callback_url(&protocol, &host, &self.config.endpoint) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                if !self.url_error_logged.swap(true, Ordering::Relaxed) {
                    warn!(
                        protocol = %protocol,
                        host = %host,
                        endpoint = %self.config.endpoint,
                        error = %e,
                        "invalid callback URL, client updates disabled"
                    );
                }
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl FlowElement for JavaScriptBuilderElement {
    fn element_data_key(&self) -> &str {
        JAVASCRIPT_BUILDER_ELEMENT_KEY
    }

    fn properties(&self) -> Vec<ElementPropertyMetaData> {
        vec![
            ElementPropertyMetaData::new("javascript", JAVASCRIPT_BUILDER_ELEMENT_KEY, ValueKind::String)
                .with_category("JavaScript")
                .with_description("Client-side script that refines the results."),
        ]
    }

    fn evidence_key_filter(&self) -> Arc<dyn EvidenceKeyFilter> {
        self.filter.clone()
    }

    async fn process(&self, data: &FlowData) -> Result<()> {
        let json = match data.get_as::<JsonBuilderData>(JSON_BUILDER_ELEMENT_KEY) {
            Ok(json) => json,
            Err(e) => {
                debug!(error = %e, "no JSON document, rendering with an empty one");
                Arc::new(JsonBuilderData::empty())
            }
        };
        let rendered = self.render_script(data, json.json())?;
        if rendered.minify_failed {
            data.stop();
        }
        data.add_element_data(Arc::new(JavaScriptBuilderData::new(rendered.script)));
        Ok(())
    }
}
