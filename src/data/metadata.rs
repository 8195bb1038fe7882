//! Property metadata declared by elements.

use serde::{Deserialize, Serialize};

/// The kind of value a property holds, declared when the property is
/// registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Bool,
    Integer,
    Float,
    /// JavaScript that the client executes to supply more evidence.
    JavaScript,
    List,
    /// A list of nested records described by `item_properties`.
    Records,
}

impl Default for ValueKind {
    fn default() -> Self {
        ValueKind::String
    }
}

/// Metadata for one property of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementPropertyMetaData {
    pub name: String,
    pub element_data_key: String,
    #[serde(default)]
    pub kind: ValueKind,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_available")]
    pub available: bool,
    /// JavaScript is only run when the client explicitly asks for it.
    #[serde(default)]
    pub delay_execution: bool,
    /// Names (relative to the element) of JavaScript properties whose
    /// execution supplies evidence for this property.
    #[serde(default)]
    pub evidence_properties: Vec<String>,
    /// Properties of the records held by a [`ValueKind::Records`] property.
    #[serde(default)]
    pub item_properties: Vec<ElementPropertyMetaData>,
}

fn default_available() -> bool {
    true
}

impl ElementPropertyMetaData {
    pub fn new(name: impl Into<String>, element_data_key: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            element_data_key: element_data_key.into(),
            kind,
            category: None,
            description: None,
            available: true,
            delay_execution: false,
            evidence_properties: Vec::new(),
            item_properties: Vec::new(),
        }
    }

    pub fn with_delay_execution(mut self, delay: bool) -> Self {
        self.delay_execution = delay;
        self
    }

    pub fn with_evidence_properties<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.evidence_properties = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_item_properties(mut self, items: Vec<ElementPropertyMetaData>) -> Self {
        self.item_properties = items;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    pub fn is_javascript(&self) -> bool {
        self.kind == ValueKind::JavaScript
    }
}
