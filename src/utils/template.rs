//! Logic-less template renderer (a Mustache subset).
//!
//! Supported tags:
//! - `{{name}}` variable, HTML-escaped
//! - `{{{name}}}` / `{{& name}}` variable, raw
//! - `{{#name}}...{{/name}}` section, rendered when `name` is truthy
//! - `{{^name}}...{{/name}}` inverted section, rendered when `name` is falsy
//! - `{{! comment}}`
//!
//! Missing variables render as empty and count as falsy.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Unterminated tag starting at byte {0}")]
    UnterminatedTag(usize),

    #[error("Empty tag at byte {0}")]
    EmptyTag(usize),

    #[error("Section '{expected}' closed by '{found}'")]
    MismatchedSection { expected: String, found: String },

    #[error("Closing tag '{0}' without an open section")]
    UnexpectedClose(String),

    #[error("Section '{0}' is never closed")]
    UnclosedSection(String),
}

/// A value substituted into a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValue {
    Text(String),
    Bool(bool),
}

impl TemplateValue {
    fn is_truthy(&self) -> bool {
        match self {
            TemplateValue::Text(s) => !s.is_empty(),
            TemplateValue::Bool(b) => *b,
        }
    }

    fn render(&self) -> String {
        match self {
            TemplateValue::Text(s) => s.clone(),
            TemplateValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<bool> for TemplateValue {
    fn from(b: bool) -> Self {
        TemplateValue::Bool(b)
    }
}

impl From<String> for TemplateValue {
    fn from(s: String) -> Self {
        TemplateValue::Text(s)
    }
}

impl From<&str> for TemplateValue {
    fn from(s: &str) -> Self {
        TemplateValue::Text(s.to_string())
    }
}

/// Named values available while rendering.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: HashMap<String, TemplateValue>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<TemplateValue>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&TemplateValue> {
        self.values.get(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Variable { name: String, escape: bool },
    Section {
        name: String,
        inverted: bool,
        children: Vec<Node>,
    },
}

/// A parsed template, ready to render any number of times.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        // Each open section keeps its name, inversion and collected children.
        let mut stack: Vec<(String, bool, Vec<Node>)> = Vec::new();
        let mut current: Vec<Node> = Vec::new();
        let mut pos = 0;

        while let Some(offset) = source[pos..].find("{{") {
            let start = pos + offset;
            if start > pos {
                current.push(Node::Text(source[pos..start].to_string()));
            }

            let (inner, end) = if source[start..].starts_with("{{{") {
                let close = source[start + 3..]
                    .find("}}}")
                    .ok_or(TemplateError::UnterminatedTag(start))?;
                let inner = &source[start + 3..start + 3 + close];
                (format!("&{}", inner), start + 3 + close + 3)
            } else {
                let close = source[start + 2..]
                    .find("}}")
                    .ok_or(TemplateError::UnterminatedTag(start))?;
                (
                    source[start + 2..start + 2 + close].to_string(),
                    start + 2 + close + 2,
                )
            };
            pos = end;

            let tag = inner.trim();
            let mut chars = tag.chars();
            let sigil = chars.next().ok_or(TemplateError::EmptyTag(start))?;
            let rest = chars.as_str().trim().to_string();
            match sigil {
                '!' => {}
                '#' | '^' => {
                    if rest.is_empty() {
                        return Err(TemplateError::EmptyTag(start));
                    }
                    stack.push((rest, sigil == '^', std::mem::take(&mut current)));
                }
                '/' => {
                    let (name, inverted, parent) = stack
                        .pop()
                        .ok_or_else(|| TemplateError::UnexpectedClose(rest.clone()))?;
                    if name != rest {
                        return Err(TemplateError::MismatchedSection {
                            expected: name,
                            found: rest,
                        });
                    }
                    let children = std::mem::replace(&mut current, parent);
                    current.push(Node::Section {
                        name,
                        inverted,
                        children,
                    });
                }
                '&' => {
                    if rest.is_empty() {
                        return Err(TemplateError::EmptyTag(start));
                    }
                    current.push(Node::Variable {
                        name: rest,
                        escape: false,
                    });
                }
                _ => current.push(Node::Variable {
                    name: tag.to_string(),
                    escape: true,
                }),
            }
        }

        if let Some((name, _, _)) = stack.pop() {
            return Err(TemplateError::UnclosedSection(name));
        }
        if pos < source.len() {
            current.push(Node::Text(source[pos..].to_string()));
        }
        Ok(Self { nodes: current })
    }

    pub fn render(&self, context: &TemplateContext) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, context, &mut out);
        out
    }
}

fn render_nodes(nodes: &[Node], context: &TemplateContext, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable { name, escape } => {
                if let Some(value) = context.get(name) {
                    let rendered = value.render();
                    if *escape {
                        out.push_str(&escape_html(&rendered));
                    } else {
                        out.push_str(&rendered);
                    }
                }
            }
            Node::Section {
                name,
                inverted,
                children,
            } => {
                let truthy = context.get(name).map(TemplateValue::is_truthy).unwrap_or(false);
                if truthy != *inverted {
                    render_nodes(children, context, out);
                }
            }
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
