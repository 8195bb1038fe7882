//! Settings for the JavaScript builder.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_OBJECT_NAME;
use crate::error::ErrorContext;
use crate::{Error, Result};

const OBJECT_NAME_PATTERN: &str = r"^[a-zA-Z_$][0-9a-zA-Z_$]*$";

static OBJECT_NAME: OnceCell<Regex> = OnceCell::new();

/// True if `name` can be used as a JavaScript identifier for the client object.
pub fn is_valid_object_name(name: &str) -> Result<bool> {
    let pattern = OBJECT_NAME.get_or_try_init(|| Regex::new(OBJECT_NAME_PATTERN)).map_err(|e| {
        Error::runtime_with_context(
            "Object name pattern failed to compile",
            ErrorContext::new().with_details(e.to_string()),
        )
    })?;
    Ok(pattern.is_match(name))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct JavaScriptBuilderConfig {
    /// Path on the host that serves refreshed JSON, e.g. `/json`. Empty
    /// disables the client refinement loop.
    #[serde(alias = "Endpoint")]
    pub endpoint: String,
    /// Name of the global object created by the script.
    #[serde(alias = "ObjectName")]
    pub object_name: String,
    #[serde(alias = "EnableCookies")]
    pub enable_cookies: bool,
    #[serde(alias = "Minify")]
    pub minify: bool,
    /// Host for the callback URL. Falls back to `header.host` evidence.
    #[serde(alias = "Host")]
    pub host: Option<String>,
    /// `http` or `https`. Falls back to `header.protocol` evidence.
    #[serde(alias = "Protocol")]
    pub protocol: Option<String>,
    /// Replacement for the bundled script template.
    #[serde(alias = "Template")]
    pub template: Option<String>,
}

impl Default for JavaScriptBuilderConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            object_name: DEFAULT_OBJECT_NAME.to_string(),
            enable_cookies: true,
            minify: true,
            host: None,
            protocol: None,
            template: None,
        }
    }
}

impl JavaScriptBuilderConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_object_name(mut self, name: impl Into<String>) -> Self {
        self.object_name = name.into();
        self
    }

    pub fn with_enable_cookies(mut self, enable: bool) -> Self {
        self.enable_cookies = enable;
        self
    }

    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_object_name(&self.object_name)? {
            return Err(Error::configuration_with_context(
                format!("'{}' is not a valid JavaScript object name", self.object_name),
                ErrorContext::new()
                    .with_field_path("object_name")
                    .with_details(format!("expected a name matching {}", OBJECT_NAME_PATTERN))
                    .with_source("javascript_builder"),
            ));
        }
        if let Some(protocol) = &self.protocol {
            let lower = protocol.to_lowercase();
            if lower != "http" && lower != "https" {
                return Err(Error::configuration_with_context(
                    format!("Unsupported protocol '{}'", protocol),
                    ErrorContext::new()
                        .with_field_path("protocol")
                        .with_details("expected 'http' or 'https'")
                        .with_source("javascript_builder"),
                ));
            }
        }
        Ok(())
    }
}
