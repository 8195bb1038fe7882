//! Utility modules
//!
//! - [`template`]: logic-less template rendering for the JavaScript resource
//! - [`minify`]: JavaScript minification

pub mod minify;
pub mod template;

pub use minify::{Minifier, MinifyError, WhitespaceMinifier};
pub use template::{Template, TemplateContext, TemplateError, TemplateValue};
