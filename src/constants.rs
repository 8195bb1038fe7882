//! Constants shared by elements and by hosts that integrate the pipeline.
//!
//! Evidence keys are `<prefix><separator><name>`, e.g. `query.sequence`.

/// Separator between an evidence prefix and the rest of the key, and between
/// the segments of a complete property name.
pub const EVIDENCE_SEPARATOR: &str = ".";

pub const EVIDENCE_HTTPHEADER_PREFIX: &str = "header";
pub const EVIDENCE_COOKIE_PREFIX: &str = "cookie";
pub const EVIDENCE_QUERY_PREFIX: &str = "query";
pub const EVIDENCE_SESSION_PREFIX: &str = "session";
pub const EVIDENCE_SERVER_PREFIX: &str = "server";

pub const EVIDENCE_SESSIONID_SUFFIX: &str = "session-id";
pub const EVIDENCE_SEQUENCE_SUFFIX: &str = "sequence";

/// Session identifier carried between client and server round-trips.
pub const EVIDENCE_SESSIONID: &str = "query.session-id";
/// Number of client/server round-trips made in the current session.
pub const EVIDENCE_SEQUENCE: &str = "query.sequence";

pub const EVIDENCE_HOST_KEY: &str = "header.host";
pub const EVIDENCE_PROTOCOL: &str = "header.protocol";

/// Overrides the configured JavaScript object name for one request.
pub const EVIDENCE_OBJECT_NAME: &str = "query.fod-js-object-name";
/// Overrides the configured cookie setting for one request.
pub const EVIDENCE_ENABLE_COOKIES: &str = "query.fod-js-enable-cookies";

/// Prefix of cookies that are shared with usage sharing.
pub const FIFTYONE_COOKIE_PREFIX: &str = "51d_";

/// Once the sequence number reaches this value JavaScript properties are no
/// longer offered to the client.
pub const MAX_JAVASCRIPT_ITERATIONS: u32 = 10;

/// Protocol used for the callback URL when neither configuration nor
/// evidence supplies one.
pub const DEFAULT_PROTOCOL: &str = "https";

pub const SEQUENCE_ELEMENT_KEY: &str = "sequence";
pub const JSON_BUILDER_ELEMENT_KEY: &str = "json-builder";
pub const JAVASCRIPT_BUILDER_ELEMENT_KEY: &str = "javascriptbuilderelement";
pub const CLOUD_RESPONSE_ELEMENT_KEY: &str = "cloud-response";
pub const SET_HEADERS_ELEMENT_KEY: &str = "set-headers";

/// Top-level JSON key listing executable JavaScript properties. The client
/// script looks this key up with exactly this casing.
pub const JAVASCRIPT_PROPERTIES_KEY: &str = "javascriptProperties";
pub const ERRORS_KEY: &str = "errors";

pub const NULL_REASON_SUFFIX: &str = "nullreason";
pub const DELAY_EXECUTION_SUFFIX: &str = "delayexecution";
pub const EVIDENCE_PROPERTIES_SUFFIX: &str = "evidenceproperties";

/// Property names probed by the JavaScript builder.
pub const PROMISE_PROPERTY: &str = "Promise";
pub const FETCH_PROPERTY: &str = "Fetch";

/// Default name of the object created by the client-side script.
pub const DEFAULT_OBJECT_NAME: &str = "fod";

/// Builds an evidence key from its prefix and name.
pub fn evidence_key(prefix: &str, name: &str) -> String {
    format!("{}{}{}", prefix, EVIDENCE_SEPARATOR, name)
}
