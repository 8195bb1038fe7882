//! Callback URL and query parameters for the client refinement loop.

use std::collections::BTreeMap;

use url::form_urlencoded::byte_serialize;
use url::Url;

use crate::constants::{EVIDENCE_SEQUENCE_SUFFIX, EVIDENCE_SESSIONID_SUFFIX};

/// Join `host` and `endpoint` with exactly one `/` between them.
pub fn join_host_endpoint(host: &str, endpoint: &str) -> String {
    match (host.ends_with('/'), endpoint.starts_with('/')) {
        (true, true) => format!("{}{}", host, &endpoint[1..]),
        (false, false) => format!("{}/{}", host, endpoint),
        _ => format!("{}{}", host, endpoint),
    }
}

/// `protocol://host/endpoint`, checked by parsing it.
pub fn callback_url(protocol: &str, host: &str, endpoint: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("{}://{}", protocol, join_host_endpoint(host, endpoint)))
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

/// Query evidence to send back with the callback, as a JSON object string.
///
/// `query` is keyed by the evidence name without its prefix. The session id
/// and sequence are sent separately by the script and are left out. Keys and
/// values are URL-encoded.
pub fn query_parameters(query: &BTreeMap<String, String>) -> serde_json::Result<String> {
    let parameters: BTreeMap<String, String> = query
        .iter()
        .filter(|(k, _)| k.as_str() != EVIDENCE_SESSIONID_SUFFIX && k.as_str() != EVIDENCE_SEQUENCE_SUFFIX)
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    serde_json::to_string(&parameters)
}
