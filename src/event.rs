//! Viewer-request event model
//!
//! Mirrors the document a CDN hands to a viewer-request edge function. Only
//! `uri` is interpreted; every other member is carried through as-is so the
//! returned request is semantically equal to the input apart from `uri`.
//! Member order is not preserved.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::rewrite::{PrefixRewriter, RewriteOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub context: Value,

    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub viewer: Value,

    pub request: EdgeRequest,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRequest {
    pub uri: String,

    /// method, querystring, headers, cookies and anything else the CDN supplies
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EdgeRequest {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            fields: Map::new(),
        }
    }

    pub fn method(&self) -> Option<&str> {
        self.fields.get("method").and_then(Value::as_str)
    }
}

impl EdgeEvent {
    pub fn for_uri(uri: impl Into<String>) -> Self {
        Self {
            version: Some("1.0".to_string()),
            context: Value::Null,
            viewer: Value::Null,
            request: EdgeRequest::new(uri),
            extra: Map::new(),
        }
    }
}

/// Function entry point: apply the rule and hand back the request
pub fn handle_event(rewriter: &PrefixRewriter, event: EdgeEvent) -> EdgeRequest {
    evaluate_event(rewriter, event).0
}

/// Like [`handle_event`] but also reports which branch of the rule fired
pub fn evaluate_event(rewriter: &PrefixRewriter, event: EdgeEvent) -> (EdgeRequest, RewriteOutcome) {
    let mut request = event.request;
    let outcome = rewriter.apply(&mut request);
    (request, outcome)
}
