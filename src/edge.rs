//! Edge rewrite middleware
//!
//! Runs the prefix-strip rule against each inbound request before it is
//! forwarded. The query string is carried over verbatim.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, Uri, uri::PathAndQuery},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::handlers::AppState;

/// Header carrying the pre-rewrite path to the origin
pub const ORIGINAL_PATH_HEADER: &str = "x-original-path";

/// Path as the client sent it, stored in request extensions when the rule fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPath(pub String);

pub async fn rewrite_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // Only the edge may set this header
    request.headers_mut().remove(ORIGINAL_PATH_HEADER);

    let outcome = state.rewriter.rewrite(request.uri().path());
    state.metrics.record_rewrite(&outcome);

    if let Some(new_path) = outcome.path() {
        let original = request.uri().path().to_string();

        match rebuild_uri(request.uri(), new_path) {
            Some(uri) => {
                debug!(
                    from = %original,
                    to = %new_path,
                    outcome = outcome.as_str(),
                    "Request rewritten"
                );
                *request.uri_mut() = uri;

                if let Ok(value) = HeaderValue::from_str(&original) {
                    request.headers_mut().insert(ORIGINAL_PATH_HEADER, value);
                }
                request.extensions_mut().insert(OriginalPath(original));
            }
            None => {
                warn!(
                    path = %original,
                    rewritten = %new_path,
                    "Rewritten path is not a valid URI, forwarding unchanged"
                );
            }
        }
    } else {
        debug!(path = %request.uri().path(), "Request passed through");
    }

    next.run(request).await
}

/// Replace the path of `uri`, keeping scheme, authority and query
fn rebuild_uri(uri: &Uri, new_path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(q) => format!("{}?{}", new_path, q),
        None => new_path.to_string(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse::<PathAndQuery>().ok()?);
    Uri::from_parts(parts).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebuild_keeps_query() {
        let uri: Uri = "/api/users?page=2&sort=name".parse().unwrap();
        let rebuilt = rebuild_uri(&uri, "/users").unwrap();
        assert_eq!(rebuilt.to_string(), "/users?page=2&sort=name");
    }

    #[test]
    fn test_rebuild_absolute_form() {
        let uri: Uri = "http://edge.example.com/api/?x=1".parse().unwrap();
        let rebuilt = rebuild_uri(&uri, "/health").unwrap();
        assert_eq!(rebuilt.to_string(), "http://edge.example.com/health?x=1");
    }

    #[test]
    fn test_rebuild_without_query() {
        let uri: Uri = "/api/orders/7".parse().unwrap();
        let rebuilt = rebuild_uri(&uri, "/orders/7").unwrap();
        assert_eq!(rebuilt.path(), "/orders/7");
        assert_eq!(rebuilt.query(), None);
    }
}
