use axum::http::{HeaderMap, HeaderName, Method, StatusCode, header};
use bytes::Bytes;
use reqwest::Client;
use reqwest::header as upstream;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::OriginConfig;
use crate::error::{EdgeError, EdgeResult};

/// Headers that describe a single connection and must not be forwarded
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const BASE_BACKOFF_MS: u64 = 100;
const MAX_BACKOFF_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct OriginForwarder {
    client: Client,
    origin: OriginConfig,
    base_url: String,
    host_header: Option<upstream::HeaderValue>,
    static_headers: Vec<(upstream::HeaderName, upstream::HeaderValue)>,
}

impl OriginForwarder {
    pub fn new(origin: OriginConfig) -> EdgeResult<Self> {
        let client = Client::builder()
            .gzip(true)
            .brotli(true)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| EdgeError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = origin.url.trim_end_matches('/').to_string();

        let host_header = origin
            .host_header
            .as_deref()
            .map(|host| {
                upstream::HeaderValue::from_str(host).map_err(|e| {
                    EdgeError::ConfigError(format!("Invalid origin.host_header '{}': {}", host, e))
                })
            })
            .transpose()?;

        let static_headers = origin
            .headers
            .iter()
            .map(|(key, value)| {
                let name = upstream::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                    EdgeError::ConfigError(format!("Invalid origin header name '{}': {}", key, e))
                })?;
                let value = upstream::HeaderValue::from_str(value).map_err(|e| {
                    EdgeError::ConfigError(format!("Invalid value for origin header '{}': {}", key, e))
                })?;
                Ok((name, value))
            })
            .collect::<EdgeResult<Vec<_>>>()?;

        info!(
            origin = %base_url,
            timeout_secs = origin.timeout_secs,
            max_retries = origin.max_retries,
            "Initialized origin forwarder"
        );

        Ok(Self {
            client,
            origin,
            base_url,
            host_header,
            static_headers,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Forward a request to the origin. Only GET and HEAD are retried.
    pub async fn forward(
        &self,
        method: &Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> EdgeResult<OriginResponse> {
        let url = self.build_url(path_and_query);
        let method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|e| EdgeError::InvalidRequest(format!("Unsupported method: {}", e)))?;
        let max_attempts = if matches!(method, reqwest::Method::GET | reqwest::Method::HEAD) {
            self.origin.max_retries.max(1)
        } else {
            1
        };

        debug!(url = %url, method = %method, "Forwarding to origin");

        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.do_forward(&method, &url, headers, body.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    if attempt >= max_attempts {
                        error!(
                            url = %url,
                            attempt = attempt,
                            error = %e,
                            "All origin attempts failed"
                        );
                        return Err(e);
                    }

                    warn!(
                        url = %url,
                        attempt = attempt,
                        max_retries = max_attempts,
                        error = %e,
                        "Origin request failed, retrying"
                    );

                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
        }
    }

    async fn do_forward(
        &self,
        method: &reqwest::Method,
        url: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> EdgeResult<OriginResponse> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .timeout(self.origin.timeout())
            .headers(self.outbound_headers(headers));

        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|e| EdgeError::OriginError(format!("Invalid origin status: {}", e)))?;

        let mut response_headers = HeaderMap::new();
        for (name, value) in response.headers() {
            if is_hop_by_hop(name.as_str()) {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_str().as_bytes()),
                header::HeaderValue::from_bytes(value.as_bytes()),
            ) {
                response_headers.append(name, value);
            }
        }

        let body = response.bytes().await?;

        debug!(
            status = status.as_u16(),
            body_size = body.len(),
            "Received origin response"
        );

        Ok(OriginResponse {
            status,
            headers: response_headers,
            body,
        })
    }

    /// Client headers minus hop-by-hop ones, with the configured headers
    /// replacing any client copy of the same name
    fn outbound_headers(&self, headers: &HeaderMap) -> upstream::HeaderMap {
        let mut outbound = upstream::HeaderMap::new();

        for (name, value) in forwardable(headers) {
            if let (Ok(name), Ok(value)) = (
                upstream::HeaderName::from_bytes(name.as_str().as_bytes()),
                upstream::HeaderValue::from_bytes(value.as_bytes()),
            ) {
                outbound.append(name, value);
            }
        }

        if let Some(ref host) = self.host_header {
            outbound.insert(upstream::HOST, host.clone());
        }

        for (name, value) in &self.static_headers {
            outbound.insert(name.clone(), value.clone());
        }

        outbound
    }

    fn build_url(&self, path_and_query: &str) -> String {
        if path_and_query.starts_with('/') {
            format!("{}{}", self.base_url, path_and_query)
        } else {
            format!("{}/{}", self.base_url, path_and_query)
        }
    }
}

/// Exponential backoff, capped at `MAX_BACKOFF_MS`
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Client headers that may be sent upstream
fn forwardable(headers: &HeaderMap) -> impl Iterator<Item = (&HeaderName, &header::HeaderValue)> {
    headers.iter().filter(|(name, _)| {
        let name = name.as_str();
        name != header::HOST.as_str()
            && name != header::CONTENT_LENGTH.as_str()
            && !is_hop_by_hop(name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarder(url: &str) -> OriginForwarder {
        OriginForwarder::new(OriginConfig {
            url: url.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_build_url() {
        let origin = forwarder("http://origin.internal:3000/");
        assert_eq!(origin.base_url(), "http://origin.internal:3000");
        assert_eq!(
            origin.build_url("/users?page=2"),
            "http://origin.internal:3000/users?page=2"
        );
        assert_eq!(origin.build_url("health"), "http://origin.internal:3000/health");
    }

    #[test]
    fn test_forwardable_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("edge.example.com"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("x-request-id", HeaderValue::from_static("abc"));

        let mut names: Vec<&str> = forwardable(&headers).map(|(n, _)| n.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["accept", "x-request-id"]);
    }

    #[test]
    fn test_configured_headers_replace_client_copies() {
        let mut config = OriginConfig {
            url: "http://origin.internal".to_string(),
            host_header: Some("origin.example.com".to_string()),
            ..Default::default()
        };
        config
            .headers
            .insert("x-edge".to_string(), "api-edge".to_string());
        let origin = OriginForwarder::new(config).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("edge.example.com"));
        headers.append("x-edge", HeaderValue::from_static("client-spoof"));
        headers.append("x-edge", HeaderValue::from_static("client-spoof-2"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html"));

        let outbound = origin.outbound_headers(&headers);

        let edge: Vec<_> = outbound.get_all("x-edge").iter().collect();
        assert_eq!(edge, vec!["api-edge"]);
        assert_eq!(outbound.get("host").unwrap(), "origin.example.com");
        assert_eq!(outbound.get("accept").unwrap(), "text/html");
    }

    #[test]
    fn test_rejects_invalid_configured_header() {
        let mut config = OriginConfig::default();
        config
            .headers
            .insert("bad header".to_string(), "x".to_string());

        assert!(matches!(
            OriginForwarder::new(config),
            Err(EdgeError::ConfigError(_))
        ));
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff_delay(1), Duration::from_millis(100));
        assert_eq!(backoff_delay(2), Duration::from_millis(200));
        assert_eq!(backoff_delay(4), Duration::from_millis(800));
        assert_eq!(backoff_delay(10), Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(backoff_delay(200), Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_millis(MAX_BACKOFF_MS));
    }

    #[test]
    fn test_hop_by_hop_case_insensitive() {
        assert!(is_hop_by_hop("Keep-Alive"));
        assert!(is_hop_by_hop("transfer-encoding"));
        assert!(!is_hop_by_hop("content-type"));
    }
}
