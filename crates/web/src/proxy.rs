//! Pass-through forwarding for requests the dispatcher declines

use axum::{
    body::{Body, Bytes},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, warn};

/// Headers that belong to one hop and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

fn bad_gateway(message: &str) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(serde_json::json!({ "message": message })),
    )
        .into_response()
}

/// Reverse proxy to the configured upstream origin.
///
/// With no upstream configured every pass-through answers 502, so a
/// scenario that reaches the real network by accident fails loudly
/// instead of hanging.
pub struct PassThroughProxy {
    upstream: Option<String>,
    client: reqwest::Client,
}

impl PassThroughProxy {
    pub fn new(upstream: Option<String>) -> Self {
        Self {
            upstream,
            client: reqwest::Client::new(),
        }
    }

    pub async fn forward(&self, parts: Parts, body: Bytes) -> Response {
        let Some(upstream) = &self.upstream else {
            warn!(path = %parts.uri.path(), "pass-through with no upstream configured");
            return bad_gateway("no upstream configured");
        };

        let mut url = format!("{}{}", upstream.trim_end_matches('/'), parts.uri.path());
        if let Some(query) = parts.uri.query() {
            url.push('?');
            url.push_str(query);
        }
        debug!(method = %parts.method, url = %url, "forwarding upstream");

        let method = match reqwest::Method::from_bytes(parts.method.as_str().as_bytes()) {
            Ok(method) => method,
            Err(_) => return bad_gateway("unsupported method"),
        };

        let mut upstream_req = self.client.request(method, &url).body(body.to_vec());
        for (name, value) in parts.headers.iter() {
            if is_hop_by_hop(name.as_str()) || name.as_str().eq_ignore_ascii_case("host") {
                continue;
            }
            if let Ok(value) = value.to_str() {
                upstream_req = upstream_req.header(name.as_str(), value);
            }
        }

        let upstream_resp = match upstream_req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, url = %url, "upstream request failed");
                return bad_gateway(&format!("upstream unreachable: {}", e));
            }
        };

        let status = StatusCode::from_u16(upstream_resp.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let headers: Vec<(String, String)> = upstream_resp
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let bytes = match upstream_resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return bad_gateway(&format!("upstream body error: {}", e)),
        };

        let mut builder = Response::builder().status(status);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        builder
            .body(Body::from(bytes))
            .unwrap_or_else(|_| bad_gateway("invalid upstream response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_headers_are_recognized() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("transfer-encoding"));
        assert!(!is_hop_by_hop("content-type"));
        assert!(!is_hop_by_hop("authorization"));
    }
}
