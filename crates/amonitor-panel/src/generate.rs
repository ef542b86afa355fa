use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::protocol::{GenerateRequest, GenerateResponse};

pub const GENERATE_PATH: &str = "/api/generate";
pub const METRICS_PATH: &str = "/api/metrics";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("invalid WS URL {url}: {message}")]
    InvalidWsUrl { url: String, message: String },
    #[error("http client build failed: {message}")]
    Client { message: String },
    #[error("request failed: {message}")]
    Request { message: String },
    #[error("read failed: {message}")]
    Read { message: String },
    #[error("http {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("json decode failed: {message}")]
    Decode { message: String },
}

/// Pick the HTTP API base: the explicit override when it is non-blank, else one
/// derived from the WebSocket URL.
pub fn resolve_api_base(override_base: &str, ws_url: &str) -> Result<String, GenerateError> {
    let explicit = override_base.trim();
    if !explicit.is_empty() {
        return Ok(explicit.trim_end_matches('/').to_string());
    }
    api_base_from_ws(ws_url)
}

/// `wss:` maps to `https:`, every other scheme to `http:`; host and port are kept.
pub fn api_base_from_ws(ws_url: &str) -> Result<String, GenerateError> {
    let parsed = Url::parse(ws_url.trim()).map_err(|error| GenerateError::InvalidWsUrl {
        url: ws_url.to_string(),
        message: error.to_string(),
    })?;
    let host = parsed
        .host_str()
        .ok_or_else(|| GenerateError::InvalidWsUrl {
            url: ws_url.to_string(),
            message: "missing host".to_string(),
        })?;
    let scheme = if parsed.scheme() == "wss" {
        "https"
    } else {
        "http"
    };
    Ok(match parsed.port() {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    })
}

pub fn generate_endpoint(api_base: &str) -> String {
    format!("{api_base}{GENERATE_PATH}")
}

pub fn metrics_endpoint(api_base: &str) -> String {
    format!("{api_base}{METRICS_PATH}")
}

/// HTTP side of the panel: one-shot generation and metrics snapshots.
#[derive(Debug, Clone)]
pub struct GenerateClient {
    http: reqwest::Client,
    timeout: Option<Duration>,
}

impl GenerateClient {
    pub fn new(timeout: Option<Duration>) -> Result<Self, GenerateError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|error| GenerateError::Client {
                message: error.to_string(),
            })?;
        Ok(Self { http, timeout })
    }

    /// `POST {endpoint}` with `{"prompt": ...}`.
    pub async fn generate(
        &self,
        endpoint: &str,
        prompt: &str,
    ) -> Result<GenerateResponse, GenerateError> {
        let mut request = self.http.post(endpoint).json(&GenerateRequest {
            prompt: prompt.to_string(),
        });
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|error| GenerateError::Request {
                message: error.to_string(),
            })?;
        decode_json_response(response).await
    }

    /// `GET {endpoint}` returning the service's metrics snapshot.
    pub async fn fetch_metrics(&self, endpoint: &str) -> Result<Map<String, Value>, GenerateError> {
        let mut request = self.http.get(endpoint);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .await
            .map_err(|error| GenerateError::Request {
                message: error.to_string(),
            })?;
        decode_json_response(response).await
    }
}

async fn decode_json_response<T>(response: reqwest::Response) -> Result<T, GenerateError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|error| GenerateError::Read {
            message: error.to_string(),
        })?;

    if !status.is_success() {
        return Err(GenerateError::Http {
            status,
            body: String::from_utf8_lossy(&bytes).to_string(),
        });
    }

    serde_json::from_slice::<T>(&bytes).map_err(|error| GenerateError::Decode {
        message: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_socket_maps_to_https_with_same_host_and_port() {
        assert_eq!(
            resolve_api_base("", "wss://host.example:9000/ws").ok(),
            Some("https://host.example:9000".to_string())
        );
        assert_eq!(
            generate_endpoint("https://host.example:9000"),
            "https://host.example:9000/api/generate"
        );
    }

    #[test]
    fn plain_socket_maps_to_http_and_drops_path() {
        assert_eq!(
            api_base_from_ws("ws://127.0.0.1:8000/ws/monitor?x=1").ok(),
            Some("http://127.0.0.1:8000".to_string())
        );
    }

    #[test]
    fn default_ports_are_omitted() {
        assert_eq!(
            api_base_from_ws("wss://svc.example:443/ws").ok(),
            Some("https://svc.example".to_string())
        );
        assert_eq!(
            api_base_from_ws("ws://svc.example/ws").ok(),
            Some("http://svc.example".to_string())
        );
    }

    #[test]
    fn explicit_override_wins() {
        assert_eq!(
            resolve_api_base(" http://api.local:7000/ ", "wss://host.example:9000/ws").ok(),
            Some("http://api.local:7000".to_string())
        );
        assert_eq!(
            metrics_endpoint("http://api.local:7000"),
            "http://api.local:7000/api/metrics"
        );
    }

    #[test]
    fn unparsable_ws_url_is_rejected() {
        assert!(matches!(
            resolve_api_base("", "not a url"),
            Err(GenerateError::InvalidWsUrl { .. })
        ));
    }

    #[test]
    fn http_error_keeps_body_verbatim() {
        let error = GenerateError::Http {
            status: StatusCode::BAD_GATEWAY,
            body: " upstream down ".to_string(),
        };
        assert_eq!(error.to_string(), "http 502 Bad Gateway:  upstream down ");
    }
}
