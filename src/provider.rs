//! Provider client.
//!
//! A provider call POSTs `{"text": <record>}` to one endpoint and returns
//! whatever JSON comes back. Calls never fail from the caller's point of
//! view: every transport, status or decoding problem becomes a failed
//! [`ProviderResult`]. There are no retries.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ProviderFailure;
use crate::models::ProviderResult;
use crate::registry::ProviderSpec;

/// Something that can score one record against one provider endpoint.
pub trait ProviderClient {
    /// Call the provider. Implementations must not panic or return errors;
    /// failures are reported inside the result.
    fn call(&self, spec: &ProviderSpec, text: &str) -> impl Future<Output = ProviderResult>;
}

/// Request body sent to every provider.
#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    text: &'a str,
}

/// HTTP provider client backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpProviderClient {
    http_client: reqwest::Client,
    timeout_seconds: u64,
}

impl HttpProviderClient {
    /// Create a client whose requests time out after `timeout_seconds`.
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            timeout_seconds,
        })
    }

    async fn request(&self, spec: &ProviderSpec, text: &str) -> Result<Value, ProviderFailure> {
        let response = self
            .http_client
            .post(&spec.url)
            .json(&ScoreRequest { text })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderFailure::Timeout(self.timeout_seconds)
                } else if e.is_connect() {
                    ProviderFailure::Connect(spec.url.clone())
                } else {
                    ProviderFailure::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderFailure::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                ProviderFailure::Timeout(self.timeout_seconds)
            } else {
                ProviderFailure::Decode(e.to_string())
            }
        })
    }
}

impl ProviderClient for HttpProviderClient {
    async fn call(&self, spec: &ProviderSpec, text: &str) -> ProviderResult {
        debug!("POST {} ({} chars)", spec.url, text.chars().count());

        match self.request(spec, text).await {
            Ok(payload) => ProviderResult::success(spec.provider, payload),
            Err(failure) => {
                warn!("{} call to {} failed: {}", spec.provider, spec.url, failure);
                ProviderResult::failure(spec.provider, &failure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderId;
    use crate::registry::ResponseShape;
    use std::net::TcpListener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// An address nothing is listening on.
    fn closed_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}/api/hf-sentiment", port)
    }

    /// Serve one canned HTTP response on a local port, returning the endpoint.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request_complete(&request) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}/api/hf-sentiment", addr)
    }

    /// Headers received and the whole declared body read.
    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..header_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        request.len() >= header_end + 4 + length
    }

    fn classifier_spec(url: String) -> ProviderSpec {
        ProviderSpec::new(ProviderId::Classifier, url, ResponseShape::ClassifierScores)
    }

    #[tokio::test]
    async fn test_successful_call_keeps_payload() {
        let url = serve_once("HTTP/1.1 200 OK", r#"[[{"label":"toxic","score":0.4}]]"#).await;
        let client = HttpProviderClient::new(5).unwrap();

        let result = client.call(&classifier_spec(url), "hello").await;

        assert!(!result.failed);
        assert_eq!(
            result.payload,
            Some(serde_json::json!([[{"label": "toxic", "score": 0.4}]]))
        );
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_error_status_is_a_failed_result() {
        let url = serve_once("HTTP/1.1 500 Internal Server Error", "oops").await;
        let client = HttpProviderClient::new(5).unwrap();

        let result = client.call(&classifier_spec(url), "hello").await;

        assert!(result.failed);
        assert!(result.payload.is_none());
        assert_eq!(
            result.error.as_deref(),
            Some("provider returned HTTP 500: oops")
        );
    }

    #[tokio::test]
    async fn test_invalid_json_is_a_failed_result() {
        let url = serve_once("HTTP/1.1 200 OK", "not json").await;
        let client = HttpProviderClient::new(5).unwrap();

        let result = client.call(&classifier_spec(url), "hello").await;

        assert!(result.failed);
        assert!(result.payload.is_none());
        assert!(result
            .error
            .unwrap()
            .starts_with("response was not valid JSON"));
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(ScoreRequest { text: "i love this" }).unwrap();
        assert_eq!(body, serde_json::json!({"text": "i love this"}));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_a_failed_result() {
        let client = HttpProviderClient::new(2).unwrap();
        let spec = ProviderSpec::new(
            ProviderId::Classifier,
            closed_endpoint(),
            ResponseShape::ClassifierScores,
        );

        let result = client.call(&spec, "hello").await;

        assert_eq!(result.provider, ProviderId::Classifier);
        assert!(result.failed);
        assert!(result.payload.is_none());
        assert!(result.error.is_some());
    }

    #[test]
    fn test_invalid_url_is_a_failed_result() {
        let client = HttpProviderClient::new(2).unwrap();
        let spec = ProviderSpec::new(ProviderId::Gemini, "not a url", ResponseShape::CandidateText);

        let result = tokio_test::block_on(client.call(&spec, "hello"));

        assert!(result.failed);
        assert!(result.error.unwrap().starts_with("request failed"));
    }
}
