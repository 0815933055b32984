//! HTTP client for a running relay server.

use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;

use crate::error::{RelayError, Result};
use crate::expression::validate_expression;
use crate::prompt::Mode;
use crate::upstream::ChunkStream;

/// Default address of a locally running relay.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:11436";

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Submits explain and generate requests to a relay server and returns the
/// streamed response body.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stream an explanation of `expression`. The expression is validated
    /// here first; an invalid one never reaches the network.
    pub async fn explain(&self, expression: &str, detailed: bool) -> Result<ChunkStream> {
        validate_expression(expression)?;
        let body = serde_json::json!({
            "expression": expression,
            "detailed": detailed,
        });
        self.post("/api/explain", &body).await
    }

    /// Stream a cron expression generated from `description`.
    pub async fn generate(&self, description: &str) -> Result<ChunkStream> {
        if description.trim().is_empty() {
            return Err(RelayError::validation(
                "description",
                "Description must not be empty",
            ));
        }
        let body = serde_json::json!({ "description": description });
        self.post("/api/generate", &body).await
    }

    /// Dispatch `input` according to `mode`.
    pub async fn submit(&self, mode: Mode, input: &str) -> Result<ChunkStream> {
        match mode {
            Mode::Explain { detailed } => self.explain(input, detailed).await,
            Mode::Generate => self.generate(input).await,
        }
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<ChunkStream> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Submitting to relay");

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(RelayError::RelayUnreachable)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|envelope| envelope.error.message)
                .unwrap_or(text);
            return Err(RelayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let stream = response
            .bytes_stream()
            .map(|item| item.map_err(|e| RelayError::StreamAborted(e.to_string())));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Nothing listens on the discard port; a network call would fail with
    // RelayUnreachable rather than Validation.
    const UNREACHABLE: &str = "http://127.0.0.1:9";

    #[tokio::test]
    async fn test_invalid_expression_rejected_locally() {
        let client = RelayClient::new(UNREACHABLE).unwrap();
        let err = client.explain("* * *", true).await.err().unwrap();
        assert!(matches!(
            err,
            RelayError::Validation {
                field: "expression",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_blank_description_rejected_locally() {
        let client = RelayClient::new(UNREACHABLE).unwrap();
        let err = client.submit(Mode::Generate, "   ").await.err().unwrap();
        assert!(matches!(
            err,
            RelayError::Validation {
                field: "description",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let client = RelayClient::new(UNREACHABLE).unwrap();
        let err = client.explain("0 5 * * *", false).await.err().unwrap();
        assert!(matches!(err, RelayError::RelayUnreachable(_)));
        assert!(err.to_string().starts_with("Failed to connect to relay server"));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = RelayClient::new("http://localhost:11436/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:11436");
    }
}
