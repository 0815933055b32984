use serde::{Deserialize, Serialize};

use crate::prompt::Mode;

/// Fixed generation parameters sent with every upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub max_tokens: u32,
    pub n: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            max_tokens: 400,
            n: 1,
        }
    }
}

/// One streaming completion to request from the upstream source.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub mode: Mode,
    pub system: String,
    pub user: String,
    pub sampling: SamplingParams,
}

/// A single message in the chat format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of an OpenAI-compatible streaming chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatPayload {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub max_tokens: u32,
    pub stream: bool,
    pub n: u32,
}

impl ChatPayload {
    pub fn new(model: &str, request: &CompletionRequest) -> Self {
        let sampling = request.sampling;
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user.clone(),
                },
            ],
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            frequency_penalty: sampling.frequency_penalty,
            presence_penalty: sampling.presence_penalty,
            max_tokens: sampling.max_tokens,
            stream: true,
            n: sampling.n,
        }
    }
}

// OpenAI streaming types
#[derive(Debug, Deserialize)]
pub(crate) struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    pub error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamChoice {
    pub delta: Option<StreamDelta>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamDelta {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamError {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sampling() {
        let params = SamplingParams::default();
        assert_eq!(params.temperature, 0.7);
        assert_eq!(params.top_p, 1.0);
        assert_eq!(params.frequency_penalty, 0.0);
        assert_eq!(params.presence_penalty, 0.0);
        assert_eq!(params.max_tokens, 400);
        assert_eq!(params.n, 1);
    }

    #[test]
    fn test_payload_shape() {
        let request = CompletionRequest {
            mode: Mode::Generate,
            system: "sys".to_string(),
            user: "usr".to_string(),
            sampling: SamplingParams::default(),
        };
        let json = serde_json::to_value(ChatPayload::new("gpt-3.5-turbo", &request)).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["stream"], true);
        assert_eq!(json["n"], 1);
        assert_eq!(json["max_tokens"], 400);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "sys");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "usr");
    }

    #[test]
    fn test_stream_chunk_deserialize() {
        let chunk: StreamChunk = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"delta":{"content":"0 | "},"finish_reason":null}]}"#,
        )
        .unwrap();
        let delta = chunk.choices[0].delta.as_ref().unwrap();
        assert_eq!(delta.content.as_deref(), Some("0 | "));
        assert!(chunk.error.is_none());
    }

    #[test]
    fn test_stream_error_deserialize() {
        let chunk: StreamChunk =
            serde_json::from_str(r#"{"error":{"message":"overloaded","type":"server_error"}}"#)
                .unwrap();
        assert!(chunk.choices.is_empty());
        assert_eq!(chunk.error.unwrap().message, "overloaded");
    }
}
