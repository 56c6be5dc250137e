//! Outbound client for the hosted generation API.
//!
//! One request per prompt, no retries. Failures are classified so the
//! application layer can show a distinct user-facing message per cause.

use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::chat::ChatMessage;

use super::error::InfraError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Classified failure of a generation call. Every variant maps to one
/// user-facing notice; nothing here crashes the calling flow.
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("generation API rejected the credential")]
    InvalidApiKey,
    #[error("generation API quota exhausted")]
    QuotaExceeded,
    #[error("model `{model}` is unavailable")]
    ModelUnavailable { model: String },
    #[error("generation API unreachable")]
    Network(#[source] reqwest::Error),
    #[error("generation API returned no text")]
    EmptyResponse,
    #[error("generation API failure ({status}): {message}")]
    Upstream { status: u16, message: String },
}

impl GeminiError {
    fn reason(&self) -> &'static str {
        match self {
            GeminiError::InvalidApiKey => "invalid_api_key",
            GeminiError::QuotaExceeded => "quota_exceeded",
            GeminiError::ModelUnavailable { .. } => "model_unavailable",
            GeminiError::Network(_) => "network",
            GeminiError::EmptyResponse => "empty_response",
            GeminiError::Upstream { .. } => "upstream",
        }
    }
}

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl GeminiClient {
    /// Build a client with the caller-specified request timeout. A timed
    /// out or aborted request surfaces as [`GeminiError::Network`].
    pub fn new(model: String, temperature: f32, timeout: Duration) -> Result<Self, InfraError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            model,
            temperature,
        })
    }

    /// Point the client at an alternate endpoint (self-hosted proxy).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send the ordered conversation turns plus the system instruction and
    /// return the generated text.
    pub async fn generate(
        &self,
        api_key: &str,
        system_instruction: &str,
        turns: &[ChatMessage],
    ) -> Result<String, GeminiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = GenerateContentRequest {
            contents: turns.iter().map(Content::from_message).collect(),
            system_instruction: Content::system(system_instruction),
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        };

        counter!("naskah_ai_requests_total", "model" => self.model.clone()).increment(1);
        let started = Instant::now();

        let result = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await;

        histogram!("naskah_ai_request_ms").record(started.elapsed().as_millis() as f64);

        let response = match result {
            Ok(response) => response,
            Err(err) => return Err(self.fail(GeminiError::Network(err))),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.fail(self.classify_status(status, &body)));
        }

        let payload: GenerateContentResponse = match response.json().await {
            Ok(payload) => payload,
            Err(err) => return Err(self.fail(GeminiError::Network(err))),
        };

        match extract_text(payload) {
            Some(text) => Ok(text),
            None => Err(self.fail(GeminiError::EmptyResponse)),
        }
    }

    fn fail(&self, error: GeminiError) -> GeminiError {
        counter!("naskah_ai_failures_total", "reason" => error.reason()).increment(1);
        warn!(
            target = "naskah::gemini",
            model = %self.model,
            error = %error,
            "generation call failed"
        );
        error
    }

    fn classify_status(&self, status: StatusCode, body: &str) -> GeminiError {
        match status {
            StatusCode::TOO_MANY_REQUESTS => GeminiError::QuotaExceeded,
            StatusCode::NOT_FOUND => GeminiError::ModelUnavailable {
                model: self.model.clone(),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GeminiError::InvalidApiKey,
            StatusCode::BAD_REQUEST if mentions_api_key(body) => GeminiError::InvalidApiKey,
            _ => GeminiError::Upstream {
                status: status.as_u16(),
                message: upstream_message(body),
            },
        }
    }
}

fn mentions_api_key(body: &str) -> bool {
    body.contains("API key") || body.contains("API_KEY")
}

fn upstream_message(body: &str) -> String {
    let parsed: Result<ErrorEnvelope, _> = serde_json::from_str(body);
    match parsed {
        Ok(envelope) => envelope.error.message,
        Err(_) => {
            let mut message: String = body.chars().take(200).collect();
            if message.is_empty() {
                message.push_str("no response body");
            }
            message
        }
    }
}

fn extract_text(payload: GenerateContentResponse) -> Option<String> {
    let text = payload
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect::<Vec<_>>()
        .join("");
    (!text.is_empty()).then_some(text)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    system_instruction: Content<'a>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn system(text: &'a str) -> Self {
        Self {
            role: None,
            parts: vec![Part::Text { text }],
        }
    }

    fn from_message(message: &'a ChatMessage) -> Self {
        let mut parts = vec![Part::Text {
            text: message.text.as_str(),
        }];
        for attachment in &message.attachments {
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: &attachment.media_type,
                    data: &attachment.data,
                },
            });
        }
        Self {
            role: Some(message.role.as_str()),
            parts,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new("gemini-2.0-flash-exp".into(), 0.7, Duration::from_secs(5))
            .expect("client builds")
    }

    #[test]
    fn quota_and_model_statuses_classify_distinctly() {
        let client = client();
        assert!(matches!(
            client.classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            GeminiError::QuotaExceeded
        ));
        assert!(matches!(
            client.classify_status(StatusCode::NOT_FOUND, ""),
            GeminiError::ModelUnavailable { .. }
        ));
    }

    #[test]
    fn key_related_rejections_classify_as_invalid_credential() {
        let client = client();
        assert!(matches!(
            client.classify_status(StatusCode::FORBIDDEN, ""),
            GeminiError::InvalidApiKey
        ));
        assert!(matches!(
            client.classify_status(
                StatusCode::BAD_REQUEST,
                r#"{"error":{"message":"API key not valid"}}"#
            ),
            GeminiError::InvalidApiKey
        ));
    }

    #[test]
    fn other_statuses_keep_the_upstream_message() {
        let client = client();
        let error = client.classify_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":{"message":"internal"}}"#,
        );
        match error {
            GeminiError::Upstream { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "internal");
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn response_text_joins_candidate_parts() {
        let payload: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"a"},{"text":"b"}]}}]}"#,
        )
        .expect("valid payload");
        assert_eq!(extract_text(payload).as_deref(), Some("ab"));
    }

    #[test]
    fn empty_candidates_yield_no_text() {
        let payload: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[]}"#).expect("valid payload");
        assert!(extract_text(payload).is_none());
    }

    #[test]
    fn request_serialises_inline_attachments_camel_case() {
        use crate::domain::chat::{Attachment, ChatMessage};

        let message = ChatMessage::user(
            "analisis",
            vec![Attachment {
                name: "jadwal.png".into(),
                media_type: "image/png".into(),
                data: "aGFsbw==".into(),
            }],
        );
        let request = GenerateContentRequest {
            contents: vec![Content::from_message(&message)],
            system_instruction: Content::system("instruksi"),
            generation_config: GenerationConfig { temperature: 0.7 },
        };

        let json = serde_json::to_value(&request).expect("serialises");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/png"
        );
        let temperature = json["generationConfig"]["temperature"]
            .as_f64()
            .expect("temperature is numeric");
        assert!((temperature - 0.7).abs() < 1e-6);
        assert!(json["systemInstruction"].get("role").is_none());
    }
}
