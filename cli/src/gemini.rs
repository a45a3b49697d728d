use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

const GENERATE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

/// Client for the hosted text-generation model used by `insight`.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    pub text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate; empty when there is none.
    #[must_use]
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

impl GeminiClient {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "sugartrack-cli/{} (glucose log)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            endpoint: GENERATE_URL.to_string(),
        })
    }

    pub async fn generate_async(&self, prompt: &str) -> Result<String> {
        let Some(key) = self.api_key.as_deref() else {
            bail!("{} is not set", crate::config::INSIGHT_KEY_ENV);
        };

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        tracing::debug!(chars = prompt.len(), "sending insight request");
        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach the insight service")?
            .error_for_status()
            .context("Insight service returned an error")?;

        let data: GenerateResponse = resp
            .json()
            .await
            .context("Failed to parse insight response")?;

        Ok(data.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: "hello" }],
            }],
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_response_text_joins_parts() {
        let resp: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"I am an AI, "},{"text":"not a doctor."}]}}]}"#,
        )
        .unwrap();
        assert_eq!(resp.text(), "I am an AI, not a doctor.");
    }

    #[test]
    fn test_response_text_empty_when_no_candidates() {
        let resp: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(resp.text(), "");

        let resp: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert_eq!(resp.text(), "");
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let client = GeminiClient::new(None).unwrap();
        let err = client.generate_async("prompt").await.unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    #[ignore = "hits the Gemini API"]
    async fn test_generate_live() {
        let key = std::env::var(crate::config::INSIGHT_KEY_ENV).ok();
        let client = GeminiClient::new(key).unwrap();
        let text = client.generate_async("Say hello.").await.unwrap();
        assert!(!text.is_empty());
    }
}
