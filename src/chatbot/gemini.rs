//! Gemini API client for free-text replies.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chatbot::generator::{GenerationError, GenerationRequest, Generator};
use crate::chatbot::intents::Tone;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

pub struct GeminiClient {
    api_key: String,
    base_url: String,
    model: String,
    persona: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

/// Reply length cap passed to the API.
const MAX_OUTPUT_TOKENS: u32 = 200;

/// Build the single natural-language prompt sent upstream.
pub fn build_prompt(persona: &str, query: &str, tone: Tone) -> String {
    let tone_line = match tone {
        Tone::Humorous => "Answer in a light, playful, humorous tone. A short joke is welcome.",
        Tone::Professional => "Answer in a friendly but professional tone.",
    };
    format!(
        "{persona}\n\n\
         A visitor of the portfolio site asked: \"{query}\"\n\n\
         {tone_line}\n\
         Reply in the first person, in plain text without markdown, in at most three sentences. \
         If the question is unrelated to the portfolio owner, answer briefly and steer back to \
         their skills, projects or experience."
    )
}

/// Extract the generated text from a `generateContent` response body.
pub fn parse_response(body: &str) -> Result<String, GenerationError> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::Parse(format!("Failed to parse response: {e}")))?;

    if let Some(error) = parsed.error {
        return Err(GenerationError::Api(format!("Gemini error: {}", error.message)));
    }

    let candidates = parsed
        .candidates
        .ok_or_else(|| GenerationError::Parse("No candidates in response".into()))?;
    let candidate = candidates
        .first()
        .ok_or_else(|| GenerationError::Parse("Empty candidates array".into()))?;
    let content = candidate
        .content
        .as_ref()
        .ok_or_else(|| GenerationError::Parse("No content in candidate".into()))?;

    let text: String = content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();
    let text = text.trim();
    if text.is_empty() {
        return Err(GenerationError::Empty);
    }
    Ok(text.to_string())
}

impl GeminiClient {
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        persona: String,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Http(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            persona,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    /// Generate a reply for a visitor query.
    pub async fn generate_reply(&self, query: &str, tone: Tone) -> Result<String, GenerationError> {
        if self.api_key.is_empty() {
            return Err(GenerationError::Api("No Gemini API key configured".into()));
        }

        info!("💬 Asking Gemini ({}): {}", tone.as_str(), query);

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: build_prompt(&self.persona, query, tone),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: MAX_OUTPUT_TOKENS,
                temperature: match tone {
                    Tone::Humorous => 0.9,
                    Tone::Professional => 0.6,
                },
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Http(format!("Failed to read response: {e}")))?;

        debug!("Gemini response status: {status}");

        if !status.is_success() {
            return Err(GenerationError::Api(format!("{status}: {body}")));
        }

        let text = parse_response(&body)?;
        info!("💬 Gemini replied: {} chars", text.chars().count());
        Ok(text)
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.generate_reply(&request.query, request.tone).await
    }
}
