//! Remote text generation seam.

use async_trait::async_trait;

use crate::chatbot::intents::Tone;

/// What the controller asks the remote generator for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Lower-cased, trimmed user query.
    pub query: String,
    pub tone: Tone,
}

/// Remote generation unavailable.
///
/// Every variant is recovered by the controller the same way: it logs the
/// error and answers with the fallback reply.
#[derive(Debug)]
pub enum GenerationError {
    /// Transport failure before a response arrived.
    Http(String),
    /// Non-success status, API-level error payload, or missing credentials.
    Api(String),
    /// Response body was not the expected JSON shape.
    Parse(String),
    /// Response parsed but carried no text.
    Empty,
    /// The call did not finish within the configured bound.
    Timeout,
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::Http(e) => write!(f, "HTTP error: {e}"),
            GenerationError::Api(e) => write!(f, "API error: {e}"),
            GenerationError::Parse(e) => write!(f, "Parse error: {e}"),
            GenerationError::Empty => write!(f, "Empty response"),
            GenerationError::Timeout => write!(f, "Timed out"),
        }
    }
}

impl std::error::Error for GenerationError {}

/// Produces free-text replies for queries no canned intent covers.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}
