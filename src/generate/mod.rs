use async_trait::async_trait;

pub mod gemini;

pub use gemini::GeminiClient;

/// Generative model failure
#[derive(thiserror::Error, Debug)]
pub enum GenerationError {
    #[error("Gemini API key not configured (set GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("Request to the model failed: {0}")]
    Request(String),

    #[error("Model call timed out after {0} seconds")]
    Timeout(u64),

    #[error("Model API returned HTTP {status}")]
    Api { status: u16, body: String },

    #[error("Model API response could not be decoded: {message}")]
    InvalidResponse { message: String, body: String },

    #[error("Model returned no usable text ({0})")]
    NoContent(String),
}

impl GenerationError {
    /// Response body worth keeping for operators
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            GenerationError::Api { body, .. } | GenerationError::InvalidResponse { body, .. } => {
                Some(body.as_str()).filter(|b| !b.is_empty())
            }
            _ => None,
        }
    }
}

/// Sends one prompt to a generative text model and returns its complete answer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
