//! Failure taxonomy shared by every pipeline stage.
//!
//! Each stage reports its own typed error; the orchestrator folds them into a single
//! [`PipelineError`] carrying the failing [`Stage`], an [`ErrorKind`], a message and,
//! where one exists, the raw diagnostic payload (for example the unparseable model text).

use std::fmt;

use serde::Serialize;

use crate::extractors::FetchError;
use crate::generate::GenerationError;
use crate::quiz::normalize::NormalizeError;
use crate::transcribe::TranscriptionError;

/// Pipeline stage that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Transcribe,
    Generate,
    Normalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Transcribe => "transcribe",
            Stage::Generate => "generate",
            Stage::Normalize => "normalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of terminal failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    FetchError,
    TranscriptionError,
    GenerationError,
    EmptyOutputError,
    #[serde(rename = "MalformedJSONError")]
    MalformedJsonError,
    SchemaValidationError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::FetchError => "FetchError",
            ErrorKind::TranscriptionError => "TranscriptionError",
            ErrorKind::GenerationError => "GenerationError",
            ErrorKind::EmptyOutputError => "EmptyOutputError",
            ErrorKind::MalformedJsonError => "MalformedJSONError",
            ErrorKind::SchemaValidationError => "SchemaValidationError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a pipeline run
#[derive(thiserror::Error, Debug, Clone, Serialize)]
#[error("{stage} stage failed [{kind}]: {message}")]
pub struct PipelineError {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
    /// Operator-facing diagnostics (raw model output, decoder errors). Never shown to end users.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl PipelineError {
    pub fn new(stage: Stage, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
            raw: None,
        }
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        PipelineError::new(Stage::Fetch, ErrorKind::FetchError, err.to_string())
    }
}

impl From<TranscriptionError> for PipelineError {
    fn from(err: TranscriptionError) -> Self {
        let raw = err.diagnostics().map(str::to_string);
        let mut out = PipelineError::new(
            Stage::Transcribe,
            ErrorKind::TranscriptionError,
            err.to_string(),
        );
        out.raw = raw;
        out
    }
}

impl From<GenerationError> for PipelineError {
    fn from(err: GenerationError) -> Self {
        let raw = err.diagnostics().map(str::to_string);
        let mut out =
            PipelineError::new(Stage::Generate, ErrorKind::GenerationError, err.to_string());
        out.raw = raw;
        out
    }
}

impl From<NormalizeError> for PipelineError {
    fn from(err: NormalizeError) -> Self {
        let kind = match &err {
            NormalizeError::EmptyOutput => ErrorKind::EmptyOutputError,
            NormalizeError::MalformedJson { .. } => ErrorKind::MalformedJsonError,
            NormalizeError::SchemaValidation { .. } => ErrorKind::SchemaValidationError,
        };
        let out = PipelineError::new(Stage::Normalize, kind, err.to_string());
        match err.raw_output() {
            Some(raw) => out.with_raw(raw),
            None => out,
        }
    }
}

/// Rejected pipeline input
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),

    #[error("URL must use HTTP or HTTPS protocol: {0}")]
    UnsupportedScheme(String),
}
