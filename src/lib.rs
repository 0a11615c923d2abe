//! Quizly - turn the spoken content of a video into a multiple-choice quiz
//!
//! The library downloads a video's audio track, transcribes it with a locally run Whisper
//! model, asks Google Gemini for a quiz about the transcript and validates the answer into
//! a typed [`QuizDraft`].

pub mod cli;
pub mod config;
pub mod error;
pub mod extractors;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod quiz;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use error::{ErrorKind, InputError, PipelineError, Stage};
pub use extractors::{FetchedAudio, MediaFetcher};
pub use generate::GenerativeClient;
pub use output::QuizRecord;
pub use pipeline::{PipelineInput, QuizPipeline};
pub use quiz::{QuestionDraft, QuizDraft};
pub use transcribe::Transcriber;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
