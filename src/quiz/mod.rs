use serde::{Deserialize, Serialize};

pub mod normalize;
pub mod prompt;

pub use normalize::{NormalizeError, ResponseNormalizer, SchemaViolation};
pub use prompt::PromptComposer;

/// Title used when the video platform reports none
pub const FALLBACK_TITLE: &str = "Untitled Video";

/// Quiz produced by a successful pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizDraft {
    pub title: String,
    pub description: String,
    pub questions: Vec<QuestionDraft>,
}

/// A single multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub question_title: String,

    /// Choices in the order the model offered them
    pub question_options: Vec<String>,

    /// Always one of `question_options` unless the membership check is disabled
    pub answer: String,
}

impl QuizDraft {
    /// Description attached to every generated quiz
    pub fn describe(title: &str) -> String {
        format!("Quiz generated from: {}", title)
    }
}
