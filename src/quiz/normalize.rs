//! Turns raw generative-model text into a validated [`QuizDraft`].
//!
//! The canonical wire shape is a bare JSON array of question objects:
//!
//! ```json
//! [{ "question": "...", "options": ["...", "..."], "answer": "..." }]
//! ```
//!
//! Anything else, including an object wrapping the questions, is rejected. The quiz title
//! comes from the fetch stage, never from the model.

use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{QuestionDraft, QuizDraft, FALLBACK_TITLE};
use crate::config::QuizConfig;
use crate::utils::truncate_for_log;

const FENCE: &str = "```";

/// Minimum number of options a question must offer
pub const MIN_OPTIONS: usize = 2;

/// Normalization failure
#[derive(thiserror::Error, Debug)]
pub enum NormalizeError {
    #[error("model returned empty output")]
    EmptyOutput,

    #[error("model output is not valid JSON: {source}")]
    MalformedJson {
        source: serde_json::Error,
        raw: String,
    },

    #[error("model output violates the quiz schema: {violation}")]
    SchemaValidation {
        violation: SchemaViolation,
        raw: String,
    },
}

impl NormalizeError {
    /// Original model text, kept for operator diagnostics
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            NormalizeError::EmptyOutput => None,
            NormalizeError::MalformedJson { raw, .. } => Some(raw),
            NormalizeError::SchemaValidation { raw, .. } => Some(raw),
        }
    }
}

/// Reason a parsed document was rejected. Question numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    NotAnArray { found: &'static str },
    NoQuestions,
    NotAnObject { question: usize },
    MissingField { question: usize, field: &'static str },
    WrongType {
        question: usize,
        field: &'static str,
        expected: &'static str,
    },
    BlankField { question: usize, field: &'static str },
    TooFewOptions { question: usize, count: usize },
    AnswerNotInOptions { question: usize, answer: String },
}

impl SchemaViolation {
    /// Wire key the violation refers to, if any
    pub fn field(&self) -> Option<&'static str> {
        match self {
            SchemaViolation::MissingField { field, .. }
            | SchemaViolation::WrongType { field, .. }
            | SchemaViolation::BlankField { field, .. } => Some(field),
            SchemaViolation::TooFewOptions { .. } => Some("options"),
            SchemaViolation::AnswerNotInOptions { .. } => Some("answer"),
            _ => None,
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaViolation::NotAnArray { found } => {
                write!(f, "expected a JSON array of question objects, found {}", found)
            }
            SchemaViolation::NoQuestions => write!(f, "the question array is empty"),
            SchemaViolation::NotAnObject { question } => {
                write!(f, "question {} is not a JSON object", question)
            }
            SchemaViolation::MissingField { question, field } => {
                write!(f, "question {} is missing required key `{}`", question, field)
            }
            SchemaViolation::WrongType {
                question,
                field,
                expected,
            } => write!(f, "question {}: key `{}` must be {}", question, field, expected),
            SchemaViolation::BlankField { question, field } => {
                write!(f, "question {}: key `{}` is blank", question, field)
            }
            SchemaViolation::TooFewOptions { question, count } => write!(
                f,
                "question {}: `options` has {} entries, at least {} required",
                question, count, MIN_OPTIONS
            ),
            SchemaViolation::AnswerNotInOptions { question, answer } => write!(
                f,
                "question {}: `answer` {:?} is not one of the options",
                question, answer
            ),
        }
    }
}

/// Remove a surrounding triple-backtick fence and its optional language hint.
///
/// Text that does not start with a fence is only trimmed.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix(FENCE) {
        let rest = rest.trim_start_matches([' ', '\t']);
        let hint_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+')))
            .unwrap_or(rest.len());
        text = rest[hint_len..].trim_end();

        if let Some(inner) = text.strip_suffix(FENCE) {
            text = inner;
        }
    }

    text.trim()
}

/// Validates model output against the canonical quiz schema
#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    expected_questions: Option<usize>,
    require_answer_in_options: bool,
}

impl Default for ResponseNormalizer {
    fn default() -> Self {
        Self {
            expected_questions: None,
            require_answer_in_options: true,
        }
    }
}

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &QuizConfig) -> Self {
        Self {
            expected_questions: Some(config.question_count),
            require_answer_in_options: config.require_answer_in_options,
        }
    }

    /// Log a warning when the model returns a different number of questions
    pub fn expect_questions(mut self, count: usize) -> Self {
        self.expected_questions = Some(count);
        self
    }

    pub fn require_answer_in_options(mut self, required: bool) -> Self {
        self.require_answer_in_options = required;
        self
    }

    /// Strip, parse, validate and assemble a quiz titled after the source video
    pub fn normalize(&self, raw: &str, video_title: &str) -> Result<QuizDraft, NormalizeError> {
        debug!(
            raw_len = raw.len(),
            preview = %truncate_for_log(raw, 200),
            "Normalizing model output"
        );

        let cleaned = strip_code_fences(raw);
        if cleaned.is_empty() {
            return Err(NormalizeError::EmptyOutput);
        }

        let document: Value =
            serde_json::from_str(cleaned).map_err(|source| NormalizeError::MalformedJson {
                source,
                raw: raw.to_string(),
            })?;

        let questions =
            self.validate(&document)
                .map_err(|violation| NormalizeError::SchemaValidation {
                    violation,
                    raw: raw.to_string(),
                })?;

        if let Some(expected) = self.expected_questions {
            if questions.len() != expected {
                warn!(
                    expected,
                    received = questions.len(),
                    "Model returned an unexpected number of questions"
                );
            }
        }

        let title = match video_title.trim() {
            "" => FALLBACK_TITLE.to_string(),
            trimmed => trimmed.to_string(),
        };

        Ok(QuizDraft {
            description: QuizDraft::describe(&title),
            title,
            questions,
        })
    }

    fn validate(&self, document: &Value) -> Result<Vec<QuestionDraft>, SchemaViolation> {
        let items = document.as_array().ok_or(SchemaViolation::NotAnArray {
            found: json_type_name(document),
        })?;

        if items.is_empty() {
            return Err(SchemaViolation::NoQuestions);
        }

        items
            .iter()
            .enumerate()
            .map(|(index, item)| self.validate_question(index + 1, item))
            .collect()
    }

    fn validate_question(&self, question: usize, item: &Value) -> Result<QuestionDraft, SchemaViolation> {
        let object = item
            .as_object()
            .ok_or(SchemaViolation::NotAnObject { question })?;

        let title = required_string(object, question, "question")?;
        if title.trim().is_empty() {
            return Err(SchemaViolation::BlankField {
                question,
                field: "question",
            });
        }

        let raw_options = required(object, question, "options")?
            .as_array()
            .ok_or(SchemaViolation::WrongType {
                question,
                field: "options",
                expected: "an array of strings",
            })?;

        let options = raw_options
            .iter()
            .map(|option| match option.as_str() {
                Some(text) if text.trim().is_empty() => Err(SchemaViolation::BlankField {
                    question,
                    field: "options",
                }),
                Some(text) => Ok(text.to_string()),
                None => Err(SchemaViolation::WrongType {
                    question,
                    field: "options",
                    expected: "an array of strings",
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        if options.len() < MIN_OPTIONS {
            return Err(SchemaViolation::TooFewOptions {
                question,
                count: options.len(),
            });
        }

        let answer = required_string(object, question, "answer")?;
        if self.require_answer_in_options
            && !options.iter().any(|option| option.trim() == answer.trim())
        {
            return Err(SchemaViolation::AnswerNotInOptions {
                question,
                answer: answer.to_string(),
            });
        }

        Ok(QuestionDraft {
            question_title: title.to_string(),
            question_options: options,
            answer: answer.to_string(),
        })
    }
}

fn required<'a>(
    object: &'a Map<String, Value>,
    question: usize,
    field: &'static str,
) -> Result<&'a Value, SchemaViolation> {
    match object.get(field) {
        Some(Value::Null) | None => Err(SchemaViolation::MissingField { question, field }),
        Some(value) => Ok(value),
    }
}

fn required_string<'a>(
    object: &'a Map<String, Value>,
    question: usize,
    field: &'static str,
) -> Result<&'a str, SchemaViolation> {
    required(object, question, field)?
        .as_str()
        .ok_or(SchemaViolation::WrongType {
            question,
            field,
            expected: "a string",
        })
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
