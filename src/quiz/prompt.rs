use crate::config::QuizConfig;

/// Builds the instruction prompt sent to the generative model.
///
/// The template over-constrains the output format on purpose; whatever noise the model
/// still adds is absorbed by [`super::ResponseNormalizer`].
#[derive(Debug, Clone)]
pub struct PromptComposer {
    question_count: usize,
    language: String,
}

impl PromptComposer {
    pub fn new(question_count: usize, language: impl Into<String>) -> Self {
        Self {
            question_count,
            language: language.into(),
        }
    }

    pub fn from_config(config: &QuizConfig) -> Self {
        Self::new(config.question_count, config.language.clone())
    }

    pub fn question_count(&self) -> usize {
        self.question_count
    }

    /// Embed the transcript verbatim into the fixed template
    pub fn compose(&self, transcript: &str) -> String {
        let count = self.question_count;
        let language = &self.language;

        format!(
            r#"You are a quiz generator for educational video content.

Create exactly {count} multiple-choice quiz questions based on the following video transcript.
Write every question, option and answer in {language}.

---
{transcript}
---

Return the output EXCLUSIVELY as one valid JSON array with exactly {count} objects of this shape:
[
  {{
    "question": "string",
    "options": ["string", "string", "string", "string"],
    "answer": "string"
  }}
]

Rules:
- "options" contains exactly the choices offered for the question, usually 4.
- "answer" must be copied verbatim from "options".
- No explanations.
- No markdown.
- No ```json code blocks.
- No comments.
- NO text before or after the JSON.
- Return ONLY the raw JSON array."#
        )
    }
}
