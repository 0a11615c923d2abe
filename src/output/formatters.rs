use anyhow::{Context, Result};
use console::style;

use super::QuizRecord;

/// Format as pretty-printed JSON
pub fn format_as_json(record: &QuizRecord) -> Result<String> {
    serde_json::to_string_pretty(record).context("Failed to serialize quiz as JSON")
}

/// Format as YAML
pub fn format_as_yaml(record: &QuizRecord) -> Result<String> {
    serde_yaml::to_string(record).context("Failed to serialize quiz as YAML")
}

/// Human-readable rendering. Answers stay hidden unless `show_answers` is set.
pub fn format_as_text(record: &QuizRecord, show_answers: bool) -> String {
    let quiz = &record.quiz;
    let mut output = String::new();

    output.push_str(&format!("{}\n", style(&quiz.title).bold().underlined()));
    output.push_str(&format!("{}\n", style(&quiz.description).dim()));
    if let Some(url) = &record.video_url {
        output.push_str(&format!("{} {}\n", style("Source:").dim(), url));
    }
    output.push_str(&format!(
        "{} {}\n",
        style("Created:").dim(),
        record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    for (index, question) in quiz.questions.iter().enumerate() {
        output.push_str(&format!(
            "\n{} {}\n",
            style(format!("{}.", index + 1)).cyan().bold(),
            question.question_title
        ));

        for (position, option) in question.question_options.iter().enumerate() {
            let label = option_label(position);
            if show_answers && option.trim() == question.answer.trim() {
                output.push_str(&format!("   {} {}\n", style(label).green(), style(option).green()));
            } else {
                output.push_str(&format!("   {} {}\n", label, option));
            }
        }

        if show_answers {
            output.push_str(&format!("   {} {}\n", style("Answer:").green().bold(), question.answer));
        }
    }

    output
}

/// `a)`, `b)`, … then numbered past the alphabet
fn option_label(position: usize) -> String {
    match u8::try_from(position) {
        Ok(offset) if offset < 26 => format!("{})", (b'a' + offset) as char),
        _ => format!("{})", position + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::sample_record;

    fn plain(text: &str) -> String {
        console::strip_ansi_codes(text).into_owned()
    }

    #[test]
    fn test_text_hides_answers_by_default() {
        let text = plain(&format_as_text(&sample_record(), false));
        assert!(text.contains("1. Which keyword declares a binding?"));
        assert!(text.contains("a) let"));
        assert!(text.contains("c) dim"));
        assert!(!text.contains("Answer:"));
    }

    #[test]
    fn test_text_shows_answers_on_request() {
        let text = plain(&format_as_text(&sample_record(), true));
        assert!(text.contains("Answer: let"));
        assert!(text.contains("Source: https://youtu.be/abc"));
    }

    #[test]
    fn test_option_labels() {
        assert_eq!(option_label(0), "a)");
        assert_eq!(option_label(25), "z)");
        assert_eq!(option_label(26), "27)");
    }

    #[test]
    fn test_json_is_pretty() {
        let json = format_as_json(&sample_record()).unwrap();
        assert!(json.contains("\n  \"title\": \"Rust Basics\""));
        assert!(json.contains("\"created_at\""));
    }
}
