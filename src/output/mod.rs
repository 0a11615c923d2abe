use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cli::OutputFormat;
use crate::quiz::QuizDraft;

pub mod formatters;

pub use formatters::*;

/// A generated quiz together with where and when it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub quiz: QuizDraft,
}

impl QuizRecord {
    pub fn new(quiz: QuizDraft, video_url: Option<String>) -> Self {
        Self {
            video_url,
            created_at: Utc::now(),
            quiz,
        }
    }
}

fn render(record: &QuizRecord, format: &OutputFormat, show_answers: bool) -> Result<String> {
    match format {
        OutputFormat::Json => format_as_json(record),
        OutputFormat::Yaml => format_as_yaml(record),
        OutputFormat::Text => Ok(format_as_text(record, show_answers)),
    }
}

/// Save quiz to file; text output is written without terminal styling
pub fn save_to_file(
    record: &QuizRecord,
    path: &Path,
    format: &OutputFormat,
    show_answers: bool,
) -> Result<()> {
    let content = render(record, format, show_answers)?;
    let content = console::strip_ansi_codes(&content);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }

    fs_err::write(path, content.as_bytes())
        .with_context(|| format!("Failed to write quiz to {}", path.display()))?;
    Ok(())
}

/// Print quiz to console
pub fn print_to_console(record: &QuizRecord, format: &OutputFormat, show_answers: bool) -> Result<()> {
    let content = render(record, format, show_answers)?;
    println!("{}", content);
    Ok(())
}
