use url::Url;

use crate::error::InputError;

/// Validate a URL and return the parsed form
pub fn validate_url(url: &str) -> Result<Url, InputError> {
    let parsed = Url::parse(url.trim())
        .map_err(|_| InputError::InvalidUrl(url.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(InputError::UnsupportedScheme(url.to_string()));
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(InputError::InvalidUrl(url.to_string()));
    }

    Ok(parsed)
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Sanitize filename for safe filesystem usage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            match c {
                c if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.' => c,
                _ => '_',
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Shorten text for log lines, respecting char boundaries
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}… ({} bytes total)", head, text.len())
    } else {
        head
    }
}

/// Last `max_lines` non-empty lines of tool output
pub fn tail_lines(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Check which external tools are missing
pub async fn check_dependencies(config: &crate::Config) -> Vec<String> {
    let mut missing = Vec::new();

    if !crate::extractors::ytdlp::YtDlpFetcher::new(&config.fetch)
        .check_availability()
        .await
    {
        missing.push(format!(
            "{} - required to download audio from video platforms",
            config.fetch.yt_dlp_path
        ));
    }

    if !check_command_available(&config.transcription.ffmpeg_path, "-version").await {
        missing.push(format!(
            "{} - required for audio extraction and whisper.cpp input",
            config.transcription.ffmpeg_path
        ));
    }

    let cpp = check_command_available(&config.transcription.whisper_cpp_path, "-h").await;
    let python = check_command_available(&config.transcription.whisper_python_path, "-h").await;
    if !cpp && !python {
        missing.push(format!(
            "{} or {} - a Whisper backend is required for transcription",
            config.transcription.whisper_cpp_path, config.transcription.whisper_python_path
        ));
    }

    missing
}

/// Check if a command is available in PATH
pub async fn check_command_available(command: &str, probe_arg: &str) -> bool {
    use std::process::Stdio;
    use tokio::process::Command;

    Command::new(command)
        .arg(probe_arg)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
