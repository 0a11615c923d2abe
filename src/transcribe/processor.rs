use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use super::TranscriptionError;
use crate::utils::tail_lines;

/// Run an external tool to completion, killing it when the timeout expires
pub async fn run_tool(
    mut command: Command,
    name: &str,
    timeout: Duration,
) -> Result<Output, TranscriptionError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!("Executing command: {:?}", command);

    match tokio::time::timeout(timeout, command.output()).await {
        Err(_) => Err(TranscriptionError::Timeout(timeout.as_secs())),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TranscriptionError::BackendUnavailable(name.to_string()))
        }
        Ok(Err(e)) => Err(TranscriptionError::Io(e)),
        Ok(Ok(output)) => Ok(output),
    }
}

/// Decode any input into the 16 kHz mono PCM WAV whisper.cpp expects
pub async fn convert_to_wav(
    ffmpeg: &str,
    input: &Path,
    output: &Path,
    timeout: Duration,
) -> Result<(), TranscriptionError> {
    let mut command = Command::new(ffmpeg);
    command
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .arg(input)
        .args(["-vn", "-ar", "16000", "-ac", "1", "-c:a", "pcm_s16le"])
        .arg(output);

    let result = run_tool(command, ffmpeg, timeout).await?;
    if !result.status.success() {
        return Err(TranscriptionError::DecodeFailed {
            message: format!("ffmpeg exited with {}", result.status),
            stderr: tail_lines(&String::from_utf8_lossy(&result.stderr), 20),
        });
    }

    Ok(())
}

/// Read the backend's text output and collapse it into one line of prose
pub async fn read_transcript(path: &Path) -> Result<String, TranscriptionError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TranscriptionError::OutputMissing(path.to_path_buf()));
        }
        Err(e) => return Err(TranscriptionError::Io(e)),
    };

    Ok(normalize_transcript(&content))
}

pub fn normalize_transcript(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_transcript() {
        assert_eq!(
            normalize_transcript(" Hello there.\n General   Kenobi.\n\n"),
            "Hello there. General Kenobi."
        );
        assert_eq!(normalize_transcript("\n \n"), "");
    }

    #[tokio::test]
    async fn test_read_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.txt");

        let missing = read_transcript(&path).await;
        assert!(matches!(missing, Err(TranscriptionError::OutputMissing(_))));

        fs_err::write(&path, "Line one\nLine two\n").unwrap();
        assert_eq!(read_transcript(&path).await.unwrap(), "Line one Line two");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_kills_slow_process() {
        let mut command = Command::new("sleep");
        command.arg("5");

        let started = std::time::Instant::now();
        let result = run_tool(command, "sleep", Duration::from_secs(1)).await;

        assert!(matches!(result, Err(TranscriptionError::Timeout(1))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_run_tool_missing_binary() {
        let command = Command::new("quizly-missing-whisper");
        let result = run_tool(command, "quizly-missing-whisper", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(TranscriptionError::BackendUnavailable(_))));
    }
}
