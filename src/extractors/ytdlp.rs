use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use url::Url;

use super::{locate_download, FetchError, FetchedAudio, MediaFetcher, AUDIO_STEM};
use crate::config::FetchConfig;
use crate::quiz::FALLBACK_TITLE;
use crate::utils::tail_lines;

/// Audio fetcher backed by yt-dlp; accepts any http(s) URL and lets the extractor decide
pub struct YtDlpFetcher {
    yt_dlp_path: String,
    timeout: Duration,
}

impl YtDlpFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            yt_dlp_path: config.yt_dlp_path.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        crate::utils::check_command_available(&self.yt_dlp_path, "--version").await
    }

    /// Best audio-only stream into `<workdir>/audio.<ext>`, metadata as JSON on stdout
    fn build_args(url: &Url, workdir: &Path) -> Vec<String> {
        let template = workdir.join(format!("{}.%(ext)s", AUDIO_STEM));

        vec![
            "--format".to_string(),
            "bestaudio/best".to_string(),
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-warnings".to_string(),
            "--dump-json".to_string(),
            "--no-simulate".to_string(),
            "--output".to_string(),
            template.to_string_lossy().into_owned(),
            url.to_string(),
        ]
    }

    /// Map yt-dlp's stderr onto the fetch failure taxonomy
    fn classify_failure(stderr: &str) -> FetchError {
        let detail = tail_lines(stderr, 5);
        let lower = stderr.to_lowercase();

        if lower.contains("requested format is not available")
            || lower.contains("no video formats found")
            || lower.contains("no audio")
        {
            FetchError::NoAudioStream(detail)
        } else if lower.contains("available in your country")
            || lower.contains("geo restricted")
            || lower.contains("geo-restricted")
            || lower.contains("not available from your location")
            || lower.contains("private video")
            || lower.contains("sign in to confirm")
            || lower.contains("members-only")
        {
            FetchError::Restricted(detail)
        } else if detail.is_empty() {
            FetchError::Failed("yt-dlp exited without an error message".to_string())
        } else {
            FetchError::Failed(detail)
        }
    }

    /// Title from the info JSON yt-dlp prints for the downloaded entry
    fn parse_title(stdout: &str) -> String {
        stdout
            .lines()
            .rev()
            .find_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
            .and_then(|info| info["title"].as_str().map(str::trim).map(str::to_string))
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| FALLBACK_TITLE.to_string())
    }

    /// Downloaded file path as reported by yt-dlp, if it exists
    fn reported_path(stdout: &str) -> Option<PathBuf> {
        let info = stdout
            .lines()
            .rev()
            .find_map(|line| serde_json::from_str::<Value>(line.trim()).ok())?;

        let path = info["requested_downloads"][0]["filepath"]
            .as_str()
            .or_else(|| info["_filename"].as_str())
            .map(PathBuf::from)?;

        path.is_file().then_some(path)
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, url: &Url, workdir: &Path) -> Result<FetchedAudio, FetchError> {
        tracing::debug!("Downloading best audio stream for: {}", url);

        let command = Command::new(&self.yt_dlp_path)
            .args(Self::build_args(url, workdir))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, command)
            .await
            .map_err(|_| FetchError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => FetchError::ToolUnavailable(self.yt_dlp_path.clone()),
                _ => FetchError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::classify_failure(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let title = Self::parse_title(&stdout);

        let path = match Self::reported_path(&stdout) {
            Some(path) => path,
            None => locate_download(workdir).await?.ok_or_else(|| {
                FetchError::NoAudioStream("yt-dlp finished but no audio file was written".to_string())
            })?,
        };

        tracing::info!(title = %title, path = %path.display(), "Audio downloaded");

        Ok(FetchedAudio { path, title })
    }

    fn supports_url(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    fn platform_name(&self) -> &'static str {
        "yt-dlp"
    }
}
