use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

pub mod direct;
pub mod ytdlp;

use crate::config::FetchConfig;

/// File stem every fetcher downloads to inside the run's work directory
pub const AUDIO_STEM: &str = "audio";

/// Audio downloaded for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAudio {
    /// Location inside the run's work directory
    pub path: PathBuf,

    /// Upstream-reported title, or the fallback placeholder
    pub title: String,
}

/// Media fetch failure
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("No fetcher supports URL: {0}")]
    UnsupportedUrl(String),

    #[error("{0} is not available; install it or set its path in the config")]
    ToolUnavailable(String),

    #[error("Media is restricted or private: {0}")]
    Restricted(String),

    #[error("No downloadable audio stream: {0}")]
    NoAudioStream(String),

    #[error("Download timed out after {0} seconds")]
    Timeout(u64),

    #[error("Audio download failed: {0}")]
    Failed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Mp4,
    Wav,
    Flac,
    Ogg,
    Webm,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Mp4 => "mp4",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Webm => "webm",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" | "aac" => Some(AudioFormat::M4a),
            "mp4" | "m4v" | "mov" => Some(AudioFormat::Mp4),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" | "opus" => Some(AudioFormat::Ogg),
            "webm" => Some(AudioFormat::Webm),
            _ => None,
        }
    }

    /// Guess the format from a Content-Type header
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type.to_lowercase() {
            ct if ct.contains("mpeg") || ct.contains("mp3") => Some(AudioFormat::Mp3),
            ct if ct.contains("audio/mp4") || ct.contains("m4a") || ct.contains("aac") => Some(AudioFormat::M4a),
            ct if ct.contains("video/mp4") || ct.contains("quicktime") => Some(AudioFormat::Mp4),
            ct if ct.contains("wav") => Some(AudioFormat::Wav),
            ct if ct.contains("flac") => Some(AudioFormat::Flac),
            ct if ct.contains("webm") => Some(AudioFormat::Webm),
            ct if ct.contains("ogg") || ct.contains("opus") => Some(AudioFormat::Ogg),
            _ => None,
        }
    }
}

/// Retrieves the best available audio track of a remote video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download audio for `url` into `workdir`
    async fn fetch(&self, url: &Url, workdir: &Path) -> Result<FetchedAudio, FetchError>;

    /// Check if this fetcher supports the given URL
    fn supports_url(&self, url: &Url) -> bool;

    /// Get the name of this platform
    fn platform_name(&self) -> &'static str;
}

/// Registry for managing multiple fetchers
pub struct FetcherRegistry {
    fetchers: Vec<Arc<dyn MediaFetcher>>,
}

impl FetcherRegistry {
    /// Direct media links first, yt-dlp as the catch-all
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let mut registry = Self::empty();
        registry.register(Arc::new(direct::DirectFetcher::new(config)?));
        registry.register(Arc::new(ytdlp::YtDlpFetcher::new(config)));
        Ok(registry)
    }

    pub fn empty() -> Self {
        Self {
            fetchers: Vec::new(),
        }
    }

    /// Register a new fetcher; earlier registrations win
    pub fn register(&mut self, fetcher: Arc<dyn MediaFetcher>) {
        self.fetchers.push(fetcher);
    }

    /// Find a fetcher that supports the given URL
    pub fn find_fetcher(&self, url: &Url) -> Option<&dyn MediaFetcher> {
        self.fetchers
            .iter()
            .find(|fetcher| fetcher.supports_url(url))
            .map(|fetcher| fetcher.as_ref())
    }

    /// List all registered platforms
    pub fn list_platforms(&self) -> Vec<&'static str> {
        self.fetchers
            .iter()
            .map(|fetcher| fetcher.platform_name())
            .collect()
    }
}

#[async_trait]
impl MediaFetcher for FetcherRegistry {
    async fn fetch(&self, url: &Url, workdir: &Path) -> Result<FetchedAudio, FetchError> {
        let fetcher = self
            .find_fetcher(url)
            .ok_or_else(|| FetchError::UnsupportedUrl(url.to_string()))?;

        tracing::debug!(platform = fetcher.platform_name(), "Selected fetcher");
        fetcher.fetch(url, workdir).await
    }

    fn supports_url(&self, url: &Url) -> bool {
        self.find_fetcher(url).is_some()
    }

    fn platform_name(&self) -> &'static str {
        "Registry"
    }
}

/// Find the downloaded `audio.*` file, skipping partial downloads
pub async fn locate_download(workdir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(workdir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_audio = path.file_stem().and_then(|s| s.to_str()) == Some(AUDIO_STEM);
        let is_partial = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("part") | Some("ytdl") | Some("temp")
        );

        if is_audio && !is_partial && entry.file_type().await?.is_file() {
            return Ok(Some(path));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_detection() {
        assert_eq!(AudioFormat::from_extension("MP3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_extension("opus"), Some(AudioFormat::Ogg));
        assert_eq!(AudioFormat::from_extension("txt"), None);
        assert_eq!(AudioFormat::from_content_type("audio/mpeg"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_content_type("audio/webm; codecs=opus"), Some(AudioFormat::Webm));
        assert_eq!(AudioFormat::from_content_type("audio/ogg; codecs=opus"), Some(AudioFormat::Ogg));
        assert_eq!(AudioFormat::from_content_type("text/html"), None);
    }

    #[test]
    fn test_registry_prefers_direct_links() {
        let registry = FetcherRegistry::new(&FetchConfig::default()).unwrap();
        let direct = Url::parse("https://cdn.example.com/talk.mp3").unwrap();
        let video = Url::parse("https://www.youtube.com/watch?v=abc").unwrap();

        assert_eq!(registry.find_fetcher(&direct).unwrap().platform_name(), "Direct URL");
        assert_eq!(registry.find_fetcher(&video).unwrap().platform_name(), "yt-dlp");
        assert_eq!(registry.list_platforms(), vec!["Direct URL", "yt-dlp"]);
    }

    #[tokio::test]
    async fn test_empty_registry_rejects_url() {
        let registry = FetcherRegistry::empty();
        let url = Url::parse("https://example.com/video").unwrap();
        let workdir = tempfile::tempdir().unwrap();

        let result = registry.fetch(&url, workdir.path()).await;
        assert!(matches!(result, Err(FetchError::UnsupportedUrl(_))));
    }

    #[tokio::test]
    async fn test_locate_download_skips_partials() {
        let workdir = tempfile::tempdir().unwrap();
        fs_err::write(workdir.path().join("audio.webm.part"), b"partial").unwrap();
        assert_eq!(locate_download(workdir.path()).await.unwrap(), None);

        fs_err::write(workdir.path().join("audio.webm"), b"done").unwrap();
        assert_eq!(
            locate_download(workdir.path()).await.unwrap(),
            Some(workdir.path().join("audio.webm"))
        );
    }
}
