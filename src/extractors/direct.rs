use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::{AudioFormat, FetchError, FetchedAudio, MediaFetcher, AUDIO_STEM};
use crate::config::FetchConfig;
use crate::quiz::FALLBACK_TITLE;

const MEDIA_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "wav", "flac", "ogg", "opus", "aac",
    "mp4", "mov", "webm", "m4v",
];

/// Fetcher for plain links to audio or video files
pub struct DirectFetcher {
    client: Client,
    timeout_seconds: u64,
}

impl DirectFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            timeout_seconds: config.timeout_seconds,
        })
    }

    /// Extension of the last path segment, if it names a media file
    fn media_extension(url: &Url) -> Option<String> {
        let filename = url.path_segments()?.last()?;
        let extension = Path::new(filename).extension()?.to_str()?.to_lowercase();
        MEDIA_EXTENSIONS
            .contains(&extension.as_str())
            .then_some(extension)
    }

    /// Title derived from the file name, decoded and de-slugged
    fn title_from_url(url: &Url) -> String {
        url.path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|filename| !filename.is_empty())
            .map(|filename| {
                let name = match filename.rfind('.') {
                    Some(dot_pos) => &filename[..dot_pos],
                    None => filename,
                };
                urlencoding::decode(name)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| name.to_string())
                    .replace(['_', '-'], " ")
                    .trim()
                    .to_string()
            })
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| FALLBACK_TITLE.to_string())
    }

    fn map_http_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout_seconds)
        } else {
            FetchError::Http(err)
        }
    }
}

#[async_trait]
impl MediaFetcher for DirectFetcher {
    async fn fetch(&self, url: &Url, workdir: &Path) -> Result<FetchedAudio, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.map_http_error(e))?;

        if !response.status().is_success() {
            return Err(FetchError::Failed(format!("HTTP {}", response.status())));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .map(|ct| ct.to_string());

        if let Some(ct) = &content_type {
            if ct.starts_with("text/") || ct.contains("html") {
                return Err(FetchError::NoAudioStream(format!("server returned {}", ct)));
            }
        }

        let extension = content_type
            .as_deref()
            .and_then(AudioFormat::from_content_type)
            .map(|format| format.as_str().to_string())
            .or_else(|| Self::media_extension(url))
            .unwrap_or_else(|| AudioFormat::Mp3.as_str().to_string());

        let path = workdir.join(format!("{}.{}", AUDIO_STEM, extension));
        let mut file = tokio::fs::File::create(&path).await?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.map_http_error(e))?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
        }
        file.flush().await?;

        if downloaded == 0 {
            return Err(FetchError::NoAudioStream("downloaded file is empty".to_string()));
        }

        let title = Self::title_from_url(url);
        tracing::info!(title = %title, bytes = downloaded, "Direct media downloaded");

        Ok(FetchedAudio { path, title })
    }

    fn supports_url(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https") && Self::media_extension(url).is_some()
    }

    fn platform_name(&self) -> &'static str {
        "Direct URL"
    }
}
