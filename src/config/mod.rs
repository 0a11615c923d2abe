use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Media download settings
    pub fetch: FetchConfig,

    /// Speech-to-text settings
    pub transcription: TranscriptionConfig,

    /// Generative model settings
    pub gemini: GeminiConfig,

    /// Quiz shape and language
    pub quiz: QuizConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// yt-dlp executable
    pub yt_dlp_path: String,

    /// Abort the download after this many seconds
    pub timeout_seconds: u64,

    /// User agent for direct media downloads
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhisperBackendKind {
    /// Prefer whisper.cpp, fall back to the Python CLI
    Auto,
    /// whisper.cpp (`whisper-cli`)
    Cpp,
    /// OpenAI Whisper (`whisper`)
    Python,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub backend: WhisperBackendKind,

    /// whisper.cpp executable
    pub whisper_cpp_path: String,

    /// OpenAI Whisper executable
    pub whisper_python_path: String,

    /// ffmpeg executable, used to prepare 16 kHz input for whisper.cpp
    pub ffmpeg_path: String,

    /// Model size (tiny, base, small, ...)
    pub model: String,

    /// Explicit ggml model file for whisper.cpp
    pub model_path: Option<PathBuf>,

    /// Spoken language; auto-detected when unset
    pub language: Option<String>,

    /// CPU threads for whisper.cpp
    pub threads: u16,

    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key; `GEMINI_API_KEY` takes precedence
    pub api_key: Option<String>,

    /// Fixed model identifier
    pub model: String,

    /// API root, without trailing slash
    pub base_url: String,

    pub temperature: f32,

    pub max_output_tokens: u32,

    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    /// Questions requested from the model
    pub question_count: usize,

    /// Language the quiz is written in
    pub language: String,

    /// Reject questions whose answer is not one of the options
    pub require_answer_in_options: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root for per-run work directories (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,

    /// Show progress spinners
    pub progress: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            temp_dir: None,
            progress: true,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            timeout_seconds: 300,
            user_agent: format!("quizly/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            backend: WhisperBackendKind::Auto,
            whisper_cpp_path: "whisper-cli".to_string(),
            whisper_python_path: "whisper".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            model: "tiny".to_string(),
            model_path: None,
            language: None,
            threads: 4,
            timeout_seconds: 900,
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.4,
            max_output_tokens: 4096,
            timeout_seconds: 120,
        }
    }
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            question_count: 5,
            language: "German".to_string(),
            require_answer_in_options: true,
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        let mut config = if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            serde_yaml::from_str::<Config>(&content).context("Failed to parse config file")?
        } else {
            let config = Self::default();
            config.save(&config_path).await?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            config
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("quizly.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("quizly").join("config.yaml"))
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Some(model) = non_empty("QUIZLY_GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(model) = non_empty("QUIZLY_WHISPER_MODEL") {
            self.transcription.model = model;
        }
        if let Some(dir) = non_empty("QUIZLY_TEMP_DIR") {
            self.app.temp_dir = Some(PathBuf::from(dir));
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.quiz.question_count == 0 {
            anyhow::bail!("quiz.question_count must be at least 1");
        }

        if self.gemini.model.trim().is_empty() {
            anyhow::bail!("gemini.model must be configured");
        }

        if self.transcription.model.trim().is_empty() && self.transcription.model_path.is_none() {
            anyhow::bail!("transcription.model or transcription.model_path must be configured");
        }

        if !(0.0..=2.0).contains(&self.gemini.temperature) {
            anyhow::bail!("gemini.temperature must be between 0.0 and 2.0");
        }

        for (name, seconds) in [
            ("fetch.timeout_seconds", self.fetch.timeout_seconds),
            ("transcription.timeout_seconds", self.transcription.timeout_seconds),
            ("gemini.timeout_seconds", self.gemini.timeout_seconds),
        ] {
            if seconds == 0 {
                anyhow::bail!("{} must be greater than zero", name);
            }
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  yt-dlp: {} (timeout {}s)", self.fetch.yt_dlp_path, self.fetch.timeout_seconds);
        println!("  Whisper Backend: {:?}", self.transcription.backend);
        println!("  Whisper Model: {}", self.transcription.model);
        if let Some(path) = &self.transcription.model_path {
            println!("  Whisper Model File: {}", path.display());
        }
        if let Some(language) = &self.transcription.language {
            println!("  Spoken Language: {}", language);
        }
        println!("  Gemini Model: {}", self.gemini.model);
        println!("  Gemini API Key: {}", mask_secret(self.gemini.api_key.as_deref()));
        println!("  Questions: {} ({})", self.quiz.question_count, self.quiz.language);
        if let Some(dir) = &self.app.temp_dir {
            println!("  Temp Dir: {}", dir.display());
        }
    }
}

fn mask_secret(secret: Option<&str>) -> String {
    match secret {
        Some(secret) if secret.chars().count() > 4 => {
            let tail: String = secret.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            format!("****{}", tail)
        }
        Some(_) => "****".to_string(),
        None => "(not set)".to_string(),
    }
}
