//! Speech-to-text stage.
//!
//! The Whisper model is resolved once per process ([`WhisperModel::shared`]) and then only
//! read. Each transcription runs the configured backend against a file inside the run's
//! work directory and writes its output next to it, so concurrent runs never collide.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub mod processor;

use crate::config::{TranscriptionConfig, WhisperBackendKind};
use crate::utils::{check_command_available, format_duration};

static SHARED_MODEL: OnceCell<Arc<WhisperModel>> = OnceCell::const_new();

/// Transcription failure
#[derive(thiserror::Error, Debug)]
pub enum TranscriptionError {
    #[error("Whisper backend not available: {0}")]
    BackendUnavailable(String),

    #[error("Whisper model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Audio file does not exist: {}", .0.display())]
    AudioMissing(PathBuf),

    #[error("Audio could not be decoded: {message}")]
    DecodeFailed { message: String, stderr: String },

    #[error("{backend} exited with {status}")]
    BackendFailed {
        backend: &'static str,
        status: String,
        stderr: String,
    },

    #[error("Transcription timed out after {0} seconds")]
    Timeout(u64),

    #[error("Whisper produced no transcript at {}", .0.display())]
    OutputMissing(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscriptionError {
    /// Tool output worth keeping for operators
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            TranscriptionError::DecodeFailed { stderr, .. }
            | TranscriptionError::BackendFailed { stderr, .. } => {
                Some(stderr.as_str()).filter(|s| !s.is_empty())
            }
            _ => None,
        }
    }
}

/// Converts an audio file into plain text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError>;
}

/// Resolved speech-recognition backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhisperBackend {
    /// whisper.cpp with a ggml model file; input is converted to 16 kHz mono WAV first
    Cpp {
        binary: String,
        model_path: PathBuf,
        ffmpeg: String,
    },
    /// OpenAI Whisper CLI, fp32 only
    Python { binary: String, model: String },
}

impl WhisperBackend {
    pub fn name(&self) -> &'static str {
        match self {
            WhisperBackend::Cpp { .. } => "whisper.cpp",
            WhisperBackend::Python { .. } => "OpenAI Whisper",
        }
    }
}

/// Process-wide, read-only speech model handle
#[derive(Debug, Clone)]
pub struct WhisperModel {
    backend: WhisperBackend,
    language: Option<String>,
    threads: u16,
    timeout: Duration,
}

impl WhisperModel {
    pub fn new(backend: WhisperBackend, config: &TranscriptionConfig) -> Self {
        Self {
            backend,
            language: config.language.clone(),
            threads: config.threads.max(1),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    /// Resolve the backend and model once; later calls return the same handle
    pub async fn shared(config: &TranscriptionConfig) -> Result<Arc<WhisperModel>, TranscriptionError> {
        SHARED_MODEL
            .get_or_try_init(|| async { Self::load(config).await.map(Arc::new) })
            .await
            .cloned()
    }

    /// Resolve the configured backend, verifying binaries and model files
    pub async fn load(config: &TranscriptionConfig) -> Result<Self, TranscriptionError> {
        let backend = match config.backend {
            WhisperBackendKind::Cpp => Self::load_cpp(config).await?,
            WhisperBackendKind::Python => Self::load_python(config).await?,
            WhisperBackendKind::Auto => match Self::load_cpp(config).await {
                Ok(backend) => backend,
                Err(err) => {
                    debug!("whisper.cpp unusable ({}), trying OpenAI Whisper", err);
                    Self::load_python(config).await.map_err(|_| {
                        TranscriptionError::BackendUnavailable(format!(
                            "neither {} nor {} is usable; install whisper.cpp or openai-whisper",
                            config.whisper_cpp_path, config.whisper_python_path
                        ))
                    })?
                }
            },
        };

        info!(backend = backend.name(), model = %config.model, "Whisper model ready");
        Ok(Self::new(backend, config))
    }

    async fn load_cpp(config: &TranscriptionConfig) -> Result<WhisperBackend, TranscriptionError> {
        let model_path = Self::resolve_model_path(config)?;

        if !check_command_available(&config.whisper_cpp_path, "-h").await {
            return Err(TranscriptionError::BackendUnavailable(config.whisper_cpp_path.clone()));
        }
        if !check_command_available(&config.ffmpeg_path, "-version").await {
            return Err(TranscriptionError::BackendUnavailable(config.ffmpeg_path.clone()));
        }

        Ok(WhisperBackend::Cpp {
            binary: config.whisper_cpp_path.clone(),
            model_path,
            ffmpeg: config.ffmpeg_path.clone(),
        })
    }

    async fn load_python(config: &TranscriptionConfig) -> Result<WhisperBackend, TranscriptionError> {
        if !check_command_available(&config.whisper_python_path, "-h").await {
            return Err(TranscriptionError::BackendUnavailable(config.whisper_python_path.clone()));
        }

        Ok(WhisperBackend::Python {
            binary: config.whisper_python_path.clone(),
            model: config.model.clone(),
        })
    }

    /// Explicit model file, or the first `ggml-<model>.bin` in the usual locations
    pub fn resolve_model_path(config: &TranscriptionConfig) -> Result<PathBuf, TranscriptionError> {
        if let Some(path) = &config.model_path {
            return if path.is_file() {
                Ok(path.clone())
            } else {
                Err(TranscriptionError::ModelNotFound(path.clone()))
            };
        }

        let file_name = format!("ggml-{}.bin", config.model);
        let mut candidates = vec![PathBuf::from("models").join(&file_name)];
        if let Some(data_dir) = dirs::data_dir() {
            candidates.push(data_dir.join("quizly").join("models").join(&file_name));
        }
        candidates.push(PathBuf::from("/usr/local/share/whisper-cpp").join(&file_name));
        candidates.push(PathBuf::from("/opt/homebrew/share/whisper-cpp").join(&file_name));

        candidates
            .iter()
            .find(|candidate| candidate.is_file())
            .cloned()
            .ok_or_else(|| TranscriptionError::ModelNotFound(candidates[0].clone()))
    }

    pub fn backend(&self) -> &WhisperBackend {
        &self.backend
    }

    /// Arguments for the backend invocation; output lands at `<workdir>/<stem>.txt`
    fn backend_args(&self, input: &Path, workdir: &Path, stem: &str) -> Vec<String> {
        match &self.backend {
            WhisperBackend::Cpp { model_path, .. } => vec![
                "-m".to_string(),
                model_path.to_string_lossy().into_owned(),
                "-f".to_string(),
                input.to_string_lossy().into_owned(),
                "-l".to_string(),
                self.language.clone().unwrap_or_else(|| "auto".to_string()),
                "-t".to_string(),
                self.threads.to_string(),
                "-nt".to_string(),
                "-otxt".to_string(),
                "-of".to_string(),
                workdir.join(stem).to_string_lossy().into_owned(),
            ],
            WhisperBackend::Python { model, .. } => {
                let mut args = vec![
                    input.to_string_lossy().into_owned(),
                    "--model".to_string(),
                    model.clone(),
                    "--fp16".to_string(),
                    "False".to_string(),
                    "--output_format".to_string(),
                    "txt".to_string(),
                    "--output_dir".to_string(),
                    workdir.to_string_lossy().into_owned(),
                    "--verbose".to_string(),
                    "False".to_string(),
                ];
                if let Some(language) = &self.language {
                    args.push("--language".to_string());
                    args.push(language.clone());
                }
                args
            }
        }
    }
}

/// Whisper-backed [`Transcriber`]
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    model: Arc<WhisperModel>,
}

impl WhisperTranscriber {
    pub fn new(model: Arc<WhisperModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, TranscriptionError> {
        if !audio_path.is_file() {
            return Err(TranscriptionError::AudioMissing(audio_path.to_path_buf()));
        }

        let start = Instant::now();
        let workdir = audio_path.parent().unwrap_or_else(|| Path::new("."));
        let stem = audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        info!(
            backend = self.model.backend.name(),
            audio = %audio_path.display(),
            "Starting transcription"
        );

        let (binary, input) = match &self.model.backend {
            WhisperBackend::Cpp { binary, ffmpeg, .. } => {
                let wav = workdir.join(format!("{}-16k.wav", stem));
                processor::convert_to_wav(ffmpeg, audio_path, &wav, self.model.timeout).await?;
                (binary.clone(), wav)
            }
            WhisperBackend::Python { binary, .. } => (binary.clone(), audio_path.to_path_buf()),
        };

        let mut command = Command::new(&binary);
        command.args(self.model.backend_args(&input, workdir, &stem));

        let output = processor::run_tool(command, &binary, self.model.timeout).await?;
        if !output.status.success() {
            return Err(TranscriptionError::BackendFailed {
                backend: self.model.backend.name(),
                status: output.status.to_string(),
                stderr: crate::utils::tail_lines(&String::from_utf8_lossy(&output.stderr), 20),
            });
        }

        let transcript = processor::read_transcript(&workdir.join(format!("{}.txt", stem))).await?;

        if transcript.is_empty() {
            warn!("Transcript is empty; the audio may contain no speech");
        }

        info!(
            chars = transcript.len(),
            elapsed = %format_duration(start.elapsed().as_secs_f64()),
            "Transcription finished"
        );

        Ok(transcript)
    }
}
