//! Quiz-generation pipeline orchestrator.
//!
//! Runs Fetch → Transcribe → Compose → Generate → Normalize strictly in sequence. The first
//! failing stage aborts the run with a [`PipelineError`]; nothing is retried. Every run owns
//! a fresh temporary work directory that is removed when the run ends, whatever the outcome.

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{error, info, info_span, warn, Instrument};
use url::Url;
use uuid::Uuid;

use crate::config::{Config, QuizConfig};
use crate::error::{ErrorKind, InputError, PipelineError, Stage};
use crate::extractors::{FetcherRegistry, MediaFetcher};
use crate::generate::{GeminiClient, GenerativeClient};
use crate::quiz::{PromptComposer, QuizDraft, ResponseNormalizer};
use crate::transcribe::{Transcriber, WhisperModel, WhisperTranscriber};
use crate::utils::{extract_domain, format_duration, truncate_for_log, validate_url};

/// Validated pipeline input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineInput {
    video_url: Url,
}

impl PipelineInput {
    pub fn new(video_url: &str) -> Result<Self, InputError> {
        Ok(Self {
            video_url: validate_url(video_url)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.video_url
    }
}

/// Progress of a single run; only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    Start,
    Fetched,
    Transcribed,
    Prompted,
    Generated,
    Normalized,
    Done,
}

impl PipelineState {
    /// Stage whose completion produced this state
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineState::Start => "start",
            PipelineState::Fetched => "fetch",
            PipelineState::Transcribed => "transcribe",
            PipelineState::Prompted => "compose",
            PipelineState::Generated => "generate",
            PipelineState::Normalized => "normalize",
            PipelineState::Done => "done",
        }
    }
}

/// Sequences the quiz stages; shareable across concurrent runs
pub struct QuizPipeline {
    fetcher: Arc<dyn MediaFetcher>,
    transcriber: Arc<dyn Transcriber>,
    generator: Arc<dyn GenerativeClient>,
    composer: PromptComposer,
    normalizer: ResponseNormalizer,
    temp_root: Option<PathBuf>,
    show_progress: bool,
}

impl QuizPipeline {
    /// Build the production pipeline: yt-dlp/direct fetchers, shared Whisper model, Gemini
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let fetcher = FetcherRegistry::new(&config.fetch)
            .context("Failed to initialize media fetchers")?;
        let model = WhisperModel::shared(&config.transcription)
            .await
            .context("Failed to load Whisper model")?;
        let generator = GeminiClient::new(&config.gemini)
            .context("Failed to initialize Gemini client")?;
        let platforms = fetcher.list_platforms().join(", ");
        info!(
            platforms = %platforms,
            whisper = model.backend().name(),
            gemini = generator.model(),
            "Pipeline stages ready"
        );

        Ok(Self::from_parts(
            Arc::new(fetcher),
            Arc::new(WhisperTranscriber::new(model)),
            Arc::new(generator),
            &config.quiz,
        )
        .with_temp_root(config.app.temp_dir.clone())
        .with_progress(config.app.progress))
    }

    /// Assemble a pipeline from explicit stage implementations
    pub fn from_parts(
        fetcher: Arc<dyn MediaFetcher>,
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn GenerativeClient>,
        quiz: &QuizConfig,
    ) -> Self {
        Self {
            fetcher,
            transcriber,
            generator,
            composer: PromptComposer::from_config(quiz),
            normalizer: ResponseNormalizer::from_config(quiz),
            temp_root: None,
            show_progress: false,
        }
    }

    /// Directory under which per-run work directories are created
    pub fn with_temp_root(mut self, root: Option<PathBuf>) -> Self {
        self.temp_root = root;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run every stage for one input
    pub async fn run(&self, input: &PipelineInput) -> Result<QuizDraft, PipelineError> {
        let run_id = Uuid::new_v4();
        let platform = extract_domain(input.url().as_str()).unwrap_or_else(|| "unknown".to_string());
        let span = info_span!("quiz_run", %run_id, url = %input.url(), platform = %platform);

        self.run_in_workdir(input).instrument(span).await
    }

    async fn run_in_workdir(&self, input: &PipelineInput) -> Result<QuizDraft, PipelineError> {
        let started = Instant::now();
        let workdir = self.create_workdir()?;
        let workdir_path = workdir.path().to_path_buf();

        let mut state = PipelineState::Start;
        let result = self.execute(input, &workdir_path, &mut state).await;

        if let Err(e) = workdir.close() {
            warn!(workdir = %workdir_path.display(), "Failed to remove work directory: {}", e);
        }

        match &result {
            Ok(quiz) => {
                advance(&mut state, PipelineState::Done);
                info!(
                    questions = quiz.questions.len(),
                    elapsed = %format_duration(started.elapsed().as_secs_f64()),
                    "Quiz generated"
                );
            }
            Err(err) => {
                error!(
                    stage = %err.stage,
                    kind = %err.kind,
                    last_state = ?state,
                    "Pipeline failed: {}",
                    err.message
                );
                if let Some(raw) = &err.raw {
                    warn!(stage = %err.stage, raw_output = %raw, "Diagnostic payload of failed run");
                }
            }
        }

        result
    }

    async fn execute(
        &self,
        input: &PipelineInput,
        workdir: &Path,
        state: &mut PipelineState,
    ) -> Result<QuizDraft, PipelineError> {
        let audio = self
            .stage("Downloading audio...", self.fetcher.fetch(input.url(), workdir))
            .await?;
        advance(state, PipelineState::Fetched);

        let transcript = self
            .stage("Transcribing audio...", self.transcriber.transcribe(&audio.path))
            .await?;
        advance(state, PipelineState::Transcribed);

        let prompt = self.composer.compose(&transcript);
        advance(state, PipelineState::Prompted);

        let raw_output = self
            .stage("Generating quiz...", self.generator.generate(&prompt))
            .await?;
        advance(state, PipelineState::Generated);
        tracing::debug!(preview = %truncate_for_log(&raw_output, 200), "Raw model output");

        let quiz = self.normalizer.normalize(&raw_output, &audio.title)?;
        advance(state, PipelineState::Normalized);

        Ok(quiz)
    }

    fn create_workdir(&self) -> Result<TempDir, PipelineError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("quizly-");

        let created = match &self.temp_root {
            Some(root) => fs_err::create_dir_all(root).and_then(|_| builder.tempdir_in(root)),
            None => builder.tempdir(),
        };

        created.map_err(|e| {
            PipelineError::new(
                Stage::Fetch,
                ErrorKind::FetchError,
                format!("Failed to create work directory: {}", e),
            )
        })
    }

    /// Await one stage behind a spinner, converting its error into the pipeline taxonomy
    async fn stage<T, E, F>(&self, message: &'static str, future: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, E>>,
        PipelineError: From<E>,
    {
        let spinner = self.spinner(message);
        let result = future.await.map_err(PipelineError::from);

        match &result {
            Ok(_) => spinner.finish_and_clear(),
            Err(_) => spinner.abandon_with_message(format!("{} failed", message.trim_end_matches("..."))),
        }

        result
    }

    fn spinner(&self, message: &'static str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner
    }
}

fn advance(state: &mut PipelineState, next: PipelineState) {
    debug_assert!(next > *state, "pipeline state must move forward");
    *state = next;
    info!(stage = next.stage(), state = ?next, "Pipeline state changed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::{FetchError, FetchedAudio, MockMediaFetcher};
    use crate::generate::{GenerationError, MockGenerativeClient};
    use crate::transcribe::{MockTranscriber, TranscriptionError};
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    const SCENARIO_RAW: &str =
        "```json\n[{\"question\":\"Q1\",\"options\":[\"A\",\"B\"],\"answer\":\"A\"}]\n```";

    fn input() -> PipelineInput {
        PipelineInput::new("https://www.youtube.com/watch?v=abc123").unwrap()
    }

    fn fetcher_writing_audio(title: &'static str) -> MockMediaFetcher {
        let mut fetcher = MockMediaFetcher::new();
        fetcher.expect_fetch().times(1).returning(move |_, workdir| {
            let path = workdir.join("audio.webm");
            fs_err::write(&path, b"audio").unwrap();
            Ok(FetchedAudio {
                path,
                title: title.to_string(),
            })
        });
        fetcher
    }

    fn transcriber_returning(text: &'static str) -> MockTranscriber {
        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .withf(|path| path.ends_with("audio.webm") && path.is_file())
            .times(1)
            .returning(move |_| Ok(text.to_string()));
        transcriber
    }

    fn generator_returning(raw: &'static str) -> MockGenerativeClient {
        let mut generator = MockGenerativeClient::new();
        generator
            .expect_generate()
            .times(1)
            .returning(move |_| Ok(raw.to_string()));
        generator
    }

    fn pipeline(
        fetcher: MockMediaFetcher,
        transcriber: MockTranscriber,
        generator: MockGenerativeClient,
        temp_root: &Path,
    ) -> QuizPipeline {
        QuizPipeline::from_parts(
            Arc::new(fetcher),
            Arc::new(transcriber),
            Arc::new(generator),
            &QuizConfig::default(),
        )
        .with_temp_root(Some(temp_root.to_path_buf()))
    }

    fn assert_no_residue(root: &Path) {
        let leftovers: Vec<_> = std::fs::read_dir(root).unwrap().collect();
        assert!(leftovers.is_empty(), "temporary files left behind: {:?}", leftovers);
    }

    #[tokio::test]
    async fn test_successful_run_produces_quiz() {
        let root = tempfile::tempdir().unwrap();
        let mut generator = MockGenerativeClient::new();
        generator
            .expect_generate()
            .withf(|prompt| prompt.contains("Ownership moves values.") && prompt.contains("exactly 5"))
            .times(1)
            .returning(|_| Ok(SCENARIO_RAW.to_string()));

        let pipeline = pipeline(
            fetcher_writing_audio("My Video"),
            transcriber_returning("Ownership moves values."),
            generator,
            root.path(),
        );

        let quiz = assert_ok!(pipeline.run(&input()).await);

        assert_eq!(quiz.title, "My Video");
        assert_eq!(quiz.description, "Quiz generated from: My Video");
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.questions[0].question_title, "Q1");
        assert_eq!(quiz.questions[0].question_options, vec!["A", "B"]);
        assert_eq!(quiz.questions[0].answer, "A");
        assert_no_residue(root.path());
    }

    #[tokio::test]
    async fn test_fetch_failure_stops_pipeline_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let mut fetcher = MockMediaFetcher::new();
        fetcher.expect_fetch().times(1).returning(|_, workdir| {
            fs_err::write(workdir.join("audio.webm.part"), b"partial").unwrap();
            Err(FetchError::Failed("Unable to download webpage: unreachable".to_string()))
        });
        let mut transcriber = MockTranscriber::new();
        transcriber.expect_transcribe().never();
        let mut generator = MockGenerativeClient::new();
        generator.expect_generate().never();

        let pipeline = pipeline(fetcher, transcriber, generator, root.path());
        let err = assert_err!(pipeline.run(&input()).await);

        assert_eq!(err.stage, Stage::Fetch);
        assert_eq!(err.kind, ErrorKind::FetchError);
        assert!(err.message.contains("unreachable"));
        assert_no_residue(root.path());
    }

    #[tokio::test]
    async fn test_empty_model_output_fails_in_normalize() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            fetcher_writing_audio("My Video"),
            transcriber_returning("some speech"),
            generator_returning(""),
            root.path(),
        );

        let err = assert_err!(pipeline.run(&input()).await);

        assert_eq!(err.stage, Stage::Normalize);
        assert_eq!(err.kind, ErrorKind::EmptyOutputError);
        assert_no_residue(root.path());
    }

    #[tokio::test]
    async fn test_malformed_output_keeps_raw_diagnostics() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            fetcher_writing_audio("My Video"),
            transcriber_returning("some speech"),
            generator_returning("Sure! Here is your quiz."),
            root.path(),
        );

        let err = assert_err!(pipeline.run(&input()).await);

        assert_eq!(err.kind, ErrorKind::MalformedJsonError);
        assert_eq!(err.raw.as_deref(), Some("Sure! Here is your quiz."));
    }

    #[tokio::test]
    async fn test_schema_violation_is_terminal() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            fetcher_writing_audio("My Video"),
            transcriber_returning("some speech"),
            generator_returning(r#"[{"question":"Q1","options":["A","B"]}]"#),
            root.path(),
        );

        let err = assert_err!(pipeline.run(&input()).await);

        assert_eq!(err.kind, ErrorKind::SchemaValidationError);
        assert!(err.message.contains("`answer`"));
    }

    #[tokio::test]
    async fn test_transcription_failure_skips_generation() {
        let root = tempfile::tempdir().unwrap();
        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .times(1)
            .returning(|_| Err(TranscriptionError::Timeout(900)));
        let mut generator = MockGenerativeClient::new();
        generator.expect_generate().never();

        let pipeline = pipeline(fetcher_writing_audio("My Video"), transcriber, generator, root.path());
        let err = assert_err!(pipeline.run(&input()).await);

        assert_eq!(err.stage, Stage::Transcribe);
        assert_eq!(err.kind, ErrorKind::TranscriptionError);
        assert_no_residue(root.path());
    }

    #[tokio::test]
    async fn test_generation_failure_maps_to_generate_stage() {
        let root = tempfile::tempdir().unwrap();
        let mut generator = MockGenerativeClient::new();
        generator.expect_generate().times(1).returning(|_| {
            Err(GenerationError::Api {
                status: 503,
                body: "overloaded".to_string(),
            })
        });

        let pipeline = pipeline(
            fetcher_writing_audio("My Video"),
            transcriber_returning("speech"),
            generator,
            root.path(),
        );
        let err = assert_err!(pipeline.run(&input()).await);

        assert_eq!(err.stage, Stage::Generate);
        assert_eq!(err.kind, ErrorKind::GenerationError);
        assert_eq!(err.raw.as_deref(), Some("overloaded"));
    }

    #[tokio::test]
    async fn test_empty_transcript_still_reaches_generator() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            fetcher_writing_audio("Silent Film"),
            transcriber_returning(""),
            generator_returning(SCENARIO_RAW),
            root.path(),
        );

        let quiz = assert_ok!(pipeline.run(&input()).await);
        assert_eq!(quiz.title, "Silent Film");
    }

    #[tokio::test]
    async fn test_concurrent_runs_use_separate_workdirs() {
        let root = tempfile::tempdir().unwrap();
        let seen: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));

        let mut fetcher = MockMediaFetcher::new();
        let recorded = Arc::clone(&seen);
        fetcher.expect_fetch().times(2).returning(move |_, workdir| {
            recorded.lock().unwrap().push(workdir.to_path_buf());
            let path = workdir.join("audio.webm");
            fs_err::write(&path, b"audio").unwrap();
            Ok(FetchedAudio {
                path,
                title: "Video".to_string(),
            })
        });
        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .times(2)
            .returning(|_| Ok("speech".to_string()));
        let mut generator = MockGenerativeClient::new();
        generator
            .expect_generate()
            .times(2)
            .returning(|_| Ok(SCENARIO_RAW.to_string()));

        let pipeline = pipeline(fetcher, transcriber, generator, root.path());
        let (first_input, second_input) = (input(), input());
        let (first, second) = tokio::join!(pipeline.run(&first_input), pipeline.run(&second_input));

        assert_ok!(first);
        assert_ok!(second);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_ne!(seen[0], seen[1]);
        assert!(seen.iter().all(|dir| dir.starts_with(root.path())));
        assert_no_residue(root.path());
    }

    #[test]
    fn test_pipeline_input_validation() {
        assert!(PipelineInput::new("https://vimeo.com/123").is_ok());
        assert!(matches!(PipelineInput::new("vimeo.com/123"), Err(InputError::InvalidUrl(_))));
        assert!(matches!(
            PipelineInput::new("file:///etc/passwd"),
            Err(InputError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_states_are_ordered() {
        assert!(PipelineState::Start < PipelineState::Fetched);
        assert!(PipelineState::Generated < PipelineState::Normalized);
        assert!(PipelineState::Normalized < PipelineState::Done);
    }

    #[test]
    fn test_states_name_their_stage() {
        assert_eq!(PipelineState::Fetched.stage(), "fetch");
        assert_eq!(PipelineState::Transcribed.stage(), "transcribe");
        assert_eq!(PipelineState::Prompted.stage(), "compose");
        assert_eq!(PipelineState::Generated.stage(), "generate");
        assert_eq!(PipelineState::Normalized.stage(), "normalize");
    }

    /// Writes a partial download, then never finishes
    struct StallingFetcher;

    #[async_trait::async_trait]
    impl MediaFetcher for StallingFetcher {
        async fn fetch(&self, _url: &Url, workdir: &Path) -> Result<FetchedAudio, FetchError> {
            fs_err::write(workdir.join("audio.webm.part"), b"partial")?;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(FetchError::Timeout(3600))
        }

        fn supports_url(&self, _url: &Url) -> bool {
            true
        }

        fn platform_name(&self) -> &'static str {
            "stalling"
        }
    }

    #[tokio::test]
    async fn test_cancelled_run_leaves_no_workdir() {
        let root = tempfile::tempdir().unwrap();
        let mut transcriber = MockTranscriber::new();
        transcriber.expect_transcribe().never();
        let mut generator = MockGenerativeClient::new();
        generator.expect_generate().never();

        let pipeline = QuizPipeline::from_parts(
            Arc::new(StallingFetcher),
            Arc::new(transcriber),
            Arc::new(generator),
            &QuizConfig::default(),
        )
        .with_temp_root(Some(root.path().to_path_buf()));

        let input = input();
        let outcome = tokio::time::timeout(Duration::from_millis(200), pipeline.run(&input)).await;

        assert!(outcome.is_err());
        assert_no_residue(root.path());
    }
}
