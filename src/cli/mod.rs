use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "quizly",
    about = "Quizly - Turn the spoken content of a video into a multiple-choice quiz",
    version,
    long_about = "Downloads the audio track of a video, transcribes it locally with Whisper and asks Google Gemini to write a multiple-choice quiz about what was said."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Configuration file (defaults to ./quizly.yaml or the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a quiz from a video URL
    Generate {
        /// Video URL (YouTube, Vimeo, direct media link, ...)
        #[arg(value_name = "URL")]
        url: String,

        /// Output file or directory (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Include the correct answers in text output
        #[arg(long)]
        show_answers: bool,

        /// Gemini API key (overrides the configuration file)
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Validate a saved raw model response offline
    Normalize {
        /// File holding the raw model text, or `-` for stdin
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Video title to attach to the quiz
        #[arg(short, long, value_name = "TITLE")]
        title: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Print the prompt that would be sent for a transcript
    Prompt {
        /// Transcript file, or `-` for stdin
        #[arg(value_name = "TRANSCRIPT_FILE")]
        input: PathBuf,
    },

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Check that the external tools are installed
    Check,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
    /// Human-readable text
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Text => "txt",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
            OutputFormat::Text => write!(f, "text"),
        }
    }
}
