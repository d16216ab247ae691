// ============================================================================
// reelrun-cli/src/cli.rs
// ============================================================================
//
// ARGUMENTS: Command-Line Definitions for clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use reelrun_core::pipelines::{AudioFormat, Container, Resolution};

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "Reelrun: batch runner for external media tools",
    long_about = "Downloads, extracts, translates, burns in and transcribes subtitles by driving \
                  ffmpeg, N_m3u8DL-RE, gst and a Whisper wrapper script, one item at a time."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Print job events as JSON lines instead of the terminal view
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    /// Show debug output
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Write a log file for this run into LOG_DIR
    #[arg(long, global = true, value_name = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Seconds a cancelled tool gets to stop before it is killed
    #[arg(long, global = true, value_name = "SECONDS", default_value_t = 3.0)]
    pub grace_secs: f64,

    /// Require every item to succeed for the run to count as successful
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    // --- Tool Overrides ---
    /// Transcoder program
    #[arg(long, global = true, value_name = "PROGRAM", env = "REELRUN_FFMPEG")]
    pub ffmpeg: Option<String>,

    /// Media probe program
    #[arg(long, global = true, value_name = "PROGRAM", env = "REELRUN_FFPROBE")]
    pub ffprobe: Option<String>,

    /// Segmented-stream downloader program
    #[arg(long, global = true, value_name = "PROGRAM", env = "REELRUN_DOWNLOADER")]
    pub downloader: Option<String>,

    /// Subtitle translator command (may include arguments, e.g. "python3 -m gemini_srt_translator")
    #[arg(long, global = true, value_name = "COMMAND", env = "REELRUN_TRANSLATOR")]
    pub translator: Option<String>,

    /// Speech-to-text wrapper script
    #[arg(long, global = true, value_name = "SCRIPT", env = "REELRUN_TRANSCRIBER_SCRIPT")]
    pub transcriber_script: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Runs pasted downloader command lines, one per episode
    Download(DownloadArgs),
    /// Extracts the first subtitle track of every .mkv in a directory
    Extract(ExtractArgs),
    /// Translates .srt files, keeping the originals as <name>_OG.srt
    Translate(TranslateArgs),
    /// Burns subtitles into videos and scales them to 720p or 1080p
    Transcode(TranscodeArgs),
    /// Transcribes videos with the speech-to-text wrapper script
    Transcribe(TranscribeArgs),
    /// Removes color tags from every .srt file in a directory
    Clean(CleanArgs),
    /// Adds each video's .srt/.vtt as a soft subtitle track without re-encoding
    Remux(RemuxArgs),
    /// Writes every audio channel of each video as its own mono .wav
    SplitAudio(SplitAudioArgs),
    /// Re-encodes the audio of each video to .mp3 or .m4a, dropping the video
    ConvertAudio(ConvertAudioArgs),
    /// Lists the stream URLs in a browser HAR capture, ready for `download -f`
    Har(HarArgs),
}

impl Commands {
    /// Short name used for log files.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Download(_) => "download",
            Commands::Extract(_) => "extract",
            Commands::Translate(_) => "translate",
            Commands::Transcode(_) => "transcode",
            Commands::Transcribe(_) => "transcribe",
            Commands::Clean(_) => "clean",
            Commands::Remux(_) => "remux",
            Commands::SplitAudio(_) => "split-audio",
            Commands::ConvertAudio(_) => "convert-audio",
            Commands::Har(_) => "har",
        }
    }
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// File with one downloader command line per episode (reads stdin when omitted)
    #[arg(short = 'f', long = "file", value_name = "COMMANDS_FILE")]
    pub commands_file: Option<PathBuf>,

    /// Episode numbers assigned to the lines, e.g. "1-3,5" or a single start number
    #[arg(short, long, default_value = "1", value_name = "RANGE")]
    pub episodes: String,

    /// Directory the episodes are saved to
    #[arg(short = 'o', long = "output", default_value = "downloads", value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Directory containing the downloaded .mkv files
    #[arg(short = 'i', long = "input", default_value = "downloads", value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Directory for the extracted subtitles (defaults to INPUT_DIR/subs)
    #[arg(short = 's', long = "subs", value_name = "SUBS_DIR")]
    pub subtitles_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct TranslateArgs {
    /// Subtitle files or directories holding them
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Target language
    #[arg(short, long, default_value = "English")]
    pub language: String,

    /// Translator API key (falls back to GST_API_KEY)
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Optional second API key
    #[arg(long, hide_env_values = true)]
    pub api_key2: Option<String>,

    /// Rename results to <name>.<iso code>.srt
    #[arg(long, default_value_t = false)]
    pub iso_suffix: bool,
}

#[derive(Args, Debug)]
pub struct TranscodeArgs {
    /// Video files or directories holding them
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Directory searched for <name>.srt after the video's own directory
    #[arg(short = 's', long = "subs", default_value = "downloads/subs", value_name = "SUBS_DIR")]
    pub subtitles_dir: PathBuf,

    /// Directory for the transcoded .mp4 files
    #[arg(short = 'o', long = "output", default_value = "output", value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Target resolution (720 or 1080)
    #[arg(short, long, default_value = "720")]
    pub resolution: Resolution,

    /// Image overlaid on the video
    #[arg(short, long, value_name = "IMAGE")]
    pub watermark: Option<PathBuf>,

    /// Also look for <name>.<iso code>.srt subtitles
    #[arg(long, default_value_t = false)]
    pub iso_suffix: bool,

    /// Language whose ISO code is used with --iso-suffix
    #[arg(short, long, default_value = "English")]
    pub language: String,
}

#[derive(Args, Debug)]
pub struct TranscribeArgs {
    /// Video files or directories holding them
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Spoken language code
    #[arg(short, long, default_value = "en")]
    pub language: String,

    /// Speech model
    #[arg(short, long, default_value = "turbo")]
    pub model: String,

    /// Output format: srt, vtt, txt, tsv, json or all
    #[arg(short, long, default_value = "srt")]
    pub format: String,

    /// Extra arguments for the speech engine
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    pub extra_args: Option<String>,

    /// Start of the excerpt to transcribe, in seconds
    #[arg(long, requires = "end", value_name = "SECONDS")]
    pub start: Option<u64>,

    /// End of the excerpt to transcribe, in seconds
    #[arg(long, requires = "start", value_name = "SECONDS")]
    pub end: Option<u64>,

    /// Keep excerpt timestamps relative to the excerpt instead of the video
    #[arg(long, default_value_t = false)]
    pub no_adjust_timestamps: bool,
}

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Directory containing the .srt files
    #[arg(default_value = "downloads/subs", value_name = "DIR")]
    pub dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct RemuxArgs {
    /// Directory containing the .mkv/.mp4 files and their subtitles
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Container of the remuxed files (mkv or mp4)
    #[arg(short, long, default_value = "mkv")]
    pub format: Container,
}

#[derive(Args, Debug)]
pub struct SplitAudioArgs {
    /// Video files or directories holding them
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Channel count to split into (read from each file when omitted)
    #[arg(short, long, value_name = "N")]
    pub channels: Option<u32>,
}

#[derive(Args, Debug)]
pub struct ConvertAudioArgs {
    /// Video files or directories holding them
    #[arg(required = true, value_name = "INPUT")]
    pub inputs: Vec<PathBuf>,

    /// Target audio format (mp3 or aac)
    #[arg(short, long, default_value = "mp3")]
    pub format: AudioFormat,
}

#[derive(Args, Debug)]
pub struct HarArgs {
    /// HAR file saved from the browser's network panel
    #[arg(value_name = "HAR_FILE")]
    pub file: PathBuf,

    /// Print the captured cookies as a Cookie header value instead
    #[arg(long, default_value_t = false)]
    pub cookies: bool,
}
