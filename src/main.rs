// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::File;
use std::io::{BufReader, IsTerminal, Write};
use std::path::{Path, PathBuf};

use subspeed::app_config::{self, Config, InputSelection, Resolution};
use subspeed::app_controller::{self, Controller, RunOptions};
use subspeed::file_utils::FileManager;
use subspeed::renderer::FfmpegCodec;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate shell completions for subspeed
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct RetimeArgs {
    /// Title of the input pair: reads <TITLE>.mp4 and <TITLE>.srt
    #[arg(short, long, conflicts_with_all = ["video", "subtitles"])]
    title: Option<String>,

    /// Input video file (use together with --subtitles)
    #[arg(short = 'i', long, requires = "subtitles")]
    video: Option<PathBuf>,

    /// Input SRT file (use together with --video)
    #[arg(short, long, requires = "video")]
    subtitles: Option<PathBuf>,

    /// Seconds added to every caption before retiming (may be negative)
    #[arg(short, long, allow_hyphen_values = true)]
    offset: Option<f64>,

    /// Playback speed while a caption is shown
    #[arg(long)]
    subtitle_speed: Option<f64>,

    /// Playback speed between captions
    #[arg(long)]
    non_subtitle_speed: Option<f64>,

    /// Output resolution, e.g. 640x360
    #[arg(short, long)]
    resolution: Option<Resolution>,

    /// Output frame rate
    #[arg(long)]
    fps: Option<u32>,

    /// Encoder threads (0 = all cores)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Output video path (default: input name with the output prefix)
    #[arg(long)]
    output_video: Option<PathBuf>,

    /// Output SRT path (default: input name with the output prefix)
    #[arg(long)]
    output_subtitles: Option<PathBuf>,

    /// Only rewrite the subtitles, do not render the video
    #[arg(long)]
    captions_only: bool,

    /// Print the retiming plan without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// subspeed - play dialogue at one speed and silence at another
///
/// Speeds up a video using its subtitles: spans covered by a subtitle play at
/// the subtitle speed, everything else at the faster non-subtitle speed, and
/// the subtitles are rewritten to stay in sync.
#[derive(Parser, Debug)]
#[command(name = "subspeed")]
#[command(version)]
#[command(about = "Dialogue-aware video speed-up")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "subspeed plays the parts of a video covered by subtitles at one speed and the rest at another, and rewrites the subtitles to match.

EXAMPLES:
    subspeed -t lecture                          # lecture.mp4 + lecture.srt -> faster_lecture.*
    subspeed -i talk.mkv -s talk.en.srt          # explicit input paths
    subspeed -t lecture -o 9                     # subtitles run 9 seconds early
    subspeed -t lecture --subtitle-speed 1.25 --non-subtitle-speed 4
    subspeed -t lecture -r 1280x720 --fps 30 -j 4
    subspeed -t lecture --captions-only          # rewrite the SRT only
    subspeed -t lecture --dry-run -l debug       # show the retiming plan
    subspeed completions bash > subspeed.bash    # generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. Command line flags override config values.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    retime: RetimeArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and tag for a level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "ERROR"),
            Level::Warn => ("\x1B[1;33m", "WARN "),
            Level::Info => ("\x1B[1;32m", "INFO "),
            Level::Debug => ("\x1B[1;36m", "DEBUG"),
            Level::Trace => ("\x1B[1;35m", "TRACE"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        // the max level set after config load is the real gate
        metadata.level() <= self.level.max(log::max_level())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        let mut stderr = std::io::stderr();

        let _ = if stderr.is_terminal() {
            let (color, tag) = Self::style_for_level(record.level());
            writeln!(stderr, "{}{} {} {}\x1B[0m", color, now, tag, record.args())
        } else {
            let (_, tag) = Self::style_for_level(record.level());
            writeln!(stderr, "{} {} {}", now, tag, record.args())
        };
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() {
    // Info until the config says otherwise
    if let Err(e) = CustomLogger::init(LevelFilter::Info) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    let cli = CommandLineOptions::parse();

    let result = match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "subspeed", &mut std::io::stdout());
            Ok(())
        }
        None => run_retime(cli.retime).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(app_controller::exit_code(&e));
    }
}

async fn run_retime(options: RetimeArgs) -> Result<()> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &options.log_level {
        log::set_max_level(level_filter(&cmd_log_level.clone().into()));
    }

    let config = load_config(&options)?;

    // If log level was not set via command line, update it from config now
    if options.log_level.is_none() {
        log::set_max_level(level_filter(&config.log_level));
    }

    let selection = InputSelection::from_parts(
        options.title.clone(),
        options.video.clone(),
        options.subtitles.clone(),
    )?;

    if !options.captions_only && !options.dry_run {
        FfmpegCodec::check_tools()?;
    }

    let controller = Controller::with_config(config)?;
    let controller = if std::io::stderr().is_terminal() {
        controller
    } else {
        controller.without_progress()
    };

    let run_options = RunOptions {
        force_overwrite: options.force_overwrite,
        captions_only: options.captions_only,
        dry_run: options.dry_run,
        output_video: options.output_video.clone(),
        output_caption: options.output_subtitles.clone(),
    };

    controller.run(&selection, &run_options).await?;
    Ok(())
}

/// Load or create the config file, then apply command line overrides
fn load_config(options: &RetimeArgs) -> Result<Config> {
    let config_path = &options.config_path;
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        FileManager::write_to_file(config_path, &config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;

        config
    };

    if let Some(offset) = options.offset {
        config.subtitle_offset_secs = offset;
    }
    if let Some(speed) = options.subtitle_speed {
        config.subtitle_speed_factor = speed;
    }
    if let Some(speed) = options.non_subtitle_speed {
        config.non_subtitle_speed_factor = speed;
    }
    if let Some(resolution) = options.resolution {
        config.target_resolution = resolution;
    }
    if let Some(fps) = options.fps {
        config.target_fps = fps;
    }
    if let Some(threads) = options.threads {
        config.encode_threads = threads;
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    config.validate()?;
    Ok(config)
}
