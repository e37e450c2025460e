use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use phototag::processing::{process_folder, BatchOptions};
use phototag::server::{self, state::AppState};
use phototag::settings::Settings;
use phototag::utils::ensure_directory_exists;
use phototag::{OutputTarget, TagOutcome, Tagger};

#[derive(Parser)]
#[command(name = "phototag", version, about = "Stamp photos with where and when they were taken")]
struct Cli {
    /// More output (-v info, -vv debug, -vvv trace). RUST_LOG wins when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (defaults to phototag.ini in the app data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Preferred font file
    #[arg(long, global = true)]
    font: Option<PathBuf>,

    /// Maximum output width in pixels
    #[arg(long, global = true)]
    max_width: Option<u32>,

    /// Reverse geocoding endpoint
    #[arg(long, global = true)]
    geocoder_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tag a single image
    Tag {
        image: PathBuf,
        /// Output file (defaults to <dir>/tagged/<stem>_tagged.png)
        output: Option<PathBuf>,
        /// Directory for the tagged file
        #[arg(long, conflicts_with = "output")]
        output_dir: Option<PathBuf>,
    },
    /// Tag every image in a folder
    Batch {
        folder: PathBuf,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Descend into subfolders
        #[arg(short, long)]
        recursive: bool,
        /// Images processed in parallel
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,
    },
    /// Serve the browsing UI
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
        /// Open the UI in the default browser
        #[arg(long)]
        open: bool,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_settings(cli: &Cli) -> Result<(Settings, PathBuf)> {
    let config_path = cli.config.clone().unwrap_or_else(Settings::config_path);
    let mut settings = Settings::load_from(&config_path)
        .with_context(|| format!("Failed to load settings from {}", config_path.display()))?;
    debug!("Settings loaded from {}", config_path.display());

    if let Some(font) = &cli.font {
        settings.font_path = Some(font.to_string_lossy().to_string());
    }
    if let Some(max_width) = cli.max_width {
        settings.max_width = max_width;
    }
    if let Some(url) = &cli.geocoder_url {
        settings.geocoder_url = url.clone();
    }
    Ok((settings, config_path))
}

fn run(cli: Cli) -> Result<ExitCode> {
    let (mut settings, config_path) = load_settings(&cli)?;

    match cli.command {
        Command::Tag {
            image,
            output,
            output_dir,
        } => {
            let tagger = Tagger::new(&settings)?;
            let target = match (output, output_dir) {
                (Some(file), _) => OutputTarget::File(file),
                (None, Some(dir)) => OutputTarget::Directory(dir),
                (None, None) => OutputTarget::Auto,
            };

            let outcome = tagger.tag(&image, &target);
            match &outcome {
                TagOutcome::Success(path) => println!("✅ {} -> {}", image.display(), path.display()),
                TagOutcome::Skipped(reason) => println!("⏭️  {}: {}", image.display(), reason),
                TagOutcome::Failed(kind, detail) => {
                    eprintln!("❌ {}: {} ({})", image.display(), detail, kind)
                }
            }
            save_cache(&tagger);

            Ok(if outcome.is_failed() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }

        Command::Batch {
            folder,
            output_dir,
            recursive,
            jobs,
        } => {
            if let Some(dir) = &output_dir {
                ensure_directory_exists(dir)
                    .with_context(|| format!("Cannot create output directory {}", dir.display()))?;
            }

            let tagger = Tagger::new(&settings)?;
            let options = BatchOptions {
                recursive,
                output_dir,
                jobs: jobs.max(1),
                silent_mode: false,
            };
            let stats = process_folder(&tagger, &folder, &options)?;
            save_cache(&tagger);

            Ok(if stats.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }

        Command::Serve { port, open } => {
            if let Some(port) = port {
                settings.port = port;
            }
            let port = settings.port;
            let open = open || settings.auto_open_browser;

            // Built outside the runtime: the blocking HTTP client must not be
            // created or dropped on an async thread.
            let tagger = Arc::new(Tagger::new(&settings)?);
            let state = AppState {
                tagger: tagger.clone(),
                settings: Arc::new(Mutex::new(settings)),
                config_path: Some(config_path),
            };

            println!("🚀 Starting PhotoTag server...");
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(server::start_server(state, port, open))?;
            drop(runtime);

            save_cache(&tagger);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn save_cache(tagger: &Tagger) {
    if let Err(e) = tagger.save_cache() {
        warn!("Failed to save geocode cache: {:#}", e);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
